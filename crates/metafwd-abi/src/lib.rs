//! Calldata construction for the ERC2771Forwarder call surface.
//!
//! - `calldata`: ERC-20 `transfer` and forwarder `nonces` call encoding
//! - `pack`: `execute` / `executeBatch` ABI encoding
//!
//! The encoders are specialized to the three function shapes the toolkit
//! talks to; there is no generic schema-driven ABI machinery.

pub mod calldata;
pub mod pack;

pub use calldata::{nonces_calldata, selector, transfer_calldata};
pub use pack::{decode_uint256, encode_execute, encode_execute_batch, ForwardRequestData};
