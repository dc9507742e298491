//! ABI packing for `execute(ForwardRequestData)` and
//! `executeBatch(ForwardRequestData[], address)`.
//!
//! `ForwardRequestData` is the forwarder's seven-field call tuple. It is not
//! the six-field `ForwardRequest` typed struct used for EIP-712 hashing: the
//! call tuple carries the signature and omits the nonce (the forwarder reads
//! that from its own storage).

use alloy_primitives::{Address, U256};
use metafwd_types::{BatchRequest, MetaFwdError, Result};

use crate::calldata::{self, address_word, u64_word, uint_word};

/// Canonical signature of `execute`.
pub const EXECUTE_SIG: &str = "execute((address,address,uint256,uint256,uint48,bytes,bytes))";

/// Canonical signature of `executeBatch`.
pub const EXECUTE_BATCH_SIG: &str =
    "executeBatch((address,address,uint256,uint256,uint48,bytes,bytes)[],address)";

/// The tuple the ERC2771Forwarder decodes for each forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequestData {
    pub from: Address,
    /// Call target of the forwarder: the ERC-20 contract.
    pub to: Address,
    pub value: U256,
    pub gas: U256,
    /// Unix seconds; uint48 on the wire.
    pub deadline: u64,
    /// Inner calldata, here always an ERC-20 `transfer`.
    pub data: Vec<u8>,
    /// 65-byte r‖s‖v signature over the EIP-712 digest.
    pub signature: Vec<u8>,
}

impl ForwardRequestData {
    /// Build the call tuple from a signed meta transaction.
    ///
    /// The forwarder targets the token contract; the transfer recipient only
    /// appears inside the inner calldata. ERC-20 transfers carry no ETH.
    pub fn from_request(req: &BatchRequest) -> Self {
        ForwardRequestData {
            from: req.meta_tx.from,
            to: req.meta_tx.token,
            value: U256::ZERO,
            gas: U256::from(req.meta_tx.gas),
            deadline: req.meta_tx.deadline,
            data: calldata::transfer_calldata(&req.meta_tx.to, &req.meta_tx.amount),
            signature: req.signature.to_bytes().to_vec(),
        }
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(32) * 32
}

/// Append a `bytes` tail: length word, contents, zero padding to a word
/// boundary.
fn append_bytes_tail(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&u64_word(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

/// Encode one `ForwardRequestData` as a dynamic ABI tuple: seven head words
/// (two of them tail offsets), then the `data` and `signature` tails.
fn encode_request_tuple(req: &ForwardRequestData) -> Result<Vec<u8>> {
    if req.deadline >> 48 != 0 {
        return Err(MetaFwdError::EncodingBug("deadline exceeds uint48"));
    }

    let head_len = 7 * 32;
    let data_tail_len = 32 + padded_len(req.data.len());
    let sig_tail_len = 32 + padded_len(req.signature.len());

    let mut out = Vec::with_capacity(head_len + data_tail_len + sig_tail_len);
    out.extend_from_slice(&address_word(&req.from));
    out.extend_from_slice(&address_word(&req.to));
    out.extend_from_slice(&uint_word(&req.value));
    out.extend_from_slice(&uint_word(&req.gas));
    out.extend_from_slice(&u64_word(req.deadline));
    out.extend_from_slice(&u64_word(head_len as u64));
    out.extend_from_slice(&u64_word((head_len + data_tail_len) as u64));
    append_bytes_tail(&mut out, &req.data);
    append_bytes_tail(&mut out, &req.signature);

    if out.len() != head_len + data_tail_len + sig_tail_len {
        return Err(MetaFwdError::EncodingBug("request tuple length drifted"));
    }
    Ok(out)
}

/// Encode the full calldata for `execute(request)`.
pub fn encode_execute(req: &ForwardRequestData) -> Result<Vec<u8>> {
    let tuple = encode_request_tuple(req)?;

    let mut out = Vec::with_capacity(4 + 32 + tuple.len());
    out.extend_from_slice(&calldata::selector(EXECUTE_SIG));
    // One dynamic argument: its head is a single offset word.
    out.extend_from_slice(&u64_word(32));
    out.extend_from_slice(&tuple);
    Ok(out)
}

/// Encode the full calldata for `executeBatch(requests, refundReceiver)`.
///
/// The requests array is a dynamic array of dynamic tuples: length word,
/// per-element offsets relative to the start of the element area, then the
/// concatenated tuple encodings. A zero `refund_receiver` makes the
/// forwarder execute the batch atomically.
pub fn encode_execute_batch(
    requests: &[ForwardRequestData],
    refund_receiver: &Address,
) -> Result<Vec<u8>> {
    let tuples = requests
        .iter()
        .map(encode_request_tuple)
        .collect::<Result<Vec<_>>>()?;

    let offsets_len = 32 * tuples.len();
    let tuples_len: usize = tuples.iter().map(Vec::len).sum();

    let mut out = Vec::with_capacity(4 + 2 * 32 + 32 + offsets_len + tuples_len);
    out.extend_from_slice(&calldata::selector(EXECUTE_BATCH_SIG));
    // Argument heads: offset of the requests array, then the refund receiver.
    out.extend_from_slice(&u64_word(64));
    out.extend_from_slice(&address_word(refund_receiver));
    // Array region.
    out.extend_from_slice(&u64_word(requests.len() as u64));
    let mut offset = offsets_len;
    for tuple in &tuples {
        out.extend_from_slice(&u64_word(offset as u64));
        offset += tuple.len();
    }
    for tuple in &tuples {
        out.extend_from_slice(tuple);
    }

    if out.len() != 4 + 2 * 32 + 32 + offsets_len + tuples_len {
        return Err(MetaFwdError::EncodingBug("batch calldata length drifted"));
    }
    Ok(out)
}

/// Decode a single uint256 return word, as produced by `nonces(address)`.
pub fn decode_uint256(data: &[u8]) -> Option<U256> {
    if data.len() < 32 {
        return None;
    }
    Some(U256::from_be_slice(&data[0..32]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use metafwd_types::{MetaTx, Signature};

    fn sample_request() -> BatchRequest {
        BatchRequest {
            meta_tx: MetaTx {
                from: Address::from_slice(&hex!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
                to: Address::from_slice(&hex!("70997970C51812dc3A010C7d01b50e0d17dc79C8")),
                token: Address::from_slice(&hex!("5FbDB2315678afecb367f032d93F642f64180aa3")),
                amount: U256::from(1_000_000_000_000_000_000u64),
                gas: 100_000,
                nonce: 0,
                deadline: 2_000_000_000,
            },
            signature: Signature {
                r: [0x11; 32],
                s: [0x22; 32],
                v: 27,
            },
        }
    }

    fn word(data: &[u8], index: usize) -> &[u8] {
        // Words counted from after the selector.
        &data[4 + index * 32..4 + (index + 1) * 32]
    }

    #[test]
    fn execute_calldata_layout() {
        let req = ForwardRequestData::from_request(&sample_request());
        let data = encode_execute(&req).unwrap();

        // selector + argument offset + 7 head words + two bytes tails
        // (68 -> 96 and 65 -> 96 bytes padded, each with a length word).
        assert_eq!(data.len(), 4 + 32 + 7 * 32 + (32 + 96) + (32 + 96));

        assert_eq!(word(&data, 0), u64_word(32)); // tuple offset
        assert_eq!(word(&data, 1), address_word(&req.from));
        assert_eq!(word(&data, 2), address_word(&req.to));
        assert_eq!(word(&data, 3), uint_word(&U256::ZERO));
        assert_eq!(word(&data, 4), u64_word(100_000));
        assert_eq!(word(&data, 5), u64_word(2_000_000_000));
        assert_eq!(word(&data, 6), u64_word(224)); // data offset within tuple
        assert_eq!(word(&data, 7), u64_word(352)); // signature offset within tuple

        // data tail: length word then the 68-byte transfer calldata.
        assert_eq!(word(&data, 8), u64_word(68));
        assert_eq!(&data[4 + 9 * 32..4 + 9 * 32 + 68], req.data.as_slice());

        // signature tail: length word then 65 signature bytes, zero padded.
        assert_eq!(word(&data, 12), u64_word(65));
        let sig_start = 4 + 13 * 32;
        assert_eq!(&data[sig_start..sig_start + 65], req.signature.as_slice());
        assert!(data[sig_start + 65..].iter().all(|&b| b == 0));
    }

    #[test]
    fn execute_encoding_is_deterministic() {
        let req = ForwardRequestData::from_request(&sample_request());
        assert_eq!(encode_execute(&req).unwrap(), encode_execute(&req).unwrap());
    }

    #[test]
    fn execute_batch_calldata_layout() {
        let req = ForwardRequestData::from_request(&sample_request());
        let refund = Address::from_slice(&hex!("00000000000000000000000000000000000000ff"));
        let data = encode_execute_batch(&[req.clone(), req.clone()], &refund).unwrap();

        let tuple_len = 7 * 32 + (32 + 96) + (32 + 96);
        assert_eq!(data.len(), 4 + 2 * 32 + 32 + 2 * 32 + 2 * tuple_len);

        assert_eq!(word(&data, 0), u64_word(64)); // requests array offset
        assert_eq!(word(&data, 1), address_word(&refund));
        assert_eq!(word(&data, 2), u64_word(2)); // array length
        // Element offsets are relative to the start of the element area.
        assert_eq!(word(&data, 3), u64_word(64));
        assert_eq!(word(&data, 4), u64_word(64 + tuple_len as u64));

        // Both elements carry identical tuple encodings.
        let first = &data[4 + 5 * 32..4 + 5 * 32 + tuple_len];
        let second = &data[4 + 5 * 32 + tuple_len..];
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_deadline_is_rejected() {
        let mut req = ForwardRequestData::from_request(&sample_request());
        req.deadline = 1 << 48;
        assert!(matches!(
            encode_execute(&req),
            Err(MetaFwdError::EncodingBug(_))
        ));
    }

    #[test]
    fn decode_uint256_reads_first_word() {
        let mut data = vec![0u8; 32];
        data[31] = 7;
        assert_eq!(decode_uint256(&data), Some(U256::from(7u64)));
        assert_eq!(decode_uint256(&data[..31]), None);
    }
}
