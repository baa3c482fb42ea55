//! Key encoding and record (de)serialization

use serde::de::DeserializeOwned;
use serde::Serialize;

use docket_core::{StorageError, StorageResult};

pub(crate) fn id_key(id: i64) -> [u8; 8] {
    (id as u64).to_be_bytes()
}

pub(crate) fn pair_key(parent: i64, child: i64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&id_key(parent));
    key[8..].copy_from_slice(&id_key(child));
    key
}

pub(crate) fn decode_id(bytes: &[u8]) -> StorageResult<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Backend(format!("invalid id key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw) as i64)
}

/// Child id from a `pair_key`
pub(crate) fn decode_child(bytes: &[u8]) -> StorageResult<i64> {
    if bytes.len() != 16 {
        return Err(StorageError::Backend(format!(
            "invalid index key of {} bytes",
            bytes.len()
        )));
    }
    decode_id(&bytes[8..])
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn backend(err: sled::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_sort_by_id() {
        assert!(id_key(2) > id_key(1));
        assert!(id_key(256) > id_key(255));
        assert!(pair_key(1, 300) < pair_key(2, 1));
    }

    #[test]
    fn test_decode_keys() {
        assert_eq!(decode_id(&id_key(42)).unwrap(), 42);
        assert_eq!(decode_child(&pair_key(7, 9)).unwrap(), 9);
        assert!(decode_id(&[1, 2, 3]).is_err());
        assert!(decode_child(&id_key(1)).is_err());
    }
}
