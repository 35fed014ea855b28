//! CBOR encoding of entity payloads.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes CBOR bytes into a value.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the bytes are not valid CBOR for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        age: u8,
    }

    #[test]
    fn encode_then_decode() {
        let sample = Sample {
            name: "user5".into(),
            age: 30,
        };
        let bytes = encode(&sample).unwrap();
        assert_eq!(decode::<Sample>(&bytes).unwrap(), sample);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode::<Sample>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }
}
