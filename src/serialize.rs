//! Deterministic binary (de)serialization of the database, with the literal
//! signature prefix/strip step that precedes encryption.

use serde::{de::DeserializeOwned, Serialize};

use crate::config::DB_SIGNATURE;
use crate::error::{ImcryptError, Result};

/// Serializes `value` to a deterministic binary form.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(ImcryptError::Serialization)
}

/// Deserializes a value previously produced by [`serialize`].
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(ImcryptError::Serialization)
}

/// Prepends the literal `imcrypt_v3` signature to `payload`.
pub fn sign(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DB_SIGNATURE.len() + payload.len());
    out.extend_from_slice(DB_SIGNATURE);
    out.extend_from_slice(payload);
    out
}

/// Strips and checks the `imcrypt_v3` signature from `signed`.
pub fn unsign(signed: &[u8]) -> Result<&[u8]> {
    signed
        .strip_prefix(DB_SIGNATURE)
        .ok_or(ImcryptError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_unsign_roundtrip() {
        let payload = b"some serialized database";
        let signed = sign(payload);
        assert_eq!(unsign(&signed).unwrap(), payload);
    }

    #[test]
    fn unsign_rejects_missing_signature() {
        let result = unsign(b"not signed");
        assert!(matches!(result, Err(ImcryptError::BadSignature)));
    }
}
