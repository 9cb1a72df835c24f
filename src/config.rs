//! Crate-wide constants.
//!
//! Centralizing these avoids magic numbers scattered through the crypto,
//! envelope, and session modules, and makes the values that must match the
//! original format (PBKDF2 iterations, nonce length, signature bytes)
//! visible in one place.

/// PBKDF2-HMAC-SHA256 iteration count used for both the master key and the
/// password/recovery-code hashes.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length in bytes of derived keys and hash outputs.
pub const KEY_LEN: usize = 32;

/// Length in bytes of the AES-GCM nonce.
pub const NONCE_LEN: usize = 12;

/// Length in bytes of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Length in bytes of the HMAC-SHA256 seal over the encrypted blob.
pub const HMAC_LEN: usize = 32;

/// Length in bytes of the encryption salt and password salt stored in the
/// envelope.
pub const SALT_LEN: usize = 8;

/// Literal signature prefixed to the serialized database before encryption.
pub const DB_SIGNATURE: &[u8] = b"imcrypt_v3";

/// Length of item/group ids.
pub const ITEM_ID_LEN: usize = 6;

/// Length of the storage id (no explicit length requested when the original
/// generated it, so the library default is used).
pub const STORAGE_ID_LEN: usize = 21;

/// Default session length, in milliseconds, used by `initialize_storage`.
pub const DEFAULT_SESSION_LENGTH_MS: u64 = 600_000;

/// TOTP issuer string shown in authenticator apps.
pub const TOTP_ISSUER: &str = "Imcrypt";

/// TOTP time step, in seconds.
pub const TOTP_STEP_SECS: u64 = 30;

/// TOTP validation window (±N steps).
pub const TOTP_SKEW: u8 = 1;

/// Length of the generated TOTP recovery code.
pub const RECOVERY_CODE_LEN: usize = 50;

/// Alphabet used for the recovery code.
pub const RECOVERY_CODE_ALPHABET: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// OS keychain service name for the optional persistent key mirror.
pub const KEYRING_SERVICE: &str = "Imcrypt";

/// OS keychain account name for the optional persistent key mirror.
pub const KEYRING_ACCOUNT: &str = "key";

/// Width/height, in pixels, of the rendered two-factor enrollment QR image.
pub const TWO_FACTOR_QR_SIZE: u32 = 500;

/// Length, in bytes, of the big-endian payload-length header embedded ahead
/// of the steganographic payload.
pub const STEGO_HEADER_LEN: usize = 8;

/// Known item kinds.
pub mod item_kind {
    pub const LOGIN: &str = "LOGIN";
    pub const ID: &str = "ID";
    pub const CARD: &str = "CARD";
    pub const NOTE: &str = "NOTE";
}

/// Reserved group names (case-insensitive) that cannot be assigned to a
/// user-created group.
pub const RESERVED_GROUP_NAMES: &[&str] = &["ALL ITEMS", "ARCHIVED"];
