//! Crate-wide error type.
//!
//! Every fallible public operation in this crate returns
//! `Result<T, ImcryptError>`. Variants are grouped by subsystem so a caller
//! can match on the ones it cares about without parsing strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImcryptError {
    // -- Crypto -------------------------------------------------------------
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: payload too short or authentication tag mismatch")]
    DecryptionFailed,

    #[error("integrity check failed: HMAC does not match")]
    IntegrityCheckFailed,

    // -- Key cache ------------------------------------------------------------
    #[error("no key is cached for this session")]
    KeyNotFound,

    #[error("the cached key has expired")]
    KeyExpired,

    #[error("storage identity does not match the cached key; cache cleared")]
    IdentityMismatch,

    #[error("OS keychain error: {0}")]
    Keyring(String),

    // -- Carrier / steganography ---------------------------------------------
    #[error("carrier file is not a PNG or JPEG image")]
    UnsupportedCarrierFormat,

    #[error("carrier image does not have enough capacity to hold the payload ({needed} bytes needed, {available} available)")]
    InsufficientCarrierCapacity { needed: usize, available: usize },

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    // -- Serialization --------------------------------------------------------
    #[error("serialization error: {0}")]
    Serialization(#[from] Box<bincode::ErrorKind>),

    #[error("database signature is missing or does not match")]
    BadSignature,

    // -- Storage / file ---------------------------------------------------------
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no storage has been loaded yet")]
    NoStorageLoaded,

    // -- Session --------------------------------------------------------------
    #[error("the vault is locked")]
    Locked,

    #[error("the session is not in the required state for this operation")]
    InvalidSessionState,

    // -- Database / validation ---------------------------------------------------
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("a title or name collision was detected: {0}")]
    DuplicateName(String),

    #[error("id generation could not find a free id after repeated attempts")]
    IdExhausted,

    // -- Password generation ---------------------------------------------------
    #[error("generation is impossible because the given constraints conflict with each other")]
    ConstraintsConflict,

    #[error("failed to generate a string from the given constraints")]
    GenerationFailed,

    #[error("failed to generate a string from the given constraints due to previous passwords")]
    GenerationCollidesWithHistory,

    // -- Two-factor authentication -----------------------------------------------
    #[error("two-factor authentication is not enrolled")]
    TwoFactorNotEnrolled,

    #[error("invalid two-factor code")]
    InvalidTwoFactorCode,

    #[error("invalid two-factor recovery code")]
    InvalidRecoveryCode,

    #[error("TOTP error: {0}")]
    Totp(String),

    // -- Generic ----------------------------------------------------------------
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ImcryptError>;
