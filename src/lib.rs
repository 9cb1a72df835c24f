//! `imcrypt`: a local, single-user credential vault whose on-disk form is a
//! host PNG/JPEG image. The database of logins, ids, cards, and notes is
//! serialized, AES-256-GCM encrypted, HMAC-sealed, and embedded into the
//! carrier image via least-significant-bit steganography.
//!
//! [`Session`] is the main entry point: load a carrier image, initialize or
//! unlock its vault, then mutate the in-memory [`model::Database`] through
//! the session's masked-update methods.

pub mod charset;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod generate;
pub mod id;
pub mod keycache;
pub mod model;
pub mod serialize;
pub mod session;
pub mod stego;
pub mod totp;
pub mod validate;

pub use envelope::Storage;
pub use error::{ImcryptError, Result};
pub use session::{Event, Session, SessionState};
