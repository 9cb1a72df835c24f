//! TOTP-based two-factor authentication: secret enrollment, QR-code
//! rendering, code validation, and single-use recovery codes.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::config::{RECOVERY_CODE_ALPHABET, RECOVERY_CODE_LEN, TOTP_ISSUER, TOTP_SKEW, TOTP_STEP_SECS};
use crate::crypto;
use crate::error::{ImcryptError, Result};

/// The result of enrolling a new two-factor secret: the base32 secret
/// itself, a PNG-encoded enrollment QR image, and a freshly generated
/// single-use recovery code (returned once, never stored in plaintext).
pub struct Enrollment {
    pub secret_base32: String,
    pub qr_png: Vec<u8>,
    pub recovery_code: String,
}

fn build_totp(secret_base32: &str, account_name: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| ImcryptError::Totp(e.to_string()))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        TOTP_SKEW,
        TOTP_STEP_SECS,
        secret,
        Some(TOTP_ISSUER.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| ImcryptError::Totp(e.to_string()))
}

/// Generates a new TOTP secret for `account_name` (the carrier's base
/// filename), rendering a QR enrollment image and a recovery code.
pub fn generate_secret(account_name: &str) -> Result<Enrollment> {
    let secret = Secret::generate_secret();
    let secret_base32 = secret.to_encoded().to_string();

    let totp = build_totp(&secret_base32, account_name)?;
    let qr_png = render_qr(&totp.get_url())?;

    let recovery_code = generate_recovery_code();

    Ok(Enrollment {
        secret_base32,
        qr_png,
        recovery_code,
    })
}

fn render_qr(data: &str) -> Result<Vec<u8>> {
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes()).map_err(|e| ImcryptError::Totp(e.to_string()))?;

    // Render to a luminance image and re-encode as PNG, since `qrcode`'s
    // built-in image renderer targets a fixed pixel-per-module scale.
    let image = code.render::<image::Luma<u8>>().build();
    let dynamic = image::DynamicImage::ImageLuma8(image);
    let resized = dynamic.resize_exact(
        crate::config::TWO_FACTOR_QR_SIZE,
        crate::config::TWO_FACTOR_QR_SIZE,
        image::imageops::FilterType::Nearest,
    );

    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    resized
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(ImcryptError::Image)?;

    Ok(out)
}

fn generate_recovery_code() -> String {
    nanoid::nanoid!(RECOVERY_CODE_LEN, RECOVERY_CODE_ALPHABET)
}

/// Hashes a recovery code with a fresh salt for storage, returning
/// `(hash, salt)`.
pub fn hash_recovery_code(code: &str) -> ([u8; 32], Vec<u8>) {
    let salt = crypto::generate_salt(8);
    let hash = crypto::hash(code.as_bytes(), &salt);
    (hash, salt)
}

/// Validates a candidate TOTP `code` against `secret_base32`.
pub fn validate_code(secret_base32: &str, account_name: &str, code: &str) -> Result<bool> {
    let totp = build_totp(secret_base32, account_name)?;
    totp.check_current(code)
        .map_err(|e| ImcryptError::Totp(e.to_string()))
}

/// Validates a candidate recovery code against its stored hash and salt.
pub fn validate_recovery_code(code: &str, stored_hash: &[u8; 32], stored_salt: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    let candidate = crypto::hash(code.as_bytes(), stored_salt);
    candidate.ct_eq(stored_hash).into()
}
