//! Secure channel codec: compact JWE with direct key agreement and
//! AES-256-GCM content encryption.
//!
//! Token layout (five base64url segments, no padding):
//!
//! ```text
//! <protected header>.<encrypted key>.<iv>.<ciphertext>.<tag>
//! ```
//!
//! With `dir` the encrypted key segment is empty. The protected header's
//! base64url text is the additional authenticated data.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use runtime_protocol::ResponseError;
use secrecy::{ExposeSecret, SecretBox};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key management algorithm.
pub const ALG_DIR: &str = "dir";
/// Content encryption algorithm.
pub const ENC_A256GCM: &str = "A256GCM";
/// Allowed skew between client and server clocks for `exp` / `nbf`.
pub const CLOCK_TOLERANCE_SECS: i64 = 60;

const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("No encryption key")]
    MissingKey,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Malformed JWE token")]
    Malformed,

    #[error("Unsupported JWE algorithm: alg={alg}, enc={enc}")]
    UnsupportedAlgorithm { alg: String, enc: String },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption operation failed")]
    DecryptionFailed,

    #[error("\"exp\" claim timestamp check failed")]
    Expired,

    #[error("\"nbf\" claim timestamp check failed")]
    NotYetValid,

    #[error("Encrypted payload has no data claim")]
    MissingData,

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<EncryptionError> for ResponseError {
    fn from(err: EncryptionError) -> Self {
        ResponseError::request_failed(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session key
// ─────────────────────────────────────────────────────────────────────────────

/// The 256-bit session key agreed in the handshake. Fixed for the process.
pub struct EncryptionKey(SecretBox<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Decode a standard-alphabet base64 key; it must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            EncryptionError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(key))
    }

    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self(SecretBox::new(Box::new(key)))
    }

    fn aead_key(&self) -> Result<LessSafeKey, EncryptionError> {
        let unbound = UnboundKey::new(&AES_256_GCM, self.0.expose_secret())
            .map_err(|_| EncryptionError::InvalidKey("rejected by AES-256-GCM".into()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[derive(Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Encrypt / decrypt
// ─────────────────────────────────────────────────────────────────────────────

/// Serialize `object` to JSON and encrypt it with `dir` / `A256GCM`.
pub fn encrypt_object_with_key<T>(object: &T, key: &EncryptionKey) -> Result<String, EncryptionError>
where
    T: Serialize + ?Sized,
{
    encrypt_object(object, key, ALG_DIR, ENC_A256GCM)
}

/// Encrypt `object` under an explicit algorithm pair. Only `dir` / `A256GCM`
/// is implemented; anything else is refused.
pub fn encrypt_object<T>(object: &T, key: &EncryptionKey, alg: &str, enc: &str) -> Result<String, EncryptionError>
where
    T: Serialize + ?Sized,
{
    ensure_supported(alg, enc)?;

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&ProtectedHeader {
        alg: alg.to_string(),
        enc: enc.to_string(),
    })?);

    let mut iv = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let mut in_out = serde_json::to_vec(object)?;
    let tag = key
        .aead_key()?
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(iv),
            Aad::from(header.as_bytes()),
            &mut in_out,
        )
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    Ok(format!(
        "{header}..{}.{}.{}",
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(&in_out),
        URL_SAFE_NO_PAD.encode(tag.as_ref()),
    ))
}

/// Decrypt a compact JWE and deserialize its plaintext as JSON.
pub fn decrypt_object_with_key<T>(token: &str, key: &EncryptionKey) -> Result<T, EncryptionError>
where
    T: DeserializeOwned,
{
    let segments: Vec<&str> = token.split('.').collect();
    let [header, encrypted_key, iv, ciphertext, tag] = segments.as_slice() else {
        return Err(EncryptionError::Malformed);
    };

    let protected = decode_header(header)?;
    ensure_supported(&protected.alg, &protected.enc)?;
    if !encrypted_key.is_empty() {
        return Err(EncryptionError::Malformed);
    }

    let iv = decode_segment(iv)?;
    let nonce = Nonce::try_assume_unique_for_key(&iv).map_err(|_| EncryptionError::Malformed)?;

    let mut in_out = decode_segment(ciphertext)?;
    in_out.extend_from_slice(&decode_segment(tag)?);

    let plaintext = key
        .aead_key()?
        .open_in_place(nonce, Aad::from(header.as_bytes()), &mut in_out)
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    Ok(serde_json::from_slice(plaintext)?)
}

#[derive(Deserialize)]
struct ClaimTimes {
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
}

impl ClaimTimes {
    fn check(&self, now: DateTime<Utc>) -> Result<(), EncryptionError> {
        let now = now.timestamp();
        if self.exp.is_some_and(|exp| exp <= now - CLOCK_TOLERANCE_SECS) {
            return Err(EncryptionError::Expired);
        }
        if self.nbf.is_some_and(|nbf| nbf > now + CLOCK_TOLERANCE_SECS) {
            return Err(EncryptionError::NotYetValid);
        }
        Ok(())
    }
}

/// Decrypt a JWE whose payload is a JWT claim set and return the whole claim
/// set, enforcing `exp` / `nbf` against the current time.
pub fn decrypt_claims<T>(token: &str, key: &EncryptionKey) -> Result<T, EncryptionError>
where
    T: DeserializeOwned,
{
    decrypt_claims_at(token, key, Utc::now())
}

/// [`decrypt_claims`] with an explicit clock.
pub fn decrypt_claims_at<T>(token: &str, key: &EncryptionKey, now: DateTime<Utc>) -> Result<T, EncryptionError>
where
    T: DeserializeOwned,
{
    let claims: Value = decrypt_object_with_key(token, key)?;
    ClaimTimes::deserialize(&claims)?.check(now)?;
    Ok(serde_json::from_value(claims)?)
}

/// Like [`decrypt_claims`], but returns only the `data` claim. Credential
/// updates wrap their payload this way.
pub fn decrypt_jwt<T>(token: &str, key: &EncryptionKey) -> Result<T, EncryptionError>
where
    T: DeserializeOwned,
{
    decrypt_jwt_at(token, key, Utc::now())
}

/// [`decrypt_jwt`] with an explicit clock.
pub fn decrypt_jwt_at<T>(token: &str, key: &EncryptionKey, now: DateTime<Utc>) -> Result<T, EncryptionError>
where
    T: DeserializeOwned,
{
    let mut claims: Value = decrypt_claims_at(token, key, now)?;
    let data = claims
        .get_mut("data")
        .map(Value::take)
        .filter(|data| !data.is_null())
        .ok_or(EncryptionError::MissingData)?;
    Ok(serde_json::from_value(data)?)
}

/// Cheap structural check: five segments and a protected header naming the
/// expected algorithms. Never fails, only answers.
pub fn is_message_jwe_encrypted(message: &str, alg: &str, enc: &str) -> bool {
    let segments: Vec<&str> = message.split('.').collect();
    if segments.len() != 5 {
        return false;
    }
    match decode_header(segments[0]) {
        Ok(header) => header.alg == alg && header.enc == enc,
        Err(_) => false,
    }
}

fn ensure_supported(alg: &str, enc: &str) -> Result<(), EncryptionError> {
    if alg == ALG_DIR && enc == ENC_A256GCM {
        Ok(())
    } else {
        Err(EncryptionError::UnsupportedAlgorithm {
            alg: alg.to_string(),
            enc: enc.to_string(),
        })
    }
}

fn decode_header(segment: &str) -> Result<ProtectedHeader, EncryptionError> {
    Ok(serde_json::from_slice(&decode_segment(segment)?)?)
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, EncryptionError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| EncryptionError::Malformed)
}
