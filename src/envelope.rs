use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Byte length of the IV prefixed to every ciphertext.
pub const IV_LEN: usize = 16;

/// The wire wrapper around encrypted bodies: `{"payload": base64(iv || ciphertext)}`.
///
/// Bodies without this shape are passed through unencrypted (multipart
/// uploads, legacy plaintext responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub payload: String,
}

/// Pre-shared 256-bit symmetric key for the envelope codec.
///
/// Accepted key material: 64 hex characters, or a raw 32-byte UTF-8 string
/// (the form the backend deployment scripts emit). Anything else is a
/// configuration error — there is no fail-open mode for a missing key.
#[derive(Clone)]
pub struct EnvelopeKey {
    bytes: [u8; 32],
}

impl EnvelopeKey {
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parses a hex-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the hex is invalid or the key length is not 32 bytes.
    pub fn from_hex(key_hex: &str) -> Result<Self, Error> {
        let bytes =
            hex::decode(key_hex).map_err(|e| Error::Config(format!("invalid key hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(Error::Config(format!(
                "invalid key length: expected 32, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { bytes: arr })
    }

    /// Parses key material as hex first, then as a raw 32-byte string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if neither form yields exactly 32 bytes.
    pub fn parse(material: &str) -> Result<Self, Error> {
        if material.len() == 64 {
            if let Ok(key) = Self::from_hex(material) {
                return Ok(key);
            }
        }
        let raw = material.as_bytes();
        if raw.len() == 32 {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(raw);
            return Ok(Self { bytes: arr });
        }
        Err(Error::Config(format!(
            "key material must be 64 hex chars or 32 raw bytes, got {} bytes",
            raw.len()
        )))
    }
}

// Never print key bytes.
impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvelopeKey(..)")
    }
}

/// Symmetric envelope codec: AES-256-CBC with PKCS7 padding.
///
/// `encode` prefixes a fresh random 16-byte IV, so two calls with identical
/// plaintext never produce the same output. `decode` never fails loudly:
/// any malformed or mismatched-key input yields `None`, which callers treat
/// as "not encrypted".
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    key: EnvelopeKey,
}

impl EnvelopeCodec {
    #[must_use]
    pub fn new(key: EnvelopeKey) -> Self {
        Self { key }
    }

    /// Encrypts a JSON value into the base64 `iv || ciphertext` wire form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encrypt` if the value cannot be serialized to JSON.
    pub fn encode(&self, value: &JsonValue) -> Result<String, Error> {
        let plaintext =
            serde_json::to_vec(value).map_err(|e| Error::Encrypt(e.to_string()))?;
        let iv: [u8; IV_LEN] = rand::rng().random();

        let ciphertext = Aes256CbcEnc::new(&self.key.bytes.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypts a base64 `iv || ciphertext` payload back to a JSON value.
    ///
    /// Returns `None` on any failure: bad base64, input shorter than the IV,
    /// bad padding (wrong key), non-UTF-8 plaintext, or non-JSON plaintext.
    #[must_use]
    pub fn decode(&self, payload: &str) -> Option<JsonValue> {
        let raw = STANDARD.decode(payload).ok()?;
        if raw.len() < IV_LEN {
            return None;
        }
        let (iv, ciphertext) = raw.split_at(IV_LEN);

        let plaintext = Aes256CbcDec::new_from_slices(&self.key.bytes, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .ok()?;

        let text = std::str::from_utf8(&plaintext).ok()?;
        serde_json::from_str(text).ok()
    }
}
