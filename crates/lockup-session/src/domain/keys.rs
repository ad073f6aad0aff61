//! # Access Key Material
//!
//! Ed25519 function-call keys in the ledger's text encoding
//! (`ed25519:<base58>`). The wallet adds the public half to the visitor's
//! account; the secret half stays in the local key store.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

use super::errors::SessionError;

/// Curve prefix used in the text encoding.
pub const ED25519_PREFIX: &str = "ed25519:";

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from bytes, rejecting points that are not on the curve.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SessionError> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| SessionError::KeyStore("invalid ed25519 public key".to_string()))?;
        Ok(Self(bytes))
    }

    /// Parse `ed25519:<base58>`.
    pub fn parse(encoded: &str) -> Result<Self, SessionError> {
        let bytes = decode_prefixed(encoded)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            SessionError::KeyStore(format!("public key must be 32 bytes, got {}", v.len()))
        })?;
        Self::from_bytes(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature made by the matching secret key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), SessionError> {
        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| SessionError::Signing("invalid public key".to_string()))?;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| SessionError::Signing("signature verification failed".to_string()))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", ED25519_PREFIX, bs58::encode(self.0).into_string())
    }
}

/// Ed25519 key pair held by the key store. The secret is zeroized on drop
/// by `SigningKey` itself.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Create from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parse `ed25519:<base58>` of either the 32-byte seed or the 64-byte
    /// seed-plus-public-key form.
    pub fn parse(encoded: &str) -> Result<Self, SessionError> {
        let mut bytes = decode_prefixed(encoded)?;
        let result = match bytes.len() {
            32 | 64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                let pair = Self::from_seed(seed);
                seed.zeroize();
                if bytes.len() == 64 && bytes[32..] != pair.public_key().0 {
                    Err(SessionError::KeyStore(
                        "secret key does not match its embedded public key".to_string(),
                    ))
                } else {
                    Ok(pair)
                }
            }
            n => Err(SessionError::KeyStore(format!(
                "secret key must be 32 or 64 bytes, got {}",
                n
            ))),
        };
        bytes.zeroize();
        result
    }

    /// Public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Text encoding of the 64-byte secret (seed followed by public key).
    pub fn secret_key_string(&self) -> String {
        let mut full = self.signing_key.to_keypair_bytes();
        let encoded = format!("{}{}", ED25519_PREFIX, bs58::encode(&full[..]).into_string());
        full.zeroize();
        encoded
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        let mut seed = self.signing_key.to_bytes();
        let pair = Self::from_seed(seed);
        seed.zeroize();
        pair
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key().to_string())
            .finish_non_exhaustive()
    }
}

fn decode_prefixed(encoded: &str) -> Result<Vec<u8>, SessionError> {
    let body = encoded.strip_prefix(ED25519_PREFIX).ok_or_else(|| {
        SessionError::KeyStore(format!("unsupported key type in `{}`", truncate(encoded)))
    })?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| SessionError::KeyStore(format!("bad base58 key: {}", e)))
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(12) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
