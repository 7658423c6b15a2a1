//! Request signing for Kraken private endpoints.
//!
//! `API-Sign = base64(HMAC-SHA512(base64_decode(secret), path || SHA256(nonce || body)))`
//!
//! The body passed to [`KrakenSigner::sign`] must be the exact bytes that are
//! transmitted; [`encode_body`] produces both.

use crate::error::{ExchangeError, ExchangeResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type HmacSha512 = Hmac<Sha512>;

/// API key pair as issued by the exchange.
///
/// Wiped from memory on drop. `Debug` never prints the secret.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub api_key: String,
    /// Base64-encoded private key.
    pub secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.trim().is_empty() || self.secret_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// First four characters of the key, enough to tell keys apart in logs.
fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}

/// Signs private requests with the decoded secret.
pub struct KrakenSigner {
    secret: Zeroizing<Vec<u8>>,
}

impl KrakenSigner {
    /// Decode the base64 secret.
    ///
    /// # Errors
    /// Returns `ExchangeError::Config` if the secret is empty or not valid base64.
    pub fn new(secret_b64: &str) -> ExchangeResult<Self> {
        let trimmed = secret_b64.trim();
        if trimmed.is_empty() {
            return Err(ExchangeError::Config("secret key is empty".to_string()));
        }
        let secret = STANDARD
            .decode(trimmed)
            .map_err(|e| ExchangeError::Config(format!("secret key is not valid base64: {e}")))?;
        Ok(Self {
            secret: Zeroizing::new(secret),
        })
    }

    /// Compute the `API-Sign` header value.
    ///
    /// # Errors
    /// Returns `ExchangeError::Config` if the key is rejected by the MAC.
    pub fn sign(&self, url_path: &str, nonce: u64, body: &str) -> ExchangeResult<String> {
        let mut sha = Sha256::new();
        sha.update(nonce.to_string().as_bytes());
        sha.update(body.as_bytes());
        let digest = sha.finalize();

        let mut mac = HmacSha512::new_from_slice(&self.secret)
            .map_err(|e| ExchangeError::Config(format!("invalid signing key: {e}")))?;
        mac.update(url_path.as_bytes());
        mac.update(&digest);

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for KrakenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KrakenSigner").finish_non_exhaustive()
    }
}

/// Form-urlencode body parameters, preserving their order.
///
/// # Errors
/// Returns `ExchangeError::Encode` if a parameter cannot be encoded.
pub fn encode_body(params: &[(&str, String)]) -> ExchangeResult<String> {
    serde_urlencoded::to_string(params).map_err(|e| ExchangeError::Encode(e.to_string()))
}
