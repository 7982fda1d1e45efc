//! Request signing for the exchange REST APIs

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::common::errors::{ClientError, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Binance signature: hex HMAC-SHA256 of the full query string
///
/// # Arguments
/// * `secret` - API secret, used verbatim as the key
/// * `query` - URL-encoded parameters including `timestamp`
pub fn sign_binance(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Hex SHA-512 of a request body, sent as `Api-Content-Hash`
pub fn bittrex_content_hash(body: &str) -> String {
    hex::encode(Sha512::digest(body.as_bytes()))
}

/// Bittrex signature: hex HMAC-SHA512 of timestamp + uri + method + content hash
pub fn sign_bittrex(
    secret: &str,
    timestamp: i64,
    uri: &str,
    method: &str,
    content_hash: &str,
) -> Result<String> {
    let message = format!("{}{}{}{}", timestamp, uri, method.to_uppercase(), content_hash);

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Authentication headers for a signed Bittrex request
#[derive(Debug, Clone)]
pub struct BittrexAuthHeaders {
    pub api_key: String,
    pub timestamp: i64,
    pub content_hash: String,
    pub signature: String,
}

impl BittrexAuthHeaders {
    pub fn generate(api_key: &str, secret: &str, uri: &str, method: &str, body: &str) -> Result<Self> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let content_hash = bittrex_content_hash(body);
        let signature = sign_bittrex(secret, timestamp, uri, method, &content_hash)?;

        Ok(Self {
            api_key: api_key.to_string(),
            timestamp,
            content_hash,
            signature,
        })
    }

    /// Add authentication headers to a reqwest RequestBuilder
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Api-Key", &self.api_key)
            .header("Api-Timestamp", self.timestamp.to_string())
            .header("Api-Content-Hash", &self.content_hash)
            .header("Api-Signature", &self.signature)
    }
}
