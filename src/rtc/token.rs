//! Media-SDK access token minting.
//!
//! Tokens are HS256 JWTs in the LiveKit claim layout: `iss` is the API key,
//! `sub`/`name` the participant identity, and a `video` grant names the room
//! and permissions. Signing locally avoids a round-trip to the media server
//! and keeps the secret on this host.

use crate::defaults;
use crate::error::{Result, ScribedError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Mints room access tokens from the configured API credentials.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(api_key: &str, api_secret: &str, ttl_secs: Option<u64>) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            ttl: Duration::from_secs(ttl_secs.unwrap_or(defaults::TOKEN_TTL_SECS)),
        }
    }

    /// Issue a join token for `identity` in `room`.
    pub fn issue(&self, room: &str, identity: &str) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ScribedError::Token {
                message: format!("system clock before epoch: {}", e),
            })?
            .as_secs();

        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let claims = json!({
            "iss": self.api_key,
            "sub": identity,
            "name": identity,
            "nbf": now,
            "exp": now + self.ttl.as_secs(),
            "video": {
                "room": room,
                "roomJoin": true,
                "canPublish": true,
                "canSubscribe": true,
            },
        });

        let encoded_header = URL_SAFE_NO_PAD.encode(header.to_string());
        let encoded_claims = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{}.{}", encoded_header, encoded_claims);

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes()).map_err(|e| {
            ScribedError::Token {
                message: format!("invalid signing secret: {}", e),
            }
        })?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }
}
