//! Short-lived signed bearer tokens for hosted tool endpoints.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Result, SwitchyardError};
use crate::integration::IntegrationKind;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a hosted bearer token.
///
/// The remote proxy verifies the signature and expiry, then uses the embedded
/// credentials to act on the organization's behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostedClaims {
    pub organization_id: String,
    pub integration_type: IntegrationKind,
    pub credentials: serde_json::Value,
    /// Unix timestamp (seconds) after which the token is rejected.
    pub exp: i64,
}

/// Issues and verifies HMAC-SHA256 signed tokens of the form
/// `base64url(claims).base64url(signature)`.
pub struct TokenSigner {
    key: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>, ttl_secs: u64) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(SwitchyardError::Configuration(
                "hosted token signing key is empty".into(),
            ));
        }
        Ok(Self {
            key,
            ttl_secs: ttl_secs as i64,
        })
    }

    pub fn issue(
        &self,
        organization_id: &str,
        integration_type: IntegrationKind,
        credentials: &serde_json::Value,
    ) -> Result<String> {
        let claims = HostedClaims {
            organization_id: organization_id.to_owned(),
            integration_type,
            credentials: credentials.clone(),
            exp: chrono::Utc::now().timestamp() + self.ttl_secs,
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        Ok(format!("{payload}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<HostedClaims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| SwitchyardError::InvalidArgument("malformed bearer token".into()))?;

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SwitchyardError::InvalidArgument("malformed token signature".into()))?;

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| SwitchyardError::Configuration(format!("invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| SwitchyardError::InvalidArgument("token signature mismatch".into()))?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SwitchyardError::InvalidArgument("malformed token payload".into()))?;
        let claims: HostedClaims = serde_json::from_slice(&raw)?;

        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(SwitchyardError::InvalidArgument("token expired".into()));
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any non-zero length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
