//! JSON Web Signature (JWS) 請求本體的建構與驗證。
//!
//! - ACME v1 使用 `{header, protected, payload, signature}`，`header` 為未受保護的標頭。
//! - ACME v2 使用扁平化 JSON 序列化 `{protected, payload, signature}`。
//!
//! `protected` 與 `payload` 在簽名前就已編碼成最終字串，簽名只覆蓋這兩段文字。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    encoding::{Base64, DecodeError},
    jwk::JwkError,
    key_pair::{KeyError, KeyPair},
    payload::PayloadError,
    protection::{JwsHeader, ProtectedHeader},
    signature::{create_signature, verify_signature, SignatureError},
};

/// 簽名原語無法產生合法的簽名本體。
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Account has no key")]
    MissingKey,
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("JWK error: {0}")]
    Jwk(#[from] JwkError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("Base64 decode error: {0}")]
    Decode(#[from] DecodeError),
}

type Result<T> = std::result::Result<T, SigningError>;

/// 已序列化的請求負載。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwsPayload {
    /// JSON 物件，編碼為其 JSON 文字的 base64url。
    Json(String),
    /// POST-as-GET：負載為空字串，而不是省略或 `{}`。
    Empty,
}

impl JwsPayload {
    pub fn json<T: Serialize + ?Sized>(payload: &T) -> Result<Self> {
        Ok(JwsPayload::Json(serde_json::to_string(payload)?))
    }

    fn encode(&self) -> String {
        match self {
            JwsPayload::Json(json) => Base64::new(json).base64_url(),
            JwsPayload::Empty => String::new(),
        }
    }
}

/// ACME v1 的 JWS 本體。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyJws {
    pub header: JwsHeader,
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

/// ACME v2 使用的扁平化 JWS 本體。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedJws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

/// 以 v1 格式簽署請求。
pub fn sign_request(
    key_pair: &KeyPair,
    header: &JwsHeader,
    protected: &ProtectedHeader,
    payload: &JwsPayload,
) -> Result<LegacyJws> {
    let (protected, payload, signature) = sign_parts(key_pair, protected, payload)?;

    Ok(LegacyJws {
        header: header.clone(),
        protected,
        payload,
        signature,
    })
}

/// 以 v2 扁平化格式簽署請求。受保護標頭必須已帶有 `url` 與 `nonce`。
pub fn sign_request_v2(
    key_pair: &KeyPair,
    protected: &ProtectedHeader,
    payload: &JwsPayload,
) -> Result<FlattenedJws> {
    let (protected, payload, signature) = sign_parts(key_pair, protected, payload)?;

    Ok(FlattenedJws {
        protected,
        payload,
        signature,
    })
}

fn sign_parts(
    key_pair: &KeyPair,
    protected: &ProtectedHeader,
    payload: &JwsPayload,
) -> Result<(String, String, String)> {
    let protected_b64 = Base64::new(serde_json::to_string(protected)?).base64_url();
    let payload_b64 = payload.encode();
    let signature = create_signature(&protected_b64, &payload_b64, key_pair)?.base64_url();

    Ok((protected_b64, payload_b64, signature))
}

fn verify_parts(protected: &str, payload: &str, signature: &str, key_pair: &KeyPair) -> Result<bool> {
    let signature = Base64::from_url(signature)?;
    Ok(verify_signature(
        protected,
        payload,
        signature.as_bytes(),
        key_pair,
    )?)
}

fn decode_json(encoded: &str) -> Result<serde_json::Value> {
    let raw = Base64::from_url(encoded)?;
    Ok(serde_json::from_slice(raw.as_bytes())?)
}

impl LegacyJws {
    /// 以公鑰驗證簽名。
    pub fn verify(&self, key_pair: &KeyPair) -> Result<bool> {
        verify_parts(&self.protected, &self.payload, &self.signature, key_pair)
    }

    pub fn protected_json(&self) -> Result<serde_json::Value> {
        decode_json(&self.protected)
    }

    pub fn payload_json(&self) -> Result<serde_json::Value> {
        decode_json(&self.payload)
    }
}

impl FlattenedJws {
    /// 以公鑰驗證簽名。
    pub fn verify(&self, key_pair: &KeyPair) -> Result<bool> {
        verify_parts(&self.protected, &self.payload, &self.signature, key_pair)
    }

    pub fn protected_json(&self) -> Result<serde_json::Value> {
        decode_json(&self.protected)
    }

    /// 解碼負載；POST-as-GET 的空負載回傳 `None`。
    pub fn payload_json(&self) -> Result<Option<serde_json::Value>> {
        if self.payload.is_empty() {
            return Ok(None);
        }
        decode_json(&self.payload).map(Some)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
