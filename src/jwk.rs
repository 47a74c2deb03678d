use openssl::bn::{BigNum, BigNumContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    encoding::Base64,
    key_pair::{KeyPair, KeyType},
};

/// JWK 相關操作的錯誤類型。
#[derive(Debug, Error)]
pub enum JwkError {
    /// 金鑰轉換失敗。
    #[error("Failed to convert key: {0}")]
    KeyConversionError(String),
    /// 序列化錯誤。
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<openssl::error::ErrorStack> for JwkError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        JwkError::KeyConversionError(e.to_string())
    }
}

/// JSON Web Key (JWK)，僅包含公開參數。
///
/// 同一把金鑰永遠產生相同的 JWK，因此可直接放入未註冊帳戶的受保護標頭中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa(RsaJwk),
    #[serde(rename = "EC")]
    Ec(EcJwk),
}

/// RSA 格式的 JWK。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaJwk {
    e: String,
    n: String,
}

/// P-256 橢圓曲線格式的 JWK。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcJwk {
    crv: String,
    x: String,
    y: String,
}

impl RsaJwk {
    fn from_key_pair(key_pair: &KeyPair) -> Result<Self, JwkError> {
        let rsa = key_pair.pub_key.rsa()?;

        Ok(RsaJwk {
            e: Base64::new(rsa.e().to_vec()).base64_url(),
            n: Base64::new(rsa.n().to_vec()).base64_url(),
        })
    }
}

impl EcJwk {
    const COORDINATE_LEN: i32 = 32;

    fn from_key_pair(key_pair: &KeyPair) -> Result<Self, JwkError> {
        let ec = key_pair.pub_key.ec_key()?;
        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        ec.public_key()
            .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)?;

        Ok(EcJwk {
            crv: "P-256".to_string(),
            x: Base64::new(x.to_vec_padded(Self::COORDINATE_LEN)?).base64_url(),
            y: Base64::new(y.to_vec_padded(Self::COORDINATE_LEN)?).base64_url(),
        })
    }
}

impl Jwk {
    /// 根據金鑰對建立對應的 JWK。
    pub fn new(key_pair: &KeyPair) -> Result<Self, JwkError> {
        match key_pair.key_type {
            KeyType::Rsa => Ok(Jwk::Rsa(RsaJwk::from_key_pair(key_pair)?)),
            KeyType::EcP256 => Ok(Jwk::Ec(EcJwk::from_key_pair(key_pair)?)),
        }
    }

    /// 將 JWK 序列化為 JSON 字串。
    pub fn to_json(&self) -> Result<String, JwkError> {
        serde_json::to_string(self).map_err(JwkError::from)
    }

    /// 產生 RFC 7638 thumbprint 使用的 JSON：只含必要成員，且依字典序排列。
    pub fn to_acme_json(&self) -> Result<String, JwkError> {
        let mut map = Map::new();
        match self {
            Jwk::Rsa(jwk) => {
                map.insert("e".to_string(), Value::String(jwk.e.clone()));
                map.insert("kty".to_string(), Value::String("RSA".to_string()));
                map.insert("n".to_string(), Value::String(jwk.n.clone()));
            }
            Jwk::Ec(jwk) => {
                map.insert("crv".to_string(), Value::String(jwk.crv.clone()));
                map.insert("kty".to_string(), Value::String("EC".to_string()));
                map.insert("x".to_string(), Value::String(jwk.x.clone()));
                map.insert("y".to_string(), Value::String(jwk.y.clone()));
            }
        }

        serde_json::to_string(&Value::Object(map)).map_err(JwkError::from)
    }
}
