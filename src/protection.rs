use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    jwk::Jwk,
    jws::SigningError,
    key_pair::KeyPair,
    nonce::NonceSource,
};

/// 由帳戶金鑰導出的基本標頭：演算法與公鑰。
///
/// v1 直接把它當作未受保護的 `header` 送出，受保護標頭則是它再加上 nonce。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    pub jwk: Jwk,
}

impl JwsHeader {
    pub fn new(key_pair: &KeyPair) -> std::result::Result<Self, SigningError> {
        Ok(Self {
            alg: key_pair.key_type.jws_algorithm().to_string(),
            jwk: Jwk::new(key_pair)?,
        })
    }

    /// 複製一份並加上 nonce，成為 v1 的受保護標頭。
    pub fn protect(&self, nonce: Option<String>) -> ProtectedHeader {
        ProtectedHeader {
            alg: self.alg.clone(),
            jwk: Some(self.jwk.clone()),
            kid: None,
            nonce,
            url: None,
        }
    }
}

/// JWS 受保護標頭。
///
/// `jwk` 與 `kid` 互斥。沒有取得 nonce 時 `nonce` 會序列化為 `null`，
/// 伺服器會拒絕這樣的請求，本地不預先檢查。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl ProtectedHeader {
    /// 以公鑰本身識別帳戶，用於註冊前的請求。
    pub fn for_jwk(key_pair: &KeyPair, nonce: Option<String>) -> std::result::Result<Self, SigningError> {
        Ok(JwsHeader::new(key_pair)?.protect(nonce))
    }

    /// 以帳戶 URL 作為 key id，用於已註冊帳戶的 v2 請求。
    pub fn for_kid(key_pair: &KeyPair, kid: &str, nonce: Option<String>) -> Self {
        Self {
            alg: key_pair.key_type.jws_algorithm().to_string(),
            jwk: None,
            kid: Some(kid.to_string()),
            nonce,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn alg(&self) -> &str {
        &self.alg
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn jwk(&self) -> Option<&Jwk> {
        self.jwk.as_ref()
    }
}

/// 為每個簽名請求產生標頭，每次都向 [`NonceSource`] 取一個新的 nonce。
pub struct Protection<'a> {
    nonce: &'a dyn NonceSource,
    key_pair: &'a KeyPair,
}

impl<'a> Protection<'a> {
    pub fn new(nonce: &'a dyn NonceSource, key_pair: &'a KeyPair) -> Self {
        Self { nonce, key_pair }
    }

    /// v1：回傳 (未受保護標頭, 受保護標頭)。
    pub fn legacy_headers(&self) -> Result<(JwsHeader, ProtectedHeader)> {
        let header = JwsHeader::new(self.key_pair)?;
        let protected = header.protect(self.nonce.fresh_nonce()?);
        Ok((header, protected))
    }

    /// v2：帶有目標 `url` 的受保護標頭；有 `kid` 時以 `kid` 取代 `jwk`。
    pub fn create_header(&self, url: &str, kid: Option<&str>) -> Result<ProtectedHeader> {
        let nonce = self.nonce.fresh_nonce()?;
        let header = match kid {
            Some(kid) => ProtectedHeader::for_kid(self.key_pair, kid, nonce),
            None => ProtectedHeader::for_jwk(self.key_pair, nonce)?,
        };
        Ok(header.with_url(url))
    }
}
