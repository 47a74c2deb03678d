//! ACME 帳戶記錄：帳戶金鑰與註冊後由伺服器指派的 URI。
//!
//! 帳戶由呼叫端建立並擁有，協議客戶端只在呼叫期間借用；
//! 唯一會被客戶端修改的是註冊成功後寫入的 `uri`。持久化由呼叫端負責。

use crate::{jws::SigningError, key_pair::KeyPair};

#[derive(Debug, Default)]
pub struct Account {
    key: Option<KeyPair>,
    uri: Option<String>,
}

impl Account {
    /// 以金鑰建立尚未註冊的帳戶。
    pub fn new(key: KeyPair) -> Self {
        Self {
            key: Some(key),
            uri: None,
        }
    }

    /// 還原先前已註冊的帳戶。
    pub fn registered(key: KeyPair, uri: impl Into<String>) -> Self {
        Self {
            key: Some(key),
            uri: Some(uri.into()),
        }
    }

    /// 帳戶金鑰；沒有金鑰時任何簽名請求都會失敗。
    pub fn key(&self) -> Result<&KeyPair, SigningError> {
        self.key.as_ref().ok_or(SigningError::MissingKey)
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.uri.is_some()
    }

    pub(crate) fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = Some(uri.into());
    }
}
