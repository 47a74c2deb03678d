use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AcmeError, Result};

/// CA 目錄的 `meta` 欄位。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryMeta {
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(rename = "caaIdentities", default, skip_serializing_if = "Vec::is_empty")]
    pub caa_identities: Vec<String>,
    #[serde(
        rename = "externalAccountRequired",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_account_required: Option<bool>,
}

/// CA 發布的服務目錄：操作名稱到絕對 URL 的對應。
///
/// 不預設任何鍵名，v2 的 `newNonce`、`newAccount`、`newOrder` 與 v1 的
/// `new-reg`、`new-authz` 都只是這張表中的項目。
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Directory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,
    #[serde(flatten)]
    entries: Map<String, Value>,
}

impl Directory {
    /// 查詢操作名稱對應的 URL；非字串項目視為不存在。
    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(Value::as_str)
    }

    /// 與 [`url_for`](Self::url_for) 相同，但缺少時回傳 [`AcmeError::MissingDirectoryEntry`]。
    pub fn require(&self, name: &str) -> Result<&str> {
        self.url_for(name)
            .ok_or_else(|| AcmeError::MissingDirectoryEntry(name.to_string()))
    }

    pub fn terms_of_service(&self) -> Option<&str> {
        self.meta.as_ref()?.terms_of_service.as_deref()
    }

    /// 所有操作名稱。
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// 每個客戶端實例各自持有的目錄快取。
///
/// 停用時每次都重新抓取；啟用時只在第一次成功抓取後保存，抓取失敗則清空。
#[derive(Debug, Default)]
pub struct DirectoryCache {
    enabled: bool,
    cached: RefCell<Option<Directory>>,
}

impl DirectoryCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cached: RefCell::new(None),
        }
    }

    pub fn get_or_fetch(&self, fetch: impl FnOnce() -> Result<Directory>) -> Result<Directory> {
        if self.enabled {
            if let Some(directory) = self.cached.borrow().as_ref() {
                return Ok(directory.clone());
            }
        }

        match fetch() {
            Ok(directory) => {
                if self.enabled {
                    *self.cached.borrow_mut() = Some(directory.clone());
                }
                Ok(directory)
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }
}
