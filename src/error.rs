//! 呼叫端可見的錯誤分類。
//!
//! 協議客戶端不做任何本地復原或重試：每一種非成功狀況都會轉成 [`AcmeError`]
//! 並直接回傳。唯一常見的可復原情況是 [`AcmeError::AccountAlreadyExists`]。

use serde::Deserialize;
use thiserror::Error;

use crate::{jws::SigningError, transport::HttpResponse, transport::TransportError};

/// 客戶端建立階段的設定錯誤。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("Failed to read CA bundle {path:?}: {source}")]
    CaBundleRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid CA bundle: {0}")]
    InvalidCaBundle(reqwest::Error),
    #[error("Invalid User-Agent: {0:?}")]
    InvalidUserAgent(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AcmeError {
    /// 註冊時伺服器回報此金鑰已有帳戶，附帶既有帳戶的 URI。
    #[error("Account already exists: {uri:?}")]
    AccountAlreadyExists {
        uri: Option<String>,
        response: Box<HttpResponse>,
    },
    /// 非預期的狀態碼或無法解析的回應內容。
    #[error("ACME protocol error ({status}): {reason}", status = .response.status)]
    Protocol {
        response: Box<HttpResponse>,
        reason: String,
    },
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// 伺服器提供的連結無法解析成 URL。
    #[error("Invalid URL {url:?} from server: {source}")]
    InvalidServerUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Directory has no `{0}` entry")]
    MissingDirectoryEntry(String),
    #[error("Account is not registered")]
    NotRegistered,
    #[error("Invalid CSR: {0}")]
    InvalidCsr(String),
    /// 訂單完成後尚未進入 `valid` 狀態，呼叫端需自行輪詢。
    #[error("Order {uri} is not ready (status: {status})")]
    OrderNotReady { uri: String, status: String },
    #[error("Order {uri} has no `{field}` field")]
    MissingOrderField { uri: String, field: &'static str },
}

pub type Result<T> = std::result::Result<T, AcmeError>;

/// RFC 7807 problem document，ACME 伺服器以此描述錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub detail: Option<String>,
    pub status: Option<u16>,
}

impl AcmeError {
    /// 以回應建立 [`AcmeError::Protocol`]，原因優先取 problem document 的 `detail`。
    pub(crate) fn protocol(response: HttpResponse) -> Self {
        let reason = problem_of(&response)
            .and_then(|p| p.detail)
            .or_else(|| response.status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "unexpected status".to_string());
        Self::protocol_with(response, reason)
    }

    pub(crate) fn protocol_with(response: HttpResponse, reason: impl Into<String>) -> Self {
        AcmeError::Protocol {
            response: Box::new(response),
            reason: reason.into(),
        }
    }

    /// 若錯誤附帶伺服器回應，回傳該回應。
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            AcmeError::AccountAlreadyExists { response, .. }
            | AcmeError::Protocol { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    /// 嘗試把回應內容解析為 problem document。
    pub fn problem(&self) -> Option<Problem> {
        self.response().and_then(problem_of)
    }

    pub fn is_account_already_exists(&self) -> bool {
        matches!(self, AcmeError::AccountAlreadyExists { .. })
    }

    /// 既有帳戶的 URI，僅在 [`AcmeError::AccountAlreadyExists`] 時存在。
    pub fn existing_account_uri(&self) -> Option<&str> {
        match self {
            AcmeError::AccountAlreadyExists { uri, .. } => uri.as_deref(),
            _ => None,
        }
    }
}

fn problem_of(response: &HttpResponse) -> Option<Problem> {
    serde_json::from_slice::<Problem>(&response.body)
        .ok()
        .filter(|p| p.type_.is_some() || p.detail.is_some())
}
