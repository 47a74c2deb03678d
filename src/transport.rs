//! HTTP 傳輸層：對絕對 URL 發出 GET/HEAD/POST，並回傳狀態碼、標頭與內容。
//!
//! 路徑的解析與正規化由協議客戶端負責，這裡只處理已解析好的 URL。

use std::{borrow::Cow, path::PathBuf, time::Duration};

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderName, HeaderValue, LINK, LOCATION, USER_AGENT},
    Certificate, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::ConfigError;

/// 預設的產品識別字串。
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (+",
    env!("CARGO_PKG_REPOSITORY"),
    ")"
);

/// 網路或 TLS 層的失敗，原樣保留底層錯誤。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// TLS 憑證驗證方式，用於連線非公開或測試用的 CA。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// 使用系統信任的根憑證。
    #[default]
    Default,
    /// 額外信任指定 PEM 檔案中的根憑證。
    CaBundle(PathBuf),
    /// 完全停用憑證驗證。
    Disabled,
}

/// 建立 [`HttpTransport`] 所需的設定。
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub tls: TlsVerification,
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tls: TlsVerification::Default,
            timeout: None,
        }
    }
}

/// 一次 HTTP 交換的完整回應。
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// `Link` 標頭中的一個關聯。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLink {
    pub relation: String,
    pub url: String,
}

impl HttpResponse {
    /// 建立指定狀態碼的空回應；不合法的狀態碼視為 500。
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// 追加一個標頭，名稱或值不合法時忽略。
    pub fn with_header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// 設定回應內容。
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// 狀態碼是否為 2xx。
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 以名稱讀取第一個標頭值；值不是可見 ASCII 時回傳 `None`。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// `Location` 標頭，通常是新建資源的 URL。
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// 伺服器發放的下一個 anti-replay nonce。
    pub fn replay_nonce(&self) -> Option<String> {
        self.header("Replay-Nonce").map(str::to_string)
    }

    /// 解析所有 `Link` 標頭，一個 `rel` 含多個關聯時各自展開。
    pub fn links(&self) -> Vec<RelationLink> {
        self.headers
            .get_all(LINK)
            .into_iter()
            .filter_map(|header| header.to_str().ok())
            .filter_map(|header_str| nom_rfc8288::complete::link(header_str).ok())
            .flat_map(|link_vec| link_vec.into_iter())
            .flatten()
            .flat_map(|link| {
                let url = link.url.to_string();
                link.params
                    .into_iter()
                    .filter(|param| param.key.eq_ignore_ascii_case("rel"))
                    .filter_map(|param| param.val)
                    .flat_map(|rel| {
                        rel.split_whitespace()
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .map(move |relation| RelationLink {
                        relation,
                        url: url.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// 取得第一個符合 `relation` 的連結 URL。
    pub fn link(&self, relation: &str) -> Option<String> {
        self.links()
            .into_iter()
            .find(|link| link.relation == relation)
            .map(|link| link.url)
    }

    /// 把回應內容解析為 JSON。
    ///
    /// # Errors
    ///
    /// 內容不是合法 JSON 或不符合 `T` 時回傳 [`serde_json::Error`]。
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// 以 UTF-8 解讀回應內容，非法位元組以替代字元取代。
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// 協議客戶端與網路之間的接縫。
///
/// 實作者必須在每個請求加上自己的預設標頭，並讓呼叫端傳入的同名標頭覆蓋預設值。
/// 逾時與取消完全交由實作者處理。
pub trait Transport {
    /// 對 `url` 發出 GET。
    ///
    /// # 參數
    ///
    /// * `url` - 已解析的絕對 URL。
    /// * `headers` - 呼叫端標頭，同名時覆蓋預設標頭。
    ///
    /// # Errors
    ///
    /// 只有網路或 TLS 失敗回傳 [`TransportError`]；任何 HTTP 狀態碼都視為成功的交換。
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError>;

    /// 對 `url` 發出 HEAD，回應內容為空。
    fn head(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError>;

    /// 對 `url` 發出帶有 `body` 的 POST；`Content-Type` 由呼叫端在 `headers` 中指定。
    fn post(&self, url: &str, body: String, headers: &HeaderMap) -> Result<HttpResponse, TransportError>;
}

/// 以 `reqwest` 阻塞式客戶端實作的 [`Transport`]。
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    default_headers: HeaderMap,
}

impl HttpTransport {
    /// 依設定建立傳輸層。
    ///
    /// # Errors
    ///
    /// CA 檔案無法讀取或內容不是合法 PEM、User-Agent 含非法字元，
    /// 或底層客戶端建立失敗時回傳 [`ConfigError`]。
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();

        match &config.tls {
            TlsVerification::Default => {}
            TlsVerification::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| ConfigError::CaBundleRead {
                    path: path.clone(),
                    source: e,
                })?;
                let cert = Certificate::from_pem(&pem).map_err(ConfigError::InvalidCaBundle)?;
                builder = builder.add_root_certificate(cert);
            }
            TlsVerification::Disabled => {
                log::warn!("TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| ConfigError::InvalidUserAgent(config.user_agent.clone()))?,
        );

        Ok(Self {
            client: builder.build().map_err(ConfigError::HttpClient)?,
            default_headers,
        })
    }

    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        headers: &HeaderMap,
    ) -> Result<HttpResponse, TransportError> {
        log::debug!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .headers(merge_headers(&self.default_headers, headers));
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        log::trace!("{url} -> {status}");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        self.send(Method::GET, url, None, headers)
    }

    fn head(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        self.send(Method::HEAD, url, None, headers)
    }

    fn post(&self, url: &str, body: String, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        self.send(Method::POST, url, Some(body), headers)
    }
}

/// 以預設標頭為底，呼叫端提供的同名標頭整組取代預設值。
pub(crate) fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
        for value in overrides.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}
