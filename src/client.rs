//! 兩代協議共用的客戶端契約、結果型別與請求核心。
//!
//! [`AcmeClient`] 定義呼叫端看到的操作集合；[`AcmeV1`](crate::v1::AcmeV1) 與
//! [`AcmeV2`](crate::v2::AcmeV2) 各自實作，差異只在目錄解析、標頭建構與負載形狀。
//! 每個操作都是一次（或加上取 nonce 共兩次）同步往返，不做任何重試。

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use serde_json::{Map, Value};
use url::Url;

use crate::{
    account::Account,
    directory::{Directory, DirectoryCache},
    error::{AcmeError, ConfigError, Result},
    transport::{HttpResponse, HttpTransport, TlsVerification, Transport, TransportConfig},
    v1::AcmeV1,
    v2::AcmeV2,
};

/// 帳戶註冊結果。
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// 伺服器回傳的帳戶 JSON。
    pub contents: Value,
    /// 伺服器指派的帳戶 URL。
    pub uri: String,
    /// 服務條款 URL（若伺服器有提供）。
    pub terms: Option<String>,
}

/// 新授權的結果。
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationResult {
    /// 描述挑戰的授權 JSON。
    pub contents: Value,
    /// 授權資源的 URL。
    pub uri: String,
}

/// 憑證簽發結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceResult {
    /// 憑證原始內容，DER 或 PEM 依 `Accept` 協商而定。
    pub certificate: Vec<u8>,
    /// 憑證資源 URL。
    pub location: String,
    /// 經由 `Link: rel="up"` 取得的中繼憑證。
    pub intermediate: Option<Vec<u8>>,
}

/// v2 訂單的查詢或建立結果。
///
/// 訂單內容保持伺服器回傳的 JSON 原樣，常用欄位透過存取方法讀取。
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    /// 伺服器回傳的訂單 JSON。
    pub contents: Value,
    /// 訂單資源 URL，建立時取自 `Location`。
    pub uri: String,
}

impl OrderResult {
    /// 訂單狀態：`pending`、`ready`、`processing`、`valid` 或 `invalid`。
    pub fn status(&self) -> Option<&str> {
        self.contents.get("status").and_then(Value::as_str)
    }

    /// 提交 CSR 的 URL。
    pub fn finalize_url(&self) -> Option<&str> {
        self.contents.get("finalize").and_then(Value::as_str)
    }

    /// 憑證下載 URL，只在訂單為 `valid` 時出現。
    pub fn certificate_url(&self) -> Option<&str> {
        self.contents.get("certificate").and_then(Value::as_str)
    }

    /// 此訂單需要完成的授權 URL；缺少此欄位時回傳空列表。
    pub fn authorizations(&self) -> Vec<&str> {
        self.contents
            .get("authorizations")
            .and_then(Value::as_array)
            .map(|urls| urls.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// 兩代協議共同的操作集合。
///
/// 帳戶以參數借入，客戶端不在呼叫之間保留它；只有 `register` 會寫入帳戶 URI。
pub trait AcmeClient {
    /// 取得 CA 目錄。
    fn get_directory(&self) -> Result<Directory>;

    /// 以聯絡信箱註冊帳戶；成功時（201）寫入 `account` 的 URI。
    ///
    /// # Errors
    ///
    /// 金鑰已註冊時回傳 [`AcmeError::AccountAlreadyExists`]。
    fn register(&self, account: &mut Account, email: &str) -> Result<RegistrationResult>;

    /// 讀取帳戶資訊（任何 2xx）。
    fn get_registration(&self, account: &Account) -> Result<Value>;

    /// 以呼叫端提供的欄位更新帳戶（任何 2xx）。
    fn update_registration(&self, account: &Account, params: Map<String, Value>) -> Result<bool>;

    /// 為單一網域申請授權（必須 201）。
    fn new_authorization(&self, account: &Account, domain: &str) -> Result<AuthorizationResult>;

    /// 通知伺服器挑戰已完成（任何 2xx）。
    fn validate_authorization(
        &self,
        account: &Account,
        uri: &str,
        challenge_type: &str,
        key_authorization: &str,
    ) -> Result<bool>;

    /// 讀取授權狀態（任何狀態碼，只要內容是 JSON）。
    fn get_authorization(&self, account: &Account, uri: &str) -> Result<Value>;

    /// 以 DER 格式的 CSR 申請憑證。
    fn issue_certificate(&self, account: &Account, csr: &[u8]) -> Result<IssuanceResult>;

    /// 撤銷 DER 格式的憑證（必須 200）。
    fn revoke_certificate(&self, account: &Account, cert: &[u8]) -> Result<bool>;
}

/// 客戶端設定與建構器。
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    directory_path: String,
    cache_directory: bool,
    transport: TransportConfig,
}

impl ClientBuilder {
    const DEFAULT_DIRECTORY_PATH: &'static str = "directory";

    /// `base_url` 為 CA 的基底 URL，例如 `https://acme-v02.api.letsencrypt.org/`。
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            directory_path: Self::DEFAULT_DIRECTORY_PATH.to_string(),
            cache_directory: false,
            transport: TransportConfig::default(),
        }
    }

    /// v2 目錄相對於基底 URL 的路徑。
    pub fn directory_path(mut self, path: impl Into<String>) -> Self {
        self.directory_path = path.into();
        self
    }

    /// 覆寫預設的 `User-Agent`。
    ///
    /// # 參數
    ///
    /// * `user_agent` - 產品識別字串；含非法字元時在 `build_*` 回傳 [`ConfigError::InvalidUserAgent`]。
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.transport.user_agent = user_agent.into();
        self
    }

    /// TLS 憑證驗證方式，用於自架或測試環境的 CA。
    pub fn tls(mut self, tls: TlsVerification) -> Self {
        self.transport.tls = tls;
        self
    }

    /// 交給傳輸層的逾時設定，協議核心本身不設逾時。
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    /// 在客戶端生命週期內快取 v2 目錄，目錄抓取失敗時清空。
    pub fn cache_directory(mut self, enabled: bool) -> Self {
        self.cache_directory = enabled;
        self
    }

    /// 以 [`HttpTransport`] 建立 v1 客戶端。
    ///
    /// # Errors
    ///
    /// 基底 URL 無法解析，或傳輸層設定無效時回傳 [`AcmeError::Config`]。
    pub fn build_v1(self) -> Result<AcmeV1<HttpTransport>> {
        let transport = HttpTransport::new(&self.transport)?;
        self.build_v1_with(transport)
    }

    /// 以 [`HttpTransport`] 建立 v2 客戶端。
    ///
    /// # Errors
    ///
    /// 與 [`build_v1`](Self::build_v1) 相同。
    pub fn build_v2(self) -> Result<AcmeV2<HttpTransport>> {
        let transport = HttpTransport::new(&self.transport)?;
        self.build_v2_with(transport)
    }

    /// 以自訂的 [`Transport`] 建立 v1 客戶端，傳輸相關設定不會套用。
    pub fn build_v1_with<T: Transport>(self, transport: T) -> Result<AcmeV1<T>> {
        Ok(AcmeV1::new(self.into_core(transport)?))
    }

    /// 以自訂的 [`Transport`] 建立 v2 客戶端，傳輸相關設定不會套用。
    pub fn build_v2_with<T: Transport>(self, transport: T) -> Result<AcmeV2<T>> {
        Ok(AcmeV2::new(self.into_core(transport)?))
    }

    fn into_core<T: Transport>(self, transport: T) -> Result<ClientCore<T>> {
        let base_url = Url::parse(&self.base_url).map_err(ConfigError::from)?;
        Ok(ClientCore {
            base_url,
            directory_path: self.directory_path,
            directory: DirectoryCache::new(self.cache_directory),
            transport,
        })
    }
}

/// 兩個協議版本共用的請求核心：路徑解析與傳輸。
#[derive(Debug)]
pub struct ClientCore<T> {
    base_url: Url,
    directory_path: String,
    pub(crate) directory: DirectoryCache,
    transport: T,
}

impl<T: Transport> ClientCore<T> {
    /// 所有路徑解析的基準 URL。
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 底層傳輸層。
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 以斜線開頭的目錄路徑。
    pub(crate) fn directory_path(&self) -> String {
        format!("/{}", self.directory_path.trim_start_matches('/'))
    }

    /// 把相對路徑或伺服器給的絕對 URL 解析成實際請求的 URL。
    ///
    /// 絕對 URL 只保留路徑部分，再接到基底 URL 上，
    /// 因此伺服器在不同主機名或顯式埠號下給出的連結都會落到同一個目標。
    ///
    /// # Errors
    ///
    /// 無法解析的連結回傳 [`AcmeError::InvalidServerUrl`]。
    pub fn resolve(&self, path: &str) -> Result<String> {
        let invalid = |source| AcmeError::InvalidServerUrl {
            url: path.to_string(),
            source,
        };
        let relative = if path.starts_with("http") {
            Url::parse(path).map_err(invalid)?.path().to_string()
        } else {
            path.to_string()
        };
        Ok(self.base_url.join(&relative).map_err(invalid)?.to_string())
    }

    pub(crate) fn get(&self, path: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let url = self.resolve(path)?;
        Ok(self.transport.get(&url, headers)?)
    }

    pub(crate) fn head(&self, path: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let url = self.resolve(path)?;
        Ok(self.transport.head(&url, headers)?)
    }

    /// 對已解析的 URL 發出 POST。
    pub(crate) fn post_resolved(&self, url: &str, body: String, headers: &HeaderMap) -> Result<HttpResponse> {
        Ok(self.transport.post(url, body, headers)?)
    }

    /// 不簽名地抓取伺服器給出的連結，用於取得中繼憑證。
    ///
    /// 絕對 URL 原樣使用；相對連結依 [`resolve`](Self::resolve) 接到基底 URL 上。
    pub(crate) fn fetch_link(&self, link: &str) -> Result<HttpResponse> {
        let url = match Url::parse(link) {
            Ok(url) => url.to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.resolve(link)?,
            Err(source) => {
                return Err(AcmeError::InvalidServerUrl {
                    url: link.to_string(),
                    source,
                })
            }
        };
        Ok(self.transport.get(&url, &HeaderMap::new())?)
    }
}

/// 以指定的 `Content-Type` 加上額外標頭組成請求標頭。
pub(crate) fn request_headers(content_type: &'static str, extra: Option<&HeaderMap>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(extra) = extra {
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers
}

pub(crate) fn accept(media_type: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(media_type));
    headers
}

/// 狀態碼必須完全相同。
pub(crate) fn expect_status(response: HttpResponse, expected: StatusCode) -> Result<HttpResponse> {
    if response.status == expected {
        Ok(response)
    } else {
        Err(AcmeError::protocol(response))
    }
}

/// 任何 2xx 都算成功。
pub(crate) fn expect_success(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(AcmeError::protocol(response))
    }
}

pub(crate) fn parse_json(response: &HttpResponse) -> Result<Value> {
    response.json().map_err(|e| {
        AcmeError::protocol_with(response.clone(), format!("Invalid JSON response: {e}"))
    })
}

/// 取出回應的 `Location`，缺少時視為協議錯誤。
pub(crate) fn required_location(response: &HttpResponse) -> Result<String> {
    response.location().ok_or_else(|| {
        log::warn!("{} response without Location header", response.status);
        AcmeError::protocol_with(response.clone(), "Location header not found")
    })
}

/// 依 `Link: rel="up"` 抓取中繼憑證；不簽名，失敗時視為協議錯誤。
pub(crate) fn fetch_intermediate<T: Transport>(
    core: &ClientCore<T>,
    response: &HttpResponse,
) -> Result<Option<Vec<u8>>> {
    let Some(up) = response.link("up") else {
        return Ok(None);
    };
    log::debug!("Fetching issuer certificate from {up}");
    let chain = expect_success(core.fetch_link(&up)?)?;
    Ok(Some(chain.body))
}
