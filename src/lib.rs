//! # ACME 協議客戶端
//!
//! 本庫實作 ACME 協議兩代版本的客戶端核心，供上層工具自動申請、續約與撤銷憑證：
//!
//! - **v1**（[`v1::AcmeV1`]）：以負載中的 `resource` 欄位區分操作，端點路徑固定。
//! - **v2**（[`v2::AcmeV2`]，RFC 8555）：所有端點由 CA 目錄解析，並提供訂單流程。
//!
//! 兩者都實作 [`client::AcmeClient`]，呼叫端看到相同的操作與結果型別。
//! 每個操作都是同步的請求/回應往返；簽名請求前一定先取得新的 nonce，
//! 核心本身不做重試、不等待，也不在呼叫之間保留帳戶。
//!
//! ## 模組
//!
//! - **簽名**：[`key_pair`]、[`jwk`]、[`protection`]、[`signature`]、[`jws`]
//! - **nonce 與目錄**：[`nonce`]、[`directory`]
//! - **傳輸**：[`transport`]，包含 `Link` 標頭解析與 TLS 驗證設定
//! - **協議**：[`client`]、[`v1`]、[`v2`]、[`payload`]、[`account`]
//! - **其他**：[`csr`]、[`encoding`]、[`error`]
//!
//! ## 示例
//!
//! ```no_run
//! use acme_twin::{
//!     account::Account,
//!     client::{AcmeClient, ClientBuilder},
//!     csr::CsrBuilder,
//!     key_pair::{KeyPair, KeyType},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("https://acme-staging-v02.api.letsencrypt.org/")
//!         .cache_directory(true)
//!         .build_v2()?;
//!
//!     // 1. 註冊帳戶；金鑰已註冊時改用既有帳戶
//!     let key = KeyPair::generate(KeyType::EcP256, None)?;
//!     let key_pem = key.private_key_to_pem()?;
//!     let mut account = Account::new(key);
//!     match client.register(&mut account, "user@example.com") {
//!         Ok(registration) => println!("Registered {}", registration.uri),
//!         Err(e) if e.is_account_already_exists() => {
//!             let uri = e.existing_account_uri().unwrap_or_default().to_string();
//!             account = Account::registered(KeyPair::from_pem(&key_pem)?, uri);
//!         }
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     // 2. 建立訂單並完成挑戰（挑戰的佈署由呼叫端負責）
//!     let order = client.new_order(&account, &["example.com"])?;
//!     for authz_url in order.authorizations() {
//!         let authz = client.get_authorization(&account, authz_url)?;
//!         println!("{authz}");
//!     }
//!
//!     // 3. 提交 CSR 並下載憑證
//!     let cert_key = KeyPair::generate(KeyType::EcP256, None)?;
//!     let csr = CsrBuilder::new().add_san("example.com").build_der(&cert_key)?;
//!     let order = client.finalize_order(&account, &order, &csr)?;
//!     if let Some(cert_url) = order.certificate_url() {
//!         let issued = client.download_certificate(&account, cert_url)?;
//!         println!("{}", String::from_utf8_lossy(&issued.certificate));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod client;
pub mod csr;
pub mod directory;
pub mod encoding;
pub mod error;
pub mod jwk;
pub mod jws;
pub mod key_pair;
pub mod nonce;
pub mod payload;
pub mod protection;
pub mod signature;
pub mod transport;
pub mod v1;
pub mod v2;

pub use account::Account;
pub use client::{
    AcmeClient, AuthorizationResult, ClientBuilder, IssuanceResult, OrderResult,
    RegistrationResult,
};
pub use error::{AcmeError, Result};
pub use v1::AcmeV1;
pub use v2::AcmeV2;
