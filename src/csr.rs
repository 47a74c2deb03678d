use std::result;

use openssl::{
    hash::MessageDigest,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509NameBuilder, X509Req},
};
use thiserror::Error;
use x509_parser::prelude::*;

use crate::key_pair::KeyPair;

/// 建立或解析 CSR（證書簽名請求）時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Openssl error: {0}")]
    OpensslError(#[from] openssl::error::ErrorStack),
    #[error("No SAN entries")]
    NoSanEntries,
    #[error("Malformed CSR: {0}")]
    Malformed(String),
}

type Result<T> = result::Result<T, CsrError>;

/// 產生帶有主體替代名稱 (SAN) 擴展的 CSR。
///
/// 第一個 SAN 同時作為主體的 CN。
///
/// ```
/// use acme_twin::{csr::CsrBuilder, key_pair::{KeyPair, KeyType}};
///
/// let key = KeyPair::generate(KeyType::EcP256, None).unwrap();
/// let der = CsrBuilder::new()
///     .add_san("example.com")
///     .add_san("www.example.com")
///     .build_der(&key)
///     .unwrap();
/// assert!(!der.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CsrBuilder {
    san_entries: Vec<String>,
}

impl CsrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新增一個 DNS 主體替代名稱。
    pub fn add_san(mut self, dns_name: &str) -> Self {
        self.san_entries.push(dns_name.to_string());
        self
    }

    /// 以指定金鑰簽署 CSR。
    ///
    /// # 錯誤
    ///
    /// 未設定任何 SAN 時回傳 `CsrError::NoSanEntries`。
    pub fn build(self, key_pair: &KeyPair) -> Result<X509Req> {
        let Some(common_name) = self.san_entries.first() else {
            return Err(CsrError::NoSanEntries);
        };

        let mut req_builder = X509Req::builder()?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("CN", common_name)?;
        req_builder.set_subject_name(&name.build())?;

        let mut san_builder = SubjectAlternativeName::new();
        for entry in &self.san_entries {
            san_builder.dns(entry);
        }
        let san_extension = san_builder.build(&req_builder.x509v3_context(None))?;

        let mut stack = Stack::new()?;
        stack.push(san_extension)?;
        req_builder.add_extensions(&stack)?;

        req_builder.set_pubkey(key_pair.private_key())?;
        req_builder.sign(key_pair.private_key(), MessageDigest::sha256())?;

        Ok(req_builder.build())
    }

    /// 與 [`build`](Self::build) 相同，但直接輸出 DER。
    pub fn build_der(self, key_pair: &KeyPair) -> Result<Vec<u8>> {
        Ok(self.build(key_pair)?.to_der()?)
    }
}

/// 從 DER 格式的 CSR 讀出要申請的網域。
///
/// 優先使用 SAN 擴展中的 DNS 名稱；沒有 SAN 時退回主體的 CN。結果去除重複並保留原順序。
pub fn csr_identifiers(der: &[u8]) -> Result<Vec<String>> {
    let (_, csr) = X509CertificationRequest::from_der(der)
        .map_err(|e| CsrError::Malformed(e.to_string()))?;

    let mut domains: Vec<String> = Vec::new();

    if let Some(extensions) = csr.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                for general_name in &san.general_names {
                    match general_name {
                        GeneralName::DNSName(dns_name) => push_unique(&mut domains, dns_name),
                        unsupported => {
                            log::warn!("Ignoring unsupported general name {unsupported} in CSR")
                        }
                    }
                }
            }
        }
    }

    if domains.is_empty() {
        for cn in csr.certification_request_info.subject.iter_common_name() {
            let cn = cn
                .as_str()
                .map_err(|e| CsrError::Malformed(e.to_string()))?;
            push_unique(&mut domains, cn);
        }
    }

    if domains.is_empty() {
        return Err(CsrError::NoSanEntries);
    }
    Ok(domains)
}

fn push_unique(domains: &mut Vec<String>, name: &str) {
    if !domains.iter().any(|d| d == name) {
        domains.push(name.to_string());
    }
}
