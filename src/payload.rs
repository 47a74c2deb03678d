use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::encoding::Base64;

/// 負載在送出前未通過檢查。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Contact information is required")]
    MissingContact,
    #[error("Identifier value cannot be empty")]
    EmptyIdentifier,
    #[error("At least one identifier is required")]
    NoIdentifiers,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// 所有請求負載共用的行為。
///
/// `RESOURCE` 是 ACME v1 嵌入每個負載的 `resource` 欄位值；v2 不送出此欄位。
pub trait PayloadT: Serialize {
    const RESOURCE: &'static str;

    /// 送出前的本地檢查，預設不做任何檢查。
    fn validate(&self) -> Result<(), PayloadError> {
        Ok(())
    }

    /// 包成帶有 `resource` 欄位的 v1 負載。
    fn with_resource(&self) -> LegacyPayload<'_, Self>
    where
        Self: Sized,
    {
        LegacyPayload {
            resource: Self::RESOURCE,
            payload: self,
        }
    }
}

/// 以 `resource` 開頭、其後攤平原負載欄位的 v1 負載。
#[derive(Debug, Serialize)]
pub struct LegacyPayload<'a, P: Serialize> {
    resource: &'static str,
    #[serde(flatten)]
    payload: &'a P,
}

/// 帳戶註冊負載。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistrationPayload {
    contact: Vec<String>,
    #[serde(
        rename = "termsOfServiceAgreed",
        skip_serializing_if = "Option::is_none"
    )]
    terms_of_service_agreed: Option<bool>,
}

impl NewRegistrationPayload {
    /// `email` 會自動補上 `mailto:` 前綴，若已包含則不重複。
    pub fn new(email: &str) -> Self {
        let contact = if email.is_empty() {
            Vec::new()
        } else if email.starts_with("mailto:") {
            vec![email.to_string()]
        } else {
            vec![format!("mailto:{}", email)]
        };

        NewRegistrationPayload {
            contact,
            terms_of_service_agreed: None,
        }
    }

    /// v2 在註冊時以布林值明確表示同意服務條款。
    pub fn agree_to_terms(mut self) -> Self {
        self.terms_of_service_agreed = Some(true);
        self
    }
}

impl PayloadT for NewRegistrationPayload {
    const RESOURCE: &'static str = "new-reg";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.contact.is_empty() {
            return Err(PayloadError::MissingContact);
        }
        Ok(())
    }
}

/// 讀取或更新既有帳戶的負載，內容為呼叫端提供的欄位。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RegistrationPayload(Map<String, Value>);

impl RegistrationPayload {
    /// 呼叫端提供的 `resource` 會被移除，由協議版本決定是否加回。
    pub fn new(mut params: Map<String, Value>) -> Self {
        params.remove("resource");
        Self(params)
    }
}

impl PayloadT for RegistrationPayload {
    const RESOURCE: &'static str = "reg";
}

/// 識別項，目前只使用 `dns` 類型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(domain: &str) -> Self {
        Self {
            type_: "dns".to_string(),
            value: domain.to_string(),
        }
    }

    fn validate(&self) -> Result<(), PayloadError> {
        if self.value.is_empty() {
            return Err(PayloadError::EmptyIdentifier);
        }
        Ok(())
    }
}

/// 申請單一網域授權的負載。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuthorizationPayload {
    pub identifier: Identifier,
}

impl NewAuthorizationPayload {
    pub fn new(domain: &str) -> Self {
        Self {
            identifier: Identifier::dns(domain),
        }
    }
}

impl PayloadT for NewAuthorizationPayload {
    const RESOURCE: &'static str = "new-authz";

    fn validate(&self) -> Result<(), PayloadError> {
        self.identifier.validate()
    }
}

/// 通知伺服器挑戰已就緒的負載。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponsePayload {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "keyAuthorization")]
    pub key_authorization: String,
}

impl ChallengeResponsePayload {
    pub fn new(type_: &str, key_authorization: &str) -> Self {
        Self {
            type_: type_.to_string(),
            key_authorization: key_authorization.to_string(),
        }
    }
}

impl PayloadT for ChallengeResponsePayload {
    const RESOURCE: &'static str = "challenge";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.key_authorization.is_empty() {
            return Err(PayloadError::EmptyField("keyAuthorization"));
        }
        Ok(())
    }
}

/// 提交 CSR 的負載，CSR 以 DER 的 base64url 表示。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequestPayload {
    csr: String,
}

impl CertificateRequestPayload {
    pub fn new(csr_der: &[u8]) -> Self {
        Self {
            csr: Base64::new(csr_der).base64_url(),
        }
    }
}

impl PayloadT for CertificateRequestPayload {
    const RESOURCE: &'static str = "new-cert";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.csr.is_empty() {
            return Err(PayloadError::EmptyField("csr"));
        }
        Ok(())
    }
}

/// 撤銷憑證的負載，憑證以 DER 的 base64url 表示。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationPayload {
    certificate: String,
}

impl RevocationPayload {
    pub fn new(cert_der: &[u8]) -> Self {
        Self {
            certificate: Base64::new(cert_der).base64_url(),
        }
    }
}

impl PayloadT for RevocationPayload {
    const RESOURCE: &'static str = "revoke-cert";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.certificate.is_empty() {
            return Err(PayloadError::EmptyField("certificate"));
        }
        Ok(())
    }
}

/// v2 建立訂單的負載。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub identifiers: Vec<Identifier>,
}

impl NewOrderPayload {
    pub fn new<S: AsRef<str>>(domains: &[S]) -> Self {
        Self {
            identifiers: domains
                .iter()
                .map(|domain| Identifier::dns(domain.as_ref()))
                .collect(),
        }
    }
}

impl PayloadT for NewOrderPayload {
    const RESOURCE: &'static str = "new-order";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.identifiers.is_empty() {
            return Err(PayloadError::NoIdentifiers);
        }
        self.identifiers.iter().try_for_each(Identifier::validate)
    }
}
