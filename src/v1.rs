//! ACME v1（以 `resource` 區分操作的舊版協議）客戶端。
//!
//! 每個操作都有固定路徑，目錄只用來取得 nonce。每個簽名請求前都會先
//! `GET /directory` 讀取 `Replay-Nonce`，再以 `{header, protected, payload, signature}`
//! 格式送出 `Content-Type: application/json` 的 POST。

use reqwest::{header::HeaderMap, StatusCode};
use serde_json::{Map, Value};

use crate::{
    account::Account,
    client::{
        accept, expect_status, expect_success, fetch_intermediate, parse_json, request_headers,
        required_location, AcmeClient, AuthorizationResult, ClientCore, IssuanceResult,
        RegistrationResult,
    },
    directory::Directory,
    error::{AcmeError, Result},
    jws::{sign_request, JwsPayload, SigningError},
    nonce::{nonce_from, NonceSource},
    payload::{
        CertificateRequestPayload, ChallengeResponsePayload, NewAuthorizationPayload,
        NewRegistrationPayload, PayloadT, RegistrationPayload, RevocationPayload,
    },
    protection::Protection,
    transport::{HttpResponse, HttpTransport, Transport},
};

const DIRECTORY_PATH: &str = "/directory";
const NEW_REG_PATH: &str = "/acme/new-reg";
const NEW_AUTHZ_PATH: &str = "/acme/new-authz";
const NEW_CERT_PATH: &str = "/acme/new-cert";
const REVOKE_CERT_PATH: &str = "/acme/revoke-cert";

const CONTENT_TYPE: &str = "application/json";
const PKIX_CERT: &str = "application/pkix-cert";

/// ACME v1 客戶端，以 [`ClientBuilder`](crate::client::ClientBuilder) 建立。
#[derive(Debug)]
pub struct AcmeV1<T = HttpTransport> {
    core: ClientCore<T>,
}

impl<T: Transport> AcmeV1<T> {
    pub(crate) fn new(core: ClientCore<T>) -> Self {
        Self { core }
    }

    /// 共用的請求核心，可取得基底 URL 與傳輸層。
    pub fn core(&self) -> &ClientCore<T> {
        &self.core
    }

    /// 簽署並送出帶有 `resource` 欄位的負載。
    fn post<P: PayloadT>(
        &self,
        account: &Account,
        path: &str,
        payload: &P,
        extra: Option<&HeaderMap>,
    ) -> Result<HttpResponse> {
        payload.validate().map_err(SigningError::from)?;
        let key = account.key()?;
        let url = self.core.resolve(path)?;

        let (header, protected) = Protection::new(self, key).legacy_headers()?;
        let jws = sign_request(key, &header, &protected, &JwsPayload::json(&payload.with_resource())?)?;
        let body = serde_json::to_string(&jws).map_err(SigningError::from)?;

        log::debug!("POST {url} ({})", P::RESOURCE);
        self.core
            .post_resolved(&url, body, &request_headers(CONTENT_TYPE, extra))
    }
}

impl<T: Transport> NonceSource for AcmeV1<T> {
    fn fresh_nonce(&self) -> Result<Option<String>> {
        log::trace!("Requesting nonce from {DIRECTORY_PATH}");
        let response = self.core.get(DIRECTORY_PATH, &HeaderMap::new())?;
        Ok(nonce_from(&response))
    }
}

impl<T: Transport> AcmeClient for AcmeV1<T> {
    fn get_directory(&self) -> Result<Directory> {
        let response = expect_success(self.core.get(DIRECTORY_PATH, &HeaderMap::new())?)?;
        response
            .json()
            .map_err(|e| AcmeError::protocol_with(response.clone(), format!("Invalid directory: {e}")))
    }

    fn register(&self, account: &mut Account, email: &str) -> Result<RegistrationResult> {
        let response = self.post(account, NEW_REG_PATH, &NewRegistrationPayload::new(email), None)?;

        match response.status {
            StatusCode::CREATED => {
                let uri = required_location(&response)?;
                account.set_uri(uri.clone());
                let contents = parse_json(&response)?;
                let terms = response.link("terms-of-service");
                Ok(RegistrationResult {
                    contents,
                    uri,
                    terms,
                })
            }
            StatusCode::CONFLICT => Err(AcmeError::AccountAlreadyExists {
                uri: response.location(),
                response: Box::new(response),
            }),
            _ => Err(AcmeError::protocol(response)),
        }
    }

    fn get_registration(&self, account: &Account) -> Result<Value> {
        let uri = account.uri().ok_or(AcmeError::NotRegistered)?;
        let response = self.post(account, uri, &RegistrationPayload::default(), None)?;
        parse_json(&expect_success(response)?)
    }

    fn update_registration(&self, account: &Account, params: Map<String, Value>) -> Result<bool> {
        let uri = account.uri().ok_or(AcmeError::NotRegistered)?;
        let response = self.post(account, uri, &RegistrationPayload::new(params), None)?;
        expect_success(response)?;
        Ok(true)
    }

    fn new_authorization(&self, account: &Account, domain: &str) -> Result<AuthorizationResult> {
        let response = self.post(
            account,
            NEW_AUTHZ_PATH,
            &NewAuthorizationPayload::new(domain),
            None,
        )?;
        let response = expect_status(response, StatusCode::CREATED)?;
        Ok(AuthorizationResult {
            contents: parse_json(&response)?,
            uri: required_location(&response)?,
        })
    }

    fn validate_authorization(
        &self,
        account: &Account,
        uri: &str,
        challenge_type: &str,
        key_authorization: &str,
    ) -> Result<bool> {
        let payload = ChallengeResponsePayload::new(challenge_type, key_authorization);
        expect_success(self.post(account, uri, &payload, None)?)?;
        Ok(true)
    }

    fn get_authorization(&self, _account: &Account, uri: &str) -> Result<Value> {
        let response = self.core.get(uri, &HeaderMap::new())?;
        parse_json(&response)
    }

    fn issue_certificate(&self, account: &Account, csr: &[u8]) -> Result<IssuanceResult> {
        let response = self.post(
            account,
            NEW_CERT_PATH,
            &CertificateRequestPayload::new(csr),
            Some(&accept(PKIX_CERT)),
        )?;
        let response = expect_status(response, StatusCode::CREATED)?;

        let location = required_location(&response)?;
        let intermediate = fetch_intermediate(&self.core, &response)?;
        Ok(IssuanceResult {
            certificate: response.body,
            location,
            intermediate,
        })
    }

    fn revoke_certificate(&self, account: &Account, cert: &[u8]) -> Result<bool> {
        let response = self.post(account, REVOKE_CERT_PATH, &RevocationPayload::new(cert), None)?;
        expect_status(response, StatusCode::OK)?;
        Ok(true)
    }
}
