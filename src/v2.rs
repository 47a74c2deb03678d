//! ACME v2（RFC 8555）客戶端。
//!
//! 所有端點都從目錄解析；nonce 以 `HEAD newNonce` 取得。請求本體是扁平化 JWS，
//! 受保護標頭帶有實際請求的 `url`。帳戶註冊後以帳戶 URI 作為 `kid` 簽名，之前則嵌入 `jwk`。

use reqwest::{header::HeaderMap, StatusCode};
use serde_json::{Map, Value};

use crate::{
    account::Account,
    client::{
        accept, expect_status, expect_success, fetch_intermediate, parse_json, request_headers,
        required_location, AcmeClient, AuthorizationResult, ClientCore, IssuanceResult,
        OrderResult, RegistrationResult,
    },
    csr::csr_identifiers,
    directory::Directory,
    error::{AcmeError, Result},
    jws::{sign_request_v2, JwsPayload, SigningError},
    key_pair::KeyPair,
    nonce::{nonce_from, NonceSource},
    payload::{
        CertificateRequestPayload, ChallengeResponsePayload, NewAuthorizationPayload,
        NewOrderPayload, NewRegistrationPayload, PayloadT, RegistrationPayload, RevocationPayload,
    },
    protection::Protection,
    transport::{HttpResponse, HttpTransport, Transport},
};

const CONTENT_TYPE: &str = "application/jose+json";
const PEM_CHAIN: &str = "application/pem-certificate-chain";

/// ACME v2 客戶端，以 [`ClientBuilder`](crate::client::ClientBuilder) 建立。
#[derive(Debug)]
pub struct AcmeV2<T = HttpTransport> {
    core: ClientCore<T>,
}

impl<T: Transport> AcmeV2<T> {
    pub(crate) fn new(core: ClientCore<T>) -> Self {
        Self { core }
    }

    /// 共用的請求核心，可取得基底 URL 與傳輸層。
    pub fn core(&self) -> &ClientCore<T> {
        &self.core
    }

    /// 查詢目錄中某個操作的 URL，每次呼叫都依目錄設定重新取得或使用快取。
    pub fn url_from_directory(&self, name: &str) -> Result<String> {
        Ok(self.get_directory()?.require(name)?.to_string())
    }

    /// 目錄 `meta.termsOfService`。
    pub fn terms_from_directory(&self) -> Result<Option<String>> {
        Ok(self.get_directory()?.terms_of_service().map(str::to_string))
    }

    /// 建立新訂單（必須 201）。
    pub fn new_order<S: AsRef<str>>(&self, account: &Account, domains: &[S]) -> Result<OrderResult> {
        let payload = Self::json_payload(&NewOrderPayload::new(domains))?;
        let url = self.url_from_directory("newOrder")?;
        let response = self.post(account, &url, &payload, None)?;
        let response = expect_status(response, StatusCode::CREATED)?;
        Ok(OrderResult {
            contents: parse_json(&response)?,
            uri: required_location(&response)?,
        })
    }

    /// 以 POST-as-GET 讀取訂單（必須 200）。
    pub fn get_order(&self, account: &Account, uri: &str) -> Result<OrderResult> {
        let response = self.post(account, uri, &JwsPayload::Empty, None)?;
        let response = expect_status(response, StatusCode::OK)?;
        Ok(OrderResult {
            contents: parse_json(&response)?,
            uri: uri.to_string(),
        })
    }

    /// 向訂單的 `finalize` URL 提交 CSR（必須 200），回傳更新後的訂單。
    pub fn finalize_order(&self, account: &Account, order: &OrderResult, csr: &[u8]) -> Result<OrderResult> {
        let finalize = order.finalize_url().ok_or_else(|| AcmeError::MissingOrderField {
            uri: order.uri.clone(),
            field: "finalize",
        })?;
        let payload = Self::json_payload(&CertificateRequestPayload::new(csr))?;
        let response = self.post(account, finalize, &payload, None)?;
        let response = expect_status(response, StatusCode::OK)?;
        Ok(OrderResult {
            contents: parse_json(&response)?,
            uri: order.uri.clone(),
        })
    }

    /// 以 POST-as-GET 下載 PEM 憑證鏈（必須 200）。
    pub fn download_certificate(&self, account: &Account, cert_url: &str) -> Result<IssuanceResult> {
        let response = self.post(account, cert_url, &JwsPayload::Empty, Some(&accept(PEM_CHAIN)))?;
        let response = expect_status(response, StatusCode::OK)?;

        let intermediate = fetch_intermediate(&self.core, &response)?;
        Ok(IssuanceResult {
            certificate: response.body,
            location: cert_url.to_string(),
            intermediate,
        })
    }

    fn json_payload<P: PayloadT>(payload: &P) -> Result<JwsPayload> {
        payload.validate().map_err(SigningError::from)?;
        Ok(JwsPayload::json(payload)?)
    }

    /// 簽署並送出請求；帳戶已註冊時以 `kid` 識別。
    fn post(
        &self,
        account: &Account,
        url: &str,
        payload: &JwsPayload,
        extra: Option<&HeaderMap>,
    ) -> Result<HttpResponse> {
        self.post_as(account.key()?, account.uri(), url, payload, extra)
    }

    fn post_as(
        &self,
        key: &KeyPair,
        kid: Option<&str>,
        url: &str,
        payload: &JwsPayload,
        extra: Option<&HeaderMap>,
    ) -> Result<HttpResponse> {
        let url = self.core.resolve(url)?;

        let protected = Protection::new(self, key).create_header(&url, kid)?;
        let body = sign_request_v2(key, &protected, payload)?.to_json()?;

        log::debug!("POST {url}");
        self.core
            .post_resolved(&url, body, &request_headers(CONTENT_TYPE, extra))
    }

    fn fetch_directory(&self) -> Result<Directory> {
        let path = self.core.directory_path();
        log::trace!("Fetching directory from {path}");
        let response = expect_status(self.core.get(&path, &HeaderMap::new())?, StatusCode::OK)?;
        response
            .json::<Directory>()
            .map_err(|e| AcmeError::protocol_with(response.clone(), format!("Invalid directory: {e}")))
    }
}

impl<T: Transport> NonceSource for AcmeV2<T> {
    fn fresh_nonce(&self) -> Result<Option<String>> {
        let url = self.url_from_directory("newNonce")?;
        log::trace!("Requesting nonce from {url}");
        let response = self.core.head(&url, &HeaderMap::new())?;
        Ok(nonce_from(&response))
    }
}

impl<T: Transport> AcmeClient for AcmeV2<T> {
    fn get_directory(&self) -> Result<Directory> {
        self.core.directory.get_or_fetch(|| self.fetch_directory())
    }

    fn register(&self, account: &mut Account, email: &str) -> Result<RegistrationResult> {
        let payload = Self::json_payload(&NewRegistrationPayload::new(email).agree_to_terms())?;
        let url = self.url_from_directory("newAccount")?;
        // newAccount 一律以 jwk 簽名
        let response = self.post_as(account.key()?, None, &url, &payload, None)?;

        match response.status {
            StatusCode::CREATED => {
                let uri = required_location(&response)?;
                account.set_uri(uri.clone());
                let contents = parse_json(&response)?;
                let terms = self.terms_from_directory().unwrap_or_else(|e| {
                    log::warn!("Account {uri} created but terms of service lookup failed: {e}");
                    None
                });
                Ok(RegistrationResult {
                    contents,
                    uri,
                    terms,
                })
            }
            StatusCode::OK | StatusCode::CONFLICT => Err(AcmeError::AccountAlreadyExists {
                uri: response.location(),
                response: Box::new(response),
            }),
            _ => Err(AcmeError::protocol(response)),
        }
    }

    fn get_registration(&self, account: &Account) -> Result<Value> {
        let uri = account.uri().ok_or(AcmeError::NotRegistered)?;
        let payload = Self::json_payload(&RegistrationPayload::default())?;
        parse_json(&expect_success(self.post(account, uri, &payload, None)?)?)
    }

    fn update_registration(&self, account: &Account, params: Map<String, Value>) -> Result<bool> {
        let uri = account.uri().ok_or(AcmeError::NotRegistered)?;
        let payload = Self::json_payload(&RegistrationPayload::new(params))?;
        expect_success(self.post(account, uri, &payload, None)?)?;
        Ok(true)
    }

    fn new_authorization(&self, account: &Account, domain: &str) -> Result<AuthorizationResult> {
        let payload = Self::json_payload(&NewAuthorizationPayload::new(domain))?;
        let url = self.url_from_directory("newAuthz")?;
        let response = expect_status(self.post(account, &url, &payload, None)?, StatusCode::CREATED)?;
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
        let payload = Self::json_payload(&ChallengeResponsePayload::new(challenge_type, key_authorization))?;
        expect_success(self.post(account, uri, &payload, None)?)?;
        Ok(true)
    }

    fn get_authorization(&self, account: &Account, uri: &str) -> Result<Value> {
        let response = self.post(account, uri, &JwsPayload::Empty, None)?;
        parse_json(&response)
    }

    /// 由 CSR 的網域建立訂單並提交；訂單在完成後立即為 `valid` 時下載憑證。
    ///
    /// 仍在處理中的訂單回傳 [`AcmeError::OrderNotReady`]，
    /// 由呼叫端以 [`get_order`](AcmeV2::get_order) 輪詢後再呼叫
    /// [`download_certificate`](AcmeV2::download_certificate)。
    fn issue_certificate(&self, account: &Account, csr: &[u8]) -> Result<IssuanceResult> {
        let domains = csr_identifiers(csr).map_err(|e| AcmeError::InvalidCsr(e.to_string()))?;
        let order = self.new_order(account, &domains)?;
        let order = self.finalize_order(account, &order, csr)?;

        match order.status() {
            Some("valid") => {
                let cert_url = order
                    .certificate_url()
                    .ok_or_else(|| AcmeError::MissingOrderField {
                        uri: order.uri.clone(),
                        field: "certificate",
                    })?;
                self.download_certificate(account, cert_url)
            }
            status => Err(AcmeError::OrderNotReady {
                uri: order.uri.clone(),
                status: status.unwrap_or("unknown").to_string(),
            }),
        }
    }

    fn revoke_certificate(&self, account: &Account, cert: &[u8]) -> Result<bool> {
        let payload = Self::json_payload(&RevocationPayload::new(cert))?;
        let url = self.url_from_directory("revokeCert")?;
        expect_status(self.post(account, &url, &payload, None)?, StatusCode::OK)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::{
        client::ClientBuilder,
        csr::CsrBuilder,
        jws::FlattenedJws,
        key_pair::KeyType,
        payload::PayloadError,
        transport::mock::{MockTransport, RecordedRequest},
    };

    const BASE: &str = "https://ca.example/";

    fn directory_json() -> Value {
        json!({
            "newNonce": "https://ca.example/acme/new-nonce",
            "newAccount": "https://ca.example/acme/new-acct",
            "newOrder": "https://ca.example/acme/new-order",
            "newAuthz": "https://ca.example/acme/new-authz",
            "revokeCert": "https://ca.example/acme/revoke-cert",
            "keyChange": "https://ca.example/acme/key-change",
            "meta": {"termsOfService": "https://ca.example/terms.pdf"}
        })
    }

    fn with_directory(transport: MockTransport) -> MockTransport {
        transport
            .route(Method::GET, "https://ca.example/directory", |_, _| {
                HttpResponse::new(200).with_body(directory_json().to_string())
            })
            .route(Method::HEAD, "https://ca.example/acme/new-nonce", |hit, _| {
                HttpResponse::new(200).with_header("Replay-Nonce", format!("nonce-{hit}"))
            })
    }

    fn client(transport: MockTransport) -> AcmeV2<MockTransport> {
        ClientBuilder::new(BASE)
            .build_v2_with(with_directory(transport))
            .unwrap()
    }

    fn registered() -> Account {
        Account::registered(
            KeyPair::generate(KeyType::EcP256, None).unwrap(),
            "https://ca.example/acme/acct/1",
        )
    }

    fn signed(request: &RecordedRequest) -> FlattenedJws {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    fn directory_fetches(transport: &MockTransport) -> usize {
        transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::GET && r.url == "https://ca.example/directory")
            .count()
    }

    #[test]
    fn test_directory_lookup_is_pure() {
        let client = client(MockTransport::new());
        let directory = client.get_directory().unwrap();

        assert_eq!(
            client.url_from_directory("newAccount").unwrap(),
            directory.url_for("newAccount").unwrap()
        );
        assert_eq!(
            client.url_from_directory("newAccount").unwrap(),
            directory_json()["newAccount"]
        );
        assert_eq!(
            client.terms_from_directory().unwrap().as_deref(),
            Some("https://ca.example/terms.pdf")
        );
        assert!(matches!(
            client.url_from_directory("renewalInfo"),
            Err(AcmeError::MissingDirectoryEntry(_))
        ));
    }

    #[test]
    fn test_directory_follows_latest_fetch() {
        let transport = MockTransport::new().route(
            Method::GET,
            "https://ca.example/custom/dir",
            |hit, _| {
                HttpResponse::new(200)
                    .with_body(json!({"newAccount": format!("https://ca.example/acct-v{hit}")}).to_string())
            },
        );
        let client = ClientBuilder::new(BASE)
            .directory_path("custom/dir")
            .build_v2_with(transport)
            .unwrap();

        assert_eq!(client.url_from_directory("newAccount").unwrap(), "https://ca.example/acct-v0");
        assert_eq!(client.url_from_directory("newAccount").unwrap(), "https://ca.example/acct-v1");
    }

    #[test]
    fn test_cached_directory_is_fetched_once() {
        let client = ClientBuilder::new(BASE)
            .cache_directory(true)
            .build_v2_with(with_directory(MockTransport::new()))
            .unwrap();

        client.url_from_directory("newAccount").unwrap();
        client.url_from_directory("newOrder").unwrap();
        client.terms_from_directory().unwrap();
        assert_eq!(directory_fetches(client.core().transport()), 1);
    }

    #[test]
    fn test_directory_failure_is_protocol_error() {
        let client = ClientBuilder::new(BASE)
            .build_v2_with(MockTransport::new())
            .unwrap();
        let err = client.get_directory().unwrap_err();
        assert_eq!(err.response().unwrap().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_register_uses_jwk_and_agrees_to_terms() {
        let client = client(MockTransport::new().route(
            Method::POST,
            "https://ca.example/acme/new-acct",
            |_, _| {
                HttpResponse::new(201)
                    .with_header("Location", "https://ca.example/acme/acct/1")
                    .with_body(r#"{"status":"valid"}"#)
            },
        ));
        let mut account = Account::new(KeyPair::generate(KeyType::Rsa, Some(2048)).unwrap());

        let result = client.register(&mut account, "me@example.com").unwrap();
        assert_eq!(result.uri, "https://ca.example/acme/acct/1");
        assert_eq!(result.terms.as_deref(), Some("https://ca.example/terms.pdf"));
        assert_eq!(account.uri(), Some("https://ca.example/acme/acct/1"));

        let request = &client.core().transport().posts_to("https://ca.example/acme/new-acct")[0];
        assert_eq!(request.headers["content-type"], "application/jose+json");
        let jws = signed(request);
        assert!(jws.verify(account.key().unwrap()).unwrap());

        let protected = jws.protected_json().unwrap();
        assert_eq!(protected["url"], "https://ca.example/acme/new-acct");
        assert_eq!(protected["jwk"]["kty"], "RSA");
        assert!(protected.get("kid").is_none());
        assert_eq!(
            jws.payload_json().unwrap(),
            Some(json!({"contact": ["mailto:me@example.com"], "termsOfServiceAgreed": true}))
        );
    }

    #[test]
    fn test_register_keeps_uri_when_terms_lookup_fails() {
        // 目錄前兩次（newAccount、newNonce）正常，第三次（服務條款）失敗
        let client = client(
            MockTransport::new()
                .route(Method::GET, "https://ca.example/directory", |hit, _| {
                    if hit < 2 {
                        HttpResponse::new(200).with_body(directory_json().to_string())
                    } else {
                        HttpResponse::new(503)
                    }
                })
                .route(Method::POST, "https://ca.example/acme/new-acct", |_, _| {
                    HttpResponse::new(201)
                        .with_header("Location", "https://ca.example/acme/acct/1")
                        .with_body(r#"{"status":"valid"}"#)
                }),
        );
        let mut account = Account::new(KeyPair::generate(KeyType::EcP256, None).unwrap());

        let result = client.register(&mut account, "me@example.com").unwrap();
        assert_eq!(result.uri, "https://ca.example/acme/acct/1");
        assert_eq!(result.terms, None);
        assert_eq!(account.uri(), Some("https://ca.example/acme/acct/1"));
    }

    #[test]
    fn test_register_keeps_uri_when_body_is_not_json() {
        let client = client(MockTransport::new().route(
            Method::POST,
            "https://ca.example/acme/new-acct",
            |_, _| {
                HttpResponse::new(201)
                    .with_header("Location", "https://ca.example/acme/acct/2")
                    .with_body("<html>")
            },
        ));
        let mut account = Account::new(KeyPair::generate(KeyType::EcP256, None).unwrap());

        assert!(matches!(
            client.register(&mut account, "me@example.com"),
            Err(AcmeError::Protocol { .. })
        ));
        assert_eq!(account.uri(), Some("https://ca.example/acme/acct/2"));
    }

    #[test]
    fn test_empty_order_is_rejected_before_any_request() {
        let client = client(MockTransport::new());
        assert!(matches!(
            client.new_order::<&str>(&registered(), &[]),
            Err(AcmeError::Signing(SigningError::InvalidPayload(
                PayloadError::NoIdentifiers
            )))
        ));
        assert!(client.core().transport().requests().is_empty());
    }

    #[test]
    fn test_existing_account_is_reported() {
        let client = client(MockTransport::new().route(
            Method::POST,
            "https://ca.example/acme/new-acct",
            |hit, _| {
                HttpResponse::new(if hit == 0 { 200 } else { 409 })
                    .with_header("Location", "https://ca.example/acme/acct/5")
            },
        ));
        let key = KeyPair::generate(KeyType::EcP256, None).unwrap();
        let mut account = Account::new(key);

        for _ in 0..2 {
            let err = client.register(&mut account, "me@example.com").unwrap_err();
            assert_eq!(err.existing_account_uri(), Some("https://ca.example/acme/acct/5"));
        }
        assert!(!account.is_registered());
    }

    #[test]
    fn test_registered_account_signs_with_kid_and_fresh_nonces() {
        let client = client(MockTransport::new().route(
            Method::POST,
            "https://ca.example/acme/acct/1",
            |_, _| HttpResponse::new(200).with_body(r#"{"status":"valid"}"#),
        ));
        let account = registered();

        assert_eq!(client.get_registration(&account).unwrap()["status"], "valid");
        let mut params = Map::new();
        params.insert("contact".to_string(), json!(["mailto:new@example.com"]));
        assert!(client.update_registration(&account, params).unwrap());

        let posts = client.core().transport().posts_to("https://ca.example/acme/acct/1");
        let first = signed(&posts[0]);
        let second = signed(&posts[1]);
        let first_protected = first.protected_json().unwrap();
        let second_protected = second.protected_json().unwrap();

        assert_eq!(first_protected["kid"], "https://ca.example/acme/acct/1");
        assert!(first_protected.get("jwk").is_none());
        assert_eq!(first_protected["alg"], "ES256");
        assert_ne!(first_protected["nonce"], second_protected["nonce"]);
        assert_eq!(first.payload_json().unwrap(), Some(json!({})));
        assert_eq!(
            second.payload_json().unwrap(),
            Some(json!({"contact": ["mailto:new@example.com"]}))
        );
    }

    #[test]
    fn test_authorization_flow() {
        let client = client(
            MockTransport::new()
                .route(Method::POST, "https://ca.example/acme/new-authz", |_, _| {
                    HttpResponse::new(201)
                        .with_header("Location", "https://ca.example/acme/authz/9")
                        .with_body(r#"{"status":"pending","challenges":[{"type":"http-01","token":"tok"}]}"#)
                })
                .route(Method::POST, "https://ca.example/acme/chall/9", |_, _| {
                    HttpResponse::new(200).with_body(r#"{"status":"processing"}"#)
                })
                .route(Method::POST, "https://ca.example/acme/authz/9", |_, _| {
                    HttpResponse::new(200).with_body(r#"{"status":"valid"}"#)
                }),
        );
        let account = registered();

        let authz = client.new_authorization(&account, "example.com").unwrap();
        assert_eq!(authz.uri, "https://ca.example/acme/authz/9");

        let key_authorization = account.key().unwrap().key_authorization("tok").unwrap();
        assert!(client
            .validate_authorization(&account, "https://ca.example/acme/chall/9", "http-01", &key_authorization)
            .unwrap());
        assert_eq!(
            client
                .get_authorization(&account, "https://ca.example:443/acme/authz/9")
                .unwrap()["status"],
            "valid"
        );

        let transport = client.core().transport();
        let poll = signed(&transport.posts_to("https://ca.example/acme/authz/9")[0]);
        assert_eq!(poll.payload, "");
        assert_eq!(poll.protected_json().unwrap()["url"], "https://ca.example/acme/authz/9");

        let authz_request = signed(&transport.posts_to("https://ca.example/acme/new-authz")[0]);
        assert_eq!(
            authz_request.payload_json().unwrap(),
            Some(json!({"identifier": {"type": "dns", "value": "example.com"}}))
        );
    }

    #[test]
    fn test_issue_certificate_runs_order_flow() {
        let client = client(
            MockTransport::new()
                .route(Method::POST, "https://ca.example/acme/new-order", |_, _| {
                    HttpResponse::new(201)
                        .with_header("Location", "https://ca.example/acme/order/1")
                        .with_body(
                            json!({
                                "status": "ready",
                                "finalize": "https://ca.example/acme/order/1/finalize",
                                "authorizations": ["https://ca.example/acme/authz/1"]
                            })
                            .to_string(),
                        )
                })
                .route(Method::POST, "https://ca.example/acme/order/1/finalize", |_, _| {
                    HttpResponse::new(200).with_body(
                        json!({
                            "status": "valid",
                            "finalize": "https://ca.example/acme/order/1/finalize",
                            "certificate": "https://ca.example/acme/cert/123"
                        })
                        .to_string(),
                    )
                })
                .route(Method::POST, "https://ca.example/acme/cert/123", |_, _| {
                    HttpResponse::new(200)
                        .with_header("Link", r#"<https://ca/issuer>; rel="up""#)
                        .with_body("-----BEGIN CERTIFICATE-----\n")
                })
                .route(Method::GET, "https://ca/issuer", |_, _| {
                    HttpResponse::new(200).with_body("issuer")
                }),
        );
        let account = registered();
        let cert_key = KeyPair::generate(KeyType::EcP256, None).unwrap();
        let csr = CsrBuilder::new()
            .add_san("example.com")
            .add_san("www.example.com")
            .build_der(&cert_key)
            .unwrap();

        let result = client.issue_certificate(&account, &csr).unwrap();
        assert_eq!(result.certificate, b"-----BEGIN CERTIFICATE-----\n");
        assert_eq!(result.location, "https://ca.example/acme/cert/123");
        assert_eq!(result.intermediate.as_deref(), Some(&b"issuer"[..]));

        let transport = client.core().transport();
        let order = signed(&transport.posts_to("https://ca.example/acme/new-order")[0]);
        assert_eq!(
            order.payload_json().unwrap(),
            Some(json!({"identifiers": [
                {"type": "dns", "value": "example.com"},
                {"type": "dns", "value": "www.example.com"}
            ]}))
        );

        let download = &transport.posts_to("https://ca.example/acme/cert/123")[0];
        assert_eq!(download.headers["accept"], "application/pem-certificate-chain");
        assert_eq!(signed(download).payload, "");
    }

    #[test]
    fn test_processing_order_is_not_ready() {
        let client = client(
            MockTransport::new()
                .route(Method::POST, "https://ca.example/acme/new-order", |_, _| {
                    HttpResponse::new(201)
                        .with_header("Location", "https://ca.example/acme/order/2")
                        .with_body(r#"{"status":"ready","finalize":"https://ca.example/acme/order/2/fin"}"#)
                })
                .route(Method::POST, "https://ca.example/acme/order/2/fin", |_, _| {
                    HttpResponse::new(200).with_body(r#"{"status":"processing"}"#)
                })
                .route(Method::POST, "https://ca.example/acme/order/2", |_, _| {
                    HttpResponse::new(200)
                        .with_body(r#"{"status":"valid","certificate":"https://ca.example/acme/cert/2"}"#)
                }),
        );
        let account = registered();
        let csr = CsrBuilder::new()
            .add_san("example.com")
            .build_der(&KeyPair::generate(KeyType::EcP256, None).unwrap())
            .unwrap();

        match client.issue_certificate(&account, &csr).unwrap_err() {
            AcmeError::OrderNotReady { uri, status } => {
                assert_eq!(uri, "https://ca.example/acme/order/2");
                assert_eq!(status, "processing");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let order = client.get_order(&account, "https://ca.example/acme/order/2").unwrap();
        assert_eq!(order.certificate_url(), Some("https://ca.example/acme/cert/2"));
    }

    #[test]
    fn test_invalid_csr_is_rejected_before_any_request() {
        let client = client(MockTransport::new());
        assert!(matches!(
            client.issue_certificate(&registered(), b"garbage"),
            Err(AcmeError::InvalidCsr(_))
        ));
        assert!(client.core().transport().requests().is_empty());
    }

    #[test]
    fn test_revoke_requires_ok() {
        let client = client(MockTransport::new().route(
            Method::POST,
            "https://ca.example/acme/revoke-cert",
            |hit, _| HttpResponse::new(if hit == 0 { 200 } else { 403 }),
        ));
        let account = registered();

        assert!(client.revoke_certificate(&account, &[0x30, 0x03]).unwrap());
        assert!(matches!(
            client.revoke_certificate(&account, &[0x30, 0x03]),
            Err(AcmeError::Protocol { .. })
        ));

        let revoke = signed(&client.core().transport().posts_to("https://ca.example/acme/revoke-cert")[0]);
        assert_eq!(revoke.payload_json().unwrap(), Some(json!({"certificate": "MAM"})));
    }
}
