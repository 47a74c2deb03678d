use openssl::{
    bn::BigNum,
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    sign::{Signer, Verifier},
};
use thiserror::Error;

use crate::{
    encoding::Base64,
    key_pair::{KeyPair, KeyType},
};

/// 簽名或驗證過程中可能遇到的錯誤。
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Signing error: {0}")]
    SigningError(String),
    #[error("Malformed signature: expected {expected} bytes, got {actual}")]
    MalformedSignature { expected: usize, actual: usize },
}

impl From<openssl::error::ErrorStack> for SignatureError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        SignatureError::SigningError(e.to_string())
    }
}

type Result<T> = std::result::Result<T, SignatureError>;

/// 簽名演算法的介面，以 JWS 的 `alg` 名稱區分。
trait SignatureAlgorithmT {
    fn sign(&self, data: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>>;

    fn verify(&self, data: &[u8], signature: &[u8], key_pair: &KeyPair) -> Result<bool>;
}

/// RS256：RSASSA-PKCS1-v1_5 搭配 SHA-256。
struct Rs256;

impl SignatureAlgorithmT for Rs256 {
    fn sign(&self, data: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>> {
        let mut signer = Signer::new(MessageDigest::sha256(), key_pair.private_key())?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    fn verify(&self, data: &[u8], signature: &[u8], key_pair: &KeyPair) -> Result<bool> {
        let mut verifier = Verifier::new(MessageDigest::sha256(), &key_pair.pub_key)?;
        verifier.update(data)?;
        Ok(verifier.verify(signature)?)
    }
}

/// ES256：P-256 ECDSA 搭配 SHA-256，簽名為固定長度的 `r || s`。
struct Es256;

impl Es256 {
    const SCALAR_LEN: usize = 32;
}

impl SignatureAlgorithmT for Es256 {
    fn sign(&self, data: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>> {
        let mut signer = Signer::new(MessageDigest::sha256(), key_pair.private_key())?;
        signer.update(data)?;
        // OpenSSL 輸出 DER，JWS 需要原始的 r || s
        let der = signer.sign_to_vec()?;
        let sig = EcdsaSig::from_der(&der)?;

        let mut raw = sig.r().to_vec_padded(Self::SCALAR_LEN as i32)?;
        raw.extend(sig.s().to_vec_padded(Self::SCALAR_LEN as i32)?);
        Ok(raw)
    }

    fn verify(&self, data: &[u8], signature: &[u8], key_pair: &KeyPair) -> Result<bool> {
        if signature.len() != Self::SCALAR_LEN * 2 {
            return Err(SignatureError::MalformedSignature {
                expected: Self::SCALAR_LEN * 2,
                actual: signature.len(),
            });
        }
        let (r, s) = signature.split_at(Self::SCALAR_LEN);
        let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;

        let mut verifier = Verifier::new(MessageDigest::sha256(), &key_pair.pub_key)?;
        verifier.update(data)?;
        Ok(verifier.verify(&sig.to_der()?)?)
    }
}

fn algorithm_for(key_type: KeyType) -> Box<dyn SignatureAlgorithmT> {
    match key_type {
        KeyType::Rsa => Box::new(Rs256),
        KeyType::EcP256 => Box::new(Es256),
    }
}

/// 對 `protected.payload` 簽名輸入產生簽名。
///
/// 兩個參數都必須是已完成 Base64 URL 編碼的字串，也就是實際送出的內容；
/// 簽名只覆蓋這兩段文字，之後任何修改都會使簽名失效。
pub fn create_signature(protected_b64: &str, payload_b64: &str, key_pair: &KeyPair) -> Result<Base64> {
    let signing_input = format!("{protected_b64}.{payload_b64}");
    let signature = algorithm_for(key_pair.key_type).sign(signing_input.as_bytes(), key_pair)?;

    Ok(Base64::new(signature))
}

/// 以金鑰對的公鑰驗證 `protected.payload` 的簽名。
pub fn verify_signature(
    protected_b64: &str,
    payload_b64: &str,
    signature: &[u8],
    key_pair: &KeyPair,
) -> Result<bool> {
    let signing_input = format!("{protected_b64}.{payload_b64}");
    algorithm_for(key_pair.key_type).verify(signing_input.as_bytes(), signature, key_pair)
}
