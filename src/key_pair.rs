use openssl::{
    ec::{EcGroup, EcKey},
    error::ErrorStack,
    nid::Nid,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
    sha::sha256,
};
use thiserror::Error;

use crate::{
    encoding::Base64,
    jwk::{Jwk, JwkError},
};

/// 金鑰相關操作的錯誤列舉，涵蓋 OpenSSL 與 JWK 轉換錯誤。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("JWK error: {0}")]
    JwkError(#[from] JwkError),
}

type Result<T> = std::result::Result<T, KeyError>;

/// 帳戶金鑰支援的演算法種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA 金鑰，以 RS256 簽名。
    Rsa,
    /// NIST P-256 橢圓曲線金鑰，以 ES256 簽名。
    EcP256,
}

impl KeyType {
    /// 此金鑰類型在 JWS `alg` 欄位中的名稱。
    pub fn jws_algorithm(&self) -> &'static str {
        match self {
            Self::Rsa => "RS256",
            Self::EcP256 => "ES256",
        }
    }
}

/// 表示一組帳戶用的非對稱金鑰對。
///
/// 私鑰只用於簽名；任何對外輸出（JWK、thumbprint）都只取自公鑰。
/// 金鑰的產生與保存屬於呼叫端的責任，本結構僅提供載入與最小的產生功能。
pub struct KeyPair {
    /// 金鑰類型。
    pub key_type: KeyType,
    pri_key: PKey<Private>,
    /// 由私鑰派生的公鑰。
    pub pub_key: PKey<Public>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// 產生新的金鑰對。`bits` 僅對 RSA 有效，未提供時預設 2048 位元。
    pub fn generate(key_type: KeyType, bits: Option<u32>) -> Result<Self> {
        let pri_key = match key_type {
            KeyType::Rsa => PKey::from_rsa(Rsa::generate(bits.unwrap_or(2048))?)?,
            KeyType::EcP256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
                PKey::from_ec_key(EcKey::generate(&group)?)?
            }
        };
        Self::from_private_key(pri_key)
    }

    /// 根據 PEM 格式的私鑰資料建立金鑰對，金鑰類型由內容判斷。
    pub fn from_pem(pri_key_pem: &[u8]) -> Result<Self> {
        Self::from_private_key(PKey::private_key_from_pem(pri_key_pem)?)
    }

    /// 以 PKCS#8 PEM 格式輸出私鑰，供呼叫端自行保存。
    pub fn private_key_to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.pri_key.private_key_to_pem_pkcs8()?)
    }

    fn from_private_key(pri_key: PKey<Private>) -> Result<Self> {
        let key_type = match pri_key.id() {
            Id::RSA => KeyType::Rsa,
            Id::EC => {
                let ec = pri_key.ec_key()?;
                if ec.group().curve_name() != Some(Nid::X9_62_PRIME256V1) {
                    return Err(KeyError::UnsupportedAlgorithm);
                }
                KeyType::EcP256
            }
            _ => return Err(KeyError::UnsupportedAlgorithm),
        };
        let pub_key = Self::derive_public_key(&pri_key)?;

        Ok(Self {
            key_type,
            pri_key,
            pub_key,
        })
    }

    fn derive_public_key(pri_key: &PKey<Private>) -> Result<PKey<Public>> {
        match pri_key.id() {
            Id::RSA => {
                let rsa = pri_key.rsa()?;
                let pub_rsa =
                    Rsa::from_public_components(rsa.n().to_owned()?, rsa.e().to_owned()?)?;
                Ok(PKey::from_rsa(pub_rsa)?)
            }
            Id::EC => {
                let ec = pri_key.ec_key()?;
                let pub_ec = EcKey::from_public_key(ec.group(), ec.public_key())?;
                Ok(PKey::from_ec_key(pub_ec)?)
            }
            _ => Err(KeyError::UnsupportedAlgorithm),
        }
    }

    pub(crate) fn private_key(&self) -> &PKey<Private> {
        &self.pri_key
    }

    /// 計算 RFC 7638 定義的 JWK thumbprint，以 URL 安全 Base64 字串回傳。
    pub fn thumbprint(&self) -> Result<String> {
        let jwk = Jwk::new(self)?;
        let hash = sha256(jwk.to_acme_json()?.as_bytes());
        Ok(Base64::new(hash).base64_url())
    }

    /// 組出挑戰所需的 key authorization：`token.thumbprint`。
    pub fn key_authorization(&self, token: &str) -> Result<String> {
        Ok(format!("{}.{}", token, self.thumbprint()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_round_trip_keeps_thumbprint() -> Result<()> {
        let key = KeyPair::generate(KeyType::Rsa, Some(2048))?;
        let restored = KeyPair::from_pem(&key.private_key_to_pem()?)?;

        assert_eq!(restored.key_type, KeyType::Rsa);
        assert_eq!(key.thumbprint()?, restored.thumbprint()?);
        Ok(())
    }

    #[test]
    fn test_ec_key_detected() -> Result<()> {
        let key = KeyPair::generate(KeyType::EcP256, None)?;
        let restored = KeyPair::from_pem(&key.private_key_to_pem()?)?;
        assert_eq!(restored.key_type, KeyType::EcP256);
        assert_eq!(restored.key_type.jws_algorithm(), "ES256");
        Ok(())
    }

    #[test]
    fn test_unsupported_curve_rejected() -> Result<()> {
        let group = EcGroup::from_curve_name(Nid::SECP384R1)?;
        let pkey = PKey::from_ec_key(EcKey::generate(&group)?)?;
        let pem = pkey.private_key_to_pem_pkcs8()?;

        assert!(matches!(
            KeyPair::from_pem(&pem),
            Err(KeyError::UnsupportedAlgorithm)
        ));
        Ok(())
    }

    #[test]
    fn test_key_authorization_format() -> Result<()> {
        let key = KeyPair::generate(KeyType::EcP256, None)?;
        let key_auth = key.key_authorization("tok3n")?;
        assert_eq!(key_auth, format!("tok3n.{}", key.thumbprint()?));
        Ok(())
    }

    #[test]
    fn test_debug_hides_private_key() -> Result<()> {
        let key = KeyPair::generate(KeyType::EcP256, None)?;
        let rendered = format!("{key:?}");
        assert!(rendered.contains("EcP256"));
        assert!(!rendered.contains("PRIVATE"));
        Ok(())
    }
}
