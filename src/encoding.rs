//! JWS 所需的 Base64 URL 安全編碼（不含填充）封裝。

use base64::prelude::*;
use thiserror::Error;

/// Base64 URL 解碼失敗時回傳的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// 輸入含有 URL 安全字母表以外的字元，或長度不合法。
    #[error("Invalid base64url input: {0}")]
    Invalid(String),
}

/// 持有原始位元組，並以 Base64 URL 安全格式輸出。
///
/// # 示例
///
/// ```
/// # use acme_twin::encoding::Base64;
/// let b64 = Base64::new("Hello, World!");
/// assert_eq!(b64.base64_url(), "SGVsbG8sIFdvcmxkIQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64 {
    raw: Vec<u8>,
}

impl Base64 {
    /// 以任何可視為位元組切片的資料建立實例。
    pub fn new<T: AsRef<[u8]>>(input: T) -> Self {
        Self {
            raw: input.as_ref().to_vec(),
        }
    }

    /// 從 URL 安全格式的字串解碼建立實例，填充符號可有可無。
    ///
    /// # 錯誤
    ///
    /// 字串不是合法的 base64url 時回傳 [`DecodeError::Invalid`]。
    pub fn from_url(url_encoded: &str) -> Result<Self, DecodeError> {
        let trimmed = url_encoded.trim_end_matches('=');
        let raw = BASE64_URL_SAFE_NO_PAD
            .decode(trimmed)
            .map_err(|e| DecodeError::Invalid(e.to_string()))?;
        Ok(Self { raw })
    }

    /// 輸出不含填充的 URL 安全 Base64 字串。
    pub fn base64_url(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(&self.raw)
    }

    /// 原始位元組。
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_safe_encoding() {
        let base64 = Base64::new([0xfb, 0xff, 0xfe]);
        let url_safe = base64.base64_url();
        assert_eq!(url_safe, "-__-");
        assert!(!url_safe.contains('='));
    }

    #[test]
    fn test_different_lengths() {
        assert_eq!(Base64::new("a").base64_url(), "YQ");
        assert_eq!(Base64::new("ab").base64_url(), "YWI");
        assert_eq!(Base64::new("abc").base64_url(), "YWJj");
        assert_eq!(Base64::new("").base64_url(), "");
    }

    #[test]
    fn test_from_url_accepts_padding() {
        let padded = Base64::from_url("SGVsbG8sIFdvcmxkIQ==").unwrap();
        let bare = Base64::from_url("SGVsbG8sIFdvcmxkIQ").unwrap();
        assert_eq!(padded, bare);
        assert_eq!(bare.as_bytes(), b"Hello, World!");
    }

    #[test]
    fn test_invalid_char() {
        assert!(matches!(
            Base64::from_url("SGVsbG8$Ww"),
            Err(DecodeError::Invalid(_))
        ));
    }
}
