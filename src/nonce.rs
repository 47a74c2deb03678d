use crate::{error::Result, transport::HttpResponse};

/// 取得 anti-replay nonce 的行為。
///
/// 每個簽名請求都必須呼叫一次，nonce 不會被重用或預先批次取得。
/// 回應中沒有 `Replay-Nonce` 標頭時回傳 `Ok(None)`，由伺服器拒絕後續請求。
pub trait NonceSource {
    fn fresh_nonce(&self) -> Result<Option<String>>;
}

/// 從回應讀取 `Replay-Nonce`。
pub(crate) fn nonce_from(response: &HttpResponse) -> Option<String> {
    let nonce = response.replay_nonce();
    match &nonce {
        Some(_) => log::trace!("Received new nonce"),
        None => log::warn!(
            "Response ({}) carried no Replay-Nonce header",
            response.status
        ),
    }
    nonce
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;

    /// 依序回傳 `nonce-0`、`nonce-1`…的測試用 nonce 來源。
    #[derive(Debug, Default)]
    pub(crate) struct SequenceNonce {
        next: Cell<usize>,
    }

    impl NonceSource for SequenceNonce {
        fn fresh_nonce(&self) -> Result<Option<String>> {
            let n = self.next.get();
            self.next.set(n + 1);
            Ok(Some(format!("nonce-{n}")))
        }
    }

    #[test]
    fn test_nonce_from_header() {
        let response = HttpResponse::new(200).with_header("Replay-Nonce", "abc");
        assert_eq!(nonce_from(&response).as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_nonce_is_none() {
        assert_eq!(nonce_from(&HttpResponse::new(200)), None);
    }

    #[test]
    fn test_sequence_nonce_never_repeats() {
        let nonce = SequenceNonce::default();
        let first = nonce.fresh_nonce().unwrap();
        let second = nonce.fresh_nonce().unwrap();
        assert_ne!(first, second);
    }
}
