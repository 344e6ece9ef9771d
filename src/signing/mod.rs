//! HMAC-SHA512 request signing for backend calls.

mod canonical;

pub use canonical::{canonical_json, canonical_uri, encode_component};

use crate::error::{PingletError, Result};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").field("secret", &"***").finish()
    }
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// `METHOD&enc(uri)[&enc(body)]`
    pub fn canonical_string(method: &str, uri: &str, body: Option<&Value>) -> String {
        let mut canonical = format!(
            "{}&{}",
            method.to_uppercase(),
            encode_component(&canonical_uri(uri))
        );
        if let Some(body) = body {
            canonical.push('&');
            canonical.push_str(&encode_component(&canonical_json(body)));
        }
        canonical
    }

    /// Hex-encoded HMAC-SHA512 of the canonical request.
    ///
    /// Fails instead of returning an empty digest so callers never send an
    /// unsigned request.
    pub fn sign(&self, method: &str, uri: &str, body: Option<&Value>) -> Result<String> {
        if self.secret.is_empty() {
            return Err(PingletError::Signature("no signing secret configured".to_string()));
        }

        let canonical = Self::canonical_string(method, uri, body);
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PingletError::Signature(e.to_string()))?;
        mac.update(canonical.as_bytes());

        tracing::trace!("Signed canonical request: {}", canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signer() -> RequestSigner {
        RequestSigner::new("shared-secret")
    }

    #[test]
    fn test_body_key_order_independent() {
        let a = signer().sign("POST", "/x", Some(&json!({"b": 1, "a": 2}))).unwrap();
        let b = signer().sign("POST", "/x", Some(&json!({"a": 2, "b": 1}))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_order_independent() {
        let a = signer().sign("GET", "/x?b=2&a=1", None).unwrap();
        let b = signer().sign("GET", "/x?a=1&b=2", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_method_case_normalized() {
        let a = signer().sign("get", "/x", None).unwrap();
        let b = signer().sign("GET", "/x", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_changes_signature() {
        let a = signer().sign("POST", "/x", Some(&json!({"a": 1}))).unwrap();
        let b = signer().sign("POST", "/x", Some(&json!({"a": 2}))).unwrap();
        let c = RequestSigner::new("other").sign("POST", "/x", Some(&json!({"a": 1}))).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        // 64-byte digest, hex encoded
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = signer().sign("POST", "/x", Some(&json!({"l": [1, 2]}))).unwrap();
        let b = signer().sign("POST", "/x", Some(&json!({"l": [2, 1]}))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_string_shape() {
        let s = RequestSigner::canonical_string("post", "/sub?b=1&a=2", Some(&json!({"k": "v"})));
        assert_eq!(s, "POST&%2Fsub%3Fa%3D2%26b%3D1&%7B%22k%22%3A%22v%22%7D");
    }

    #[test]
    fn test_missing_secret_aborts() {
        let err = RequestSigner::new("").sign("GET", "/x", None).unwrap_err();
        assert!(matches!(err, PingletError::Signature(_)));
    }
}
