//! REST request signing for Kraken's private API.
//!
//! Stateless and unused by the streaming engine — private WebSocket channels
//! fetch their token through signed REST calls, and this is the signature
//! scheme they use: `HMAC-SHA512(path ‖ SHA256(nonce ‖ postdata))` keyed with
//! the base64-decoded API secret, output base64-encoded.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use kws_core::WsError;

type HmacSha512 = Hmac<Sha512>;

/// Nonce counter: an always-increasing unsigned integer (milliseconds since
/// the Unix epoch).
pub fn nonce() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock set before Unix epoch")
        .as_millis() as u64
}

/// URL-encode request parameters into `key=value&...` form data.
pub fn urlencode_form(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign one private request.
///
/// # Arguments
///
/// * `url_path` — API URL path sans host (e.g. `/0/private/AddOrder`).
/// * `post_data` — URL-encoded request body; must already contain the
///   `nonce` field matching `nonce`.
/// * `nonce` — the nonce used in `post_data`.
/// * `secret_b64` — the base64-encoded API secret.
pub fn sign(
    url_path: &str,
    post_data: &str,
    nonce: u64,
    secret_b64: &str,
) -> Result<String, WsError> {
    let secret = BASE64
        .decode(secret_b64)
        .map_err(|e| WsError::Sign(format!("invalid base64 secret: {e}")))?;

    let mut sha = Sha256::new();
    sha.update(nonce.to_string().as_bytes());
    sha.update(post_data.as_bytes());
    let digest = sha.finalize();

    let mut mac = HmacSha512::new_from_slice(&secret)
        .map_err(|e| WsError::Sign(e.to_string()))?;
    mac.update(url_path.as_bytes());
    mac.update(&digest);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_the_documented_kraken_vector() {
        // Worked example from Kraken's REST API documentation.
        let secret = "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";
        let post_data = "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25";
        let signature = sign("/0/private/AddOrder", post_data, 1616492376594, secret).unwrap();
        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb7nmbvVdC9oLSwfQ=="
        );
    }

    #[test]
    fn rejects_a_secret_that_is_not_base64() {
        let err = sign("/0/private/Balance", "nonce=1", 1, "not base64!!").unwrap_err();
        assert!(matches!(err, WsError::Sign(_)));
    }

    #[test]
    fn form_encoding_escapes_reserved_characters() {
        let encoded = urlencode_form(&[("pair", "XBT/USD"), ("type", "buy")]);
        assert_eq!(encoded, "pair=XBT%2FUSD&type=buy");
    }

    #[test]
    fn nonces_do_not_decrease() {
        let a = nonce();
        let b = nonce();
        assert!(b >= a);
    }
}
