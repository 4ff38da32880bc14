//! Request signing for the two credential modes.
//!
//! - API key mode appends `key=<api key>` to the query string.
//! - Enterprise mode appends `client=<client id>`, then signs the resulting
//!   path and query with HMAC-SHA1 keyed by the decoded client secret and
//!   appends `&signature=<base64url digest>`.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hmac::{Hmac, Mac};
use log::debug;
use sha1::Sha1;

use crate::context::{Context, Credentials};
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// URL-safe alphabet; secrets are accepted with or without trailing `=`.
const SECRET_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes a base64url client secret into HMAC key bytes.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    SECRET_ENGINE
        .decode(secret.trim())
        .map_err(|e| Error::Configuration(format!("client secret is not valid base64url: {}", e)))
}

/// Returns the base64url-encoded HMAC-SHA1 signature of `message`.
pub fn hmac_sign(secret: &[u8], message: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| Error::Configuration(format!("unusable client secret: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

/// Produces the signed path and query string for a request.
///
/// `params` keep their order. A param named like the injected credential
/// parameter (`key` or `client`) is overwritten in place.
pub fn sign(ctx: &Context, path: &str, params: &[(&str, &str)]) -> Result<String> {
    match ctx.credentials() {
        Credentials::ApiKey(key) => Ok(format!(
            "{}?{}",
            path,
            encode_query(params, ("key", key))
        )),
        Credentials::Enterprise { client_id, secret } => {
            let unsigned = format!("{}?{}", path, encode_query(params, ("client", client_id)));
            let signature = hmac_sign(secret, &unsigned)?;
            debug!("Signed {} for client {}", path, client_id);
            Ok(format!("{}&signature={}", unsigned, signature))
        }
    }
}

fn encode_query(params: &[(&str, &str)], credential: (&str, &str)) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut injected = false;

    for (name, value) in params {
        if *name == credential.0 {
            if !injected {
                serializer.append_pair(credential.0, credential.1);
                injected = true;
            }
        } else {
            serializer.append_pair(name, value);
        }
    }

    if !injected {
        serializer.append_pair(credential.0, credential.1);
    }

    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;

    const API_KEY: &str = "AIzaasdf";

    fn enterprise_context(client_id: &str, secret: &str) -> Context {
        Context::with_enterprise(client_id, secret).unwrap()
    }

    #[test]
    fn test_hmac_sign_reference_vector() {
        // HMAC_SHA1("key", "The quick brown fox jumps over the lazy dog")
        //   = de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9
        let secret = decode_secret("a2V5").unwrap();
        assert_eq!(secret, b"key");
        assert_eq!(
            hmac_sign(&secret, "The quick brown fox jumps over the lazy dog").unwrap(),
            "3nybhbi3iqa8ino29wqQcBydtNk="
        );
    }

    #[test]
    fn test_sign_with_api_key() {
        let ctx = Context::with_key(API_KEY).unwrap();
        let signed = sign(&ctx, "/maps/api/geocode/json", &[("address", "Sydney")]).unwrap();
        assert_eq!(signed, "/maps/api/geocode/json?address=Sydney&key=AIzaasdf");
    }

    #[test]
    fn test_sign_with_api_key_and_no_params() {
        let ctx = Context::with_key(API_KEY).unwrap();
        let signed = sign(&ctx, "/maps/api/timezone/json", &[]).unwrap();
        assert_eq!(signed, "/maps/api/timezone/json?key=AIzaasdf");
    }

    #[test]
    fn test_sign_encodes_params() {
        let ctx = Context::with_key(API_KEY).unwrap();
        let signed = sign(
            &ctx,
            "/maps/api/directions/json",
            &[("origin", "Sydney"), ("destination", "Perth, WA")],
        )
        .unwrap();
        assert_eq!(
            signed,
            "/maps/api/directions/json?origin=Sydney&destination=Perth%2C+WA&key=AIzaasdf"
        );
    }

    #[test]
    fn test_sign_overwrites_colliding_key_param() {
        let ctx = Context::with_key(API_KEY).unwrap();
        let signed = sign(&ctx, "/p", &[("key", "AIzaother"), ("a", "b")]).unwrap();
        assert_eq!(signed, "/p?key=AIzaasdf&a=b");
    }

    #[test]
    fn test_sign_enterprise_matches_reference() {
        let ctx = enterprise_context("foo", "a2V5");
        let signed = sign(&ctx, "/maps/api/geocode/json", &[("address", "Sesame St.")]).unwrap();
        assert_eq!(
            signed,
            "/maps/api/geocode/json?address=Sesame+St.&client=foo&signature=fxbWUIcNPZSekVOhp2ul9LW5TpY="
        );
    }

    #[test]
    fn test_sign_enterprise_url_safe_secret() {
        let ctx = enterprise_context("clientID", "vNIXE0xscrmjlyV-12Nj_BvUPaw=");
        let signed = sign(&ctx, "/maps/api/geocode/json", &[("address", "New York")]).unwrap();
        assert_eq!(
            signed,
            "/maps/api/geocode/json?address=New+York&client=clientID&signature=chaRF2hTJKOScPr-RQCEhZbSzIE="
        );
    }

    #[test]
    fn test_sign_enterprise_signs_encoded_query() {
        let ctx = enterprise_context("foo", "a2V5");
        let signed = sign(
            &ctx,
            "/maps/api/directions/json",
            &[("origin", "Sydney"), ("destination", "Perth, WA")],
        )
        .unwrap();
        assert_eq!(
            signed,
            "/maps/api/directions/json?origin=Sydney&destination=Perth%2C+WA&client=foo&signature=jCIwnVcJxf57IeQde382R3C3i6o="
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let params = [("latlng", "40.714224,-73.961452"), ("language", "en")];
        for ctx in [
            Context::with_key(API_KEY).unwrap(),
            enterprise_context("foo", "a2V5"),
        ] {
            let first = sign(&ctx, "/maps/api/geocode/json", &params).unwrap();
            let second = sign(&ctx, "/maps/api/geocode/json", &params).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_sign_does_not_alter_context() {
        let ctx = Context::new(ContextOptions {
            key: Some(API_KEY.to_string()),
            ..Default::default()
        })
        .unwrap();
        let before = format!("{:?}", ctx);
        sign(&ctx, "/p", &[("a", "b")]).unwrap();
        assert_eq!(format!("{:?}", ctx), before);
    }

    #[test]
    fn test_decode_secret_without_padding() {
        assert_eq!(decode_secret("a2V5").unwrap(), b"key");
        assert_eq!(decode_secret("a2V5cw").unwrap(), b"keys");
        assert_eq!(decode_secret("a2V5cw==").unwrap(), b"keys");
    }

    #[test]
    fn test_decode_secret_malformed() {
        let result = decode_secret("not base64!");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
