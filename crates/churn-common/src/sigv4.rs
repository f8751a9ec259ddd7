//! AWS Signature Version 4 request signing
//!
//! Both the control-plane client (model, serving config and endpoint
//! management) and the runtime invoker talk to the provider over plain
//! HTTPS. Each request is signed with the `AWS4-HMAC-SHA256` scheme:
//! canonical request → string to sign → derived key → signature.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Errors raised while preparing signed requests
#[derive(Debug, Error)]
pub enum SigningError {
    /// The MAC could not be keyed
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Access key credentials, static or temporary
///
/// See [`crate::credentials`] for how they are resolved.
#[derive(Clone)]
pub struct Credentials {
    /// Access key id (`AKIA...`)
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Create credentials from explicit values
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Scope of a signature: who signs, for which region and service, and when
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    /// Signing credentials
    pub credentials: &'a Credentials,
    /// Region, e.g. `us-east-1`
    pub region: &'a str,
    /// Signing service name, e.g. `sagemaker`
    pub service: &'a str,
    /// Request timestamp
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request that take part in the signature
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    /// HTTP method
    pub method: &'a str,
    /// Host header value
    pub host: &'a str,
    /// Unencoded absolute path, e.g. `/endpoints/my-endpoint/invocations`
    pub path: &'a str,
    /// Extra headers to sign (content-type, x-amz-target, ...)
    pub headers: &'a [(&'a str, &'a str)],
    /// Request body
    pub body: &'a [u8],
}

/// Sign a request and return the headers that must be added to it.
///
/// The returned list always contains `x-amz-date` and `authorization`,
/// plus `x-amz-security-token` for temporary credentials.
pub fn sign(
    request: &SignableRequest<'_>,
    params: &SigningParams<'_>,
) -> Result<Vec<(String, String)>, SigningError> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), request.host.to_string()));
    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &params.credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        canonical_uri(request.path),
        canonical_headers,
        signed_headers,
        sha256_hex(request.body)
    );

    let scope = format!("{}/{}/{}/aws4_request", date, params.region, params.service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &params.credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    let mut out = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out.push((
        "authorization".to_string(),
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
        ),
    ));
    Ok(out)
}

/// Derive the per-day, per-region, per-service signing key
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// URI-encode each path segment, leaving the separators intact
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", EXAMPLE_SECRET, None)
    }

    #[test]
    fn signing_key_matches_published_derivation() {
        let key = signing_key(EXAMPLE_SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature_matches_reference_suite() {
        let creds = example_credentials();
        let time = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let params = SigningParams {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
            time,
        };
        let request = SignableRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            headers: &[],
            body: b"",
        };

        let headers = sign(&request, &params).unwrap();
        let auth = headers
            .iter()
            .find(|(k, _)| k == "authorization")
            .map(|(_, v)| v.as_str())
            .unwrap();

        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(headers
            .iter()
            .any(|(k, v)| k == "x-amz-date" && v == "20150830T123600Z"));
    }

    #[test]
    fn session_token_is_signed_and_returned() {
        let creds = Credentials::new("AKID", "secret", Some("token-123".to_string()));
        let params = SigningParams {
            credentials: &creds,
            region: "eu-west-1",
            service: "sagemaker",
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let request = SignableRequest {
            method: "POST",
            host: "api.sagemaker.eu-west-1.amazonaws.com",
            path: "/",
            headers: &[
                ("Content-Type", "application/x-amz-json-1.1"),
                ("X-Amz-Target", "SageMaker.DescribeEndpoint"),
            ],
            body: br#"{"EndpointName":"e"}"#,
        };

        let headers = sign(&request, &params).unwrap();
        assert!(headers
            .iter()
            .any(|(k, v)| k == "x-amz-security-token" && v == "token-123"));

        let auth = &headers.iter().find(|(k, _)| k == "authorization").unwrap().1;
        assert!(auth.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target"
        ));
        assert!(auth.contains("/20240102/eu-west-1/sagemaker/aws4_request"));
    }

    #[test]
    fn empty_and_long_keys_are_accepted() {
        assert_eq!(hmac_sha256(b"", b"data").unwrap().len(), 32);
        assert_eq!(hmac_sha256(&[7u8; 200], b"data").unwrap().len(), 32);
        assert!(signing_key("", "20240102", "us-east-1", "sagemaker").is_ok());
    }

    #[test]
    fn canonical_uri_encodes_reserved_characters_per_segment() {
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/"), "/");
        assert_eq!(
            canonical_uri("/endpoints/churn-predictor-endpoint/invocations"),
            "/endpoints/churn-predictor-endpoint/invocations"
        );
        assert_eq!(canonical_uri("/a b/c:d"), "/a%20b/c%3Ad");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::new("AKID", "super-secret", Some("tok".to_string()));
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("tok\""));
    }
}
