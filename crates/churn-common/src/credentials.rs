//! Credential resolution for signed provider calls
//!
//! Sources are tried in the order the provider's own tooling uses:
//! environment variables, container credentials (ECS tasks, CodeBuild
//! builds), the shared credentials file, then the instance metadata
//! service. The first source that yields keys wins.
//!
//! Credentials are resolved once per process. Container and instance
//! credentials are issued with hours of validity, which covers a single
//! reconcile pass including the bounded deletion wait.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::sigv4::Credentials;

/// Link-local host that serves container credentials for relative URIs
pub const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Link-local host of the instance metadata service
pub const INSTANCE_METADATA_HOST: &str = "http://169.254.169.254";

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);
const METADATA_TOKEN_PATH: &str = "/latest/api/token";
const METADATA_ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const METADATA_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const METADATA_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const METADATA_TOKEN_TTL_SECS: &str = "21600";
const DEFAULT_PROFILE: &str = "default";

/// Failures resolving credentials
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Every source was tried and none had credentials
    #[error("no credentials found (tried {0})")]
    NotFound(String),

    /// A configured source failed to produce credentials
    #[error("{provider} credentials unavailable: {message}")]
    Provider {
        /// Source name, e.g. `container`
        provider: &'static str,
        /// What went wrong
        message: String,
    },
}

impl CredentialsError {
    fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }
}

/// Endpoint serving task or build credentials
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerSource {
    /// Full credentials URL
    pub url: String,
    /// Value for the `Authorization` header, when the endpoint needs one
    pub authorization: Option<String>,
}

/// A profile in the shared credentials file
#[derive(Clone, Debug, PartialEq)]
pub struct SharedFileSource {
    /// Path of the credentials file
    pub path: PathBuf,
    /// Profile (section) name
    pub profile: String,
}

/// The configured credential sources, in resolution order
#[derive(Debug)]
pub struct CredentialsChain {
    http: reqwest::Client,
    environment: Option<Credentials>,
    container: Option<ContainerSource>,
    shared_file: Option<SharedFileSource>,
    instance_metadata: Option<String>,
}

impl CredentialsChain {
    /// Configure the chain from process environment variables
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(crate::sigv4::non_empty_env)
    }

    /// Configure the chain from any variable lookup.
    ///
    /// `lookup` returns `None` for unset or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CredentialsError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| CredentialsError::provider("http", e.to_string()))?;

        Ok(Self {
            http,
            environment: environment_credentials(&lookup)?,
            container: container_source(&lookup)?,
            shared_file: shared_file_source(&lookup),
            instance_metadata: instance_metadata_endpoint(&lookup),
        })
    }

    /// Try each source in order and return the first credentials found
    pub async fn resolve(&self) -> Result<Credentials, CredentialsError> {
        if let Some(credentials) = &self.environment {
            info!(provider = "environment", "Resolved credentials");
            return Ok(credentials.clone());
        }

        if let Some(container) = &self.container {
            let credentials = fetch_container(&self.http, container).await?;
            info!(provider = "container", "Resolved credentials");
            return Ok(credentials);
        }

        if let Some(file) = &self.shared_file {
            if let Some(credentials) = load_shared_file(file) {
                info!(provider = "shared file", profile = %file.profile, "Resolved credentials");
                return Ok(credentials);
            }
        }

        if let Some(base) = &self.instance_metadata {
            if let Some(credentials) = fetch_instance_metadata(&self.http, base).await? {
                info!(provider = "instance metadata", "Resolved credentials");
                return Ok(credentials);
            }
        }

        Err(CredentialsError::NotFound(
            "environment, container, shared file, instance metadata".to_string(),
        ))
    }
}

impl Credentials {
    /// Resolve credentials through the standard provider chain
    pub async fn resolve() -> Result<Self, CredentialsError> {
        CredentialsChain::from_env()?.resolve().await
    }
}

fn environment_credentials(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<Credentials>, CredentialsError> {
    match (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY")) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Credentials::new(
            access_key_id,
            secret_access_key,
            lookup("AWS_SESSION_TOKEN"),
        ))),
        (Some(_), None) => Err(CredentialsError::provider(
            "environment",
            "AWS_ACCESS_KEY_ID is set but AWS_SECRET_ACCESS_KEY is not",
        )),
        (None, Some(_)) => Err(CredentialsError::provider(
            "environment",
            "AWS_SECRET_ACCESS_KEY is set but AWS_ACCESS_KEY_ID is not",
        )),
        (None, None) => Ok(None),
    }
}

fn container_source(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<ContainerSource>, CredentialsError> {
    let url = if let Some(relative) = lookup("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
        format!("{}{}", CONTAINER_CREDENTIALS_HOST, relative)
    } else if let Some(full) = lookup("AWS_CONTAINER_CREDENTIALS_FULL_URI") {
        full
    } else {
        return Ok(None);
    };

    let authorization = match lookup("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE") {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .map_err(|e| {
                    CredentialsError::provider("container", format!("failed to read {}: {}", path, e))
                })?
                .trim()
                .to_string(),
        ),
        None => lookup("AWS_CONTAINER_AUTHORIZATION_TOKEN"),
    };

    Ok(Some(ContainerSource { url, authorization }))
}

fn shared_file_source(lookup: &impl Fn(&str) -> Option<String>) -> Option<SharedFileSource> {
    let path = match lookup("AWS_SHARED_CREDENTIALS_FILE") {
        Some(path) => PathBuf::from(path),
        None => Path::new(&lookup("HOME")?).join(".aws").join("credentials"),
    };
    Some(SharedFileSource {
        path,
        profile: lookup("AWS_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
    })
}

fn instance_metadata_endpoint(lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if lookup("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return None;
    }
    Some(
        lookup("AWS_EC2_METADATA_SERVICE_ENDPOINT")
            .unwrap_or_else(|| INSTANCE_METADATA_HOST.to_string())
            .trim_end_matches('/')
            .to_string(),
    )
}

/// Credential document served by the container and instance endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialDocument {
    #[serde(default)]
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

impl CredentialDocument {
    fn into_credentials(self, provider: &'static str) -> Result<Credentials, CredentialsError> {
        if let Some(code) = self.code.as_deref().filter(|c| *c != "Success") {
            return Err(CredentialsError::provider(
                provider,
                format!("endpoint reported {}", code),
            ));
        }
        debug!(provider, expiration = ?self.expiration, "Fetched temporary credentials");
        Ok(Credentials::new(
            self.access_key_id,
            self.secret_access_key,
            self.token.filter(|t| !t.is_empty()),
        ))
    }
}

async fn fetch_container(
    http: &reqwest::Client,
    source: &ContainerSource,
) -> Result<Credentials, CredentialsError> {
    let mut request = http.get(&source.url);
    if let Some(authorization) = &source.authorization {
        request = request.header(reqwest::header::AUTHORIZATION, authorization);
    }

    let response = request
        .send()
        .await
        .map_err(|e| CredentialsError::provider("container", e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CredentialsError::provider(
            "container",
            format!("{} answered HTTP {}", source.url, status.as_u16()),
        ));
    }

    let document: CredentialDocument = response
        .json()
        .await
        .map_err(|e| CredentialsError::provider("container", e.to_string()))?;
    document.into_credentials("container")
}

/// Fetch the instance role's credentials with a session token.
///
/// An unreachable service or an instance without a role yields `None`.
async fn fetch_instance_metadata(
    http: &reqwest::Client,
    base: &str,
) -> Result<Option<Credentials>, CredentialsError> {
    let token = match http
        .put(format!("{}{}", base, METADATA_TOKEN_PATH))
        .header(METADATA_TOKEN_TTL_HEADER, METADATA_TOKEN_TTL_SECS)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response
            .text()
            .await
            .map_err(|e| CredentialsError::provider("instance metadata", e.to_string()))?,
        Ok(response) => {
            debug!(status = response.status().as_u16(), "Instance metadata refused a session token");
            return Ok(None);
        }
        Err(e) => {
            debug!(error = %e, "Instance metadata service unreachable");
            return Ok(None);
        }
    };

    let roles_url = format!("{}{}", base, METADATA_ROLE_PATH);
    let roles = metadata_get(http, &roles_url, &token).await?;
    let Some(role) = roles.as_deref().and_then(|r| r.lines().map(str::trim).find(|l| !l.is_empty()))
    else {
        debug!("Instance has no role attached");
        return Ok(None);
    };

    let document_url = format!("{}{}", roles_url, role);
    let Some(body) = metadata_get(http, &document_url, &token).await? else {
        return Ok(None);
    };
    let document: CredentialDocument = serde_json::from_str(&body)
        .map_err(|e| CredentialsError::provider("instance metadata", e.to_string()))?;
    document.into_credentials("instance metadata").map(Some)
}

/// GET a metadata path; 404 is `None`
async fn metadata_get(
    http: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<Option<String>, CredentialsError> {
    let response = http
        .get(url)
        .header(METADATA_TOKEN_HEADER, token)
        .send()
        .await
        .map_err(|e| CredentialsError::provider("instance metadata", e.to_string()))?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(CredentialsError::provider(
            "instance metadata",
            format!("{} answered HTTP {}", url, status.as_u16()),
        ));
    }
    response
        .text()
        .await
        .map(Some)
        .map_err(|e| CredentialsError::provider("instance metadata", e.to_string()))
}

fn load_shared_file(source: &SharedFileSource) -> Option<Credentials> {
    match std::fs::read_to_string(&source.path) {
        Ok(contents) => {
            let credentials = parse_shared_credentials(&contents, &source.profile);
            if credentials.is_none() {
                debug!(path = %source.path.display(), profile = %source.profile, "Profile has no keys");
            }
            credentials
        }
        Err(e) => {
            debug!(path = %source.path.display(), error = %e, "No shared credentials file");
            None
        }
    }
}

/// Read one profile's keys from an INI-style shared credentials file
pub fn parse_shared_credentials(contents: &str, profile: &str) -> Option<Credentials> {
    let mut in_profile = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }
    }

    Some(Credentials::new(access_key_id?, secret_access_key?, session_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    /// Variable lookup over a fixed set of pairs
    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned()
    }

    /// Serve a router on an ephemeral port and return its base URL
    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    // =========================================================================
    // Chain configuration
    // =========================================================================

    #[test]
    fn environment_keys_are_used_as_is() {
        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ("AWS_SESSION_TOKEN", "env-token"),
        ]))
        .unwrap();

        let credentials = chain.environment.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDENV");
        assert_eq!(credentials.session_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn half_configured_environment_is_an_error() {
        let err = CredentialsChain::from_lookup(vars(&[("AWS_ACCESS_KEY_ID", "AKIDENV")]))
            .unwrap_err();
        assert!(err.to_string().contains("AWS_SECRET_ACCESS_KEY"));
    }

    #[test]
    fn relative_container_uri_uses_link_local_host() {
        let chain = CredentialsChain::from_lookup(vars(&[(
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
            "/v2/credentials/build-1234",
        )]))
        .unwrap();

        assert_eq!(
            chain.container,
            Some(ContainerSource {
                url: "http://169.254.170.2/v2/credentials/build-1234".to_string(),
                authorization: None,
            })
        );
    }

    #[test]
    fn container_authorization_token_can_come_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-token").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://localhost:9911/creds"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "ignored"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE", &path),
        ]))
        .unwrap();

        let container = chain.container.unwrap();
        assert_eq!(container.url, "http://localhost:9911/creds");
        assert_eq!(container.authorization.as_deref(), Some("file-token"));
    }

    #[test]
    fn shared_file_defaults_to_home_and_default_profile() {
        let chain = CredentialsChain::from_lookup(vars(&[("HOME", "/home/builder")])).unwrap();
        assert_eq!(
            chain.shared_file,
            Some(SharedFileSource {
                path: PathBuf::from("/home/builder/.aws/credentials"),
                profile: "default".to_string(),
            })
        );
        assert_eq!(chain.instance_metadata.as_deref(), Some(INSTANCE_METADATA_HOST));
    }

    #[test]
    fn instance_metadata_can_be_disabled() {
        let chain =
            CredentialsChain::from_lookup(vars(&[("AWS_EC2_METADATA_DISABLED", "TRUE")])).unwrap();
        assert!(chain.instance_metadata.is_none());
    }

    #[test]
    fn shared_file_profiles_are_isolated() {
        let contents = "\
# managed by the build image
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[deploy]
aws_access_key_id=AKIDDEPLOY
aws_secret_access_key=deploy-secret
aws_session_token=deploy-token
region=us-east-1

[broken]
aws_access_key_id = AKIDBROKEN
";
        let deploy = parse_shared_credentials(contents, "deploy").unwrap();
        assert_eq!(deploy.access_key_id, "AKIDDEPLOY");
        assert_eq!(deploy.secret_access_key, "deploy-secret");
        assert_eq!(deploy.session_token.as_deref(), Some("deploy-token"));

        let default = parse_shared_credentials(contents, "default").unwrap();
        assert_eq!(default.access_key_id, "AKIDDEFAULT");
        assert!(default.session_token.is_none());

        assert!(parse_shared_credentials(contents, "broken").is_none());
        assert!(parse_shared_credentials(contents, "missing").is_none());
    }

    // =========================================================================
    // Resolution against local stubs
    // =========================================================================

    /// Story: `churn deploy` runs inside a CodeBuild job. No keys are in the
    /// environment; the build's credentials come from the container endpoint.
    #[tokio::test]
    async fn container_endpoint_supplies_credentials() {
        let app = Router::new().route(
            "/creds",
            get(|headers: HeaderMap| async move {
                if header(&headers, "authorization") != Some("Bearer build-token") {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Ok(Json(json!({
                    "AccessKeyId": "ASIACONTAINER",
                    "SecretAccessKey": "container-secret",
                    "Token": "container-session",
                    "Expiration": "2026-10-19T18:00:00Z",
                    "RoleArn": "arn:aws:iam::123456789012:role/codebuild-churn"
                })))
            }),
        );
        let base = spawn_stub(app).await;
        let url = format!("{}/creds", base);

        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", &url),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "Bearer build-token"),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ]))
        .unwrap();
        let credentials = chain.resolve().await.unwrap();

        assert_eq!(credentials.access_key_id, "ASIACONTAINER");
        assert_eq!(credentials.secret_access_key, "container-secret");
        assert_eq!(credentials.session_token.as_deref(), Some("container-session"));
    }

    #[tokio::test]
    async fn failing_container_endpoint_is_an_error() {
        let app = Router::new().route("/creds", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base = spawn_stub(app).await;
        let url = format!("{}/creds", base);

        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", &url),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ]))
        .unwrap();
        let err = chain.resolve().await.unwrap_err();

        assert!(matches!(err, CredentialsError::Provider { provider: "container", .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    /// Story: the CLI runs on an instance with a role attached. It asks for a
    /// session token first and presents it on every metadata read.
    #[tokio::test]
    async fn instance_role_credentials_use_a_session_token() {
        let app = Router::new()
            .route(
                "/latest/api/token",
                put(|headers: HeaderMap| async move {
                    match header(&headers, "x-aws-ec2-metadata-token-ttl-seconds") {
                        Some(_) => Ok("imds-session"),
                        None => Err(StatusCode::BAD_REQUEST),
                    }
                }),
            )
            .route(
                "/latest/meta-data/iam/security-credentials/",
                get(|headers: HeaderMap| async move {
                    match header(&headers, "x-aws-ec2-metadata-token") {
                        Some("imds-session") => Ok("churn-deploy-role\n"),
                        _ => Err(StatusCode::UNAUTHORIZED),
                    }
                }),
            )
            .route(
                "/latest/meta-data/iam/security-credentials/churn-deploy-role",
                get(|headers: HeaderMap| async move {
                    if header(&headers, "x-aws-ec2-metadata-token") != Some("imds-session") {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(json!({
                        "Code": "Success",
                        "AccessKeyId": "ASIAINSTANCE",
                        "SecretAccessKey": "instance-secret",
                        "Token": "instance-session",
                        "Expiration": "2026-10-19T18:00:00Z"
                    })
                    .to_string())
                }),
            );
        let base = spawn_stub(app).await;

        let chain = CredentialsChain::from_lookup(vars(&[("AWS_EC2_METADATA_SERVICE_ENDPOINT", &base)]))
            .unwrap();
        let credentials = chain.resolve().await.unwrap();

        assert_eq!(credentials.access_key_id, "ASIAINSTANCE");
        assert_eq!(credentials.session_token.as_deref(), Some("instance-session"));
    }

    #[tokio::test]
    async fn instance_without_role_has_no_credentials() {
        let app = Router::new().route("/latest/api/token", put(|| async { "imds-session" }));
        let base = spawn_stub(app).await;

        let chain = CredentialsChain::from_lookup(vars(&[("AWS_EC2_METADATA_SERVICE_ENDPOINT", &base)]))
            .unwrap();
        let err = chain.resolve().await.unwrap_err();
        assert!(matches!(err, CredentialsError::NotFound(_)));
    }

    #[tokio::test]
    async fn shared_file_profile_is_used_when_nothing_else_is_set() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[deploy]\naws_access_key_id = AKIDFILE\naws_secret_access_key = file-secret\n"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_SHARED_CREDENTIALS_FILE", &path),
            ("AWS_PROFILE", "deploy"),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ]))
        .unwrap();
        let credentials = chain.resolve().await.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDFILE");
    }

    #[tokio::test]
    async fn environment_wins_over_every_other_source() {
        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            // Would fail if it were contacted
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://127.0.0.1:1/creds"),
        ]))
        .unwrap();
        let credentials = chain.resolve().await.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDENV");
    }

    #[tokio::test]
    async fn nothing_configured_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("credentials").to_string_lossy().to_string();

        let chain = CredentialsChain::from_lookup(vars(&[
            ("AWS_SHARED_CREDENTIALS_FILE", &missing),
            ("AWS_EC2_METADATA_SERVICE_ENDPOINT", "http://127.0.0.1:1"),
        ]))
        .unwrap();
        let err = chain.resolve().await.unwrap_err();

        assert!(matches!(err, CredentialsError::NotFound(_)));
        assert!(err.to_string().contains("instance metadata"));
    }
}
