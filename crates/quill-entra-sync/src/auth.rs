//! OAuth2 token acquisition against the Microsoft identity platform.
//!
//! Three grant flows are supported, each consuming the credential subset
//! resolved from configuration: client secret, client certificate (signed
//! client assertion), and resource-owner username/password.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_core::config::GraphCredentials;
use quill_core::error::{QuillError, Result};

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Token response from the identity platform.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    aud: String,
    iss: String,
    sub: String,
    jti: String,
    nbf: i64,
    exp: i64,
}

/// Acquires bearer tokens for Graph calls.
pub struct GraphAuth {
    http: reqwest::Client,
    login_base: String,
    credentials: GraphCredentials,
}

impl GraphAuth {
    pub fn new(credentials: GraphCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            login_base: LOGIN_BASE.to_string(),
            credentials,
        }
    }

    /// Override the login endpoint base URL (for testing with wiremock).
    pub fn with_login_base(mut self, url: &str) -> Self {
        self.login_base = url.trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base,
            self.credentials.tenant_id()
        )
    }

    /// Acquire an access token using the configured flow.
    ///
    /// Any failure here is run-fatal; the caller does not retry.
    pub async fn acquire_token(&self) -> Result<String> {
        let token_url = self.token_url();
        debug!(url = %token_url, "requesting Graph access token");

        let params: Vec<(&str, String)> = match &self.credentials {
            GraphCredentials::AppToken {
                app_id, app_secret, ..
            } => vec![
                ("grant_type", "client_credentials".into()),
                ("client_id", app_id.clone()),
                ("client_secret", app_secret.clone()),
                ("scope", GRAPH_SCOPE.into()),
            ],
            GraphCredentials::AppCert {
                app_id,
                cert_pem,
                cert_thumbprint,
                ..
            } => {
                let assertion =
                    build_client_assertion(&token_url, app_id, cert_pem, cert_thumbprint)?;
                vec![
                    ("grant_type", "client_credentials".into()),
                    ("client_id", app_id.clone()),
                    (
                        "client_assertion_type",
                        "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".into(),
                    ),
                    ("client_assertion", assertion),
                    ("scope", GRAPH_SCOPE.into()),
                ]
            }
            GraphCredentials::UserPassword {
                app_id,
                user_principal,
                user_password,
                ..
            } => vec![
                ("grant_type", "password".into()),
                ("client_id", app_id.clone()),
                ("username", user_principal.clone()),
                ("password", user_password.clone()),
                ("scope", GRAPH_SCOPE.into()),
            ],
        };

        let response = self
            .http
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| QuillError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuillError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| QuillError::Auth(format!("failed to parse token response: {e}")))?;
        debug!("Graph access token acquired");
        Ok(token.access_token)
    }
}

/// Build the signed JWT client assertion for the certificate flow.
///
/// The `x5t` header carries the configured certificate thumbprint so the
/// identity platform can locate the uploaded certificate.
fn build_client_assertion(
    token_url: &str,
    app_id: &str,
    cert_pem: &str,
    cert_thumbprint: &str,
) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(cert_pem.as_bytes())
        .map_err(|e| QuillError::Auth(format!("invalid app certificate key: {e}")))?;

    let mut header = Header::new(Algorithm::RS256);
    header.x5t = Some(cert_thumbprint.to_string());

    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        aud: token_url.to_string(),
        iss: app_id.to_string(),
        sub: app_id.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        nbf: now,
        exp: now + 600,
    };

    encode(&header, &claims, &key)
        .map_err(|e| QuillError::Auth(format!("failed to sign client assertion: {e}")))
}
