//! Workbench admin API — local user and group management.
//!
//! The sync tooling talks to the workbench through the [`WorkbenchDirectory`]
//! trait so engines can be tested against in-memory fakes; [`WorkbenchClient`]
//! is the reqwest implementation used in production.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{QuillError, Result};
use crate::license::License;

/// How a workbench account authenticates.
///
/// Accounts of type `LocalNoAuth` are owned by the directory sync: they have
/// no usable password and are the only accounts the sync may mutate or
/// delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceType {
    #[serde(rename = "LOCAL")]
    Local,
    #[serde(rename = "LOCAL_NO_AUTH")]
    LocalNoAuth,
    #[serde(rename = "LDAP")]
    Ldap,
    #[serde(rename = "SAAS_AUTH")]
    SaasAuth,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Local => "LOCAL",
            SourceType::LocalNoAuth => "LOCAL_NO_AUTH",
            SourceType::Ldap => "LDAP",
            SourceType::SaasAuth => "SAAS_AUTH",
        }
    }
}

/// A workbench user definition as returned by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchUser {
    pub login: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub source_type: SourceType,
    pub user_profile: License,
}

/// Request body for account creation.
///
/// The creation endpoint does not accept an email; callers set it afterwards
/// by rewriting the definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkbenchUser {
    pub login: String,
    pub display_name: String,
    pub groups: Vec<String>,
    pub password: String,
    pub source_type: SourceType,
    pub user_profile: License,
}

/// A workbench group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkbenchGroup {
    pub name: String,
}

/// Account and group operations exposed by the workbench.
#[async_trait]
pub trait WorkbenchDirectory: Send + Sync {
    /// Snapshot of the full local user roster.
    async fn list_users(&self) -> Result<Vec<WorkbenchUser>>;
    /// All group names known to the workbench.
    async fn list_groups(&self) -> Result<Vec<String>>;
    async fn create_user(&self, user: &NewWorkbenchUser) -> Result<WorkbenchUser>;
    async fn get_user(&self, login: &str) -> Result<WorkbenchUser>;
    async fn update_user(&self, user: &WorkbenchUser) -> Result<()>;
    async fn delete_user(&self, login: &str) -> Result<()>;
    /// The identity the admin API token authenticates as.
    async fn auth_identity(&self) -> Result<String>;
}

/// HTTP client for the workbench admin API.
pub struct WorkbenchClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthInfo {
    #[serde(rename = "authIdentifier")]
    auth_identifier: String,
}

impl WorkbenchClient {
    /// Create a new client with the given base URL and admin API token.
    pub fn new(base_url: &str, api_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn users_url(&self) -> String {
        format!("{}/api/admin/users", self.base_url)
    }

    fn user_url(&self, login: &str) -> String {
        format!("{}/api/admin/users/{}", self.base_url, login)
    }

    fn groups_url(&self) -> String {
        format!("{}/api/admin/groups", self.base_url)
    }

    fn auth_info_url(&self) -> String {
        format!("{}/api/admin/auth-info", self.base_url)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(QuillError::Workbench(format!(
            "{what} failed ({status}): {body}"
        )))
    }
}

#[async_trait]
impl WorkbenchDirectory for WorkbenchClient {
    async fn list_users(&self) -> Result<Vec<WorkbenchUser>> {
        let resp = self
            .http
            .get(self.users_url())
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("list users request failed: {e}")))?;
        let resp = Self::check(resp, "list users").await?;
        resp.json::<Vec<WorkbenchUser>>()
            .await
            .map_err(|e| QuillError::Workbench(format!("list users parse failed: {e}")))
    }

    async fn list_groups(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.groups_url())
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("list groups request failed: {e}")))?;
        let resp = Self::check(resp, "list groups").await?;
        let groups = resp
            .json::<Vec<WorkbenchGroup>>()
            .await
            .map_err(|e| QuillError::Workbench(format!("list groups parse failed: {e}")))?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }

    async fn create_user(&self, user: &NewWorkbenchUser) -> Result<WorkbenchUser> {
        let resp = self
            .http
            .post(self.users_url())
            .bearer_auth(&self.api_token)
            .json(user)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("create user request failed: {e}")))?;
        let resp = Self::check(resp, "create user").await?;
        resp.json::<WorkbenchUser>()
            .await
            .map_err(|e| QuillError::Workbench(format!("create user parse failed: {e}")))
    }

    async fn get_user(&self, login: &str) -> Result<WorkbenchUser> {
        let resp = self
            .http
            .get(self.user_url(login))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("get user request failed: {e}")))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(QuillError::Workbench(format!("user {login:?} not found")));
        }
        let resp = Self::check(resp, "get user").await?;
        resp.json::<WorkbenchUser>()
            .await
            .map_err(|e| QuillError::Workbench(format!("get user parse failed: {e}")))
    }

    async fn update_user(&self, user: &WorkbenchUser) -> Result<()> {
        let resp = self
            .http
            .put(self.user_url(&user.login))
            .bearer_auth(&self.api_token)
            .json(user)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("update user request failed: {e}")))?;
        Self::check(resp, "update user").await?;
        Ok(())
    }

    async fn delete_user(&self, login: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.user_url(login))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("delete user request failed: {e}")))?;
        Self::check(resp, "delete user").await?;
        Ok(())
    }

    async fn auth_identity(&self) -> Result<String> {
        let resp = self
            .http
            .get(self.auth_info_url())
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| QuillError::Workbench(format!("auth info request failed: {e}")))?;
        let resp = Self::check(resp, "auth info").await?;
        let info = resp
            .json::<AuthInfo>()
            .await
            .map_err(|e| QuillError::Workbench(format!("auth info parse failed: {e}")))?;
        Ok(info.auth_identifier)
    }
}
