//! Typed reqwest wrapper for the Microsoft Graph group endpoints.

use std::time::Duration;

use tracing::{debug, warn};

use quill_core::error::{QuillError, Result};

use crate::models::{GraphGroupList, GraphMember, GraphMemberPage};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com";

/// HTTP client for Graph group search and member listing.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GraphClient {
    /// Create a new client carrying the given bearer token.
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GRAPH_API_BASE.to_string(),
            token: token.to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy (for testing).
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Look up a group's Graph identifier by exact display name.
    ///
    /// Returns `Ok(None)` when the directory has no group with that name.
    /// Transport and HTTP failures are `Err`; the runner downgrades them to
    /// a per-group warning so one bad group never aborts the run.
    pub async fn find_group_id(&self, display_name: &str) -> Result<Option<String>> {
        let url = format!("{}/v1.0/groups", self.base_url);
        debug!(group = %display_name, "querying Graph for group id");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("$filter", format!("displayName eq '{display_name}'")),
                ("$select", "id".to_string()),
            ])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| QuillError::Graph(format!("group query request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuillError::Graph(format!(
                "group query failed ({status}): {body}"
            )));
        }

        let list: GraphGroupList = response
            .json()
            .await
            .map_err(|e| QuillError::Graph(format!("group query parse failed: {e}")))?;
        Ok(list.value.into_iter().next().map(|hit| hit.id))
    }

    /// List all members of a group, following `@odata.nextLink` pagination
    /// until exhausted.
    pub async fn list_group_members(&self, group_id: &str) -> Result<Vec<GraphMember>> {
        let first_url = format!(
            "{}/v1.0/groups/{}/members?$select=displayName,userPrincipalName",
            self.base_url, group_id
        );

        let mut members = Vec::new();
        let mut next_url = Some(first_url);
        while let Some(url) = next_url {
            debug!(url = %url, "fetching member page");
            let page = self.fetch_member_page(&url).await?;
            members.extend(page.value);
            next_url = page.next_link;
        }
        Ok(members)
    }

    /// Fetch one member page with bounded retry and exponential backoff on
    /// transient failures.
    async fn fetch_member_page(&self, url: &str) -> Result<GraphMemberPage> {
        let mut attempt = 0;
        loop {
            match self.try_fetch_member_page(url).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "member page fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch_member_page(&self, url: &str) -> Result<GraphMemberPage> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| QuillError::Graph(format!("member listing request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuillError::Graph(format!(
                "member listing failed ({status}): {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| QuillError::Graph(format!("member listing parse failed: {e}")))
    }
}
