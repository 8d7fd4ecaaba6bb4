//! Run orchestration — the four sync phases, the progress callback, and the
//! top-level error boundary.
//!
//! Phases: validate configuration and mapping, fetch directory membership,
//! aggregate per user, reconcile and apply. A failure in phases 1 or 4 is
//! run-fatal; per-group fetch failures in phase 2 degrade to warnings so one
//! misconfigured group never blocks the rest.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use quill_core::config::EntraSyncConfig;
use quill_core::error::{QuillError, Result};
use quill_core::mapping::MappingTable;
use quill_core::runlog::RunLog;
use quill_core::workbench::WorkbenchDirectory;

use crate::aggregate::aggregate_members;
use crate::apply::{Applier, ApplySummary};
use crate::auth::GraphAuth;
use crate::client::GraphClient;
use crate::login::login_from_email;
use crate::models::DirectoryMember;
use crate::reconcile::reconcile;

/// Callback invoked with the number of completed phases, 0 through 4.
pub type ProgressFn = Box<dyn Fn(u32) + Send + Sync>;

/// Result of a sync run. The log is always populated, even when the run
/// aborted early.
pub struct SyncOutcome {
    pub log: RunLog,
    pub summary: ApplySummary,
}

/// Drives a full sync run against one workbench.
pub struct SyncRunner<'a, W: WorkbenchDirectory + ?Sized> {
    config: EntraSyncConfig,
    workbench: &'a W,
    login_base: Option<String>,
    graph_base: Option<String>,
    graph_retry: Option<(u32, Duration)>,
    progress: Option<ProgressFn>,
}

impl<'a, W: WorkbenchDirectory + ?Sized> SyncRunner<'a, W> {
    pub fn new(config: EntraSyncConfig, workbench: &'a W) -> Self {
        Self {
            config,
            workbench,
            login_base: None,
            graph_base: None,
            graph_retry: None,
            progress: None,
        }
    }

    /// Override the identity platform base URL (for testing with wiremock).
    pub fn with_login_base(mut self, url: &str) -> Self {
        self.login_base = Some(url.to_string());
        self
    }

    /// Override the Graph API base URL (for testing with wiremock).
    pub fn with_graph_base(mut self, url: &str) -> Self {
        self.graph_base = Some(url.to_string());
        self
    }

    /// Override the Graph retry policy (for testing).
    pub fn with_graph_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.graph_retry = Some((max_retries, base_delay));
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report_progress(&self, completed_phases: u32) {
        if let Some(progress) = &self.progress {
            progress(completed_phases);
        }
    }

    /// Execute the run. Never returns `Err`: a fatal failure is recorded as
    /// an ERROR log entry, and the log is flushed to CSV regardless when
    /// `log_output` is configured.
    pub async fn run(&self) -> SyncOutcome {
        let run_user = match self.workbench.auth_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                let mut log = RunLog::new("unknown");
                log.error(format!("cannot determine the calling identity: {e}"));
                return self.flush(log, ApplySummary::default());
            }
        };
        let mut log = RunLog::new(&run_user);

        let summary = match self.run_phases(&mut log).await {
            Ok(summary) => {
                info!(
                    created = summary.created,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    "sync run finished"
                );
                summary
            }
            Err(e) => {
                log.error(e.to_string());
                ApplySummary::default()
            }
        };
        self.flush(log, summary)
    }

    fn flush(&self, log: RunLog, summary: ApplySummary) -> SyncOutcome {
        if let Some(path) = &self.config.log_output {
            if let Err(e) = log.write_csv(Path::new(path)) {
                warn!(path = %path, error = %e, "could not write the run log");
            }
        }
        SyncOutcome { log, summary }
    }

    async fn run_phases(&self, log: &mut RunLog) -> Result<ApplySummary> {
        if !self.config.enabled {
            return Err(QuillError::Sync(
                "Entra ID sync is disabled in the configuration".into(),
            ));
        }
        self.report_progress(0);

        // Phase 1: validate the mapping, the workbench groups, and the
        // credentials before touching the network.
        let mapping = MappingTable::from_csv_path(Path::new(&self.config.group_mapping))?;
        let credentials = self.config.resolve_credentials()?;

        let workbench_groups: BTreeSet<String> =
            self.workbench.list_groups().await?.into_iter().collect();
        let mapped_names = mapping.quill_names();
        let missing: Vec<&str> = mapped_names
            .iter()
            .filter(|name| !workbench_groups.contains(**name))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(QuillError::Sync(format!(
                "these groups are absent from the workbench: {}",
                missing.join(", ")
            )));
        }
        // Groups nobody maps are owned locally; memberships in them survive
        // updates.
        let local_only_groups: BTreeSet<String> = workbench_groups
            .iter()
            .filter(|group| !mapped_names.contains(group.as_str()))
            .cloned()
            .collect();
        self.report_progress(1);

        // Phase 2: authenticate once, then fetch membership group by group.
        let auth = self.graph_auth(credentials);
        let token = auth.acquire_token().await?;
        let client = self.graph_client(&token);

        let mut rows: Vec<DirectoryMember> = Vec::new();
        for row in mapping.rows() {
            let group_id = match client.find_group_id(&row.entra_name).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    log.warning(format!(
                        "No return value from Graph for group {:?}.",
                        row.entra_name
                    ));
                    continue;
                }
                Err(e) => {
                    log.warning(format!("Group {:?} cannot be queried: {e}", row.entra_name));
                    continue;
                }
            };
            let members = match client.list_group_members(&group_id).await {
                Ok(members) => members,
                Err(e) => {
                    log.warning(format!(
                        "Members of group {:?} cannot be retrieved: {e}",
                        row.entra_name
                    ));
                    continue;
                }
            };
            info!(group = %row.entra_name, members = members.len(), "fetched group membership");
            for member in members {
                rows.push(DirectoryMember {
                    login: login_from_email(&member.user_principal_name),
                    display_name: member.display_name.clone(),
                    email: member.user_principal_name.clone(),
                    quill_group: row.quill_name.clone(),
                });
            }
        }
        self.report_progress(2);

        // Phase 3: collapse rows into one record per directory user.
        let entra_users = aggregate_members(&rows, &mapping);
        self.report_progress(3);

        // Phase 4: reconcile against the roster and apply.
        let local_users = self.workbench.list_users().await?;
        let decisions = reconcile(&entra_users, &local_users, &local_only_groups);
        let summary = Applier::new(self.workbench, self.config.simulate)
            .apply(&decisions, log)
            .await?;
        self.report_progress(4);
        Ok(summary)
    }

    fn graph_auth(&self, credentials: quill_core::config::GraphCredentials) -> GraphAuth {
        let mut auth = GraphAuth::new(credentials);
        if let Some(base) = &self.login_base {
            auth = auth.with_login_base(base);
        }
        auth
    }

    fn graph_client(&self, token: &str) -> GraphClient {
        let mut client = GraphClient::new(token);
        if let Some(base) = &self.graph_base {
            client = client.with_base_url(base);
        }
        if let Some((max_retries, base_delay)) = self.graph_retry {
            client = client.with_retry(max_retries, base_delay);
        }
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use quill_core::license::License;
    use quill_core::runlog::Severity;
    use quill_core::workbench::{NewWorkbenchUser, SourceType, WorkbenchUser};

    struct MockWorkbench {
        groups: Vec<String>,
        users: Mutex<Vec<WorkbenchUser>>,
        mutations: Mutex<Vec<String>>,
    }

    impl MockWorkbench {
        fn new(groups: &[&str], users: Vec<WorkbenchUser>) -> Self {
            Self {
                groups: groups.iter().map(|g| g.to_string()).collect(),
                users: Mutex::new(users),
                mutations: Mutex::new(Vec::new()),
            }
        }

        fn mutations(&self) -> Vec<String> {
            self.mutations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkbenchDirectory for MockWorkbench {
        async fn list_users(&self) -> quill_core::error::Result<Vec<WorkbenchUser>> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn list_groups(&self) -> quill_core::error::Result<Vec<String>> {
            Ok(self.groups.clone())
        }

        async fn create_user(
            &self,
            user: &NewWorkbenchUser,
        ) -> quill_core::error::Result<WorkbenchUser> {
            self.mutations.lock().unwrap().push(format!("create:{}", user.login));
            let created = WorkbenchUser {
                login: user.login.clone(),
                display_name: user.display_name.clone(),
                email: None,
                groups: user.groups.clone(),
                source_type: user.source_type,
                user_profile: user.user_profile,
            };
            self.users.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn get_user(&self, login: &str) -> quill_core::error::Result<WorkbenchUser> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.login == login)
                .cloned()
                .ok_or_else(|| {
                    quill_core::error::QuillError::Workbench(format!("user {login:?} not found"))
                })
        }

        async fn update_user(&self, user: &WorkbenchUser) -> quill_core::error::Result<()> {
            self.mutations.lock().unwrap().push(format!("update:{}", user.login));
            let mut users = self.users.lock().unwrap();
            if let Some(existing) = users.iter_mut().find(|u| u.login == user.login) {
                *existing = user.clone();
            }
            Ok(())
        }

        async fn delete_user(&self, login: &str) -> quill_core::error::Result<()> {
            self.mutations.lock().unwrap().push(format!("delete:{login}"));
            self.users.lock().unwrap().retain(|u| u.login != login);
            Ok(())
        }

        async fn auth_identity(&self) -> quill_core::error::Result<String> {
            Ok("sync-admin".to_string())
        }
    }

    fn mapping_csv(rows: &[(&str, &str, &str)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quill_name,entra_name,license").unwrap();
        for (quill, entra, license) in rows {
            writeln!(file, "{quill},{entra},{license}").unwrap();
        }
        file
    }

    fn config(mapping_path: &Path) -> EntraSyncConfig {
        EntraSyncConfig {
            enabled: true,
            group_mapping: mapping_path.to_string_lossy().into_owned(),
            tenant_id: Some("tenant-1".into()),
            app_id: Some("app-1".into()),
            app_secret: Some("s3cret".into()),
            ..Default::default()
        }
    }

    async fn mock_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-abc"
            })))
            .mount(server)
            .await;
    }

    async fn mock_group(server: &MockServer, entra_name: &str, id: &str, members: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .and(query_param(
                "$filter",
                format!("displayName eq '{entra_name}'"),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": id}]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/groups/{id}/members")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "value": members })),
            )
            .mount(server)
            .await;
    }

    fn runner<'a>(
        config: EntraSyncConfig,
        workbench: &'a MockWorkbench,
        server: &MockServer,
    ) -> SyncRunner<'a, MockWorkbench> {
        SyncRunner::new(config, workbench)
            .with_login_base(&server.uri())
            .with_graph_base(&server.uri())
            .with_graph_retry(0, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn full_run_creates_updates_and_deletes() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_group(
            &server,
            "Eng-AAD",
            "g-1",
            serde_json::json!([
                {"displayName": "Ada X", "userPrincipalName": "Ada@x.com"},
                {"displayName": "Bo Y", "userPrincipalName": "b@y.com"}
            ]),
        )
        .await;

        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        // "b_y.com" already exists with a stale license; "stale_z.com" is no
        // longer in the directory.
        let workbench = MockWorkbench::new(
            &["eng", "admins"],
            vec![
                WorkbenchUser {
                    login: "b_y.com".into(),
                    display_name: "Bo Y".into(),
                    email: Some("b@y.com".into()),
                    groups: vec!["eng".into()],
                    source_type: SourceType::LocalNoAuth,
                    user_profile: License::Explorer,
                },
                WorkbenchUser {
                    login: "stale_z.com".into(),
                    display_name: "Stale Z".into(),
                    email: Some("stale@z.com".into()),
                    groups: vec!["eng".into()],
                    source_type: SourceType::LocalNoAuth,
                    user_profile: License::Reader,
                },
            ],
        );

        let outcome = runner(config(mapping.path()), &workbench, &server)
            .run()
            .await;

        assert!(!outcome.log.has_errors());
        assert_eq!(outcome.summary.created, 1);
        assert_eq!(outcome.summary.updated, 1);
        assert_eq!(outcome.summary.deleted, 1);

        let users = workbench.users.lock().unwrap().clone();
        let ada = users.iter().find(|u| u.login == "ada_x.com").unwrap();
        assert_eq!(ada.email.as_deref(), Some("Ada@x.com"));
        assert_eq!(ada.user_profile, License::Reader);
        let bo = users.iter().find(|u| u.login == "b_y.com").unwrap();
        assert_eq!(bo.user_profile, License::Reader);
        assert!(!users.iter().any(|u| u.login == "stale_z.com"));
    }

    #[tokio::test]
    async fn missing_workbench_group_aborts_with_logged_error() {
        let server = MockServer::start().await;
        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        let workbench = MockWorkbench::new(&["admins"], vec![]);

        let outcome = runner(config(mapping.path()), &workbench, &server)
            .run()
            .await;

        assert!(outcome.log.has_errors());
        let error = &outcome.log.entries()[0];
        assert_eq!(error.severity, Severity::Error);
        assert!(error.message.contains("eng"));
        assert!(workbench.mutations().is_empty());
        assert_eq!(outcome.summary, ApplySummary::default());
    }

    #[tokio::test]
    async fn unknown_graph_group_degrades_to_warning() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})),
            )
            .mount(&server)
            .await;

        let mapping = mapping_csv(&[("eng", "Ghost-AAD", "READER")]);
        let workbench = MockWorkbench::new(&["eng"], vec![]);

        let outcome = runner(config(mapping.path()), &workbench, &server)
            .run()
            .await;

        assert!(!outcome.log.has_errors());
        let warning = &outcome.log.entries()[0];
        assert_eq!(warning.severity, Severity::Warning);
        assert!(warning.message.contains("Ghost-AAD"));
        assert_eq!(outcome.summary, ApplySummary::default());
    }

    #[tokio::test]
    async fn simulate_mutates_nothing_and_flushes_log() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_group(
            &server,
            "Eng-AAD",
            "g-1",
            serde_json::json!([
                {"displayName": "Ada X", "userPrincipalName": "a@x.com"}
            ]),
        )
        .await;

        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        let log_file = tempfile::NamedTempFile::new().unwrap();
        let mut config = config(mapping.path());
        config.simulate = true;
        config.log_output = Some(log_file.path().to_string_lossy().into_owned());
        let workbench = MockWorkbench::new(&["eng"], vec![]);

        let outcome = runner(config, &workbench, &server).run().await;

        assert!(workbench.mutations().is_empty());
        assert_eq!(outcome.summary.created, 1);
        let written = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(written.contains("will be created"));
        assert!(written.contains("sync-admin"));
    }

    #[tokio::test]
    async fn progress_reports_each_completed_phase() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;
        mock_group(&server, "Eng-AAD", "g-1", serde_json::json!([])).await;

        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        let workbench = MockWorkbench::new(&["eng"], vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let outcome = runner(config(mapping.path()), &workbench, &server)
            .with_progress(Box::new(move |phase| sink.lock().unwrap().push(phase)))
            .run()
            .await;

        assert!(!outcome.log.has_errors());
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn disabled_sync_refuses_to_run() {
        let server = MockServer::start().await;
        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        let mut config = config(mapping.path());
        config.enabled = false;
        let workbench = MockWorkbench::new(&["eng"], vec![]);

        let outcome = runner(config, &workbench, &server).run().await;
        assert!(outcome.log.has_errors());
        assert!(outcome.log.entries()[0].message.contains("disabled"));
    }

    #[tokio::test]
    async fn missing_credentials_abort_with_full_listing() {
        let server = MockServer::start().await;
        let mapping = mapping_csv(&[("eng", "Eng-AAD", "READER")]);
        let mut config = config(mapping.path());
        config.app_id = None;
        config.app_secret = None;
        let workbench = MockWorkbench::new(&["eng"], vec![]);

        let outcome = runner(config, &workbench, &server).run().await;
        assert!(outcome.log.has_errors());
        let message = &outcome.log.entries()[0].message;
        assert!(message.contains("Application ID"));
        assert!(message.contains("App secret"));
    }
}
