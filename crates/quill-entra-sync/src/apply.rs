//! Decision application — turns reconciliation decisions into workbench
//! mutations, or into simulation log entries.

use tracing::info;

use quill_core::error::Result;
use quill_core::license::License;
use quill_core::runlog::RunLog;
use quill_core::workbench::{NewWorkbenchUser, SourceType, WorkbenchDirectory};

use crate::reconcile::Decision;

/// Counts of applied decisions for the run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub warned: usize,
    pub unchanged: usize,
}

/// Applies decisions against a workbench, honoring the simulate flag.
pub struct Applier<'a, W: WorkbenchDirectory + ?Sized> {
    workbench: &'a W,
    simulate: bool,
}

impl<'a, W: WorkbenchDirectory + ?Sized> Applier<'a, W> {
    pub fn new(workbench: &'a W, simulate: bool) -> Self {
        Self { workbench, simulate }
    }

    /// Apply every decision in order, appending one log entry per action.
    ///
    /// With `simulate` set, no workbench call is made for any decision; the
    /// log records what would have happened. A workbench failure here is
    /// run-fatal and propagates to the run boundary.
    pub async fn apply(&self, decisions: &[Decision], log: &mut RunLog) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();
        for decision in decisions {
            match decision {
                Decision::Create {
                    login,
                    display_name,
                    email,
                    groups,
                    license,
                } => {
                    self.create(login, display_name, email, groups, *license, log)
                        .await?;
                    summary.created += 1;
                }
                Decision::Update {
                    login,
                    groups,
                    license,
                } => {
                    self.update(login, groups, *license, log).await?;
                    summary.updated += 1;
                }
                Decision::Delete { login, reason } => {
                    self.delete(login, reason, log).await?;
                    summary.deleted += 1;
                }
                Decision::Warn { message, .. } => {
                    log.warning(message.clone());
                    summary.warned += 1;
                }
                Decision::Skip { login } => {
                    log.info(format!(
                        "User {login:?} will not be created, since they have no license."
                    ));
                    summary.skipped += 1;
                }
                Decision::NoOp { .. } => {
                    summary.unchanged += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn create(
        &self,
        login: &str,
        display_name: &str,
        email: &str,
        groups: &[String],
        license: License,
        log: &mut RunLog,
    ) -> Result<()> {
        if self.simulate {
            log.info(format!(
                "User {login:?} will be created and assigned groups {groups:?}"
            ));
            return Ok(());
        }

        // Authentication is always external, so the account gets no usable
        // password. The creation endpoint does not accept an email; it is
        // set by rewriting the definition afterwards.
        let mut definition = self
            .workbench
            .create_user(&NewWorkbenchUser {
                login: login.to_string(),
                display_name: display_name.to_string(),
                groups: groups.to_vec(),
                password: String::new(),
                source_type: SourceType::LocalNoAuth,
                user_profile: license,
            })
            .await?;
        definition.email = Some(email.to_string());
        self.workbench.update_user(&definition).await?;

        info!(login, ?groups, %license, "created workbench user");
        log.info(format!(
            "User {login:?} has been created and assigned groups {groups:?}"
        ));
        Ok(())
    }

    async fn update(
        &self,
        login: &str,
        groups: &[String],
        license: License,
        log: &mut RunLog,
    ) -> Result<()> {
        if self.simulate {
            log.info(format!(
                "User {login:?} groups will be modified to {groups:?}, user license {license}"
            ));
            return Ok(());
        }

        let mut definition = self.workbench.get_user(login).await?;
        definition.groups = groups.to_vec();
        definition.user_profile = license;
        self.workbench.update_user(&definition).await?;

        info!(login, ?groups, %license, "updated workbench user");
        log.info(format!(
            "User {login:?} groups have been modified to {groups:?}, user license {license}"
        ));
        Ok(())
    }

    async fn delete(&self, login: &str, reason: &str, log: &mut RunLog) -> Result<()> {
        if self.simulate {
            log.info(format!("User {login:?} will be deleted. Reason: {reason}"));
            return Ok(());
        }

        // Fetch first so a vanished account fails loudly rather than being
        // silently "deleted".
        self.workbench.get_user(login).await?;
        self.workbench.delete_user(login).await?;

        info!(login, reason, "deleted workbench user");
        log.info(format!("User {login:?} has been deleted. Reason: {reason}"));
        Ok(())
    }
}
