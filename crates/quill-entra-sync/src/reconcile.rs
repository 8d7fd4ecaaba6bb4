//! Reconciliation engine — decides, per user, how the local roster must
//! change to mirror the directory.
//!
//! The engine performs a full outer join between the aggregated directory
//! users and the workbench roster, keyed on login. Logins derive from
//! case-folded emails, so casing drift between the two sides never forks an
//! identity. Only accounts of source type `LOCAL_NO_AUTH` are ever mutated;
//! everything else is reported, not touched.

use std::collections::{BTreeMap, BTreeSet};

use quill_core::license::License;
use quill_core::workbench::{SourceType, WorkbenchUser};

use crate::models::EntraUser;

/// Deletion reason for accounts the directory no longer backs.
pub const REASON_NOT_IN_DIRECTORY: &str = "Not found in Entra ID.";
/// Deletion reason for accounts whose memberships grant no license.
pub const REASON_NO_LICENSE: &str = "No license.";

/// The per-user outcome of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Provision a new workbench account.
    Create {
        login: String,
        display_name: String,
        email: String,
        groups: Vec<String>,
        license: License,
    },
    /// Rewrite an existing account's groups and license.
    Update {
        login: String,
        groups: Vec<String>,
        license: License,
    },
    /// Remove an account this sync owns.
    Delete { login: String, reason: &'static str },
    /// A directory identity collides with a foreign-owned local account.
    Warn { login: String, message: String },
    /// Directory-only user with no licensed group: no account is produced.
    Skip { login: String },
    /// Nothing to do.
    NoOp { login: String },
}

impl Decision {
    pub fn login(&self) -> &str {
        match self {
            Decision::Create { login, .. }
            | Decision::Update { login, .. }
            | Decision::Delete { login, .. }
            | Decision::Warn { login, .. }
            | Decision::Skip { login }
            | Decision::NoOp { login } => login,
        }
    }
}

/// Compare directory truth against the local roster and emit one decision
/// per login, ordered by login.
///
/// `local_only_groups` is the set of workbench groups absent from the
/// mapping table; memberships in those groups are owned locally and survive
/// updates.
pub fn reconcile(
    entra_users: &[EntraUser],
    local_users: &[WorkbenchUser],
    local_only_groups: &BTreeSet<String>,
) -> Vec<Decision> {
    let mut joined: BTreeMap<&str, (Option<&EntraUser>, Option<&WorkbenchUser>)> = BTreeMap::new();
    for user in entra_users {
        joined.entry(user.login.as_str()).or_default().0 = Some(user);
    }
    for user in local_users {
        joined.entry(user.login.as_str()).or_default().1 = Some(user);
    }

    joined
        .into_iter()
        .map(|(login, sides)| decide(login, sides.0, sides.1, local_only_groups))
        .collect()
}

fn decide(
    login: &str,
    entra: Option<&EntraUser>,
    local: Option<&WorkbenchUser>,
    local_only_groups: &BTreeSet<String>,
) -> Decision {
    match (entra, local) {
        (Some(entra), None) => {
            let license = License::resolve(entra.licenses.iter().copied());
            if license == License::None {
                return Decision::Skip {
                    login: login.to_string(),
                };
            }
            Decision::Create {
                login: login.to_string(),
                display_name: entra.display_name.clone(),
                email: entra.email.clone(),
                groups: entra.groups.iter().cloned().collect(),
                license,
            }
        }
        (None, Some(local)) => {
            if local.source_type == SourceType::LocalNoAuth {
                Decision::Delete {
                    login: login.to_string(),
                    reason: REASON_NOT_IN_DIRECTORY,
                }
            } else {
                Decision::NoOp {
                    login: login.to_string(),
                }
            }
        }
        (Some(entra), Some(local)) => {
            if local.source_type != SourceType::LocalNoAuth {
                return Decision::Warn {
                    login: login.to_string(),
                    message: format!(
                        "user {login:?} has source type {}, while LOCAL_NO_AUTH was expected",
                        local.source_type.as_str()
                    ),
                };
            }

            let license = License::resolve(entra.licenses.iter().copied());
            if license == License::None {
                return Decision::Delete {
                    login: login.to_string(),
                    reason: REASON_NO_LICENSE,
                };
            }

            let current: BTreeSet<&str> = local.groups.iter().map(String::as_str).collect();
            // Directory-assigned groups plus any locally owned memberships.
            let effective: BTreeSet<&str> = entra
                .groups
                .iter()
                .map(String::as_str)
                .chain(
                    local
                        .groups
                        .iter()
                        .map(String::as_str)
                        .filter(|g| local_only_groups.contains(*g)),
                )
                .collect();

            if effective != current || license != local.user_profile {
                Decision::Update {
                    login: login.to_string(),
                    groups: effective.into_iter().map(str::to_string).collect(),
                    license,
                }
            } else {
                Decision::NoOp {
                    login: login.to_string(),
                }
            }
        }
        (None, None) => unreachable!("join rows always have at least one side"),
    }
}
