//! Microsoft Graph wire structs and per-run row types.

use std::collections::BTreeSet;

use serde::Deserialize;

use quill_core::license::License;

/// Response shape of the group search endpoint (`$select=id`).
#[derive(Debug, Deserialize)]
pub struct GraphGroupList {
    #[serde(default)]
    pub value: Vec<GraphGroupHit>,
}

#[derive(Debug, Deserialize)]
pub struct GraphGroupHit {
    pub id: String,
}

/// One page of a group-member listing.
///
/// Only `displayName` and `userPrincipalName` are selected; the OData type
/// annotation column the API prepends is never deserialized.
#[derive(Debug, Deserialize)]
pub struct GraphMemberPage {
    #[serde(default)]
    pub value: Vec<GraphMember>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A group member as reported by Graph.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphMember {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub user_principal_name: String,
}

/// A directory member tagged with the workbench group it was retrieved for.
///
/// Transient: rows exist only between the Graph query phase and aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMember {
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub quill_group: String,
}

/// A directory user aggregated across all mapped groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntraUser {
    pub login: String,
    pub display_name: String,
    pub email: String,
    /// Workbench group names the directory assigns this user to.
    pub groups: BTreeSet<String>,
    /// Licenses implied by those groups.
    pub licenses: BTreeSet<License>,
}
