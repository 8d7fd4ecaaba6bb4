//! Quill Entra Sync — mirrors Microsoft Entra ID group membership onto
//! workbench accounts.
//!
//! One run queries the mapped Entra ID groups, aggregates their members into
//! a per-user view, reconciles that view against the local roster, and
//! applies the resulting create/update/delete decisions (or simulates them).

pub mod aggregate;
pub mod apply;
pub mod auth;
pub mod client;
pub mod login;
pub mod models;
pub mod reconcile;
pub mod run;
