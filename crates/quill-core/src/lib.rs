//! Quill Core — configuration, license model, group mapping, run log, and the
//! workbench admin API client shared by the sync tooling.

pub mod config;
pub mod error;
pub mod license;
pub mod mapping;
pub mod runlog;
pub mod workbench;
