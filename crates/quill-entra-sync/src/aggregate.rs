//! Membership aggregation — collapse per-group member rows into one row per
//! directory user.

use std::collections::BTreeMap;

use quill_core::mapping::MappingTable;

use crate::models::{DirectoryMember, EntraUser};

/// Group the flat member rows by login, collecting the unique group and
/// license sets per user.
///
/// Each row's group grants the license the mapping table assigns to it; rows
/// whose group is missing from the table contribute membership but no
/// license. Display name and email are taken from the first row seen for a
/// login. Output is sorted by login.
pub fn aggregate_members(rows: &[DirectoryMember], mapping: &MappingTable) -> Vec<EntraUser> {
    let mut by_login: BTreeMap<&str, EntraUser> = BTreeMap::new();

    for row in rows {
        let user = by_login
            .entry(row.login.as_str())
            .or_insert_with(|| EntraUser {
                login: row.login.clone(),
                display_name: row.display_name.clone(),
                email: row.email.clone(),
                groups: Default::default(),
                licenses: Default::default(),
            });
        user.groups.insert(row.quill_group.clone());
        if let Some(license) = mapping.license_for(&row.quill_group) {
            user.licenses.insert(license);
        }
    }

    by_login.into_values().collect()
}
