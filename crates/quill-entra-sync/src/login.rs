//! Login derivation for directory-sourced accounts.

/// Derive a workbench login from a directory email address.
///
/// The email is case-folded first, then `@` becomes `_`. Case-folding keeps
/// the join with the local roster stable when the directory reports the same
/// principal with different casing; the transform is deterministic and 1:1
/// per normalized address.
pub fn login_from_email(email: &str) -> String {
    email.to_lowercase().replace('@', "_")
}
