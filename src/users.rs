use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetError};

pub type UserId = u64;

/// A known user, as far as sharing is concerned.
///
/// Authentication lives in front of this crate; all we need is a stable id
/// and an e-mail address to share documents with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier handed to us by the authentication layer
    pub id: UserId,

    /// Display name
    pub name: String,

    /// E-mail address, unique case-insensitively
    pub email: String,

    pub created_at: DateTime<Utc>,
}

/// Canonical form used for e-mail comparisons.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks registration input.
///
/// # Errors
/// * Returns a validation error if the name or e-mail is empty
/// * Returns a validation error if the e-mail has no `@`
pub fn validate_registration(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(SheetError::validation("name and email cannot be empty"));
    }
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(SheetError::validation("email address is not valid")),
    }
}
