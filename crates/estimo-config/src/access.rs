//! Who may run administrative commands.
//!
//! The lists are read once at startup and handed to the router as an
//! immutable [`AccessPolicy`]; nothing mutates them at runtime.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Handles allowed to manage participants, teams, epics, and risks.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Handles additionally allowed to confirm deletions.
    #[serde(default)]
    pub super_admins: Vec<String>,
}

/// Normalized, immutable view of [`AccessConfig`].
///
/// Handles are compared case-insensitively and without a leading `@`.
/// Super admins are admins too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    admins: HashSet<String>,
    super_admins: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, J, S, T>(admins: I, super_admins: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let super_admins: HashSet<String> = super_admins
            .into_iter()
            .map(|h| normalize_handle(h.as_ref()))
            .collect();
        let mut admins: HashSet<String> = admins
            .into_iter()
            .map(|h| normalize_handle(h.as_ref()))
            .collect();
        admins.extend(super_admins.iter().cloned());
        Self {
            admins,
            super_admins,
        }
    }

    #[must_use]
    pub fn is_admin(&self, handle: &str) -> bool {
        self.admins.contains(&normalize_handle(handle))
    }

    #[must_use]
    pub fn is_super_admin(&self, handle: &str) -> bool {
        self.super_admins.contains(&normalize_handle(handle))
    }
}

impl From<&AccessConfig> for AccessPolicy {
    fn from(config: &AccessConfig) -> Self {
        Self::new(&config.admins, &config.super_admins)
    }
}

/// Strip a leading `@` and lowercase.
#[must_use]
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
