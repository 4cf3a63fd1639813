//! User records and administrative levels.

use serde::Deserialize;
use serde::Serialize;

/// Administrative capability attached to a user record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdminLevel {
    /// The user is not known to the cache
    #[default]
    NotSet,
    None,
    Operator,
    Administrator,
}

impl AdminLevel {
    /// Operators and administrators may see other users' usage.
    pub fn is_privileged(&self) -> bool {
        matches!(self, AdminLevel::Operator | AdminLevel::Administrator)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Resolved numeric identifier; None when the name cannot be resolved
    pub uid: Option<u32>,
    pub name: String,
    pub default_account: Option<String>,
    pub default_wckey: Option<String>,
    pub admin_level: AdminLevel,
    /// Accounts this user coordinates (authorized to query/modify)
    pub coord_accounts: Vec<String>,
}

impl User {
    /// User names match case-insensitively.
    pub(crate) fn name_matches(
        &self,
        name: &str,
    ) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub(crate) fn coordinates(
        &self,
        account: &str,
    ) -> bool {
        self.coord_accounts.iter().any(|a| a == account)
    }

    /// Copy every cached field the caller did not supply.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: &User,
    ) {
        if self.uid.is_none() {
            self.uid = cached.uid;
        }
        if self.name.is_empty() {
            self.name = cached.name.clone();
        }
        if self.default_account.is_none() {
            self.default_account = cached.default_account.clone();
        }
        if self.default_wckey.is_none() {
            self.default_wckey = cached.default_wckey.clone();
        }
        if self.admin_level == AdminLevel::NotSet {
            self.admin_level = cached.admin_level;
        }
        if self.coord_accounts.is_empty() {
            self.coord_accounts = cached.coord_accounts.clone();
        }
    }
}
