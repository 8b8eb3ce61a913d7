//! crates/simricare_core/src/roles.rs
//!
//! Maps an account email to a role through configurable allow-lists.

use std::collections::HashSet;

use crate::domain::UserRole;

/// Admin and counselor allow-lists. Admin membership wins when an email is
/// listed in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePolicy {
    admin_emails: HashSet<String>,
    counselor_emails: HashSet<String>,
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn email_set<I>(emails: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    emails
        .into_iter()
        .map(|e| normalize(e.as_ref()))
        .filter(|e| !e.is_empty())
        .collect()
}

impl RolePolicy {
    pub fn new<A, C>(admin_emails: A, counselor_emails: C) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            admin_emails: email_set(admin_emails),
            counselor_emails: email_set(counselor_emails),
        }
    }

    /// Parses comma-separated lists, e.g. from environment variables.
    pub fn from_lists(admin_emails: &str, counselor_emails: &str) -> Self {
        Self::new(admin_emails.split(','), counselor_emails.split(','))
    }

    pub fn role_for(&self, email: &str) -> UserRole {
        let email = normalize(email);
        if self.admin_emails.contains(&email) {
            UserRole::Admin
        } else if self.counselor_emails.contains(&email) {
            UserRole::Counselor
        } else {
            UserRole::User
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.role_for(email) == UserRole::Admin
    }

    pub fn is_counselor_or_admin(&self, email: &str) -> bool {
        matches!(self.role_for(email), UserRole::Counselor | UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RolePolicy {
        RolePolicy::from_lists(
            "admin@simricare.kr, ops@simricare.kr",
            "counselor@simricare.kr,ops@simricare.kr,",
        )
    }

    #[test]
    fn admin_list_members_are_admins() {
        let policy = policy();
        for email in ["admin@simricare.kr", "ops@simricare.kr"] {
            assert_eq!(policy.role_for(email), UserRole::Admin);
        }
    }

    #[test]
    fn counselor_and_unknown_emails() {
        let policy = policy();
        assert_eq!(policy.role_for("counselor@simricare.kr"), UserRole::Counselor);
        assert_eq!(policy.role_for("client@example.com"), UserRole::User);
        assert_eq!(policy.role_for(""), UserRole::User);
        assert!(policy.is_counselor_or_admin("counselor@simricare.kr"));
        assert!(!policy.is_admin("counselor@simricare.kr"));
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        assert_eq!(policy().role_for("  Admin@SimriCare.kr "), UserRole::Admin);
    }

    #[test]
    fn empty_policy_makes_everyone_a_user() {
        assert_eq!(RolePolicy::default().role_for("admin@simricare.kr"), UserRole::User);
    }
}
