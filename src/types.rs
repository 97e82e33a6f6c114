/// Shared types used across the codebase

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Stored as the Postgres enum `user_role` and carried in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Provider,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Provider => "PROVIDER",
            Role::User => "USER",
        }
    }

    /// End of the access window granted to a freshly created account.
    pub fn initial_access_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            Role::Provider => now.checked_add_signed(Duration::days(3)),
            Role::User => now.checked_add_months(Months::new(3)),
            Role::Admin => now.checked_add_months(Months::new(12 * 100)),
        };
        end.unwrap_or(now)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn roles_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Provider).unwrap(), "\"PROVIDER\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn access_windows_by_role() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(Role::Provider.initial_access_end(now), Utc.with_ymd_and_hms(2024, 2, 3, 12, 0, 0).unwrap());
        // month arithmetic clamps to the last day of the target month
        assert_eq!(Role::User.initial_access_end(now), Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap());
        assert_eq!(Role::Admin.initial_access_end(now), Utc.with_ymd_and_hms(2124, 1, 31, 12, 0, 0).unwrap());
    }
}
