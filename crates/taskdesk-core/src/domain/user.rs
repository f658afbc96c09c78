//! User records as seen by this crate (read-only).

use serde::{Deserialize, Serialize};

use super::ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl User {
    /// Contact address, if the user has a usable one.
    pub fn contact_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        format!("{first} {last}").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn user(email: Option<&str>) -> User {
        User {
            id: UserId::from_ulid(Ulid::new()),
            first_name: Some("Ada".into()),
            last_name: None,
            email: email.map(str::to_string),
            is_deleted: false,
        }
    }

    #[test]
    fn blank_email_is_not_an_address() {
        assert_eq!(user(None).contact_address(), None);
        assert_eq!(user(Some("   ")).contact_address(), None);
        assert_eq!(user(Some("ada@example.com")).contact_address(), Some("ada@example.com"));
    }

    #[test]
    fn full_name_skips_missing_parts() {
        assert_eq!(user(None).full_name(), "Ada");
    }
}
