use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    /// Organisation ("society") tag used to group team members.
    pub organization: Option<String>,
}

impl User {
    /// Whether the user's organisation tag names `organization`, ignoring case
    /// (Unicode-aware) and surrounding whitespace.
    pub fn belongs_to(&self, organization: &str) -> bool {
        self.organization
            .as_deref()
            .is_some_and(|tag| organization_key(tag) == organization_key(organization))
    }
}

pub fn organization_key(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{User, UserId};

    #[test]
    fn organization_match_folds_accented_capitals() {
        let user = User {
            id: UserId("u-1".to_string()),
            display_name: "Ada".to_string(),
            organization: Some("Société Générale".to_string()),
        };
        assert!(user.belongs_to("  SOCIÉTÉ GÉNÉRALE "));
        assert!(!user.belongs_to("Societe Generale"));
        assert!(!User { organization: None, ..user }.belongs_to(""));
    }
}
