use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Hospital,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Hospital => write!(f, "hospital"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "hospital" => Ok(Role::Hospital),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Parsed role claim; unknown or missing roles yield `None`.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|role| role.parse().ok())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Option<&str>) -> User {
        User {
            id: "user-1".to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn role_claim_is_parsed() {
        assert_eq!(user_with_role(Some("Hospital")).role(), Some(Role::Hospital));
        assert!(user_with_role(Some("hospital")).has_role(Role::Hospital));
        assert!(!user_with_role(Some("patient")).has_role(Role::Hospital));
    }

    #[test]
    fn unknown_role_is_none() {
        assert_eq!(user_with_role(Some("authenticated")).role(), None);
        assert_eq!(user_with_role(None).role(), None);
    }
}
