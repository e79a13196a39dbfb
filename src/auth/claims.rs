use serde::{Deserialize, Serialize};

/// Role carried inside access tokens and on the stored user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an access token. Self-contained: validity is decided by
/// signature and `exp` alone, never by a stored row (unless the exact token
/// string has been blacklisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Numeric user id, rendered as a string.
    pub sub: String,
    pub email: String,
    #[serde(rename = "userRole")]
    pub user_role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn subject_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Payload of a refresh token. Carries no subject: ownership is established
/// by the stored row keyed on user id, not by the token itself. `jti` makes
/// consecutive mints distinct even within one clock second, which the
/// single-use rotation check depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}
