use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Seconds a session token stays valid after issuance (7 days).
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity carried inside a session token. Anything in `extra` is
/// flattened next to `userId` and `role` in the token payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPayload {
    pub user_id: i64,
    pub role: Role,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityPayload {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            extra: Map::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Full payload of an issued token: the identity plus its timestamps.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub identity: IdentityPayload,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiration, unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    pub fn starting_at(identity: IdentityPayload, issuedAt: i64) -> Self {
        Self {
            identity,
            iat: issuedAt,
            exp: issuedAt + SESSION_TTL_SECS,
        }
    }
}
