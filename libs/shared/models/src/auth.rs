use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

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

impl JwtClaims {
    /// Application role: `app_metadata.role` wins over the top-level claim,
    /// which Supabase sets to "authenticated" for every signed-in user.
    pub fn application_role(&self) -> Option<String> {
        self.app_metadata
            .as_ref()
            .and_then(|meta| meta.get("role"))
            .and_then(|role| role.as_str())
            .map(str::to_string)
            .or_else(|| self.role.clone())
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
    pub fn role(&self) -> Role {
        Role::from_claim(self.role.as_deref())
    }

    /// Resolve the caller into the identity the booking core works with.
    pub fn identity(&self) -> Result<Identity, AppError> {
        let user_id = Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        Ok(Identity {
            user_id,
            role: self.role(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn from_claim(role: Option<&str>) -> Self {
        match role {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Authenticated caller attached to every request that reaches the booking core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
