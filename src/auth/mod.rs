use crate::routes::ApiError;
use crate::AppState;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use log::{debug, info};
use serde::Deserialize;
use uuid::Uuid;

use std::collections::HashMap;
use std::fs;
use std::future::{ready, Ready};
use std::path::Path;

pub const ADMIN_COOKIE: &str = "token";
pub const USER_COOKIE: &str = "userToken";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    #[default]
    Admin,
    SuperAdmin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Admin { id: Uuid, role: AdminRole },
    User { id: Uuid },
}

/// Resolves credentials to a principal. Issuing tokens is somebody else's job.
pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Principal>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenTableError {
    #[error("cannot read token table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed token table: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Grant {
    Admin {
        token: String,
        id: Uuid,
        #[serde(default)]
        role: AdminRole,
    },
    User {
        token: String,
        id: Uuid,
    },
}

/// Fixed set of bearer tokens, e.g.
///
/// ```json
/// [
///   {"kind": "admin", "token": "s3cret", "id": "…", "role": "super_admin"},
///   {"kind": "user", "token": "rider", "id": "…"}
/// ]
/// ```
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: HashMap<String, Principal>,
}

impl TokenTable {
    pub fn new() -> TokenTable {
        TokenTable::default()
    }

    pub fn from_json(json: &str) -> Result<TokenTable, TokenTableError> {
        let grants: Vec<Grant> = serde_json::from_str(json)?;
        let mut table = TokenTable::new();
        for grant in grants {
            match grant {
                Grant::Admin { token, id, role } => table.insert(token, Principal::Admin { id, role }),
                Grant::User { token, id } => table.insert(token, Principal::User { id }),
            }
        }
        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<TokenTable, TokenTableError> {
        let table = TokenTable::from_json(&fs::read_to_string(path.as_ref())?)?;
        info!(
            "[auth] loaded {} tokens from {}",
            table.tokens.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn insert<S: Into<String>>(&mut self, token: S, principal: Principal) {
        self.tokens.insert(token.into(), principal);
    }

    pub fn with(mut self, token: &str, principal: Principal) -> TokenTable {
        self.insert(token, principal);
        self
    }
}

impl AuthProvider for TokenTable {
    fn authenticate(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).cloned()
    }
}

// bearer header first, then the cookie set by the dashboard of that actor
fn credentials(req: &HttpRequest, cookie: &str) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| req.cookie(cookie).map(|c| c.value().to_owned()))
}

fn principal(req: &HttpRequest, cookie: &str) -> Result<Principal, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Server(String::from("application state is not registered")))?;
    let token = credentials(req, cookie).ok_or(ApiError::Unauthorized(
        "Not authorized to access this route",
    ))?;

    state.auth.authenticate(&token).ok_or_else(|| {
        debug!("[auth] rejected token on {}", req.path());
        ApiError::Unauthorized("Not authorized to access this route")
    })
}

/// An authenticated administrator.
#[derive(Clone, Copy, Debug)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub role: AdminRole,
}

impl AdminIdentity {
    /// Stations and routes may be changed by whoever created them or by a
    /// super administrator.
    pub fn may_modify(&self, owner: Uuid) -> bool {
        self.id == owner || self.role == AdminRole::SuperAdmin
    }
}

impl FromRequest for AdminIdentity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            principal(req, ADMIN_COOKIE).and_then(|principal| match principal {
                Principal::Admin { id, role } => Ok(AdminIdentity { id, role }),
                Principal::User { .. } => {
                    Err(ApiError::Unauthorized("No admin found with this token"))
                }
            }),
        )
    }
}

/// An authenticated end-user.
#[derive(Clone, Copy, Debug)]
pub struct UserIdentity {
    pub id: Uuid,
}

impl FromRequest for UserIdentity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            principal(req, USER_COOKIE).and_then(|principal| match principal {
                Principal::User { id } => Ok(UserIdentity { id }),
                Principal::Admin { .. } => {
                    Err(ApiError::Unauthorized("No user found with this token"))
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_table_from_json() {
        let admin = Uuid::new_v4();
        let user = Uuid::new_v4();
        let json = format!(
            r#"[
                {{"kind": "admin", "token": "a", "id": "{}", "role": "super_admin"}},
                {{"kind": "admin", "token": "b", "id": "{}"}},
                {{"kind": "user", "token": "c", "id": "{}"}}
            ]"#,
            admin, admin, user
        );

        let table = TokenTable::from_json(&json).unwrap();
        assert_eq!(
            table.authenticate("a"),
            Some(Principal::Admin {
                id: admin,
                role: AdminRole::SuperAdmin
            })
        );
        assert_eq!(
            table.authenticate("b"),
            Some(Principal::Admin {
                id: admin,
                role: AdminRole::Admin
            })
        );
        assert_eq!(table.authenticate("c"), Some(Principal::User { id: user }));
        assert_eq!(table.authenticate("d"), None);
    }

    #[test]
    fn rejects_unknown_grant_kinds() {
        let json = r#"[{"kind": "driver", "token": "x", "id": "00000000-0000-0000-0000-000000000000"}]"#;
        assert!(matches!(
            TokenTable::from_json(json),
            Err(TokenTableError::Json(_))
        ));
    }

    #[test]
    fn ownership() {
        let owner = Uuid::new_v4();
        let admin = AdminIdentity {
            id: owner,
            role: AdminRole::Admin,
        };
        let other = AdminIdentity {
            id: Uuid::new_v4(),
            role: AdminRole::Admin,
        };
        let super_admin = AdminIdentity {
            id: Uuid::new_v4(),
            role: AdminRole::SuperAdmin,
        };

        assert!(admin.may_modify(owner));
        assert!(!other.may_modify(owner));
        assert!(super_admin.may_modify(owner));
    }
}
