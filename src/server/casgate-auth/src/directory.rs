//! User directory collaborator.
//!
//! Casgate does not own user accounts. After a successful authentication the
//! caller hands the [`AuthContext`] to [`provision`], which looks the user up,
//! creates it when allowed, and copies mapped CAS attributes onto it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{AuthContext, AuthError, CasConfig};

/// A user account as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Login name, equal to the CAS username.
    pub username: String,
    /// Profile fields (e.g. `email`, `first_name`).
    pub fields: BTreeMap<String, String>,
}

impl DirectoryUser {
    /// Creates a user without profile fields.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// Account storage owned by the host application.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<DirectoryUser>, AuthError>;

    /// Creates a user and returns it.
    async fn create_user(&self, username: &str) -> Result<DirectoryUser, AuthError>;

    /// Persists profile changes.
    async fn save(&self, user: &DirectoryUser) -> Result<(), AuthError>;
}

/// Finds or creates the directory user for `ctx` and applies the attribute
/// mapping from `config`.
///
/// The user is saved only when at least one mapped attribute was released.
///
/// # Errors
///
/// - [`AuthError::UnknownUser`] if the user is missing and auto-creation is off
/// - Any error returned by the directory
pub async fn provision<D>(
    directory: &D,
    ctx: &AuthContext,
    config: &CasConfig,
) -> Result<DirectoryUser, AuthError>
where
    D: UserDirectory + ?Sized,
{
    let mut user = match directory.find_by_username(&ctx.username).await? {
        Some(user) => user,
        None if config.auto_create_users => {
            debug!(username = %ctx.username, "User auto created by CAS backend");
            directory.create_user(&ctx.username).await?
        },
        None => {
            error!(username = %ctx.username, "Failed authentication, user does not exist");
            return Err(AuthError::UnknownUser(ctx.username.clone()));
        },
    };

    let mut changed = false;
    for (cas_name, field) in &config.attributes {
        if let Some(value) = ctx.attributes.get(cas_name) {
            user.fields.insert(field.clone(), value.clone());
            changed = true;
        }
    }

    if changed {
        directory.save(&user).await?;
    }

    Ok(user)
}
