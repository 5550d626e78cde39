use crate::{
    auth::hash_password,
    config::AppConfig,
    error::RepositoryError,
    models::NewUser,
    repository::Repository,
};

/// What provisioning did on this run.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminProvisioning {
    Created { id: i64 },
    AlreadyPresent { id: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to hash the admin password: {0}")]
    Hash(String),
}

/// ensure_admin
///
/// Seeds the administrative account (staff and superuser) named by the configuration.
/// Runs once at startup before the listener binds and is idempotent: an existing account
/// with that username is left untouched, including its password.
pub async fn ensure_admin(
    repo: &dyn Repository,
    config: &AppConfig,
) -> Result<AdminProvisioning, ProvisioningError> {
    if let Some(existing) = repo.find_user_by_username(&config.admin_username).await? {
        tracing::info!(user_id = existing.id, "admin account already provisioned");
        return Ok(AdminProvisioning::AlreadyPresent { id: existing.id });
    }

    let password_hash =
        hash_password(&config.admin_password).map_err(|e| ProvisioningError::Hash(e.to_string()))?;

    let admin = repo
        .create_user(NewUser {
            username: config.admin_username.clone(),
            password_hash,
            email: config.admin_email.clone(),
            is_staff: true,
            is_superuser: true,
        })
        .await?;

    tracing::info!(user_id = admin.id, username = %admin.username, "admin account provisioned");
    Ok(AdminProvisioning::Created { id: admin.id })
}
