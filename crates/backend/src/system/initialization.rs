use anyhow::{Context, Result};

use crate::shared::data::db::get_connection;
use crate::system::onboarding::attributes::{status_attributes, ATTR_BUSINESS_INFO_DONE};
use crate::system::onboarding::identity_store::SqliteIdentityStore;
use crate::system::onboarding::IdentityStore;
use contracts::system::onboarding::OnboardingStatus;

/// Ensure admin user exists (create if table is empty)
pub async fn ensure_admin_user_exists() -> Result<()> {
    use crate::system::users::{repository, service};
    use contracts::system::users::CreateUserDto;

    let count = repository::count_users().await?;
    if count > 0 {
        return Ok(());
    }

    tracing::info!("No users found. Creating default admin user...");

    let admin_dto = CreateUserDto {
        username: "admin".to_string(),
        password: "admin".to_string(),
        email: None,
        full_name: Some("Administrator".to_string()),
        is_admin: true,
        is_confirmed: true,
    };

    let admin_id = service::create(admin_dto, None).await?;

    // Администратор не проходит онбординг
    let mut attributes = status_attributes(OnboardingStatus::Complete, true);
    attributes.insert(ATTR_BUSINESS_INFO_DONE.to_string(), "TRUE".to_string());
    SqliteIdentityStore::for_user(get_connection().clone(), admin_id.clone())
        .update_attributes(attributes)
        .await
        .context("Failed to seed admin onboarding attributes")?;

    tracing::warn!("═══════════════════════════════════════════════");
    tracing::warn!("  Default admin user created!");
    tracing::warn!("  Username: admin");
    tracing::warn!("  Password: admin");
    tracing::warn!("  User ID: {}", admin_id);
    tracing::warn!("  ⚠️  PLEASE CHANGE THE PASSWORD IMMEDIATELY!");
    tracing::warn!("═══════════════════════════════════════════════");

    Ok(())
}
