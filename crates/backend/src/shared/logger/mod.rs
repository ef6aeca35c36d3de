pub mod repository;

use repository::log_event_internal;

/// Категория для срабатываний списка принудительного завершения онбординга
pub const CATEGORY_ONBOARDING_OVERRIDE: &str = "onboarding_override";

/// Категория для событий `onboardingStatusUpdated`
pub const CATEGORY_ONBOARDING_STATUS: &str = "onboarding_status";

/// Логирование события на сервере
///
/// # Примеры
/// ```ignore
/// logger::log("startup", "Сервер запущен");
/// logger::log(logger::CATEGORY_ONBOARDING_OVERRIDE, "user=... forced to complete");
/// ```
pub fn log(category: &str, message: &str) {
    log_event_internal("server", category, message);
}
