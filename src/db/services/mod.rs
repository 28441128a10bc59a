pub mod alert_service;
pub mod notification_service;
pub mod settings_service;
pub mod storage_service;
pub mod template_service;
pub mod user_service;
