pub mod alert_routes;
pub mod app_routes;
pub mod backup_routes;
pub mod container_routes;
pub mod network_routes;
pub mod notification_routes;
pub mod settings_routes;
pub mod storage_routes;
pub mod system_routes;
