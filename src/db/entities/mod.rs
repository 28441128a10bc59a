pub mod alert_rule;
pub mod app_template;
pub mod notification;
pub mod setting;
pub mod storage_pool;
pub mod user;
