pub mod alerting;
pub mod apps;
pub mod backup;
pub mod db;
pub mod docker;
pub mod metrics;
pub mod notifications;
pub mod server;
pub mod services;
pub mod version;
pub mod web;
