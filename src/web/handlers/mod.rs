pub mod logs_ws;
