pub mod app_template;
pub mod export;
pub mod projection;
