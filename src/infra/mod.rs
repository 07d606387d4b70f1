//! Usage: Infrastructure: paths, configuration, persistence.

pub mod app_paths;
pub mod db;
pub mod settings;
