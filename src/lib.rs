pub mod actions;
pub mod catalog;
pub mod config;
pub mod health;
pub mod history;
pub mod models;
pub mod selection;
pub mod session;
pub mod splits;
pub mod store;
pub mod suggest;
pub mod thresholds;

/// Application name for XDG paths
pub const APP_NAME: &str = "splitlist";
