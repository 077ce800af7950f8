// API module - HTTP endpoints

pub mod auth;
pub mod health;
pub mod middleware;
pub mod sanctions;
