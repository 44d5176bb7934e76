pub mod admin;
pub mod api;
pub mod config;
pub mod database;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod seeds;
pub mod services;
pub mod session;
pub mod store;
pub mod utils;
pub mod views;
