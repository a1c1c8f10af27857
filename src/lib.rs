pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod publisher;
pub mod routes;
pub mod services;
pub mod store;
