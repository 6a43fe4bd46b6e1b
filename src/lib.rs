pub mod auth;
pub mod collectors;
pub mod config;
pub mod db;
pub mod error;
pub mod harvest;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod store;
