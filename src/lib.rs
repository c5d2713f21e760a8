pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod files;
pub mod keys;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod storage;
