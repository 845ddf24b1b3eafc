pub mod api;
pub mod client;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod game;
pub mod models;
pub mod services;
