pub mod app;
pub mod browse;
pub mod cache;
pub mod cli;
pub mod config;
pub mod countries;
pub mod logging;
pub mod saved;
pub mod state;
pub mod sync;
pub mod upstream;
pub mod utils;
pub mod web;
