pub mod browse;
pub mod catalog;
pub mod config;
pub mod database;
pub mod domain;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod listing;
pub mod output;
pub mod store;
pub mod tui;
pub mod unpack;
