pub mod aggregate;
pub mod cache;
pub mod config;
pub mod detail;
pub mod discover;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod jsonld;
pub mod logging;
pub mod manual;
pub mod server;
pub mod sources;
pub mod text;
pub mod venues;
