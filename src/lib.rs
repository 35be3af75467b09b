pub mod api;
pub mod codec;
pub mod config;
pub mod doc;
pub mod error;
pub mod game;
pub mod registry;
pub mod repo;
pub mod resolver;
pub mod types;

pub use types::*;
