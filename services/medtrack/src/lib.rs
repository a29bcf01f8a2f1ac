pub mod adapters;
pub mod assistant;
pub mod config;
pub mod error;
pub mod history;
pub mod state;
pub mod storage;
