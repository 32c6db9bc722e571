pub mod config;
pub mod cycle;
pub mod error;
pub mod logger;
pub mod market;
pub mod news;
pub mod notify;
pub mod state;
pub mod util;
