pub mod config;
pub mod download;
mod error;
pub mod fetch;
pub mod generic;
pub mod handler;
pub mod log;
pub mod paths;
pub mod rank;
pub mod site;
pub mod throttle;
pub mod urls;
pub mod workspace;

pub use error::{ExtractError, Result, ScrapeError, TransportError};
