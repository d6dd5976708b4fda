pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod sink;
pub mod transform;

pub use error::EtlError;
