pub mod buffers;
pub mod config;
pub mod error;
pub mod kernel;
pub mod traits;
pub mod types;
