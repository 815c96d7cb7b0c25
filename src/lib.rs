pub mod args;
pub mod config;
pub mod encoder;
pub mod error;
pub mod filename;
pub mod logging;
pub mod metadata;
pub mod processor;
pub mod verify;
