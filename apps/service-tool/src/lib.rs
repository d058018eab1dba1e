// Library exports for testing
// The binary (main.rs) imports these as well

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;

#[cfg(test)]
mod tests;

/// Directory name under the platform config and data dirs.
pub const APP_DIR_NAME: &str = "service-tool";
