//! Shared building blocks for the service tool workspace.
//!
//! Every error type in the workspace records where it was raised. This crate
//! owns that location type so `link-core` and the `service-tool` app agree on
//! its shape and rendering.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
