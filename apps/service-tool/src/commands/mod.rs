//! Entry points behind each subcommand.

pub mod control_point;
pub mod device;

pub use control_point::run_control_point;
pub use device::{ServeOptions, ServeReport, drive_control_point, serve};
