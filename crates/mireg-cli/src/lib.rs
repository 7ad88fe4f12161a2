//! Support code for the `mireg` binary: configuration files and the
//! multi-image display model.

pub mod config;
pub mod display;

pub use config::load_registration_config;
pub use display::{DisplayError, MultiImageDisplay, Panel, WindowLevel};
