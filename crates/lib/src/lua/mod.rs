//! Lua evaluation shared by the config loader and the plugin runner.
//!
//! - [`runtime`] - Lua VM construction and file loading

pub mod runtime;
