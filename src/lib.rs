//! Scanner session orchestration for the Arcai desktop client
//!
//! The [`scanner`] module drives an external console scan tool: scanner
//! discovery, feeder-with-flatbed-fallback scan attempts, vendor popup
//! suppression and cancellation. [`app`] is the command-line front end.

pub mod app;
pub mod core;
pub mod scanner;
