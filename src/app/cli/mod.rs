//! Command-line parsing, configuration and display

pub mod args;
pub mod config;
pub mod display;

#[cfg(test)]
mod tests;
