//! Test modules for the scanner system
//!
//! Component-level tests driven through the fake process runner in
//! `helpers`.

pub mod helpers;

mod coordinator;
mod lister;
