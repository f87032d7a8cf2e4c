//! # calc-rpc-core
//!
//! This crate provides the core utilities for `calc-rpc`.
//! It includes the error taxonomy and the client/server configuration shared by the other crates
//! in the workspace.

mod config;
pub use config::*;
pub mod error;
