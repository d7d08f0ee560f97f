//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Start the HTTP server
//! - quote: Price a job offline
//! - materials: List the material catalog
//! - config: Configuration display and validation

pub mod config;
pub mod materials;
pub mod quote;
pub mod start;
