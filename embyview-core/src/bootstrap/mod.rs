//! Bootstrap module for wiring embyview from configuration
//!
//! This module handles:
//! - Configuration loading and validation
//! - Client, fetcher and repository construction

pub mod config;
pub mod services;

pub use config::load_config;
pub use services::{init_services, Services};
