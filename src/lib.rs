//! `cdp-download` command line front end.
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod metrics;
