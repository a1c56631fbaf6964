pub mod app;
pub mod config;
pub mod context;
pub mod env;
pub mod fetch;
pub mod output;
pub mod runtime;
