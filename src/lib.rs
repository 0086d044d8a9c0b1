pub mod aws_cli;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod sso_config;
pub mod workflow;
