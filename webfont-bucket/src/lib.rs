pub mod cli;
pub mod load_config;
pub mod s3;

pub use cli::{run, Cli, Commands};
