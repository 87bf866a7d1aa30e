//! Exporter configuration
//!
//! All settings come from command-line flags, each overridable by an
//! environment variable derived from the flag name (see the `Args` struct
//! in `main.rs`). There is no config file.

mod defaults;
mod types;
mod validation;

pub use defaults::*;
pub use types::Config;
