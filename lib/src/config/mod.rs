//! Print configuration.

mod print_config;

pub use print_config::{InfillPattern, PrintConfig, SupportKind};
