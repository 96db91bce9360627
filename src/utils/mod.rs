pub mod config;
pub mod logger;
pub mod output_dir;
pub(crate) mod porewatch_toml;

pub use config::*;
pub use logger::{LogRole, notice, setup_logging, setup_logging_as};
pub use output_dir::{clear_dir, prepare_output_dir};
