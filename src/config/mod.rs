//! Generator configuration: schema, YAML loading, validation and CLI types.

mod cli;
mod loader;
mod schema;
mod validate;

pub use cli::{parse_args, Cli, Command, InfoArgs, OutputFormat, SampleArgs, ValidateArgs};
pub use loader::{load_config, parse_config};
pub use schema::{Device, LeakGanConfig, VocabSpec};
pub use validate::{validate_config, ValidationError};
