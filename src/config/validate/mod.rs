//! Configuration validation
//!
//! Validates generator configurations before any parameter is allocated.

mod error;
mod validator;

#[cfg(test)]
mod tests;

pub use error::ValidationError;
pub use validator::validate_config;
