// ABOUTME: Validated application name used as the revision prefix.
// ABOUTME: Restricts names to characters every supported platform accepts.

use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplicationNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("application name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("invalid character in application name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationName(String);

impl ApplicationName {
    pub fn new(value: &str) -> Result<Self, ApplicationNameError> {
        if value.is_empty() {
            return Err(ApplicationNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(ApplicationNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ApplicationNameError::StartsWithHyphen);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(ApplicationNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
