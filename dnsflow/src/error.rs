use std::fmt;

/// Bad CLI input, a bad destination address, or a PID-file lock that's
/// already held. Fails before any capture begins.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::error::Error for ConfigError {}

/// Interface unavailable, filter failed to compile, dump file unwritable.
#[derive(Debug)]
pub struct InitError(pub String);

impl fmt::Display for InitError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::error::Error for InitError {}

impl From<ConfigError> for String {
	fn from(err: ConfigError) -> Self {
		err.0
	}
}

impl From<InitError> for String {
	fn from(err: InitError) -> Self {
		err.0
	}
}
