//! Accessors for the environment and working directory of the shell process.

use std::env;
use std::path::{Path, PathBuf};

use nix::unistd;

use crate::error::{Result, ShellError};

pub const PWD: &str = "PWD";
pub const OLD_PWD: &str = "OLD_PWD";
pub const HOME: &str = "HOME";

pub fn lookup_env(name: &str) -> Option<String> {
	env::var(name).ok()
}

/// Overwrites any existing value.
pub fn set_env(name: &str, value: &str) -> Result<()> {
	if name.is_empty() || name.contains('=') || name.contains('\0') || value.contains('\0') {
		return Err(ShellError::InvalidVariable(format!("{}={}", name, value)));
	}
	env::set_var(name, value);
	Ok(())
}

pub fn current_directory() -> Result<PathBuf> {
	Ok(unistd::getcwd()?)
}

/// Returns the new working directory on success and leaves it untouched on failure.
pub fn change_directory(path: &Path) -> Result<PathBuf> {
	unistd::chdir(path).map_err(|source| ShellError::InvalidDirectory { path: path.to_owned(), source })?;
	current_directory()
}
