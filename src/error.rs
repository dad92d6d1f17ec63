use std::io::{self, Write};
use std::path::PathBuf;
use std::{ffi, string};

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
	#[error("Failed to create process: {0}")]
	Fork(#[source] nix::Error),
	#[error("Failed to open pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("stage {0} reads from a pipe that was never opened")]
	MissingPipe(usize),
	#[error("Failed to execute program {program}: {source}")]
	Exec {
		program: String,
		#[source]
		source: nix::Error,
	},
	#[error("no program given")]
	EmptyCommand,
	#[error("Failed to redirect {}: {source}", path.display())]
	Redirect {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("redirection requested without a file")]
	MissingRedirectTarget,
	#[error("Failed to resolve path")]
	MissingDirectory,
	#[error("Failed to change directory to {}: {source}", path.display())]
	InvalidDirectory {
		path: PathBuf,
		#[source]
		source: nix::Error,
	},
	#[error("invalid signal number {0}")]
	InvalidSignal(i32),
	#[error("invalid variable assignment {0:?}")]
	InvalidVariable(String),
	#[error("syntax error: {0}")]
	Parse(String),
	#[error("input is not valid UTF-8: {0}")]
	Encoding(#[from] string::FromUtf8Error),
	#[error("Nix error: {0}")]
	Nix(#[from] nix::Error),
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
	#[error("Nul char error: {0}")]
	Nul(#[from] ffi::NulError),
}

pub type Result<T> = std::result::Result<T, ShellError>;

impl ShellError {
	/// Status a child exits with when this error ends it.
	pub fn exit_code(&self) -> i32 {
		match *self {
			ShellError::Exec { source: Errno::ENOENT, .. } => 127,
			_ => 126,
		}
	}
}

/// Unbuffered so it stays usable between `fork` and `_exit`.
pub fn report(err: &ShellError) {
	let _ = writeln!(&mut io::stderr(), "ERROR: {}", err);
}
