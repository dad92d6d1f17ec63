use std::path::{Path, PathBuf};

use bitflags::bitflags;

bitflags! {
	/// Per-stage plumbing requested by the parser.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct Flags: u8 {
		const PIPE_IN         = 0b0000_0001;
		const PIPE_OUT        = 0b0000_0010;
		const REDIRECT_IN     = 0b0000_0100;
		const REDIRECT_OUT    = 0b0000_1000;
		const REDIRECT_APPEND = 0b0001_0000;
		const BACKGROUND      = 0b0010_0000;
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// `args[0]` is the program, looked up through `PATH`.
	Generic { args: Vec<String> },
	Echo { args: Vec<String> },
	Export { name: String, value: String },
	Cd { dir: Option<PathBuf> },
	Kill { signal: i32, job: usize },
	Pwd,
	Jobs,
	Exit,
	EndOfCommands,
}

impl Command {
	pub fn name(&self) -> &str {
		match *self {
			Command::Generic { ref args } => args.first().map_or("", String::as_str),
			Command::Echo { .. } => "echo",
			Command::Export { .. } => "export",
			Command::Cd { .. } => "cd",
			Command::Kill { .. } => "kill",
			Command::Pwd => "pwd",
			Command::Jobs => "jobs",
			Command::Exit => "exit",
			Command::EndOfCommands => "<eoc>",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHolder {
	pub cmd: Command,
	pub flags: Flags,
	pub redirect_in: Option<PathBuf>,
	pub redirect_out: Option<PathBuf>,
}

impl CommandHolder {
	pub fn new(cmd: Command) -> CommandHolder {
		CommandHolder { cmd, flags: Flags::empty(), redirect_in: None, redirect_out: None }
	}

	pub fn end() -> CommandHolder {
		CommandHolder::new(Command::EndOfCommands)
	}

	pub fn with_flags(mut self, flags: Flags) -> CommandHolder {
		self.flags |= flags;
		self
	}

	pub fn reading_from<P: AsRef<Path>>(mut self, path: P) -> CommandHolder {
		self.flags |= Flags::REDIRECT_IN;
		self.redirect_in = Some(path.as_ref().to_owned());
		self
	}

	pub fn writing_to<P: AsRef<Path>>(mut self, path: P, append: bool) -> CommandHolder {
		self.flags |= Flags::REDIRECT_OUT;
		if append {
			self.flags |= Flags::REDIRECT_APPEND;
		}
		self.redirect_out = Some(path.as_ref().to_owned());
		self
	}

	pub fn is_end(&self) -> bool {
		self.cmd == Command::EndOfCommands
	}
}

/// One parsed pipeline together with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
	pub holders: Vec<CommandHolder>,
	pub line: String,
}

impl Script {
	/// Appends the `EndOfCommands` marker when the caller left it off.
	pub fn new<S: Into<String>>(line: S, mut holders: Vec<CommandHolder>) -> Script {
		if !holders.last().map_or(false, CommandHolder::is_end) {
			holders.push(CommandHolder::end());
		}
		Script { holders, line: line.into() }
	}

	/// Stages up to, not including, the first `EndOfCommands`.
	pub fn stages(&self) -> impl Iterator<Item = &CommandHolder> {
		self.holders.iter().take_while(|h| !h.is_end())
	}

	pub fn is_exit(&self) -> bool {
		match (self.holders.first(), self.holders.get(1)) {
			(Some(first), Some(second)) => first.cmd == Command::Exit && second.is_end(),
			_ => false,
		}
	}

	pub fn is_background(&self) -> bool {
		self.holders.first().map_or(false, |h| h.flags.contains(Flags::BACKGROUND))
	}
}
