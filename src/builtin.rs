use std::convert::Infallible;
use std::ffi::CString;
use std::io::{self, BufWriter, Write};
use std::os::fd::BorrowedFd;
use std::path::Path;

use nix::sys::signal::Signal;
use nix::unistd;

use crate::env;
use crate::error::{Result, ShellError};
use crate::job::{self, JobTable};
use crate::session::Session;
use crate::types::Command;

/// Writes straight to descriptor 1, bypassing the buffers a forked child
/// inherits from the shell.
struct StdoutFd;

impl Write for StdoutFd {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let fd = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
		Ok(unistd::write(fd, buf)?)
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

fn run_generic(args: &[String]) -> Result<Infallible> {
	let program = args.first().ok_or(ShellError::EmptyCommand)?;
	let argv = args.iter().map(|a| CString::new(a.as_bytes())).collect::<std::result::Result<Vec<CString>, _>>()?;
	unistd::execvp(argv[0].as_c_str(), &argv).map_err(|source| ShellError::Exec { program: program.clone(), source })
}

pub fn run_echo<W: Write + ?Sized>(out: &mut W, args: &[String]) -> io::Result<()> {
	for arg in args {
		out.write_all(arg.as_bytes())?;
	}
	out.write_all(b"\n")?;
	out.flush()
}

pub fn run_pwd<W: Write + ?Sized>(out: &mut W) -> Result<()> {
	let cwd = env::current_directory()?;
	writeln!(out, "{}", cwd.display())?;
	out.flush()?;
	Ok(())
}

pub fn run_jobs<W: Write + ?Sized>(out: &mut W, jobs: &JobTable) -> io::Result<()> {
	for j in jobs {
		job::print_job(out, j)?;
	}
	out.flush()
}

pub fn run_export(name: &str, value: &str) -> Result<()> {
	env::set_env(name, value)
}

pub fn run_cd(dir: Option<&Path>) -> Result<()> {
	let dir = dir.ok_or(ShellError::MissingDirectory)?;
	let old = env::current_directory()?;
	let new = env::change_directory(dir)?;
	env::set_env(env::PWD, &new.to_string_lossy())?;
	env::set_env(env::OLD_PWD, &old.to_string_lossy())?;
	tracing::debug!(from = %old.display(), to = %new.display(), "changed directory");
	Ok(())
}

/// Unknown job ids are ignored.
pub fn run_kill(jobs: &JobTable, signal: i32, job_id: usize) -> Result<()> {
	let signal = match signal {
		0 => None,
		n => Some(Signal::try_from(n).map_err(|_| ShellError::InvalidSignal(n))?),
	};
	match jobs.find(job_id) {
		Some(j) => j.signal(signal),
		None => tracing::debug!(job = job_id, "kill: no such job"),
	}
	Ok(())
}

/// Child-side half of a command. Returns once a builtin is done; a
/// successful `exec` never returns.
pub fn run_child(session: &Session, cmd: &Command) -> Result<()> {
	let mut out = BufWriter::new(StdoutFd);
	match *cmd {
		Command::Generic { ref args } => match run_generic(args)? {},
		Command::Echo { ref args } => run_echo(&mut out, args)?,
		Command::Pwd => run_pwd(&mut out)?,
		Command::Jobs => run_jobs(&mut out, &session.jobs)?,
		Command::Export { .. } | Command::Cd { .. } | Command::Kill { .. } | Command::Exit | Command::EndOfCommands => {},
	}
	out.flush()?;
	Ok(())
}

/// Shell-side half of a command, for effects that must outlive the child.
pub fn run_parent(session: &mut Session, cmd: &Command) -> Result<()> {
	match *cmd {
		Command::Export { ref name, ref value } => run_export(name, value),
		Command::Cd { ref dir } => run_cd(dir.as_deref()),
		Command::Kill { signal, job } => run_kill(&session.jobs, signal, job),
		Command::Generic { .. } | Command::Echo { .. } | Command::Pwd | Command::Jobs | Command::Exit | Command::EndOfCommands => Ok(()),
	}
}
