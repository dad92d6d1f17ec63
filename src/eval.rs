use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult, Pid};

use crate::builtin;
use crate::error::{self, Result, ShellError};
use crate::job::{self, JobBuilder};
use crate::pipe::PipeRing;
use crate::session::Session;
use crate::types::{CommandHolder, Flags, Script};

fn redirect(path: Option<&Path>, options: &OpenOptions, target: RawFd) -> Result<()> {
	let path = path.ok_or(ShellError::MissingRedirectTarget)?;
	let file = options.open(path).map_err(|source| ShellError::Redirect { path: path.to_owned(), source })?;
	unistd::dup2(file.as_raw_fd(), target)?;
	Ok(())
}

// Runs in the child. Owned descriptors here are never dropped since the
// child leaves through `_exit`, so the raw ones are closed by hand.
fn exec_command(session: &Session, pipes: &PipeRing, holder: &CommandHolder, position: usize) -> Result<()> {
	let flags = holder.flags;

	if flags.contains(Flags::PIPE_IN) {
		let fd = pipes.previous(position).ok_or(ShellError::MissingPipe(position))?.read_fd();
		unistd::dup2(fd, libc::STDIN_FILENO)?;
		unistd::close(fd)?;
	}
	if flags.contains(Flags::PIPE_OUT) {
		let fd = pipes.next(position).and_then(|p| p.write_fd()).ok_or(ShellError::MissingPipe(position))?;
		unistd::dup2(fd, libc::STDOUT_FILENO)?;
		unistd::close(fd)?;
	}
	if flags.contains(Flags::REDIRECT_IN) {
		redirect(holder.redirect_in.as_deref(), OpenOptions::new().read(true), libc::STDIN_FILENO)?;
	}
	if flags.contains(Flags::REDIRECT_OUT) {
		let mut options = OpenOptions::new();
		if flags.contains(Flags::REDIRECT_APPEND) {
			options.append(true).create(true);
		} else {
			options.write(true).create(true).truncate(true);
		}
		redirect(holder.redirect_out.as_deref(), &options, libc::STDOUT_FILENO)?;
	}

	builtin::run_child(session, &holder.cmd)
}

fn child_process(session: &Session, pipes: &PipeRing, holder: &CommandHolder, position: usize) -> ! {
	// The Rust runtime starts with SIGPIPE ignored, which fork and exec keep.
	if let Err(e) = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
		error::report(&ShellError::Nix(e));
	}
	let status = match exec_command(session, pipes, holder, position) {
		Ok(()) => 0,
		Err(e) => {
			error::report(&e);
			e.exit_code()
		},
	};
	unsafe { libc::_exit(status) }
}

/// Creates the process for one stage, wiring it into the pipe chain.
pub fn launch(session: &mut Session, pipes: &mut PipeRing, holder: &CommandHolder, position: usize) -> Result<Pid> {
	let flags = holder.flags;
	if flags.contains(Flags::PIPE_IN) && pipes.previous(position).is_none() {
		return Err(ShellError::MissingPipe(position));
	}
	if flags.contains(Flags::PIPE_OUT) {
		pipes.open_next(position).map_err(ShellError::Pipe)?;
	}

	// Nothing buffered may be pending when the address space is copied.
	session.out().flush()?;
	io::stdout().flush()?;

	match unsafe { unistd::fork() }.map_err(ShellError::Fork)? {
		ForkResult::Child => child_process(session, pipes, holder, position),
		ForkResult::Parent { child } => {
			tracing::debug!(pid = %child, position, command = holder.cmd.name(), "spawned");
			if flags.contains(Flags::PIPE_OUT) {
				if let Some(pipe) = pipes.next_mut(position) {
					pipe.close_write();
				}
			}
			if flags.contains(Flags::PIPE_IN) {
				pipes.release_previous(position);
			}
			if let Err(e) = builtin::run_parent(session, &holder.cmd) {
				error::report(&e);
			}
			Ok(child)
		},
	}
}

/// Runs one parsed pipeline to completion, or registers it as a background job.
pub fn run_pipeline(session: &mut Session, script: &Script) {
	session.check_jobs();

	if script.is_exit() {
		session.end_main_loop();
		return;
	}

	let mut pending = JobBuilder::new(script.holders.len());
	let mut pipes = PipeRing::new();
	for (position, holder) in script.stages().enumerate() {
		match launch(session, &mut pipes, holder, position) {
			Ok(pid) => pending.push(pid),
			Err(e) => {
				error::report(&e);
				break;
			},
		}
	}
	// A reader left holding an unread pipe must not stall the wait below.
	drop(pipes);

	if pending.is_empty() {
		return;
	}
	if !script.is_background() {
		pending.wait();
		return;
	}

	let started = session.jobs.commit(pending, &script.line).cloned();
	if let Some(j) = started {
		if let Err(e) = job::print_job_bg_start(session.out(), &j) {
			tracing::warn!(error = %e, "failed to announce background job");
		}
	}
}
