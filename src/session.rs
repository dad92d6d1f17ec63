use std::io::{self, Write};

use crate::job::JobTable;

/// Shell-process state shared by the orchestrator and the dispatcher.
pub struct Session {
	pub jobs: JobTable,
	running: bool,
	out: Box<dyn Write>,
}

impl Default for Session {
	fn default() -> Session {
		Session::new()
	}
}

impl Session {
	pub fn new() -> Session {
		Session::with_output(Box::new(io::stdout()))
	}

	/// Job notifications go to `out` instead of stdout.
	pub fn with_output(out: Box<dyn Write>) -> Session {
		Session { jobs: JobTable::new(), running: true, out }
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn end_main_loop(&mut self) {
		self.running = false;
	}

	pub fn out(&mut self) -> &mut dyn Write {
		&mut *self.out
	}

	/// Background completion sweep; never blocks.
	pub fn check_jobs(&mut self) {
		if let Err(e) = self.jobs.sweep(&mut *self.out) {
			tracing::warn!(error = %e, "failed to report completed jobs");
		}
	}
}
