use std::fmt;
use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

trait WaitStatusExt {
	fn is_terminated(self) -> bool;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			WaitStatus::Stopped(..) | WaitStatus::Continued(..) | WaitStatus::StillAlive => false,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) | WaitStatus::PtraceSyscall(..) => false,
		}
	}
}

/// Non-blocking check; a pid that is no longer our child counts as finished.
fn has_terminated(pid: Pid) -> bool {
	match wait::waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
		Ok(status) => status.is_terminated(),
		Err(Errno::ECHILD) => true,
		Err(e) => {
			tracing::warn!(%pid, error = %e, "waitpid failed during sweep");
			false
		},
	}
}

fn wait_terminated(pid: Pid) {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) if status.is_terminated() => {
				tracing::debug!(%pid, ?status, "reaped");
				return;
			},
			Ok(_) | Err(Errno::EINTR) => continue,
			Err(Errno::ECHILD) => return,
			Err(e) => {
				tracing::warn!(%pid, error = %e, "waitpid failed");
				return;
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
	pub id: usize,
	pub pids: Vec<Pid>,
	/// Last spawned member, shown in listings.
	pub pid: Pid,
	pub cmd: String,
}

impl fmt::Display for Job {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "[{}]\t{}\t{}", self.id, self.pid, self.cmd)
	}
}

impl Job {
	/// Delivers `sig` to every member in spawn order. `None` only checks they exist.
	pub fn signal<S: Into<Option<Signal>> + Copy>(&self, sig: S) {
		for &pid in &self.pids {
			if let Err(e) = signal::kill(pid, sig) {
				tracing::warn!(job = self.id, %pid, error = %e, "kill failed");
			}
		}
	}
}

pub fn print_job<W: Write + ?Sized>(out: &mut W, job: &Job) -> io::Result<()> {
	writeln!(out, "{}", job)?;
	out.flush()
}

pub fn print_job_bg_start<W: Write + ?Sized>(out: &mut W, job: &Job) -> io::Result<()> {
	write!(out, "Background job started: ")?;
	print_job(out, job)
}

pub fn print_job_bg_complete<W: Write + ?Sized>(out: &mut W, job: &Job) -> io::Result<()> {
	write!(out, "Completed: \t")?;
	print_job(out, job)
}

/// Processes spawned so far by the pipeline being launched.
#[derive(Debug, Default)]
pub struct JobBuilder {
	pids: Vec<Pid>,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder { pids: Vec::with_capacity(size_hint) }
	}

	pub fn push(&mut self, pid: Pid) {
		self.pids.push(pid);
	}

	pub fn is_empty(&self) -> bool {
		self.pids.is_empty()
	}

	/// Blocks until every member has been reaped.
	pub fn wait(self) {
		tracing::debug!(count = self.pids.len(), "waiting on foreground pipeline");
		for pid in self.pids {
			wait_terminated(pid);
		}
	}

	fn build(self, id: usize, cmd: String) -> Option<Job> {
		let pid = *self.pids.last()?;
		Some(Job { id, pids: self.pids, pid, cmd })
	}
}

#[derive(Debug)]
pub struct JobTable {
	jobs: Vec<Job>,
	next_id: usize,
}

impl Default for JobTable {
	fn default() -> JobTable {
		JobTable::new()
	}
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable { jobs: Vec::new(), next_id: 1 }
	}

	/// Ids are never reused, even after the job that held one is gone.
	pub fn allocate_id(&mut self) -> usize {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	pub fn append(&mut self, job: Job) {
		debug_assert!(self.find(job.id).is_none(), "job id {} already present", job.id);
		if job.id >= self.next_id {
			self.next_id = job.id + 1;
		}
		self.jobs.push(job);
	}

	/// Turns a launched pipeline into a job. `None` if nothing was spawned.
	pub fn commit(&mut self, builder: JobBuilder, cmd: &str) -> Option<&Job> {
		if builder.is_empty() {
			return None;
		}
		let id = self.allocate_id();
		let job = builder.build(id, cmd.to_string())?;
		tracing::info!(job = id, pid = %job.pid, members = job.pids.len(), "background job committed");
		self.jobs.push(job);
		self.jobs.last()
	}

	pub fn remove(&mut self, id: usize) -> Option<Job> {
		let idx = self.jobs.iter().position(|j| j.id == id)?;
		Some(self.jobs.remove(idx))
	}

	pub fn find(&self, id: usize) -> Option<&Job> {
		self.jobs.iter().find(|j| j.id == id)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Job> {
		self.jobs.iter()
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	/// Reaps finished members without blocking and drops jobs left with none,
	/// announcing each on `out` first. Returns how many jobs completed.
	pub fn sweep<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<usize> {
		let mut done = Vec::new();
		for job in &mut self.jobs {
			job.pids.retain(|&pid| !has_terminated(pid));
			if job.pids.is_empty() {
				done.push(job.id);
			}
		}
		for &id in &done {
			if let Some(job) = self.find(id) {
				tracing::info!(job = id, "background job completed");
				print_job_bg_complete(out, job)?;
			}
			self.remove(id);
		}
		Ok(done.len())
	}
}

impl<'a> IntoIterator for &'a JobTable {
	type Item = &'a Job;
	type IntoIter = std::slice::Iter<'a, Job>;

	fn into_iter(self) -> Self::IntoIter {
		self.jobs.iter()
	}
}
