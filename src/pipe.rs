use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd;

/// A pipe whose ends close on drop and never leak across `exec`.
#[derive(Debug)]
pub struct Pipe {
	read: OwnedFd,
	write: Option<OwnedFd>,
}

impl Pipe {
	pub fn open() -> nix::Result<Pipe> {
		let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
		Ok(Pipe { read, write: Some(write) })
	}

	pub fn read_fd(&self) -> RawFd {
		self.read.as_raw_fd()
	}

	pub fn write_fd(&self) -> Option<RawFd> {
		self.write.as_ref().map(AsRawFd::as_raw_fd)
	}

	pub fn close_write(&mut self) {
		self.write = None;
	}
}

/// Two pipe slots used alternately by consecutive stages.
///
/// Stage `i` writes into slot `i mod 2` and reads from slot `(i - 1) mod 2`,
/// so no more than two pipes are ever open however long the pipeline is.
#[derive(Debug, Default)]
pub struct PipeRing {
	slots: [Option<Pipe>; 2],
}

impl PipeRing {
	pub fn new() -> PipeRing {
		PipeRing::default()
	}

	fn prev_index(position: usize) -> usize {
		(position + 1) % 2
	}

	fn next_index(position: usize) -> usize {
		position % 2
	}

	pub fn open_next(&mut self, position: usize) -> nix::Result<&mut Pipe> {
		let pipe = Pipe::open()?;
		Ok(self.slots[PipeRing::next_index(position)].insert(pipe))
	}

	pub fn previous(&self, position: usize) -> Option<&Pipe> {
		if position == 0 {
			return None;
		}
		self.slots[PipeRing::prev_index(position)].as_ref()
	}

	pub fn next(&self, position: usize) -> Option<&Pipe> {
		self.slots[PipeRing::next_index(position)].as_ref()
	}

	pub fn next_mut(&mut self, position: usize) -> Option<&mut Pipe> {
		self.slots[PipeRing::next_index(position)].as_mut()
	}

	/// Drops the pipe stage `position` read from.
	pub fn release_previous(&mut self, position: usize) -> Option<Pipe> {
		if position == 0 {
			return None;
		}
		self.slots[PipeRing::prev_index(position)].take()
	}

	#[cfg(test)]
	fn open_count(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;
	use std::io::{Read, Write};
	use std::os::fd::FromRawFd;

	#[test]
	fn stages_alternate_slots() {
		let mut ring = PipeRing::new();
		assert!(ring.previous(0).is_none());

		let first = ring.open_next(0).unwrap().read_fd();
		assert_eq!(ring.previous(1).map(Pipe::read_fd), Some(first));

		let second = ring.open_next(1).unwrap().read_fd();
		assert_eq!(ring.open_count(), 2);
		assert_eq!(ring.previous(2).map(Pipe::read_fd), Some(second));
		assert_eq!(ring.next(2).map(Pipe::read_fd), Some(first));

		assert!(ring.release_previous(1).is_some());
		assert_eq!(ring.open_count(), 1);
		assert!(ring.next(2).is_none());
	}

	#[test]
	fn closing_write_end_signals_eof() {
		let mut ring = PipeRing::new();
		let pipe = ring.open_next(0).unwrap();
		let write_fd = pipe.write_fd().unwrap();
		// Borrow the write end through a File without taking ownership of it.
		let mut writer = std::mem::ManuallyDrop::new(unsafe { File::from_raw_fd(write_fd) });
		writer.write_all(b"through the ring").unwrap();
		pipe.close_write();
		assert!(pipe.write_fd().is_none());

		let read_fd = ring.previous(1).unwrap().read_fd();
		let mut reader = std::mem::ManuallyDrop::new(unsafe { File::from_raw_fd(read_fd) });
		let mut got = String::new();
		reader.read_to_string(&mut got).unwrap();
		assert_eq!(got, "through the ring");
	}
}
