#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::rc::Rc;
use std::thread::sleep;
use std::time::Duration;

use quash::{Command, Session};

/// Memory-backed writer standing in for the shell's stdout.
pub struct MemWriter {
	buf: Rc<RefCell<Vec<u8>>>,
}

impl Write for MemWriter {
	fn write(&mut self, data: &[u8]) -> IoResult<usize> {
		self.buf.borrow_mut().extend_from_slice(data);
		Ok(data.len())
	}

	fn flush(&mut self) -> IoResult<()> {
		Ok(())
	}
}

pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
	pub fn text(&self) -> String {
		String::from_utf8(self.0.borrow().clone()).unwrap()
	}
}

pub fn capture_session() -> (Session, Captured) {
	let buf = Rc::new(RefCell::new(Vec::new()));
	let session = Session::with_output(Box::new(MemWriter { buf: buf.clone() }));
	(session, Captured(buf))
}

pub fn generic(words: &[&str]) -> Command {
	Command::Generic { args: words.iter().map(|s| s.to_string()).collect() }
}

pub fn echo(words: &[&str]) -> Command {
	Command::Echo { args: words.iter().map(|s| s.to_string()).collect() }
}

/// Sweeps until the job table drains, failing after a few seconds.
pub fn sweep_until_empty(session: &mut Session) {
	for _ in 0..500 {
		session.check_jobs();
		if session.jobs.is_empty() {
			return;
		}
		sleep(Duration::from_millis(10));
	}
	panic!("background jobs never completed: {:?}", session.jobs.iter().collect::<Vec<_>>());
}
