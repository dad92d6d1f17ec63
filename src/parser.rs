use std::path::PathBuf;

use crate::env;
use crate::error::{Result, ShellError};
use crate::types::*;

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

struct RawCommand {
	words: Vec<String>,
	holder_flags: Flags,
	redirect_in: Option<PathBuf>,
	redirect_out: Option<PathBuf>,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<u8> {
		self.line.get(self.i).cloned()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn is_name_char(c: u8) -> bool {
		c == b'_' || c.is_ascii_alphanumeric()
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn expand_variable(&mut self, buf: &mut Vec<u8>) {
		let orig = self.i;
		self.proceed_while(Parser::is_name_char);
		if orig == self.i {
			buf.push(b'$');
			return;
		}
		let name = String::from_utf8_lossy(&self.line[orig .. self.i]);
		if let Some(value) = env::lookup_env(&name) {
			buf.extend_from_slice(value.as_bytes());
		}
	}

	/// Reads one word, resolving quotes and `$NAME`. `None` if no word starts here.
	fn read_word(&mut self) -> Result<Option<String>> {
		let mut buf: Vec<u8> = vec![];
		let mut seen = false;
		while let Some(c) = self.peek() {
			match c {
				b'\'' => {
					self.i += 1;
					let orig = self.i;
					self.proceed_while(|c| c != b'\'');
					if self.peek().is_none() {
						return Err(ShellError::Parse("unterminated single quote".to_string()));
					}
					buf.extend_from_slice(&self.line[orig .. self.i]);
					self.i += 1;
				},
				b'"' => {
					self.i += 1;
					loop {
						match self.peek() {
							None => return Err(ShellError::Parse("unterminated double quote".to_string())),
							Some(b'"') => { self.i += 1; break; },
							Some(b'$') => { self.i += 1; self.expand_variable(&mut buf); },
							Some(c) => { buf.push(c); self.i += 1; },
						}
					}
				},
				b'$' => {
					self.i += 1;
					self.expand_variable(&mut buf);
				},
				c if Parser::is_letter(c) => {
					buf.push(c);
					self.i += 1;
				},
				_ => break,
			}
			seen = true;
		}
		if !seen {
			return Ok(None);
		}
		String::from_utf8(buf).map(Some).map_err(|e| ShellError::Parse(e.to_string()))
	}

	fn read_target(&mut self) -> Result<PathBuf> {
		self.skip_whitespaces();
		match self.read_word()? {
			Some(word) if !word.is_empty() => Ok(PathBuf::from(word)),
			_ => Err(ShellError::Parse("empty redirect".to_string())),
		}
	}

	fn parse_command(&mut self) -> Result<RawCommand> {
		let mut cmd = RawCommand { words: vec![], holder_flags: Flags::empty(), redirect_in: None, redirect_out: None };
		loop {
			self.skip_whitespaces();
			match self.peek() {
				Some(b'<') => {
					self.i += 1;
					cmd.redirect_in = Some(self.read_target()?);
					cmd.holder_flags |= Flags::REDIRECT_IN;
				},
				Some(b'>') => {
					self.i += 1;
					cmd.holder_flags.remove(Flags::REDIRECT_APPEND);
					if self.peek() == Some(b'>') {
						self.i += 1;
						cmd.holder_flags |= Flags::REDIRECT_APPEND;
					}
					cmd.redirect_out = Some(self.read_target()?);
					cmd.holder_flags |= Flags::REDIRECT_OUT;
				},
				_ => match self.read_word()? {
					Some(word) => cmd.words.push(word),
					None => break,
				},
			}
		}
		if cmd.words.is_empty() {
			return Err(ShellError::Parse("empty command".to_string()));
		}
		Ok(cmd)
	}

	fn parse_pipeline(&mut self) -> Result<(Vec<RawCommand>, bool)> {
		let mut commands = vec![];
		let mut is_background = false;
		loop {
			commands.push(self.parse_command()?);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					is_background = true;
					self.skip_whitespaces();
					if let Some(c) = self.peek() {
						return Err(ShellError::Parse(format!("character after '&': '{}'", c as char)));
					}
					break;
				},
				Some(c) => return Err(ShellError::Parse(format!("unknown command separator: '{}'", c as char))),
				None => break,
			}
		}
		Ok((commands, is_background))
	}
}

fn parse_number<T: std::str::FromStr>(word: Option<&String>, what: &str) -> Result<T> {
	let word = word.ok_or_else(|| ShellError::Parse(format!("kill: missing {}", what)))?;
	let digits = word.trim_start_matches(|c: char| c == '-' || c == '%');
	digits.parse().map_err(|_| ShellError::Parse(format!("kill: bad {} '{}'", what, word)))
}

fn resolve(mut words: Vec<String>) -> Result<Command> {
	let name = words[0].clone();
	let cmd = match name.as_str() {
		"echo" => {
			// Echo joins its arguments as-is, so keep the blanks between words.
			let args = words.drain(1 ..).enumerate()
				.map(|(n, w)| if n == 0 { w } else { format!(" {}", w) })
				.collect();
			Command::Echo { args }
		},
		"export" => {
			let assignment = words.get(1).ok_or_else(|| ShellError::Parse("export: missing NAME=VALUE".to_string()))?;
			let (name, value) = assignment.split_once('=')
				.ok_or_else(|| ShellError::Parse(format!("export: expected NAME=VALUE, got '{}'", assignment)))?;
			Command::Export { name: name.to_string(), value: value.to_string() }
		},
		"cd" => {
			let dir = words.get(1).cloned().or_else(|| env::lookup_env(env::HOME));
			Command::Cd { dir: dir.map(PathBuf::from) }
		},
		"kill" => Command::Kill {
			signal: parse_number(words.get(1), "signal")?,
			job: parse_number(words.get(2), "job id")?,
		},
		"pwd" => Command::Pwd,
		"jobs" => Command::Jobs,
		"exit" | "quit" => Command::Exit,
		_ => Command::Generic { args: words },
	};
	Ok(cmd)
}

/// Parses one input line. Blank lines give `None`.
pub fn parse(line: &str) -> Result<Option<Script>> {
	let text = line.trim();
	if text.is_empty() {
		return Ok(None);
	}

	let mut parser = Parser { line: text.as_bytes(), i: 0 };
	let (commands, is_background) = parser.parse_pipeline()?;

	let last = commands.len() - 1;
	let mut holders = Vec::with_capacity(commands.len() + 1);
	for (n, raw) in commands.into_iter().enumerate() {
		let mut flags = raw.holder_flags;
		if n > 0 {
			flags |= Flags::PIPE_IN;
		}
		if n < last {
			flags |= Flags::PIPE_OUT;
		}
		if is_background {
			flags |= Flags::BACKGROUND;
		}
		holders.push(CommandHolder {
			cmd: resolve(raw.words)?,
			flags,
			redirect_in: raw.redirect_in,
			redirect_out: raw.redirect_out,
		});
	}
	Ok(Some(Script::new(text, holders)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_ok(line: &str) -> Script {
		parse(line).unwrap().unwrap()
	}

	fn generic(words: &[&str]) -> Command {
		Command::Generic { args: words.iter().map(|s| s.to_string()).collect() }
	}

	#[test]
	fn blank_line_is_nothing() {
		assert!(parse("   \n").unwrap().is_none());
	}

	#[test]
	fn pipeline_flags() {
		let script = parse_ok("cat a | grep x | wc -l\n");
		assert_eq!(script.line, "cat a | grep x | wc -l");
		let stages: Vec<&CommandHolder> = script.stages().collect();
		assert_eq!(stages.len(), 3);
		assert_eq!(stages[0].flags, Flags::PIPE_OUT);
		assert_eq!(stages[1].flags, Flags::PIPE_IN | Flags::PIPE_OUT);
		assert_eq!(stages[2].flags, Flags::PIPE_IN);
		assert_eq!(stages[2].cmd, generic(&["wc", "-l"]));
		assert!(script.holders.last().unwrap().is_end());
	}

	#[test]
	fn redirections_and_background() {
		let script = parse_ok("sort < in.txt >> out.txt &");
		assert!(script.is_background());
		let h = &script.holders[0];
		assert_eq!(h.flags, Flags::REDIRECT_IN | Flags::REDIRECT_OUT | Flags::REDIRECT_APPEND | Flags::BACKGROUND);
		assert_eq!(h.redirect_in, Some(PathBuf::from("in.txt")));
		assert_eq!(h.redirect_out, Some(PathBuf::from("out.txt")));

		let h = &parse_ok("ls >out").holders[0];
		assert_eq!(h.flags, Flags::REDIRECT_OUT);
	}

	#[test]
	fn builtins_resolve() {
		assert_eq!(parse_ok("pwd").holders[0].cmd, Command::Pwd);
		assert_eq!(parse_ok("jobs").holders[0].cmd, Command::Jobs);
		assert!(parse_ok("quit").is_exit());
		assert!(parse_ok("exit").is_exit());
		assert_eq!(parse_ok("kill 9 %2").holders[0].cmd, Command::Kill { signal: 9, job: 2 });
		assert_eq!(parse_ok("kill -15 3").holders[0].cmd, Command::Kill { signal: 15, job: 3 });
		assert_eq!(
			parse_ok("export GREETING=hello=world").holders[0].cmd,
			Command::Export { name: "GREETING".into(), value: "hello=world".into() }
		);
		assert_eq!(parse_ok("cd /tmp").holders[0].cmd, Command::Cd { dir: Some(PathBuf::from("/tmp")) });
	}

	#[test]
	fn echo_keeps_word_separation() {
		assert_eq!(
			parse_ok("echo hello   big 'wide world'").holders[0].cmd,
			Command::Echo { args: vec!["hello".into(), " big".into(), " wide world".into()] }
		);
	}

	#[test]
	fn variables_expand_outside_single_quotes() {
		env::set_env("QUASH_PARSER_VAR", "value").unwrap();
		let script = parse_ok("printf $QUASH_PARSER_VAR \"[$QUASH_PARSER_VAR]\" '$QUASH_PARSER_VAR' $ $QUASH_PARSER_UNSET_987");
		assert_eq!(
			script.holders[0].cmd,
			generic(&["printf", "value", "[value]", "$QUASH_PARSER_VAR", "$", ""])
		);
	}

	#[test]
	fn syntax_errors() {
		assert!(matches!(parse("| wc"), Err(ShellError::Parse(_))));
		assert!(matches!(parse("ls >"), Err(ShellError::Parse(_))));
		assert!(matches!(parse("sleep 1 & ls"), Err(ShellError::Parse(_))));
		assert!(matches!(parse("echo 'open"), Err(ShellError::Parse(_))));
		assert!(matches!(parse("export NOEQUALS"), Err(ShellError::Parse(_))));
		assert!(matches!(parse("kill 9"), Err(ShellError::Parse(_))));
	}
}
