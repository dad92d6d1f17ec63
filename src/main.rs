use std::io::{self, BufRead, IsTerminal, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quash::{env, error, parser, run_pipeline, Session, ShellError};

const LOG_ENV: &str = "QUASH_LOG";

#[derive(Parser, Debug)]
#[command(name = "quash", version, about = "Quite a shell")]
struct Args {
	/// Run a single command line and exit
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	command: Option<String>,

	/// Do not print the welcome banner
	#[arg(long)]
	quiet: bool,

	/// Log filter used when QUASH_LOG is unset
	#[arg(long, default_value = "warn", value_name = "FILTER")]
	log_level: String,
}

fn init_tracing(fallback: &str) {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();
}

fn print_prompt() -> io::Result<()> {
	let cwd = env::current_directory().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
	let dir = match cwd.rfind('/') {
		Some(idx) => &cwd[idx + 1 ..],
		None => &cwd[..],
	};
	let mut stdout = io::stdout();
	write!(
		stdout,
		"[QUASH - {}@{} {}]$ ",
		env::lookup_env("USER").unwrap_or_default(),
		env::lookup_env("HOSTNAME").unwrap_or_default(),
		dir
	)?;
	stdout.flush()
}

fn run_line(session: &mut Session, line: &str) {
	match parser::parse(line) {
		Ok(Some(script)) => run_pipeline(session, &script),
		Ok(None) => session.check_jobs(),
		Err(e) => {
			error::report(&e);
			session.check_jobs();
		},
	}
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	init_tracing(&args.log_level);

	let mut session = Session::new();

	if let Some(line) = args.command {
		run_line(&mut session, &line);
		return Ok(());
	}

	let interactive = io::stdin().is_terminal();
	if interactive && !args.quiet {
		println!("Welcome to Quash!");
		println!("Type \"exit\" or \"quit\" to quit");
		println!("---------------------------------");
	}

	let stdin = io::stdin();
	let mut input = stdin.lock();
	while session.is_running() {
		if interactive {
			print_prompt()?;
		}
		let mut line: Vec<u8> = vec![];
		match input.read_until(b'\n', &mut line) {
			Ok(0) => break,
			Ok(_) => {},
			Err(e) => {
				// A broken stdin will not recover; stop like on end of input.
				error::report(&ShellError::Io(e));
				break;
			},
		}
		match String::from_utf8(line) {
			Ok(line) => run_line(&mut session, &line),
			Err(e) => {
				error::report(&ShellError::Encoding(e));
				session.check_jobs();
			},
		}
	}
	tracing::debug!(jobs = session.jobs.len(), "main loop finished");
	Ok(())
}
