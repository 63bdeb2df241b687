use std::io;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ish::eval::{self, EvalError, EvalResult};
use ish::global;
use ish::parser;

#[derive(Debug, Parser)]
#[command(name = "ish", version, about = "A small command shell")]
struct Args {
	/// Run a single command line and exit with its status
	#[arg(short, long, value_name = "LINE")]
	command: Option<String>,

	#[arg(long, default_value = "ish> ")]
	prompt: String,
}

const EXIT: &str = "exit";

fn run_line(state: &mut global::State, line: &str) -> i32 {
	let (line, background) = parser::split_background(line);
	match eval::eval(state, line, background) {
		Ok(EvalResult::Done { status, .. }) => status,
		Ok(EvalResult::Running(pids)) => {
			for pid in pids {
				println!("Background process with PID {} started.", pid);
			}
			0
		},
		Err(e) => {
			eprintln!("ish: {}", e);
			match e {
				EvalError::Parse(_) => 2,
				_ => 1,
			}
		},
	}
}

fn repl(state: &mut global::State, prompt: &str) -> Result<()> {
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		stdout.write_all(prompt.as_bytes())?;
		stdout.flush()?;
		let mut line = String::new();
		let n = stdin_locked.read_line(&mut line).context("reading command line")?;
		if n == 0 {
			break;
		}
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}
		if trimmed == EXIT {
			break;
		}
		run_line(state, trimmed);
	}
	Ok(())
}

fn main() -> ExitCode {
	let filter = EnvFilter::try_from_env("ISH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();

	let args = Args::parse();
	let mut state = global::State::new();

	if let Some(line) = args.command {
		let s = run_line(&mut state, &line);
		return ExitCode::from((s & 0xff) as u8);
	}

	match repl(&mut state, &args.prompt) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("ish: {:#}", e);
			ExitCode::FAILURE
		},
	}
}
