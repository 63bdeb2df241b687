use std::io;
use std::io::Write;

use nix::unistd::Pid;

use crate::global;
use crate::job::JobState;

pub type Builtin = fn(&mut global::State, &[String]) -> i32;

pub fn write_jobs<W: Write>(out: &mut W, report: &[(Pid, JobState)]) -> io::Result<()> {
	writeln!(out, "Running background processes:")?;
	for &(pid, state) in report {
		writeln!(out, "PID: {}   Status: {}", pid, state)?;
	}
	Ok(())
}

pub fn builtin_jobs(state: &mut global::State, _: &[String]) -> i32 {
	let report = state.registry.report_all();
	let stdout = io::stdout();
	let mut out = stdout.lock();
	match write_jobs(&mut out, &report).and_then(|_| out.flush()) {
		Ok(()) => 0,
		Err(_) => 1,
	}
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"myjobs" | "jobs" => Some(builtin_jobs),
		_ => None,
	}
}
