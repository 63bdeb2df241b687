use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::io;
use std::io::Write;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, warn};

use crate::builtin;
use crate::global;
use crate::job::WaitStatusExt;
use crate::parser::{self, ParseError};
use crate::pipe::{self, PipeTable, StageIo, Wire};
use crate::types::*;

const REDIRECT_FAILED: i32 = 1;
const NOT_EXECUTABLE: i32 = 126;
const NOT_FOUND: i32 = 127;

#[derive(Debug, Error)]
pub enum EvalError {
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("cannot fork for {program}: {source}")]
	Spawn { program: String, source: nix::Error },
}

/// Failures inside a forked stage. They end that process only.
#[derive(Debug, Error)]
enum StageError {
	#[error("{}: {}", .path.to_string_lossy(), .source)]
	Redirection { path: CString, source: nix::Error },
	#[error("{}: command not found", .program.to_string_lossy())]
	NotFound { program: CString },
	#[error("{}: {}", .program.to_string_lossy(), .source)]
	Exec { program: CString, source: nix::Error },
	#[error("cannot duplicate descriptor: {0}")]
	Dup(#[source] nix::Error),
}

impl StageError {
	fn exit_status(&self) -> i32 {
		match *self {
			StageError::Redirection { .. } | StageError::Dup(_) => REDIRECT_FAILED,
			StageError::NotFound { .. } => NOT_FOUND,
			StageError::Exec { .. } => NOT_EXECUTABLE,
		}
	}
}

/// A stage converted to C strings before forking, so the child only has to
/// wire descriptors and exec.
struct Invocation {
	program: CString,
	argv: Vec<CString>,
	target: Option<CString>,
}

impl Invocation {
	fn new(stage: &Stage) -> Result<Invocation, ParseError> {
		let cstring = |s: &str| CString::new(s).map_err(|_| ParseError::NulByte);
		let program = cstring(stage.program.as_str())?;
		let mut argv = Vec::with_capacity(stage.arguments.len() + 1);
		argv.push(program.clone());
		for argument in &stage.arguments {
			argv.push(cstring(argument.as_str())?);
		}
		let target = match stage.redirect {
			Redirect::None => None,
			Redirect::InputFrom(ref path) | Redirect::OutputTo(ref path) => Some(cstring(path.as_str())?),
		};
		Ok(Invocation { program: program, argv: argv, target: target })
	}
}

fn dup_onto(fd: RawFd, std_fd: RawFd) -> Result<(), StageError> {
	unistd::dup2(fd, std_fd).map_err(StageError::Dup)?;
	Ok(())
}

fn open_onto(path: &CStr, flags: OFlag, std_fd: RawFd) -> Result<(), StageError> {
	let fd = fcntl::open(path, flags, Mode::from_bits_truncate(0o666))
		.map_err(|e| StageError::Redirection { path: path.to_owned(), source: e })?;
	if fd != std_fd {
		dup_onto(fd, std_fd)?;
		let _ = unistd::close(fd);
	}
	Ok(())
}

fn do_exec_stage(invocation: &Invocation, wiring: StageIo, pipes: PipeTable) -> Result<Infallible, StageError> {
	let target = invocation.target.as_deref();
	match (wiring.stdin, target) {
		(Wire::Pipe(i), _) => dup_onto(pipes.read_end(i), libc::STDIN_FILENO)?,
		(Wire::File, Some(path)) => open_onto(path, OFlag::O_RDONLY, libc::STDIN_FILENO)?,
		_ => {},
	}
	match (wiring.stdout, target) {
		(Wire::Pipe(i), _) => dup_onto(pipes.write_end(i), libc::STDOUT_FILENO)?,
		(Wire::File, Some(path)) => {
			let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
			open_onto(path, flags, libc::STDOUT_FILENO)?
		},
		_ => {},
	}
	// ends of other stages were inherited through fork as well
	pipes.release();
	// the shell ignores SIGPIPE and exec keeps ignored dispositions
	let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

	let e = match unistd::execvp(&invocation.program, &invocation.argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	Err(match e {
		Errno::ENOENT => StageError::NotFound { program: invocation.program.clone() },
		_ => StageError::Exec { program: invocation.program.clone(), source: e },
	})
}

fn exec_stage(invocation: &Invocation, wiring: StageIo, pipes: PipeTable) -> ! {
	let s = match do_exec_stage(invocation, wiring, pipes) {
		Ok(never) => match never {},
		Err(e) => {
			let _ = writeln!(&mut io::stderr(), "ish: {}", e);
			e.exit_status()
		},
	};
	unsafe { libc::_exit(s) }
}

/// Forks one process per stage, left to right. Pids are pushed as they are
/// forked, so on error `pids` holds the stages that are already running.
fn spawn_stages(stages: &[Stage], pids: &mut Vec<Pid>) -> Result<(), EvalError> {
	let invocations = stages.iter().map(Invocation::new).collect::<Result<Vec<_>, _>>()?;
	let wiring = pipe::plan(stages);
	let pipes = PipeTable::allocate(stages.len().saturating_sub(1)).map_err(EvalError::Pipe)?;

	for (i, invocation) in invocations.iter().enumerate() {
		let program = &stages[i].program;
		match unsafe { unistd::fork() } {
			Ok(ForkResult::Parent { child }) => {
				debug!(pid = %child, stage = i, %program, "forked stage");
				pids.push(child);
			},
			Ok(ForkResult::Child) => exec_stage(invocation, wiring[i], pipes),
			Err(e) => {
				warn!(stage = i, %program, error = %e, "fork failed, abandoning pipeline");
				pipes.release();
				return Err(EvalError::Spawn { program: program.clone(), source: e });
			},
		}
	}
	pipes.release();
	Ok(())
}

fn wait_for(pid: Pid) -> Option<WaitStatus> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
				debug!(%pid, ?status, "stage finished");
				return Some(status);
			},
			Ok(_) | Err(Errno::EINTR) => continue,
			Err(e) => {
				warn!(%pid, error = %e, "wait failed");
				return None;
			},
		}
	}
}

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	/// Foreground work finished. `status` is that of the last stage.
	Done { status: i32, pids: Vec<Pid> },
	/// Background pipeline, every pid already registered.
	Running(Vec<Pid>),
}

/// Runs one command line.
///
/// A lone built-in without redirection runs in this process. Built-ins exist
/// only there: inside a pipeline or with a redirection the name is exec'd like
/// any other program, so `myjobs | cat` fails with "command not found".
/// Everything else is forked stage by stage; foreground pipelines are waited for in full, and
/// background ones are handed to the registry. When a fork fails partway, the
/// stages already started keep running and are registered so they can still
/// be queried and reaped.
pub fn eval(state: &mut global::State, line: &str, background: bool) -> Result<EvalResult, EvalError> {
	let stages = parser::parse(line)?;

	if stages.len() == 1 && stages[0].redirect == Redirect::None {
		if let Some(func) = builtin::match_builtin(&stages[0].program) {
			let s = func(state, &stages[0].arguments);
			return Ok(EvalResult::Done { status: s, pids: vec![] });
		}
	}

	let mut pids: Vec<Pid> = Vec::with_capacity(stages.len());
	if let Err(e) = spawn_stages(&stages, &mut pids) {
		for &pid in &pids {
			state.registry.register(pid);
		}
		return Err(e);
	}

	if background {
		for &pid in &pids {
			state.registry.register(pid);
		}
		return Ok(EvalResult::Running(pids));
	}

	let statuses: Vec<Option<WaitStatus>> = pids.iter().map(|&pid| wait_for(pid)).collect();
	let s = statuses.last().and_then(|&st| st).map_or(0, |st| st.code());
	Ok(EvalResult::Done { status: s, pids: pids })
}
