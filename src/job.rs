//! Background process registry.
//!
//! Records are only ever appended. Probing uses a non-blocking `waitpid`, which
//! reaps a process the first time it is seen finished, so the registry keeps the
//! last terminal state it observed and answers from that afterwards.

use std::fmt;

use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::debug;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JobState { Running, Exited, Terminated, Stopped, NotFound }

impl JobState {
	fn is_final(self) -> bool {
		match self {
			JobState::Exited | JobState::Terminated => true,
			_ => false,
		}
	}
}

impl fmt::Display for JobState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let s = match *self {
			JobState::Running => "Running",
			JobState::Exited => "Exited",
			JobState::Terminated => "Terminated",
			JobState::Stopped => "Stopped",
			JobState::NotFound => "Not found",
		};
		f.write_str(s)
	}
}

pub trait WaitStatusExt {
	fn state(self) -> JobState;
	fn code(self) -> i32;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> JobState {
		match self {
			WaitStatus::Exited(..) => JobState::Exited,
			WaitStatus::Signaled(..) => JobState::Terminated,
			WaitStatus::Stopped(..) => JobState::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) | WaitStatus::PtraceSyscall(..) => JobState::Stopped,
			WaitStatus::Continued(..) => JobState::Running,
			WaitStatus::StillAlive => JobState::Running,
		}
	}

	/// Shell-style status: the exit code, or 128 + signal number.
	fn code(self) -> i32 {
		match self {
			WaitStatus::Exited(_, code) => code,
			WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
			_ => 0,
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct Record {
	pid: Pid,
	last_seen: Option<JobState>,
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
	records: Vec<Record>,
}

/// `None` when nothing changed since the previous probe.
fn probe(pid: Pid) -> nix::Result<Option<JobState>> {
	let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
	loop {
		match wait::waitpid(pid, Some(flags)) {
			Ok(WaitStatus::StillAlive) => return Ok(None),
			Ok(status) => return Ok(Some(status.state())),
			Err(Errno::EINTR) => continue,
			Err(e) => return Err(e),
		}
	}
}

impl ProcessRegistry {
	pub fn new() -> ProcessRegistry {
		ProcessRegistry { records: vec![] }
	}

	pub fn register(&mut self, pid: Pid) {
		debug!(%pid, "registered background process");
		self.records.push(Record { pid: pid, last_seen: None });
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn pids(&self) -> Vec<Pid> {
		self.records.iter().map(|r| r.pid).collect()
	}

	/// Current state of every registered process, in registration order.
	/// Never blocks.
	pub fn report_all(&mut self) -> Vec<(Pid, JobState)> {
		let mut report = Vec::with_capacity(self.records.len());
		for i in 0 .. self.records.len() {
			let Record { pid, last_seen } = self.records[i];
			let state = match last_seen {
				Some(state) if state.is_final() => state,
				_ => match probe(pid) {
					Ok(Some(state)) => state,
					Ok(None) => last_seen.unwrap_or(JobState::Running),
					Err(e) => {
						debug!(%pid, error = %e, "probe failed");
						JobState::NotFound
					},
				},
			};
			// one wait event per change, shared by every record of the pid;
			// once final the pid is reaped and never probed again
			if state != JobState::NotFound {
				for record in self.records.iter_mut().filter(|r| r.pid == pid) {
					record.last_seen = Some(state);
				}
			}
			report.push((pid, state));
		}
		report
	}
}
