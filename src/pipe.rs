//! Pipe endpoints shared between adjacent stages.
//!
//! Pipe `i` connects stage `i` (writer) to stage `i + 1` (reader). Every end
//! is an `OwnedFd`, so dropping the table closes whatever the current process
//! still holds. A forked child drops its copy right after `dup2`, and the
//! parent drops its copy once the last stage has been forked.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd;

use crate::types::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Wire {
	Inherit,
	File,
	Pipe(usize),
}

/// Where one stage's standard input and output come from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StageIo {
	pub stdin: Wire,
	pub stdout: Wire,
}

/// File redirection wins over pipe wiring on the same stream, so a middle
/// stage with `> file` leaves its outgoing pipe without a writer and the next
/// stage sees end-of-file.
pub fn plan(stages: &[Stage]) -> Vec<StageIo> {
	let last = stages.len().saturating_sub(1);
	stages.iter().enumerate().map(|(i, stage)| {
		let stdin = match stage.redirect {
			Redirect::InputFrom(_) => Wire::File,
			_ if i > 0 => Wire::Pipe(i - 1),
			_ => Wire::Inherit,
		};
		let stdout = match stage.redirect {
			Redirect::OutputTo(_) => Wire::File,
			_ if i < last => Wire::Pipe(i),
			_ => Wire::Inherit,
		};
		StageIo { stdin: stdin, stdout: stdout }
	}).collect()
}

#[derive(Debug)]
struct PipePair {
	read: OwnedFd,
	write: OwnedFd,
}

#[derive(Debug)]
pub struct PipeTable {
	pairs: Vec<PipePair>,
}

impl PipeTable {
	/// Creates all `count` pipes up front. On failure the pipes created so
	/// far are closed before the error is returned.
	pub fn allocate(count: usize) -> nix::Result<PipeTable> {
		let mut pairs = Vec::with_capacity(count);
		for _ in 0 .. count {
			let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
			pairs.push(PipePair { read: read, write: write });
		}
		Ok(PipeTable { pairs: pairs })
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	pub fn read_end(&self, i: usize) -> RawFd {
		self.pairs[i].read.as_raw_fd()
	}

	pub fn write_end(&self, i: usize) -> RawFd {
		self.pairs[i].write.as_raw_fd()
	}

	pub fn release(self) {
		drop(self.pairs);
	}
}
