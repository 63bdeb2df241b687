use crate::job;

/// Per-session state, owned by the front end and passed to `eval`.
#[derive(Debug, Default)]
pub struct State {
	pub registry: job::ProcessRegistry,
}

impl State {
	pub fn new() -> State {
		State { registry: job::ProcessRegistry::new() }
	}
}
