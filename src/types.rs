#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Redirect {
	None,
	InputFrom(String),
	OutputTo(String),
}

/// One program invocation between pipe delimiters.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stage {
	pub program: String,
	pub arguments: Vec<String>,
	pub redirect: Redirect,
}
