use std::str::SplitAsciiWhitespace;

use thiserror::Error;
use tracing::debug;

use crate::types::*;

const PIPE: char = '|';
const INPUT: &str = "<";
const OUTPUT: &str = ">";
const BACKGROUND: char = '&';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command in pipeline stage {index}")]
	EmptyStage { index: usize },
	#[error("missing file after '{operator}' in pipeline stage {index}")]
	MissingRedirectTarget { index: usize, operator: &'static str },
	#[error("nul character in command line")]
	NulByte,
}

pub type ParseResult<T> = Result<T, ParseError>;

struct Parser<'a> {
	tokens: SplitAsciiWhitespace<'a>,
	index: usize,
}

impl<'a> Parser<'a> {
	fn read_target(&mut self, operator: &'static str) -> ParseResult<String> {
		match self.tokens.next() {
			Some(target) => Ok(target.trim().to_string()),
			None => Err(ParseError::MissingRedirectTarget { index: self.index, operator: operator }),
		}
	}

	fn parse_stage(&mut self) -> ParseResult<Stage> {
		let program = match self.tokens.next() {
			Some(name) => name.to_string(),
			None => { return Err(ParseError::EmptyStage { index: self.index }); },
		};

		let mut arguments: Vec<String> = vec![];
		let mut redirect = Redirect::None;
		while let Some(token) = self.tokens.next() {
			// only the first clause is recognized, later operators are plain words
			if redirect != Redirect::None {
				arguments.push(token.to_string());
				continue;
			}
			match token {
				INPUT => { redirect = Redirect::InputFrom(self.read_target(INPUT)?); },
				OUTPUT => { redirect = Redirect::OutputTo(self.read_target(OUTPUT)?); },
				_ => arguments.push(token.to_string()),
			}
		}

		Ok(Stage { program: program, arguments: arguments, redirect: redirect })
	}
}

/// Splits `line` into pipeline stages.
///
/// There is no quoting: every `|` is a stage boundary, and `<` / `>` are only
/// recognized as whole whitespace-separated words. A malformed stage anywhere
/// rejects the whole line.
pub fn parse(line: &str) -> ParseResult<Vec<Stage>> {
	if line.contains('\0') {
		return Err(ParseError::NulByte);
	}
	let mut stages: Vec<Stage> = vec![];
	for (index, segment) in line.split(PIPE).enumerate() {
		let mut parser = Parser { tokens: segment.split_ascii_whitespace(), index: index };
		stages.push(parser.parse_stage()?);
	}
	debug!(stages = stages.len(), "parsed pipeline");
	Ok(stages)
}

/// Strips a trailing `&`. Returns the remaining line and whether it was present.
pub fn split_background(line: &str) -> (&str, bool) {
	let line = line.trim_end();
	match line.strip_suffix(BACKGROUND) {
		Some(rest) => (rest, true),
		None => (line, false),
	}
}
