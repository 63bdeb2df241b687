//! Command execution for a small interactive shell.
//!
//! A line is split into pipeline stages (`parser`), each stage is forked with
//! its standard streams wired to pipes or redirection files (`pipe`, `eval`),
//! and background pipelines are tracked for later status queries (`job`).

pub mod types;
pub mod parser;
pub mod pipe;
pub mod job;
pub mod global;
pub mod builtin;
pub mod eval;
