//! # logroll-cli
//!
//! Command-line front end for [`logroll`]: reads standard input and appends
//! it, one newline-terminated chunk at a time, to a size-rotated log file.
//!
//! ```text
//! some-service 2>&1 | logroll --path /var/log/svc.log --max-size 10M --retain 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod pipe;

pub use cli::Cli;
pub use pipe::{pipe, PipeSummary};
