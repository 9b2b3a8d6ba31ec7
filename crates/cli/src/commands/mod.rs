//! Command implementations

mod parse;
mod session;

pub(crate) use parse::parse_command;
pub(crate) use session::{list_command, read_command, watch_command};
