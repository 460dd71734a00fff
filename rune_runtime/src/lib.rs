//! Shared runtime utilities for the rune registry.
//!
//! This crate re-exports the data contracts from `rune_schema` and adds the
//! command surface the presentation layer drives: the [`RegistryCommand`]
//! enumeration and the text parser that produces it.

pub use rune_schema::*;

mod command_text;
mod commands;

pub use command_text::{parse_command_line, tokenize, CommandParseError};
pub use commands::{DeclarationLine, RegistryCommand};
