//! Dual-section migration file parser
//!
//! A migration file holds four literal markers, in order:
//!
//! ```sql
//! -- anything here is ignored
//! BEGIN -- UP
//! CREATE TABLE users (id INT);
//! END -- UP
//! BEGIN -- DOWN
//! DROP TABLE users;
//! END -- DOWN
//! ```
//!
//! Section bodies are taken verbatim, untrimmed and unvalidated.

use super::definitions::MigrationScript;
use crate::error::{MigrateError, MigrateResult};

pub const BEGIN_UP: &str = "BEGIN -- UP";
pub const END_UP: &str = "END -- UP";
pub const BEGIN_DOWN: &str = "BEGIN -- DOWN";
pub const END_DOWN: &str = "END -- DOWN";

/// Split a migration file into its apply and revert scripts
pub fn parse(contents: &str, name: &str) -> MigrateResult<MigrationScript> {
    let (up, rest) = section(contents, name, BEGIN_UP, END_UP)?;
    let (down, _) = section(rest, name, BEGIN_DOWN, END_DOWN)?;

    Ok(MigrationScript {
        up: up.to_string(),
        down: down.to_string(),
    })
}

/// Body between `begin` and the next `end`, and the text after `end`
fn section<'a>(
    text: &'a str,
    name: &str,
    begin: &'static str,
    end: &'static str,
) -> MigrateResult<(&'a str, &'a str)> {
    let start = text.find(begin).ok_or_else(|| malformed(name, begin))? + begin.len();
    let rest = &text[start..];
    let stop = rest.find(end).ok_or_else(|| malformed(name, end))?;

    Ok((&rest[..stop], &rest[stop + end.len()..]))
}

fn malformed(name: &str, marker: &'static str) -> MigrateError {
    MigrateError::MalformedMigration {
        name: name.to_string(),
        marker,
    }
}
