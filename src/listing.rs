//! Parsers for identity listings pushed by a cluster identity service
//!
//! Users: `name:id[:...]` per line.
//! Groups: `name:id[:...[:member,member,...]]` per line; the fourth field,
//! when present, lists the group's members.
//!
//! Lines that do not parse are reported as `MalformedListingLine` and
//! skipped; they never fail the whole listing.

use crate::accounts::parse_id;
use crate::error::{GuidError, Result};

/// One parsed group line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub id: i32,
    pub members: Vec<String>,
}

impl GroupEntry {
    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }
}

fn name_and_id<'a>(line: &'a str, fields: &[&'a str]) -> Result<(&'a str, i32)> {
    if fields.len() < 2 {
        return Err(GuidError::malformed(line, "expected name:id"));
    }
    let name = fields[0].trim();
    if name.is_empty() {
        return Err(GuidError::malformed(line, "empty name"));
    }
    let id = parse_id(fields[1]).ok_or_else(|| GuidError::malformed(line, "id is not a number"))?;
    Ok((name, id))
}

/// Parse one user line
pub fn parse_user_line(line: &str) -> Result<(String, i32)> {
    let fields: Vec<&str> = line.split(':').collect();
    let (name, id) = name_and_id(line, &fields)?;
    Ok((name.to_string(), id))
}

/// Parse one group line
pub fn parse_group_line(line: &str) -> Result<GroupEntry> {
    let fields: Vec<&str> = line.split(':').collect();
    let (name, id) = name_and_id(line, &fields)?;
    let members: Vec<String> = fields
        .get(3)
        .map(|m| m.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default();
    Ok(GroupEntry { name: name.to_string(), id, members })
}

/// Run `parse` over every non-blank line, logging and dropping failures
fn parse_lines<T>(text: &str, parse: impl Fn(&str) -> Result<T>) -> Vec<T> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match parse(l) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "skipping listing line");
                None
            }
        })
        .collect()
}

/// Parse a user listing
pub fn parse_users(text: &str) -> Vec<(String, i32)> {
    parse_lines(text, parse_user_line)
}

/// Parse a group listing
pub fn parse_groups(text: &str) -> Vec<GroupEntry> {
    parse_lines(text, parse_group_line)
}
