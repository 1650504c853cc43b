//! Local account databases (`name:passwd:id:...` records)
//!
//! Files are re-read on every call; the resolver caches what it needs and
//! never holds its store lock while reading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::ROOT_NAME;
use crate::error::{GuidError, Result};
use crate::principal::Kind;

/// name -> id pairs for both kinds, applied to the store as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub users: Vec<(String, i32)>,
    pub groups: Vec<(String, i32)>,
}

impl Snapshot {
    pub fn entries(&self, kind: Kind) -> impl Iterator<Item = (&str, i32)> {
        let v = match kind {
            Kind::User => &self.users,
            Kind::Group => &self.groups,
        };
        v.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// Parse a numeric id; values above i32::MAX wrap like the 32-bit uid_t they are
pub(crate) fn parse_id(s: &str) -> Option<i32> {
    let s = s.trim();
    s.parse::<u32>().map(|v| v as i32).ok().or_else(|| s.parse::<i32>().ok())
}

/// Split a record into (name, id); None for blanks, comments and short lines
fn record(line: &str) -> Option<(&str, i32)> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split(':');
    let name = fields.next()?;
    let id = fields.nth(1)?;
    if name.is_empty() {
        return None;
    }
    match parse_id(id) {
        Some(id) => Some((name, id)),
        None => {
            tracing::warn!(line, "skipping account record with non-numeric id");
            None
        }
    }
}

/// One colon-delimited account file
#[derive(Debug, Clone)]
pub struct AccountFile {
    path: PathBuf,
}

impl AccountFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| GuidError::source_unavailable(&self.path, e))
    }

    /// Id recorded for `name`
    pub fn lookup_id(&self, name: &str) -> Result<Option<i32>> {
        let data = self.load()?;
        Ok(data.lines().filter_map(record).find(|(n, _)| *n == name).map(|(_, id)| id))
    }

    /// Name recorded for `id`
    pub fn lookup_name(&self, id: i32) -> Result<Option<String>> {
        let data = self.load()?;
        Ok(data
            .lines()
            .filter_map(record)
            .find(|(_, i)| *i == id)
            .map(|(n, _)| n.to_string()))
    }

    /// Every record except `root`
    pub fn entries(&self) -> Result<Vec<(String, i32)>> {
        let data = self.load()?;
        Ok(data
            .lines()
            .filter_map(record)
            .filter(|(n, _)| *n != ROOT_NAME)
            .map(|(n, id)| (n.to_string(), id))
            .collect())
    }
}

/// The user and group databases of the local host
#[derive(Debug, Clone)]
pub struct LocalAccounts {
    users: AccountFile,
    groups: AccountFile,
}

impl LocalAccounts {
    pub fn new(passwd: impl Into<PathBuf>, group: impl Into<PathBuf>) -> Self {
        Self { users: AccountFile::new(passwd), groups: AccountFile::new(group) }
    }

    #[inline]
    pub fn file(&self, kind: Kind) -> &AccountFile {
        match kind {
            Kind::User => &self.users,
            Kind::Group => &self.groups,
        }
    }

    /// Read both files; fails if either cannot be read
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot { users: self.users.entries()?, groups: self.groups.entries()? })
    }
}
