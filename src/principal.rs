//! Principal kinds: users and groups live in separate namespaces

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which namespace a name or id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    User,
    Group,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::User => f.write_str("user"),
            Kind::Group => f.write_str("group"),
        }
    }
}

/// A resolved name/id pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: Kind,
    pub name: String,
    pub id: i32,
}

impl Principal {
    pub fn new(kind: Kind, name: impl Into<String>, id: i32) -> Self {
        Self { kind, name: name.into(), id }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.kind, self.name, self.id)
    }
}
