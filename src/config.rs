//! Layer options and the configuration sink the filesystem bridge reads

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::accounts::LocalAccounts;
use crate::constants::{GROUP_FILE, MAX_NAME_LEN, PASSWD_FILE};
use crate::generator::HashAlgorithm;

/// Options for a resolver session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub passwd_path: PathBuf,
    pub group_path: PathBuf,
    /// Consult the local account files; false starts in distributed mode
    pub local_accounts: bool,
    pub hash: HashAlgorithm,
    pub max_name_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            passwd_path: PathBuf::from(PASSWD_FILE),
            group_path: PathBuf::from(GROUP_FILE),
            local_accounts: true,
            hash: HashAlgorithm::default(),
            max_name_len: MAX_NAME_LEN,
        }
    }
}

impl Options {
    /// Options that never read local files
    pub fn distributed() -> Self {
        Self { local_accounts: false, ..Self::default() }
    }

    /// Options reading the given account files
    pub fn with_files(passwd: impl Into<PathBuf>, group: impl Into<PathBuf>) -> Self {
        Self { passwd_path: passwd.into(), group_path: group.into(), ..Self::default() }
    }

    pub(crate) fn local(&self) -> Option<LocalAccounts> {
        self.local_accounts
            .then(|| LocalAccounts::new(&self.passwd_path, &self.group_path))
    }
}

/// Key/value configuration consumed by the filesystem bridge
pub trait ConfigSink: Send + Sync {
    fn set_config(&self, key: &str, value: &str);

    /// Set several keys. Implementations shared with concurrent readers
    /// should apply the batch atomically.
    fn set_configs(&self, entries: &[(&str, String)]) {
        for (k, v) in entries {
            self.set_config(k, v);
        }
    }
}

/// In-memory sink; batches are applied under one lock
#[derive(Debug, Default)]
pub struct MemoryConfig {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().unwrap_or_else(|p| p.into_inner()).get(key).cloned()
    }

    /// Read several keys under one lock
    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let data = self.data.read().unwrap_or_else(|p| p.into_inner());
        keys.iter().map(|k| data.get(*k).cloned()).collect()
    }
}

impl ConfigSink for MemoryConfig {
    fn set_config(&self, key: &str, value: &str) {
        self.data
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn set_configs(&self, entries: &[(&str, String)]) {
        let mut data = self.data.write().unwrap_or_else(|p| p.into_inner());
        for (k, v) in entries {
            data.insert(k.to_string(), v.clone());
        }
    }
}
