//! Name <-> id resolution
//!
//! Lookup order for a name:
//! 1. cached pair
//! 2. distributed mode: generated id
//! 3. local mode: local account file, else generated id
//!
//! `root` never resolves through the local files; the superuser here is a
//! configured identity, not the host account.

use crate::accounts::{LocalAccounts, Snapshot};
use crate::config::Options;
use crate::constants::ROOT_NAME;
use crate::error::Result;
use crate::generator::IdGenerator;
use crate::principal::Kind;
use crate::store::IdentityStore;

/// Resolver for one session, bound to its salt
#[derive(Debug)]
pub struct IdentityResolver {
    store: IdentityStore,
    generator: IdGenerator,
    local: Option<LocalAccounts>,
    max_name_len: usize,
}

impl IdentityResolver {
    /// Create a resolver and load the local snapshot when local accounts are enabled
    pub fn new(salt: &str, options: &Options) -> Result<Self> {
        let local = options.local();
        let resolver = Self {
            store: IdentityStore::new(local.is_some()),
            generator: IdGenerator::new(salt, options.hash),
            local,
            max_name_len: options.max_name_len,
        };
        if let Some(local) = &resolver.local {
            let snap = local.snapshot()?;
            resolver.apply(&snap, true);
        }
        Ok(resolver)
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn generator(&self) -> &IdGenerator {
        &self.generator
    }

    /// Local files to consult, if the store is currently in local mode
    #[inline]
    fn local_source(&self) -> Option<&LocalAccounts> {
        self.local.as_ref().filter(|_| self.store.is_local())
    }

    /// Resolve a name to an id; always yields an id
    pub fn lookup_by_name(&self, kind: Kind, name: &str) -> Result<i32> {
        loop {
            let epoch = self.store.epoch();
            if let Some(id) = self.store.get_id(kind, name) {
                return Ok(id);
            }

            let found = match self.local_source() {
                Some(local) if name != ROOT_NAME => local.file(kind).lookup_id(name)?,
                _ => None,
            };
            let id = match found {
                Some(id) => id,
                None => {
                    let id = self.generator.generate(name);
                    tracing::debug!(%kind, principal = name, id, "generated id");
                    id
                }
            };

            match self.store.put_id_if_current(kind, name, id, epoch) {
                Some(id) => return Ok(id),
                None => tracing::debug!(%kind, principal = name, "refresh raced lookup, retrying"),
            }
        }
    }

    /// Resolve an id to a name; unknown ids display as their decimal form
    pub fn lookup_by_id(&self, kind: Kind, id: i32) -> Result<String> {
        loop {
            let epoch = self.store.epoch();
            if let Some(name) = self.store.get_name(kind, id) {
                return Ok(name);
            }
            let Some(local) = self.local_source() else {
                return Ok(id.to_string());
            };

            let name = match local.file(kind).lookup_name(id)? {
                Some(n) if !n.is_empty() => self.truncate(n),
                _ => id.to_string(),
            };
            // A cached local root would shadow the generated root id
            if name == ROOT_NAME {
                return Ok(name);
            }
            match self.store.put_name_if_current(kind, id, &name, epoch) {
                Some(name) => return Ok(name),
                None => tracing::debug!(%kind, id, "refresh raced lookup, retrying"),
            }
        }
    }

    fn truncate(&self, name: String) -> String {
        if name.chars().count() <= self.max_name_len {
            return name;
        }
        let cut: String = name.chars().take(self.max_name_len).collect();
        tracing::warn!(account = %name, truncated = %cut, "truncating long account name");
        cut
    }

    fn apply(&self, snap: &Snapshot, is_local: bool) {
        self.store.replace_all(snap.entries(Kind::User), snap.entries(Kind::Group), is_local);
        tracing::info!(
            users = snap.users.len(),
            groups = snap.groups.len(),
            local = is_local,
            "identity snapshot applied"
        );
    }

    /// Refresh the cache.
    ///
    /// `Some(snapshot)` applies pushed identities and switches to distributed
    /// mode. `None` re-reads the local files, or switches to distributed mode
    /// when there are none. A failed read leaves the cache untouched.
    pub fn refresh(&self, snapshot: Option<Snapshot>) -> Result<()> {
        match (snapshot, &self.local) {
            (Some(snap), _) => self.apply(&snap, false),
            (None, Some(local)) => {
                let snap = local.snapshot()?;
                self.apply(&snap, true);
            }
            (None, None) => {
                self.store.set_local(false);
                tracing::info!("no local account source, using generated ids");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuidError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn local(passwd: &str, group: &str) -> (NamedTempFile, NamedTempFile, IdentityResolver) {
        let p = file(passwd);
        let g = file(group);
        let r = IdentityResolver::new("fs", &Options::with_files(p.path(), g.path())).unwrap();
        (p, g, r)
    }

    #[test]
    fn test_local_hit_and_fallback() {
        let (_p, _g, r) = local("alice:x:1001:1001::/home/alice:/bin/sh\n", "dev:x:2000:\n");
        assert_eq!(r.lookup_by_name(Kind::User, "alice").unwrap(), 1001);
        let bob = r.lookup_by_name(Kind::User, "bob").unwrap();
        assert_eq!(bob, r.generator().generate("bob"));
        assert_eq!(bob, 1812274360);
        assert_eq!(r.lookup_by_id(Kind::User, bob).unwrap(), "bob");
        assert_eq!(r.lookup_by_name(Kind::Group, "dev").unwrap(), 2000);
    }

    #[test]
    fn test_root_is_generated() {
        let (_p, _g, r) = local("root:x:0:0::/root:/bin/sh\n", "root:x:0:\n");
        let id = r.lookup_by_name(Kind::User, "root").unwrap();
        assert_eq!(id, r.generator().generate("root"));
        assert_ne!(id, 0);
        assert_eq!(r.lookup_by_name(Kind::Group, "root").unwrap(), r.generator().generate("root"));
    }

    #[test]
    fn test_local_reverse_root_not_cached() {
        let (_p, _g, r) = local("root:x:0:0::/root:/bin/sh\n", "");
        assert_eq!(r.lookup_by_id(Kind::User, 0).unwrap(), "root");
        assert_eq!(r.store().get_id(Kind::User, "root"), None);
    }

    #[test]
    fn test_reverse_lookup_picks_up_new_local_entries() {
        let (mut p, _g, r) = local("alice:x:1001:\n", "");
        p.write_all(b"carol:x:1003:\n").unwrap();
        assert_eq!(r.lookup_by_id(Kind::User, 1003).unwrap(), "carol");
        assert_eq!(r.store().get_id(Kind::User, "carol"), Some(1003));
    }

    #[test]
    fn test_reverse_lookup_unknown_id() {
        let (_p, _g, r) = local("alice:x:1001:\n", "");
        assert_eq!(r.lookup_by_id(Kind::User, 4242).unwrap(), "4242");
        assert_eq!(r.lookup_by_id(Kind::Group, -7).unwrap(), "-7");
    }

    #[test]
    fn test_name_truncation() {
        let (mut p, _g, r) = local("alice:x:1001:\n", "");
        p.write_all(format!("{}:x:1500:\n", "u".repeat(60)).as_bytes()).unwrap();
        let name = r.lookup_by_id(Kind::User, 1500).unwrap();
        assert_eq!(name, "u".repeat(49));
        assert_eq!(r.store().get_name(Kind::User, 1500).as_deref(), Some(name.as_str()));
        assert_eq!(r.store().get_id(Kind::User, &name), Some(1500));
    }

    #[test]
    fn test_distributed_mode() {
        let r = IdentityResolver::new("fs", &Options::distributed()).unwrap();
        assert!(!r.store().is_local());
        let id = r.lookup_by_name(Kind::User, "alice").unwrap();
        assert_eq!(id, 697552004);
        assert_eq!(r.lookup_by_id(Kind::User, id).unwrap(), "alice");
        assert_eq!(r.lookup_by_id(Kind::User, 12).unwrap(), "12");
        assert_eq!(r.store().get_id(Kind::User, "12"), None);
    }

    #[test]
    fn test_missing_account_files() {
        let opts = Options::with_files("/nonexistent/guidmap/passwd", "/nonexistent/guidmap/group");
        let e = IdentityResolver::new("fs", &opts).unwrap_err();
        assert!(matches!(e, GuidError::AccountSourceUnavailable { .. }));
    }

    #[test]
    fn test_refresh_pushed_snapshot() {
        let (_p, _g, r) = local("alice:x:1001:\n", "");
        let snap = Snapshot { users: vec![("alice".into(), 5001)], groups: vec![("dev".into(), 6001)] };
        r.refresh(Some(snap)).unwrap();
        assert!(!r.store().is_local());
        assert_eq!(r.lookup_by_name(Kind::User, "alice").unwrap(), 5001);
        assert_eq!(r.lookup_by_id(Kind::User, 1001).unwrap(), "1001");
        assert_eq!(r.lookup_by_name(Kind::Group, "dev").unwrap(), 6001);
        // unknown names are generated now, even if local files know them
        assert_eq!(r.lookup_by_name(Kind::User, "bob").unwrap(), r.generator().generate("bob"));
    }

    #[test]
    fn test_refresh_local_failure_keeps_cache() {
        let p = file("alice:x:1001:\n");
        let g = file("");
        let opts = Options::with_files(p.path(), g.path());
        let r = IdentityResolver::new("fs", &opts).unwrap();
        let gpath = g.path().to_path_buf();
        drop(g);
        assert!(!gpath.exists());
        assert!(r.refresh(None).is_err());
        assert!(r.store().is_local());
        assert_eq!(r.lookup_by_name(Kind::User, "alice").unwrap(), 1001);
    }

    #[cfg(unix)]
    #[test]
    fn test_refresh_during_local_read_wins() {
        use std::fs::{self, OpenOptions};
        use std::process::Command;
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let passwd = dir.path().join("passwd");
        let group = dir.path().join("group");
        fs::write(&passwd, "alice:x:1001:\n").unwrap();
        fs::write(&group, "").unwrap();
        let r = Arc::new(IdentityResolver::new("fs", &Options::with_files(&passwd, &group)).unwrap());

        // a fifo makes the lookup's file read block until we write
        fs::remove_file(&passwd).unwrap();
        assert!(Command::new("mkfifo").arg(&passwd).status().unwrap().success());

        let lookup = {
            let r = r.clone();
            thread::spawn(move || r.lookup_by_name(Kind::User, "dave").unwrap())
        };
        // opening for write returns once the lookup has opened the fifo
        let mut w = OpenOptions::new().write(true).open(&passwd).unwrap();
        let snap = Snapshot { users: vec![("dave".into(), 5001)], groups: Vec::new() };
        r.refresh(Some(snap)).unwrap();
        w.write_all(b"dave:x:1001:\n").unwrap();
        drop(w);

        assert_eq!(lookup.join().unwrap(), 5001);
        assert_eq!(r.store().get_id(Kind::User, "dave"), Some(5001));
        assert_eq!(r.store().get_name(Kind::User, 5001).as_deref(), Some("dave"));
        assert_eq!(r.store().get_name(Kind::User, 1001), None);
    }

    #[test]
    fn test_refresh_without_local_source() {
        let r = IdentityResolver::new("fs", &Options::distributed()).unwrap();
        r.refresh(None).unwrap();
        assert!(!r.store().is_local());
    }
}
