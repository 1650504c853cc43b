//! Session permissions: which uid and gids a mount operates as
//!
//! A session is privileged when its user is the configured superuser or any
//! of its groups is the configured supergroup. Privileged sessions run as
//! uid 0 / gid 0 and skip resolution entirely.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::accounts::Snapshot;
use crate::config::{ConfigSink, Options};
use crate::constants::{PERMISSION_GIDS, PERMISSION_UID, PERMISSION_UMASK, SUPER_ID};
use crate::error::{GuidError, Result};
use crate::listing::{parse_groups, parse_users};
use crate::principal::Kind;
use crate::resolver::IdentityResolver;

/// Resolved identity of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub uid: i32,
    /// Primary gid; unset when the session has no groups
    pub gid: Option<i32>,
    pub gids: Vec<i32>,
    pub umask: u16,
}

impl EffectivePermission {
    pub fn superuser(umask: u16) -> Self {
        Self { uid: SUPER_ID, gid: Some(SUPER_ID), gids: vec![SUPER_ID], umask }
    }

    #[inline]
    pub fn is_superuser(&self) -> bool {
        self.uid == SUPER_ID
    }

    /// The rwx triple of `mode` that applies to this identity
    pub fn access_mode(&self, owner_uid: i32, owner_gid: i32, mode: u32) -> u8 {
        if self.is_superuser() {
            return 0o7;
        }
        let bits = if self.uid == owner_uid {
            mode >> 6
        } else if self.gids.contains(&owner_gid) {
            mode >> 3
        } else {
            mode
        };
        (bits & 0o7) as u8
    }

    /// Whether every bit of `want` (`WANT_READ | WANT_WRITE | WANT_EXEC`) is granted
    #[inline]
    pub fn check(&self, owner_uid: i32, owner_gid: i32, mode: u32, want: u8) -> bool {
        self.access_mode(owner_uid, owner_gid, mode) & want == want
    }

    /// Mode for a new file or directory
    #[inline]
    pub fn apply_umask(&self, mode: u32) -> u32 {
        mode & !u32::from(self.umask)
    }

    /// gids as published: comma-joined decimals
    pub fn gids_csv(&self) -> String {
        self.gids.iter().map(i32::to_string).collect::<Vec<_>>().join(",")
    }

    fn config_entries(&self) -> [(&'static str, String); 3] {
        [
            (PERMISSION_UID, self.uid.to_string()),
            (PERMISSION_GIDS, self.gids_csv()),
            (PERMISSION_UMASK, self.umask.to_string()),
        ]
    }
}

/// Split a comma-separated group list; order and duplicates are kept
pub fn parse_group_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

/// Configured principals plus the resolver bound to the session name
#[derive(Debug)]
struct Session {
    user: String,
    groups: Vec<String>,
    superuser: String,
    supergroup: String,
    umask: u16,
    privileged: bool,
    resolver: Arc<IdentityResolver>,
}

/// Privileged when the user is the superuser or any group is the supergroup
fn is_privileged(user: &str, groups: &[String], superuser: &str, supergroup: &str) -> bool {
    user == superuser || groups.iter().any(|g| g == supergroup)
}

impl Session {
    fn lookup_uid(&self, user: &str) -> Result<i32> {
        if user == self.superuser {
            return Ok(SUPER_ID);
        }
        self.resolver.lookup_by_name(Kind::User, user)
    }

    fn lookup_gid(&self, group: &str) -> Result<i32> {
        if group == self.supergroup {
            return Ok(SUPER_ID);
        }
        self.resolver.lookup_by_name(Kind::Group, group)
    }

    fn resolve(&self) -> Result<EffectivePermission> {
        if self.privileged {
            return Ok(EffectivePermission::superuser(self.umask));
        }
        let uid = self.lookup_uid(&self.user)?;
        let gids = self
            .groups
            .iter()
            .map(|g| self.lookup_gid(g))
            .collect::<Result<Vec<_>>>()?;
        Ok(EffectivePermission { uid, gid: gids.first().copied(), gids, umask: self.umask })
    }
}

#[derive(Debug)]
struct State {
    session: Arc<Session>,
    effective: Arc<EffectivePermission>,
}

/// Permission setup for one mount.
///
/// `configure` and `refresh_identities` are serialized; readers always see
/// a complete `EffectivePermission`, and the published configuration is
/// written as one batch.
pub struct PermissionContext {
    sink: Arc<dyn ConfigSink>,
    options: Options,
    update: Mutex<()>,
    state: RwLock<Option<State>>,
}

impl PermissionContext {
    pub fn new(sink: Arc<dyn ConfigSink>, options: Options) -> Self {
        Self { sink, options, update: Mutex::new(()), state: RwLock::new(None) }
    }

    fn current(&self) -> Result<(Arc<Session>, Arc<EffectivePermission>)> {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        state
            .as_ref()
            .map(|s| (s.session.clone(), s.effective.clone()))
            .ok_or(GuidError::NotConfigured)
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.current().map(|(s, _)| s)
    }

    /// Publish and install a new state; the caller holds `update`
    fn install(&self, session: Arc<Session>, effective: EffectivePermission) -> Arc<EffectivePermission> {
        self.sink.set_configs(&effective.config_entries());
        let effective = Arc::new(effective);
        *self.state.write().unwrap_or_else(|p| p.into_inner()) =
            Some(State { session, effective: effective.clone() });
        effective
    }

    /// Set up the session identity.
    ///
    /// `name` salts generated ids. On error the previous identity stays in
    /// effect.
    pub fn configure(
        &self,
        name: &str,
        user: &str,
        groups_csv: &str,
        superuser: &str,
        supergroup: &str,
        umask: u16,
    ) -> Result<Arc<EffectivePermission>> {
        let _guard = self.update.lock().unwrap_or_else(|p| p.into_inner());

        let groups = parse_group_csv(groups_csv);
        let privileged = is_privileged(user, &groups, superuser, supergroup);
        let resolver = Arc::new(IdentityResolver::new(name, &self.options)?);
        let session = Session {
            user: user.to_string(),
            groups,
            superuser: superuser.to_string(),
            supergroup: supergroup.to_string(),
            umask,
            privileged,
            resolver,
        };
        let effective = session.resolve()?;
        tracing::info!(
            session = name,
            user,
            uid = effective.uid,
            gids = %effective.gids_csv(),
            privileged,
            "permission context configured"
        );
        Ok(self.install(Arc::new(session), effective))
    }

    /// Apply pushed user and group listings and recompute the identity.
    ///
    /// When the configured user is a member of any listed group, those
    /// groups become the session's groups. Privilege is decided again from
    /// the resulting groups.
    pub fn refresh_identities(&self, uid_listing: &str, group_listing: &str) -> Result<Arc<EffectivePermission>> {
        let _guard = self.update.lock().unwrap_or_else(|p| p.into_inner());
        let session = self.session()?;

        let users = parse_users(uid_listing);
        let groups = parse_groups(group_listing);
        let memberships: Vec<String> = groups
            .iter()
            .filter(|g| g.has_member(&session.user))
            .map(|g| g.name.clone())
            .collect();
        let snapshot = Snapshot {
            users,
            groups: groups.into_iter().map(|g| (g.name, g.id)).collect(),
        };
        session.resolver.refresh(Some(snapshot))?;

        let groups = if memberships.is_empty() { session.groups.clone() } else { memberships };
        let session = Session {
            privileged: is_privileged(&session.user, &groups, &session.superuser, &session.supergroup),
            user: session.user.clone(),
            groups,
            superuser: session.superuser.clone(),
            supergroup: session.supergroup.clone(),
            umask: session.umask,
            resolver: session.resolver.clone(),
        };
        let effective = session.resolve()?;
        tracing::info!(
            user = %session.user,
            uid = effective.uid,
            gids = %effective.gids_csv(),
            privileged = session.privileged,
            "identities refreshed"
        );
        Ok(self.install(Arc::new(session), effective))
    }

    /// Current identity, if configured
    pub fn effective(&self) -> Option<Arc<EffectivePermission>> {
        self.current().ok().map(|(_, e)| e)
    }

    /// Resolver of the current session
    pub fn resolver(&self) -> Result<Arc<IdentityResolver>> {
        Ok(self.session()?.resolver.clone())
    }

    /// uid for a user name; the superuser maps to 0
    pub fn lookup_uid(&self, user: &str) -> Result<i32> {
        self.session()?.lookup_uid(user)
    }

    /// gid for a group name; the supergroup maps to 0
    pub fn lookup_gid(&self, group: &str) -> Result<i32> {
        self.session()?.lookup_gid(group)
    }

    /// Display name of a file owner
    pub fn owner_name(&self, uid: i32) -> Result<String> {
        let session = self.session()?;
        if uid == SUPER_ID {
            return Ok(session.superuser.clone());
        }
        session.resolver.lookup_by_id(Kind::User, uid)
    }

    /// Display name of a file group
    pub fn group_name(&self, gid: i32) -> Result<String> {
        let session = self.session()?;
        if gid == SUPER_ID {
            return Ok(session.supergroup.clone());
        }
        session.resolver.lookup_by_id(Kind::Group, gid)
    }
}

impl fmt::Debug for PermissionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionContext")
            .field("options", &self.options)
            .field("effective", &self.effective())
            .finish()
    }
}
