//! Paths, configuration keys and fixed ids

// Local account databases
pub const PASSWD_FILE: &str = "/etc/passwd";
pub const GROUP_FILE: &str = "/etc/group";

// Keys published to the filesystem bridge
pub const PERMISSION_UID: &str = "vfs.permission.uid";
pub const PERMISSION_GIDS: &str = "vfs.permission.gids";
pub const PERMISSION_UMASK: &str = "vfs.permission.umask";

/// Id the superuser and supergroup operate as
pub const SUPER_ID: i32 = 0;

/// Never resolved through the local account database
pub const ROOT_NAME: &str = "root";

/// Names resolved from local accounts are cut to this many characters
pub const MAX_NAME_LEN: usize = 49;

// Access bits for `EffectivePermission::check`
pub const WANT_EXEC: u8 = 1;
pub const WANT_WRITE: u8 = 1 << 1;
pub const WANT_READ: u8 = 1 << 2;
