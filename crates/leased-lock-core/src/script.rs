//! Atomic ownership scripts run by the store.

/// Lua script to release the lock.
///
/// Deletes `KEYS[1]` only while it still holds `ARGV[1]`; returns 1 on delete,
/// 0 otherwise.
const RELEASE_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('del', KEYS[1])
    end
    return 0
"#;

/// Lua script to extend the lock duration.
///
/// Resets the TTL of `KEYS[1]` to `ARGV[2]` milliseconds only while it still
/// holds `ARGV[1]`; returns 1 on extend, 0 otherwise.
const REFRESH_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('pexpire', KEYS[1], ARGV[2])
    end
    return 0
"#;

/// Lua script to check ownership.
///
/// Returns 1 while `KEYS[1]` holds `ARGV[1]`, 0 otherwise. Never writes.
const CHECK_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return 1
    end
    return 0
"#;

/// The compare-then-act scripts the lock protocol depends on.
///
/// Stores that cannot run Lua must provide the same semantics atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScript {
    /// `keys = [key]`, `args = [token]`. Compare-and-delete.
    Release,
    /// `keys = [key]`, `args = [token, ttl_millis]`. Compare-and-expire.
    Refresh,
    /// `keys = [key]`, `args = [token]`. Read-only ownership check.
    Check,
}

impl LockScript {
    pub const ALL: [LockScript; 3] = [LockScript::Release, LockScript::Refresh, LockScript::Check];

    /// Lua source for stores that evaluate scripts server-side.
    pub fn source(self) -> &'static str {
        match self {
            Self::Release => RELEASE_SCRIPT_LUA,
            Self::Refresh => REFRESH_SCRIPT_LUA,
            Self::Check => CHECK_SCRIPT_LUA,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Refresh => "refresh",
            Self::Check => "check",
        }
    }
}
