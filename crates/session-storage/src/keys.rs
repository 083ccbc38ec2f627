//! Storage key constants.

/// Keys used in the credential store.
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized `_forward_auth` session cookie (Set-Cookie syntax).
    pub const SESSION_COOKIE: &'static str = "template_library.session_cookie";
}
