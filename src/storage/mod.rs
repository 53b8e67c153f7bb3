//! Session storage for tokens and the cached user.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::ClientError;

/// Storage key names as constants.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// JSON-encoded `User` of the logged-in account
    pub const USER: &str = "user";

    pub const ALL: [&str; 3] = [ACCESS_TOKEN, REFRESH_TOKEN, USER];
}

/// String key/value store that outlives a single command.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;
}
