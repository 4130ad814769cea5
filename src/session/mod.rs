//! Durable cookie storage.
//!
//! The login flow persists cookies through the [`SessionStore`] contract;
//! everything else (format, location) is the store's business. The default
//! store is the filesystem, holding a pretty-printed JSON cookie array.

use std::path::Path;

use crate::app::Result;
use crate::config::SessionOptions;
use crate::page::Cookie;

pub trait SessionStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Filesystem-backed session store.
pub struct FsSessionStore;

impl SessionStore for FsSessionStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        Ok(std::fs::write(path, bytes)?)
    }
}

pub fn cookies_from_json(bytes: &[u8]) -> Result<Vec<Cookie>> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn cookies_to_json(cookies: &[Cookie]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(cookies)?)
}

/// Resolve the cookie set a fresh page should start from: inline JSON takes
/// precedence, then the cookie file when the store has it, else nothing.
pub fn initial_cookies<S: SessionStore>(
    options: &SessionOptions,
    store: &S,
) -> Result<Option<Vec<Cookie>>> {
    if let Some(ref raw) = options.cookies_json {
        return Ok(Some(cookies_from_json(raw.as_bytes())?));
    }
    if let Some(ref path) = options.cookies_file {
        if store.exists(path) {
            return Ok(Some(cookies_from_json(&store.read(path)?)?));
        }
    }
    Ok(None)
}
