//! Session-scoped credential storage for the terminal client.
//!
//! The credential lives in a directory keyed by the terminal session id, so
//! it is shared by commands run from the same shell and gone for a new one.
//! `EVENTDESK_SESSION_DIR` overrides the location.

use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::path::PathBuf;

use eventdesk_core::FileStorage;

pub const SESSION_DIR_ENV: &str = "EVENTDESK_SESSION_DIR";

/// Storage scoped to the current terminal session.
pub fn session_storage() -> Result<FileStorage> {
    let dir = match std::env::var_os(SESSION_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => default_session_dir(),
    };
    create_private_dir(&dir)?;
    tracing::debug!(dir = %dir.display(), "Using session storage");
    Ok(FileStorage::new(dir))
}

fn default_session_dir() -> PathBuf {
    let base = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    base.join("eventdesk").join(session_key())
}

/// Terminal session id, or the parent process id when there is none.
fn session_key() -> String {
    match nix::unistd::getsid(None) {
        Ok(sid) => format!("session-{}", sid),
        Err(_) => format!("session-ppid-{}", nix::unistd::getppid()),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .context(format!("Failed to create session directory {}", dir.display()))?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &std::path::Path) -> Result<()> {
    fs::create_dir_all(dir).context(format!("Failed to create session directory {}", dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_stable() {
        assert_eq!(session_key(), session_key());
        assert!(session_key().starts_with("session-"));
    }

    #[test]
    fn test_default_dir_is_per_session() {
        let dir = default_session_dir();
        assert!(dir.ends_with(session_key()));
        assert_eq!(dir.parent().and_then(|p| p.file_name()).unwrap(), "eventdesk");
    }

    #[cfg(unix)]
    #[test]
    fn test_private_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");
        create_private_dir(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
