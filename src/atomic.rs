//! Atomic file replacement for token and cache files.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Write `contents` to `path` via a temp file in the same directory, then rename.
///
/// When `private` is set the file is restricted to the owner (0600) on unix.
pub fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;

    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tmp.as_file().metadata()?.permissions();
        perms.set_mode(0o600);
        tmp.as_file().set_permissions(perms)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
