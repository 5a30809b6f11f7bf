//! Atomic file replacement.

use std::io::Write;
use std::path::{Path, PathBuf};

use ragdb_core::Result;

/// Write `bytes` to `path` by way of a sibling temp file and a rename, so
/// readers see either the old file or the new one, never a partial write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    let outcome = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if outcome.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    Ok(outcome?)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
