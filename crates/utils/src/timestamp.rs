//! Modification stamps used to detect stale configuration.

use std::os::unix::fs::MetadataExt;

use anyhow::Result;
use camino::Utf8Path;
use fn_error_context::context;

const USEC_PER_SEC: u64 = 1_000_000;
const NSEC_PER_USEC: u64 = 1_000;

/// Pack the modification time of `meta` into a single comparable value,
/// in microseconds since the epoch.
///
/// Times before the epoch collapse to zero.
pub fn mstamp(meta: &std::fs::Metadata) -> u64 {
    let secs = u64::try_from(meta.mtime()).unwrap_or_default();
    let nsecs = u64::try_from(meta.mtime_nsec()).unwrap_or_default();
    secs.saturating_mul(USEC_PER_SEC)
        .saturating_add(nsecs / NSEC_PER_USEC)
}

/// Stat `path`, following symlinks, and return its modification stamp.
#[context("Querying modification time of {path}")]
pub fn path_mstamp(path: &Utf8Path) -> Result<u64> {
    let meta = std::fs::metadata(path)?;
    Ok(mstamp(&meta))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn test_mstamp() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = camino::Utf8PathBuf::try_from(td.path().join("f"))?;
        let f = std::fs::File::create(&path)?;
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::new(5, 123_456_789))?;
        drop(f);

        assert_eq!(path_mstamp(&path)?, 5_123_456);
        assert_eq!(mstamp(&std::fs::metadata(&path)?), 5_123_456);
        Ok(())
    }

    #[test]
    fn test_missing() {
        let err = path_mstamp(Utf8Path::new("/no/such/path")).unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/path"));
    }
}
