//! Finding configuration files.
//!
//! Each configuration root is either a single file or a directory of
//! `*.conf` files.  Files from all roots are merged into one list sorted
//! by file name; when two roots provide the same name, the root listed
//! first wins.  This lets `/etc/modprobe.d/foo.conf` mask a vendor
//! supplied `/usr/lib/modprobe.d/foo.conf`.

use std::ffi::OsString;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std_ext::cap_std;
use cap_std_ext::cap_std::fs::Dir;
use fn_error_context::context;
use rustix::fs::{AtFlags, FileType};

const CONF_SUFFIX: &str = ".conf";

/// A file scheduled for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfFile {
    /// The root it was found in; for a single-file root this is the file.
    dir: Utf8PathBuf,
    /// The sort key.
    name: String,
    is_single: bool,
}

impl ConfFile {
    pub(crate) fn path(&self) -> Utf8PathBuf {
        if self.is_single {
            self.dir.clone()
        } else {
            self.dir.join(&self.name)
        }
    }
}

/// The merged, sorted list of files to parse.
#[derive(Debug, Default)]
pub(crate) struct ConfFiles(Vec<ConfFile>);

impl ConfFiles {
    /// Insert `dir/name`, or the single file `dir` when `name` is `None`.
    ///
    /// Returns false if a file with the same name is already present.
    pub(crate) fn insert(&mut self, dir: &Utf8Path, name: Option<&str>) -> bool {
        let (name, is_single) = match name {
            Some(name) => (name, false),
            None => (dir.file_name().unwrap_or(dir.as_str()), true),
        };
        match self.0.binary_search_by(|cf| cf.name.as_str().cmp(name)) {
            Ok(_) => {
                tracing::debug!("Ignoring duplicate config file: {dir}/{name}");
                false
            }
            Err(idx) => {
                let cf = ConfFile {
                    dir: dir.to_owned(),
                    name: name.to_owned(),
                    is_single,
                };
                self.0.insert(idx, cf);
                true
            }
        }
    }

    /// Add every eligible file of one configuration root and return the
    /// modification stamp of the root itself.
    #[context("Scanning {root}")]
    pub(crate) fn add_root(&mut self, root: &Utf8Path) -> Result<u64> {
        let meta = std::fs::metadata(root)?;
        let stamp = kmod_utils::mstamp(&meta);

        if !meta.is_dir() {
            self.insert(root, None);
            return Ok(stamp);
        }

        let dir = Dir::open_ambient_dir(root, cap_std::ambient_authority())
            .inspect_err(|e| tracing::error!("opendir({root}): {e}"))?;
        let entries = dir
            .entries()
            .context("Reading directory")?
            .map(|entry| entry.map(|e| e.file_name()));
        self.add_entries(root, entries, |name| is_eligible(&dir, root, name));
        Ok(stamp)
    }

    /// Insert the eligible names of a directory listing.  An unreadable
    /// entry ends the listing but keeps what was found before it.
    fn add_entries(
        &mut self,
        root: &Utf8Path,
        entries: impl IntoIterator<Item = std::io::Result<OsString>>,
        mut eligible: impl FnMut(&str) -> bool,
    ) {
        for entry in entries {
            let name = match entry {
                Ok(name) => name,
                Err(e) => {
                    tracing::error!("readdir({root}): {e}");
                    break;
                }
            };
            let Some(name) = name.to_str() else {
                tracing::debug!("Skipping non-UTF-8 file name in {root}: {name:?}");
                continue;
            };
            if eligible(name) {
                self.insert(root, Some(name));
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ConfFile> {
        self.0.iter()
    }
}

/// Hidden files, files without the `.conf` suffix and directories are
/// skipped.
fn is_eligible(dir: &Dir, root: &Utf8Path, name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    if name.len() <= CONF_SUFFIX.len() || !name.ends_with(CONF_SUFFIX) {
        return false;
    }
    // Follow symlinks; entries commonly point outside the root.
    let st = match rustix::fs::statat(dir, name, AtFlags::empty()) {
        Ok(st) => st,
        Err(e) => {
            tracing::error!("Cannot stat directory entry: {root}/{name}: {e}");
            return false;
        }
    };
    if FileType::from_raw_mode(st.st_mode) == FileType::Directory {
        tracing::error!("Directories inside directories are not supported: {root}/{name}");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &ConfFiles) -> Vec<&str> {
        files.iter().map(|cf| cf.name.as_str()).collect()
    }

    #[test]
    fn test_insert_sorted() {
        let mut files = ConfFiles::default();
        assert!(files.insert(Utf8Path::new("/etc/modprobe.d"), Some("b.conf")));
        assert!(files.insert(Utf8Path::new("/etc/modprobe.d"), Some("a.conf")));
        assert!(files.insert(Utf8Path::new("/usr/lib/modprobe.d"), Some("c.conf")));
        assert!(!files.insert(Utf8Path::new("/usr/lib/modprobe.d"), Some("a.conf")));
        assert_eq!(names(&files), ["a.conf", "b.conf", "c.conf"]);
        assert_eq!(
            files.iter().next().map(|cf| cf.path()),
            Some(Utf8PathBuf::from("/etc/modprobe.d/a.conf"))
        );
    }

    #[test]
    fn test_insert_single() {
        let mut files = ConfFiles::default();
        assert!(files.insert(Utf8Path::new("/etc/custom"), None));
        // the basename takes part in duplicate detection
        assert!(!files.insert(Utf8Path::new("/etc/modprobe.d"), Some("custom")));
        let cf = files.iter().next().unwrap();
        assert_eq!(cf.name, "custom");
        assert_eq!(cf.path(), "/etc/custom");
    }

    #[test]
    fn test_add_root() -> Result<()> {
        let td = tempfile::tempdir()?;
        let root = Utf8PathBuf::try_from(td.path().to_owned())?;
        for f in ["b.conf", "a.conf", ".hidden.conf", "notes.txt", ".conf", "x.conf.bak"] {
            std::fs::write(root.join(f), "")?;
        }
        std::fs::create_dir(root.join("nested.conf"))?;
        std::os::unix::fs::symlink(root.join("a.conf"), root.join("link.conf"))?;
        std::os::unix::fs::symlink(root.join("nested.conf"), root.join("dirlink.conf"))?;
        std::os::unix::fs::symlink(root.join("missing"), root.join("dangling.conf"))?;

        let mut files = ConfFiles::default();
        let stamp = files.add_root(&root)?;
        assert_eq!(stamp, kmod_utils::path_mstamp(&root)?);
        assert_eq!(names(&files), ["a.conf", "b.conf", "link.conf"]);
        Ok(())
    }

    #[test]
    fn test_add_entries_read_error() {
        let root = Utf8Path::new("/etc/modprobe.d");
        let entries = vec![
            Ok(OsString::from("b.conf")),
            Ok(OsString::from("a.conf")),
            Err(std::io::Error::other("bad entry")),
            Ok(OsString::from("c.conf")),
        ];
        let mut files = ConfFiles::default();
        files.add_entries(root, entries, |_| true);
        assert_eq!(names(&files), ["a.conf", "b.conf"]);
    }

    #[test]
    fn test_add_root_missing() {
        let mut files = ConfFiles::default();
        let err = files.add_root(Utf8Path::new("/no/such/modprobe.d")).unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/modprobe.d"));
        assert_eq!(files.iter().count(), 0);
    }
}
