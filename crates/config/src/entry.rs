//! The plain configuration entries.
//!
//! Every entry is keyed by a module name.  Entries never reference each
//! other; finding everything that applies to one module means scanning
//! the relevant list.

use camino::{Utf8Path, Utf8PathBuf};

/// `alias <name> <modname>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alias {
    name: String,
    modname: String,
}

impl Alias {
    pub(crate) fn new(name: String, modname: String) -> Self {
        Self { name, modname }
    }

    /// The alias (a modalias pattern or alternate name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module the alias resolves to.
    pub fn modname(&self) -> &str {
        &self.modname
    }
}

/// `options <modname> <options...>`
///
/// Several entries may exist for one module; they accumulate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleOptions {
    modname: String,
    options: String,
}

impl ModuleOptions {
    pub(crate) fn new(modname: String, options: &str) -> Self {
        Self {
            modname,
            options: options.replace('\t', " "),
        }
    }

    /// The module the options apply to.
    pub fn modname(&self) -> &str {
        &self.modname
    }

    /// The option text, with tabs turned into spaces.
    pub fn options(&self) -> &str {
        &self.options
    }
}

/// `install <modname> <command...>` or `remove <modname> <command...>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    modname: String,
    command: String,
}

impl Command {
    pub(crate) fn new(modname: String, command: &str) -> Self {
        Self {
            modname,
            command: command.to_owned(),
        }
    }

    /// The module the command replaces loading or unloading of.
    pub fn modname(&self) -> &str {
        &self.modname
    }

    /// The shell command line.
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// `blacklist <modname>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blacklist(String);

impl Blacklist {
    pub(crate) fn new(modname: String) -> Self {
        Self(modname)
    }

    /// The module excluded from automatic loading.
    pub fn modname(&self) -> &str {
        &self.0
    }
}

/// A configuration root that contributed to the store, with the
/// modification stamp it had when it was scanned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigPath {
    path: Utf8PathBuf,
    stamp: u64,
}

impl ConfigPath {
    pub(crate) fn new(path: &Utf8Path, stamp: u64) -> Self {
        Self {
            path: path.to_owned(),
            stamp,
        }
    }

    /// The root as it was configured.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Modification stamp in microseconds, see [`kmod_utils::mstamp`].
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Whether the root changed (or disappeared) since it was scanned.
    pub fn is_stale(&self) -> bool {
        match kmod_utils::path_mstamp(&self.path) {
            Ok(stamp) => stamp != self.stamp,
            Err(e) => {
                tracing::debug!("{e:#}");
                true
            }
        }
    }
}
