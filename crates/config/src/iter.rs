//! Uniform iteration over the entry lists of a [`Config`].
//!
//! Every entry projects to a key (the module or alias name) and an
//! optional value.  Dependency values are rendered on demand.

use std::borrow::Cow;
use std::fmt;

use crate::deps::{SoftDep, WeakDep};
use crate::entry::{Alias, Blacklist, Command, ModuleOptions};
use crate::store::Config;

/// The entry lists of a [`Config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// `blacklist` entries.
    Blacklist,
    /// `install` commands.
    Install,
    /// `remove` commands.
    Remove,
    /// `alias` entries.
    Alias,
    /// `options` entries.
    Options,
    /// `softdep` entries.
    SoftDep,
    /// `weakdep` entries.
    WeakDep,
}

impl ConfigKind {
    /// Every kind, in the order configuration is dumped.
    pub const ALL: [ConfigKind; 7] = [
        ConfigKind::Blacklist,
        ConfigKind::Install,
        ConfigKind::Remove,
        ConfigKind::Alias,
        ConfigKind::Options,
        ConfigKind::SoftDep,
        ConfigKind::WeakDep,
    ];

    /// The configuration file keyword for this kind.
    pub fn directive(self) -> &'static str {
        match self {
            ConfigKind::Blacklist => "blacklist",
            ConfigKind::Install => "install",
            ConfigKind::Remove => "remove",
            ConfigKind::Alias => "alias",
            ConfigKind::Options => "options",
            ConfigKind::SoftDep => "softdep",
            ConfigKind::WeakDep => "weakdep",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}

/// A reference to one entry of any kind.
#[derive(Clone, Copy, Debug)]
pub enum ConfigEntry<'a> {
    /// See [`ConfigKind::Blacklist`].
    Blacklist(&'a Blacklist),
    /// See [`ConfigKind::Install`].
    Install(&'a Command),
    /// See [`ConfigKind::Remove`].
    Remove(&'a Command),
    /// See [`ConfigKind::Alias`].
    Alias(&'a Alias),
    /// See [`ConfigKind::Options`].
    Options(&'a ModuleOptions),
    /// See [`ConfigKind::SoftDep`].
    SoftDep(&'a SoftDep),
    /// See [`ConfigKind::WeakDep`].
    WeakDep(&'a WeakDep),
}

impl<'a> ConfigEntry<'a> {
    pub(crate) fn get(config: &'a Config, kind: ConfigKind, index: usize) -> Option<Self> {
        let entry = match kind {
            ConfigKind::Blacklist => Self::Blacklist(config.blacklists().get(index)?),
            ConfigKind::Install => Self::Install(config.install_commands().get(index)?),
            ConfigKind::Remove => Self::Remove(config.remove_commands().get(index)?),
            ConfigKind::Alias => Self::Alias(config.aliases().get(index)?),
            ConfigKind::Options => Self::Options(config.options().get(index)?),
            ConfigKind::SoftDep => Self::SoftDep(config.softdeps().get(index)?),
            ConfigKind::WeakDep => Self::WeakDep(config.weakdeps().get(index)?),
        };
        Some(entry)
    }

    /// Which list the entry belongs to.
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Blacklist(_) => ConfigKind::Blacklist,
            Self::Install(_) => ConfigKind::Install,
            Self::Remove(_) => ConfigKind::Remove,
            Self::Alias(_) => ConfigKind::Alias,
            Self::Options(_) => ConfigKind::Options,
            Self::SoftDep(_) => ConfigKind::SoftDep,
            Self::WeakDep(_) => ConfigKind::WeakDep,
        }
    }

    /// The alias name for aliases, the module name otherwise.
    pub fn key(&self) -> &'a str {
        match *self {
            Self::Blacklist(b) => b.modname(),
            Self::Install(c) | Self::Remove(c) => c.modname(),
            Self::Alias(a) => a.name(),
            Self::Options(o) => o.modname(),
            Self::SoftDep(d) => d.name(),
            Self::WeakDep(d) => d.name(),
        }
    }

    /// The payload of the entry.
    ///
    /// Blacklist entries have none.  Dependency lists are rendered into
    /// a new string, which is `None` if that allocation fails.
    pub fn value(&self) -> Option<Cow<'a, str>> {
        match *self {
            Self::Blacklist(_) => None,
            Self::Install(c) | Self::Remove(c) => Some(Cow::Borrowed(c.command())),
            Self::Alias(a) => Some(Cow::Borrowed(a.modname())),
            Self::Options(o) => Some(Cow::Borrowed(o.options())),
            Self::SoftDep(d) => d.to_display().map(Cow::Owned),
            Self::WeakDep(d) => d.to_display().map(Cow::Owned),
        }
    }
}

/// Renders the entry as a configuration file line.
impl fmt::Display for ConfigEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.key())?;
        match self.value() {
            Some(v) if !v.is_empty() => write!(f, " {v}"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
enum Cursor<'a> {
    Start,
    At {
        index: usize,
        entry: ConfigEntry<'a>,
        /// Filled on the first call to [`ConfigIter::value`].
        value: Option<Option<Cow<'a, str>>>,
    },
    End,
}

/// A cursor over one entry list of a [`Config`].
///
/// The cursor starts before the first entry; call [`ConfigIter::advance`]
/// to move onto it.  Once past the last entry it stays exhausted.
#[derive(Debug)]
pub struct ConfigIter<'a> {
    config: &'a Config,
    kind: ConfigKind,
    cursor: Cursor<'a>,
}

impl<'a> ConfigIter<'a> {
    pub(crate) fn new(config: &'a Config, kind: ConfigKind) -> Self {
        Self {
            config,
            kind,
            cursor: Cursor::Start,
        }
    }

    /// The list this cursor walks.
    pub fn kind(&self) -> ConfigKind {
        self.kind
    }

    /// Move to the next entry, returning false when there is none.
    pub fn advance(&mut self) -> bool {
        let index = match self.cursor {
            Cursor::Start => 0,
            Cursor::At { index, .. } => index + 1,
            Cursor::End => return false,
        };
        match ConfigEntry::get(self.config, self.kind, index) {
            Some(entry) => {
                self.cursor = Cursor::At {
                    index,
                    entry,
                    value: None,
                };
                true
            }
            None => {
                self.cursor = Cursor::End;
                false
            }
        }
    }

    /// The current entry, if the cursor is on one.
    pub fn entry(&self) -> Option<ConfigEntry<'a>> {
        match self.cursor {
            Cursor::At { entry, .. } => Some(entry),
            _ => None,
        }
    }

    /// The key of the current entry.
    pub fn key(&self) -> Option<&'a str> {
        self.entry().map(|e| e.key())
    }

    /// The value of the current entry, rendered at most once per entry.
    pub fn value(&mut self) -> Option<&str> {
        match &mut self.cursor {
            Cursor::At { entry, value, .. } => value.get_or_insert_with(|| entry.value()).as_deref(),
            _ => None,
        }
    }
}
