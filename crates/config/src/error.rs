//! Errors which abort building the configuration.
//!
//! Everything else that can go wrong while reading configuration (an
//! unreadable file, a malformed line, a duplicate file name) is logged
//! and skipped instead.

/// A fatal error while building configuration entries.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Memory for an entry could not be allocated, or computing its size
    /// overflowed.
    #[error("out of memory while adding configuration for module {modname}")]
    OutOfMemory {
        /// The module the entry was for.
        modname: String,
    },
    /// A dependency list holds more entries than a 32-bit count allows.
    #[error("too many {kind} dependencies for module {modname}")]
    TooManyDependencies {
        /// The module the entry was for.
        modname: String,
        /// Which list overflowed: `pre`, `post` or `weak`.
        kind: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn oom(modname: &str) -> Self {
        tracing::error!("out-of-memory modname={modname}");
        Self::OutOfMemory {
            modname: modname.to_owned(),
        }
    }
}

/// Result alias for fallible configuration building.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Append `item` to `list`, reporting allocation failure instead of aborting.
pub(crate) fn try_push<T>(list: &mut Vec<T>, item: T, modname: &str) -> Result<()> {
    list.try_reserve(1).map_err(|_| ConfigError::oom(modname))?;
    list.push(item);
    Ok(())
}
