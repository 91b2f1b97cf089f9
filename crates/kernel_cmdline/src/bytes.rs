//! Reading the raw kernel command line.
//!
//! The line is kept as bytes; nothing here assumes it is valid UTF-8.

use std::borrow::Cow;
use std::io::Read;

use anyhow::{Context, Result};

use crate::modparam::ModuleParams;
use crate::CMDLINE_MAX;

/// A raw kernel command line.
///
/// Uses copy-on-write semantics so callers holding the line in memory
/// can scan it without copying; [`Cmdline::read_from`] owns its copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cmdline<'a>(Cow<'a, [u8]>);

/// An owned `Cmdline`.  Alias for `Cmdline<'static>`.
pub type CmdlineOwned = Cmdline<'static>;

impl<'a, T: AsRef<[u8]> + ?Sized> From<&'a T> for Cmdline<'a> {
    /// Creates a new `Cmdline` borrowing any type that can be referenced as bytes.
    fn from(input: &'a T) -> Self {
        Self(Cow::Borrowed(input.as_ref()))
    }
}

impl<'a> Cmdline<'a> {
    /// Reads the kernel command line from `reader`.
    ///
    /// The content must fit in a `CMDLINE_MAX` buffer together with its
    /// terminator.  Longer input is an error rather than being truncated.
    pub fn read_from(reader: impl Read) -> Result<CmdlineOwned> {
        let limit = CMDLINE_MAX - 1;
        let mut buf = Vec::with_capacity(limit);
        let mut reader = reader.take(CMDLINE_MAX as u64);
        reader
            .read_to_end(&mut buf)
            .context("Reading kernel command line")?;
        if buf.len() > limit {
            anyhow::bail!("Kernel command line exceeds {limit} bytes");
        }
        Ok(Cmdline(Cow::Owned(buf)))
    }

    /// The raw bytes of the command line.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the command line holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over every `module.param[=value]` entry.
    ///
    /// Tokens that are not addressed to a module (no `.` before any `=`),
    /// or that are ill-formed, are skipped.
    pub fn module_params(&self) -> ModuleParams {
        ModuleParams::new(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(CmdlineOwned: Send, Sync, Clone);
    static_assertions::assert_impl_all!(ModuleParams: Send, Iterator);

    #[test]
    fn test_read_from() {
        let kargs = Cmdline::read_from(b"root=/dev/vda ro quiet\n".as_slice()).unwrap();
        assert_eq!(kargs.as_bytes(), b"root=/dev/vda ro quiet\n");

        let kargs = Cmdline::read_from(b"".as_slice()).unwrap();
        assert!(kargs.is_empty());
    }

    #[test]
    fn test_read_from_limit() {
        // exactly as much as fits next to the terminator
        let fits = vec![b'a'; CMDLINE_MAX - 1];
        let kargs = Cmdline::read_from(fits.as_slice()).unwrap();
        assert_eq!(kargs.as_bytes().len(), CMDLINE_MAX - 1);

        // one more byte is an error, not a silent truncation
        let too_long = vec![b'a'; CMDLINE_MAX];
        let err = Cmdline::read_from(too_long.as_slice()).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        let way_too_long = vec![b'a'; CMDLINE_MAX * 3];
        assert!(Cmdline::read_from(way_too_long.as_slice()).is_err());
    }

    #[test]
    fn test_borrowed() {
        let raw = b"a.b=c";
        let kargs = Cmdline::from(raw);
        assert_eq!(kargs.as_bytes(), raw);
        assert_eq!(kargs.module_params().count(), 1);
    }
}
