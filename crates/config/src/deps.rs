//! Soft and weak dependency entries.
//!
//! Each entry is packed into a single string buffer holding the module
//! name followed by every dependency name, each one terminated by a NUL,
//! plus one slot per dependency recording where its name lives in the
//! buffer.  The buffer is sized exactly up front: a first pass over the
//! line only counts tokens and bytes (with checked arithmetic), then the
//! fill pass writes into the pre-sized buffer without ever growing it.
//!
//! The names of one list (`pre`, `post` or `weak`) always form one
//! contiguous block, and a `softdep`'s `pre` block always precedes its
//! `post` block.  Rendering a list back to text is therefore a single
//! copy of the block with the terminators turned into spaces.

use std::mem::size_of;

use crate::error::{ConfigError, Result};

const PRE_MARKER: &str = "pre:";
const POST_MARKER: &str = "post:";

/// Separator between names inside the packed buffer.
const TERMINATOR: char = '\0';

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

/// Split on runs of whitespace.
fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(is_space).filter(|t| !t.is_empty())
}

/// Tokens of a `softdep` line tagged with the list they belong to.
///
/// Tokens before the first marker belong to no list and are dropped.
fn softdep_tokens(line: &str) -> impl Iterator<Item = (usize, &str)> {
    #[derive(Clone, Copy)]
    enum Mode {
        None,
        Pre,
        Post,
    }

    let mut mode = Mode::None;
    tokens(line).filter_map(move |t| match t {
        PRE_MARKER => {
            mode = Mode::Pre;
            None
        }
        POST_MARKER => {
            mode = Mode::Post;
            None
        }
        t => match mode {
            Mode::None => None,
            Mode::Pre => Some((0, t)),
            Mode::Post => Some((1, t)),
        },
    })
}

/// Tokens of a `weakdep` line; all of them are weak dependencies.
fn weakdep_tokens(line: &str) -> impl Iterator<Item = (usize, &str)> {
    tokens(line).map(|t| (0, t))
}

/// Which measure overflowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Overflow {
    Count,
    Size,
}

/// Running totals for one dependency list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Measure {
    count: u32,
    /// Bytes of all names including their terminators.
    bytes: usize,
}

impl Measure {
    fn add(&mut self, token_len: usize) -> std::result::Result<(), Overflow> {
        self.count = self.count.checked_add(1).ok_or(Overflow::Count)?;
        self.bytes = token_len
            .checked_add(1)
            .and_then(|n| self.bytes.checked_add(n))
            .ok_or(Overflow::Size)?;
        Ok(())
    }
}

/// Where one name lives inside the packed buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Size of a packed entry: the header, the module name and its
/// terminator, one slot per dependency, and the dependency names.
///
/// Returns `None` if any step overflows.
fn packed_size(name_len: usize, counts: &[u32], bytes: usize) -> Option<usize> {
    let mut size = size_of::<Packed>().checked_add(name_len)?.checked_add(1)?;
    for &count in counts {
        let slots = usize::try_from(count)
            .ok()?
            .checked_mul(size_of::<Span>())?;
        size = size.checked_add(slots)?;
    }
    size.checked_add(bytes)
}

/// The module name and its dependency names in one buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Packed {
    buf: Box<str>,
    name_len: usize,
    /// All lists' slots, list after list.
    slots: Box<[Span]>,
}

impl Packed {
    /// Build from the list-tagged tokens produced by `scan`, which must
    /// return the same sequence every time it is called.
    fn build<'l, I, F, const N: usize>(
        modname: &str,
        kinds: [&'static str; N],
        scan: F,
    ) -> Result<(Self, [u32; N])>
    where
        F: Fn() -> I,
        I: Iterator<Item = (usize, &'l str)>,
    {
        // Measure
        let mut measures = [Measure::default(); N];
        for (list, token) in scan() {
            measures[list].add(token.len()).map_err(|o| match o {
                Overflow::Count => {
                    tracing::error!("too many {} dependencies for modname={modname}", kinds[list]);
                    ConfigError::TooManyDependencies {
                        modname: modname.to_owned(),
                        kind: kinds[list],
                    }
                }
                Overflow::Size => ConfigError::oom(modname),
            })?;
        }
        let counts = measures.map(|m| m.count);
        tracing::debug!("modname={modname} counts={counts:?}");

        let oom = || ConfigError::oom(modname);
        let bytes = measures
            .iter()
            .try_fold(0usize, |acc, m| acc.checked_add(m.bytes))
            .ok_or_else(oom)?;
        let size = packed_size(modname.len(), &counts, bytes).ok_or_else(oom)?;
        tracing::trace!("modname={modname} packed size={size}");
        let nslots = counts
            .iter()
            .try_fold(0usize, |acc, &n| acc.checked_add(usize::try_from(n).ok()?))
            .ok_or_else(oom)?;
        let buflen = modname
            .len()
            .checked_add(1)
            .and_then(|n| n.checked_add(bytes))
            .ok_or_else(oom)?;

        // Allocate
        let mut buf = String::new();
        buf.try_reserve_exact(buflen).map_err(|_| oom())?;
        let mut slots = Vec::new();
        slots.try_reserve_exact(nslots).map_err(|_| oom())?;

        // Fill, one list at a time so each list's names stay contiguous
        buf.push_str(modname);
        buf.push(TERMINATOR);
        for list in 0..N {
            for (_, token) in scan().filter(|&(l, _)| l == list) {
                slots.push(Span {
                    start: buf.len(),
                    len: token.len(),
                });
                buf.push_str(token);
                buf.push(TERMINATOR);
            }
        }
        debug_assert_eq!(buf.len(), buflen);
        debug_assert_eq!(slots.len(), nslots);

        let packed = Self {
            buf: buf.into_boxed_str(),
            name_len: modname.len(),
            slots: slots.into_boxed_slice(),
        };
        Ok((packed, counts))
    }

    fn name(&self) -> &str {
        &self.buf[..self.name_len]
    }

    fn list(&self, range: std::ops::Range<usize>) -> Deps<'_> {
        Deps {
            buf: &*self.buf,
            slots: self.slots[range].iter(),
        }
    }

    /// The packed block covering all names of a list, terminators
    /// between them included.  `None` for an empty list.
    fn block(&self, range: std::ops::Range<usize>) -> Option<&str> {
        let slots = &self.slots[range];
        let first = slots.first()?;
        let last = slots.last()?;
        Some(&self.buf[first.start..last.end()])
    }
}

/// Append `block` to `out` with every terminator turned into a space.
fn push_block(out: &mut String, block: &str) {
    out.extend(
        block
            .chars()
            .map(|c| if c == TERMINATOR { ' ' } else { c }),
    );
}

/// An iterator over the names of one dependency list.
#[derive(Clone, Debug)]
pub struct Deps<'a> {
    buf: &'a str,
    slots: std::slice::Iter<'a, Span>,
}

impl<'a> Iterator for Deps<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let span = self.slots.next()?;
        Some(&self.buf[span.start..span.end()])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl DoubleEndedIterator for Deps<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let span = self.slots.next_back()?;
        Some(&self.buf[span.start..span.end()])
    }
}

impl ExactSizeIterator for Deps<'_> {}

/// `softdep <modname> [pre: <names...>] [post: <names...>]`
///
/// Modules in `pre` should be loaded before `modname`, those in `post`
/// after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftDep {
    packed: Packed,
    n_pre: u32,
    n_post: u32,
}

impl SoftDep {
    /// Parse the text following the module name of a `softdep` line.
    pub fn new(modname: &str, line: &str) -> Result<Self> {
        tracing::debug!("modname={modname}");
        let (packed, [n_pre, n_post]) =
            Packed::build(modname, ["pre", "post"], || softdep_tokens(line))?;
        tracing::debug!("{n_pre} pre, {n_post} post");
        Ok(Self {
            packed,
            n_pre,
            n_post,
        })
    }

    fn pre_range(&self) -> std::ops::Range<usize> {
        0..self.n_pre as usize
    }

    fn post_range(&self) -> std::ops::Range<usize> {
        self.n_pre as usize..self.n_pre as usize + self.n_post as usize
    }

    /// The module the dependencies are for.
    pub fn name(&self) -> &str {
        self.packed.name()
    }

    /// Modules to load before this one, in configuration order.
    pub fn pre(&self) -> Deps<'_> {
        self.packed.list(self.pre_range())
    }

    /// Modules to load after this one, in configuration order.
    pub fn post(&self) -> Deps<'_> {
        self.packed.list(self.post_range())
    }

    /// Number of `pre` dependencies.
    pub fn n_pre(&self) -> u32 {
        self.n_pre
    }

    /// Number of `post` dependencies.
    pub fn n_post(&self) -> u32 {
        self.n_post
    }

    /// Render as configuration text, e.g. `pre: a b post: c`.
    ///
    /// Empty lists are left out.  Returns `None` if the string cannot be
    /// allocated.
    pub fn to_display(&self) -> Option<String> {
        let pre = self.packed.block(self.pre_range());
        let post = self.packed.block(self.post_range());

        let mut size = 0usize;
        if let Some(pre) = pre {
            size = size.checked_add(PRE_MARKER.len() + 1)?.checked_add(pre.len())?;
        }
        if let Some(post) = post {
            if size > 0 {
                size = size.checked_add(1)?;
            }
            size = size
                .checked_add(POST_MARKER.len() + 1)?
                .checked_add(post.len())?;
        }

        let mut s = String::new();
        s.try_reserve_exact(size).ok()?;
        if let Some(pre) = pre {
            s.push_str(PRE_MARKER);
            s.push(' ');
            push_block(&mut s, pre);
        }
        if let Some(post) = post {
            if !s.is_empty() {
                s.push(' ');
            }
            s.push_str(POST_MARKER);
            s.push(' ');
            push_block(&mut s, post);
        }
        Some(s)
    }
}

/// `weakdep <modname> <names...>`
///
/// Modules that may be used by `modname`, without any ordering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeakDep {
    packed: Packed,
    n_weak: u32,
}

impl WeakDep {
    /// Parse the text following the module name of a `weakdep` line.
    pub fn new(modname: &str, line: &str) -> Result<Self> {
        tracing::debug!("modname={modname}");
        let (packed, [n_weak]) = Packed::build(modname, ["weak"], || weakdep_tokens(line))?;
        tracing::debug!("{n_weak} weak");
        Ok(Self { packed, n_weak })
    }

    /// The module the dependencies are for.
    pub fn name(&self) -> &str {
        self.packed.name()
    }

    /// The weak dependencies, in configuration order.
    pub fn weak(&self) -> Deps<'_> {
        self.packed.list(0..self.n_weak as usize)
    }

    /// Number of weak dependencies.
    pub fn n_weak(&self) -> u32 {
        self.n_weak
    }

    /// Render as configuration text, e.g. `a b c`.
    ///
    /// Returns `None` if the string cannot be allocated.
    pub fn to_display(&self) -> Option<String> {
        let mut s = String::new();
        if let Some(weak) = self.packed.block(0..self.n_weak as usize) {
            s.try_reserve_exact(weak.len()).ok()?;
            push_block(&mut s, weak);
        }
        Some(s)
    }
}
