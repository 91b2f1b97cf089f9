//! Parsing of `modprobe.d` style configuration files.
//!
//! A malformed line is logged and skipped; it never aborts the rest of
//! the file.

use std::io::BufRead;

use camino::Utf8Path;

use crate::error::Result;
use crate::iter::ConfigKind;
use crate::modname::{normalize_alias, normalize_module_name};
use crate::store::Config;

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Reads lines, joining those that end in a backslash with the next.
#[derive(Debug)]
struct LogicalLines<R> {
    reader: R,
    /// The physical line number of the last line consumed.
    linenum: u32,
}

impl<R: BufRead> LogicalLines<R> {
    fn new(reader: R) -> Self {
        Self { reader, linenum: 0 }
    }

    fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        let mut pending = false;
        loop {
            let mut phys = Vec::new();
            if self.reader.read_until(b'\n', &mut phys)? == 0 {
                return Ok(pending.then_some(out));
            }
            self.linenum += 1;
            if phys.last() == Some(&b'\n') {
                phys.pop();
            }

            let mut continued = false;
            let mut bytes = phys.into_iter();
            while let Some(b) = bytes.next() {
                if b != b'\\' {
                    out.push(b);
                    continue;
                }
                match bytes.next() {
                    Some(escaped) => out.push(escaped),
                    None => continued = true,
                }
            }
            if !continued {
                return Ok(Some(out));
            }
            pending = true;
        }
    }
}

/// Split off the next blank-delimited token.
fn next_token<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let s = rest.trim_start_matches(is_blank);
    if s.is_empty() {
        *rest = s;
        return None;
    }
    let end = s.find(is_blank).unwrap_or(s.len());
    let (token, tail) = s.split_at(end);
    *rest = tail;
    Some(token)
}

/// Everything after the previous token, starting at the first non-blank
/// character.
fn remainder<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let s = rest.trim_start_matches(is_blank);
    *rest = "";
    (!s.is_empty()).then_some(s)
}

#[derive(Debug, PartialEq, Eq)]
enum Directive<'a> {
    Alias { name: String, modname: String },
    Blacklist(String),
    Options(String, &'a str),
    Command(ConfigKind, String, &'a str),
    SoftDep(String, &'a str),
    WeakDep(String, &'a str),
    Deprecated(&'a str),
}

/// Parse one logical line.  `Ok(None)` is a blank line; `Err` carries the
/// directive keyword of a malformed line.
fn parse_directive(line: &str) -> std::result::Result<Option<Directive<'_>>, &str> {
    let mut rest = line;
    let Some(cmd) = next_token(&mut rest) else {
        return Ok(None);
    };

    let module = |rest: &mut &str| {
        next_token(rest)
            .and_then(|m| normalize_module_name(m).ok())
            .ok_or(cmd)
    };

    let directive = match cmd {
        "alias" => {
            let name = next_token(&mut rest)
                .and_then(|n| normalize_alias(n).ok())
                .ok_or(cmd)?;
            let modname = module(&mut rest)?;
            Directive::Alias { name, modname }
        }
        "blacklist" => Directive::Blacklist(module(&mut rest)?),
        "options" => {
            let modname = module(&mut rest)?;
            Directive::Options(modname, remainder(&mut rest).ok_or(cmd)?)
        }
        "install" | "remove" => {
            let kind = if cmd == "install" {
                ConfigKind::Install
            } else {
                ConfigKind::Remove
            };
            let modname = module(&mut rest)?;
            Directive::Command(kind, modname, remainder(&mut rest).ok_or(cmd)?)
        }
        "softdep" => {
            let modname = module(&mut rest)?;
            Directive::SoftDep(modname, remainder(&mut rest).ok_or(cmd)?)
        }
        "weakdep" => {
            let modname = module(&mut rest)?;
            Directive::WeakDep(modname, remainder(&mut rest).ok_or(cmd)?)
        }
        "include" | "config" => Directive::Deprecated(cmd),
        _ => return Err(cmd),
    };
    Ok(Some(directive))
}

/// Parse one configuration file into `config`.
///
/// Only allocation failure is returned as an error.  A read error ends
/// the file early, keeping whatever was parsed before it.
pub(crate) fn parse(config: &mut Config, reader: impl BufRead, path: &Utf8Path) -> Result<()> {
    let mut lines = LogicalLines::new(reader);
    loop {
        let line = match lines.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("{path}: {e}");
                break;
            }
        };
        let linenum = lines.linenum;

        if line.first().is_none_or(|&b| b == b'#') {
            continue;
        }
        let Ok(line) = std::str::from_utf8(&line) else {
            tracing::error!("{path} line {linenum}: ignoring line that is not valid UTF-8");
            continue;
        };

        let directive = match parse_directive(line) {
            Ok(Some(d)) => d,
            Ok(None) => continue,
            Err(cmd) => {
                tracing::error!("{path} line {linenum}: ignoring bad line starting with '{cmd}'");
                continue;
            }
        };

        match directive {
            Directive::Alias { name, modname } => config.add_alias(name, modname)?,
            Directive::Blacklist(modname) => config.add_blacklist(modname)?,
            Directive::Options(modname, options) => config.add_options(modname, options)?,
            Directive::Command(kind, modname, command) => {
                config.add_command(kind, modname, command)?
            }
            Directive::SoftDep(modname, line) => config.add_softdep(&modname, line)?,
            Directive::WeakDep(modname, line) => config.add_weakdep(&modname, line)?,
            Directive::Deprecated(cmd) => {
                tracing::error!("{path}: command {cmd} is deprecated and not parsed anymore");
            }
        }
    }
    Ok(())
}
