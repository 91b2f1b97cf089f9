//! Module and alias name normalization.
//!
//! Module names treat `-` and `_` as the same character; the canonical
//! spelling uses underscores.  Alias names are modalias patterns and may
//! carry `[...]` character classes, inside of which dashes are ranges and
//! must be left alone.

/// A name rejected by normalization.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvalidName {
    /// The name is empty.
    #[error("empty name")]
    Empty,
    /// A `[` without a matching `]`, or a stray `]`.
    #[error("unbalanced brackets in '{0}'")]
    UnbalancedBracket(String),
    /// A character not permitted in this kind of name.
    #[error("invalid character {1:?} in '{0}'")]
    Character(String, char),
}

fn is_module_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_alias_char(c: char) -> bool {
    c.is_ascii_graphic() && c != '/'
}

/// Replace dashes with underscores outside of bracket groups.
fn underscores(name: &str) -> Result<String, InvalidName> {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        match c {
            '-' => out.push('_'),
            ']' => return Err(InvalidName::UnbalancedBracket(name.to_owned())),
            '[' => {
                out.push(c);
                loop {
                    match chars.next() {
                        Some(c) => {
                            out.push(c);
                            if c == ']' {
                                break;
                            }
                        }
                        None => return Err(InvalidName::UnbalancedBracket(name.to_owned())),
                    }
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Validate a module name and return its canonical spelling.
///
/// Module names consist of ASCII alphanumerics, `_` and `-`.
pub fn normalize_module_name(name: &str) -> Result<String, InvalidName> {
    if name.is_empty() {
        return Err(InvalidName::Empty);
    }
    if let Some(c) = name.chars().find(|&c| !is_module_char(c)) {
        return Err(InvalidName::Character(name.to_owned(), c));
    }
    underscores(name)
}

/// Validate an alias name and return its canonical spelling.
///
/// Aliases are glob patterns over modalias strings such as
/// `pci:v00008086d*sv*`, so any printable ASCII other than `/` is
/// accepted, as long as bracket groups are balanced.
pub fn normalize_alias(name: &str) -> Result<String, InvalidName> {
    if name.is_empty() {
        return Err(InvalidName::Empty);
    }
    if let Some(c) = name.chars().find(|&c| !is_alias_char(c)) {
        return Err(InvalidName::Character(name.to_owned(), c));
    }
    underscores(name)
}

/// Compare two module names, treating dashes and underscores as equal.
pub fn modname_eq(a: &str, b: &str) -> bool {
    let dedashed = |c: u8| if c == b'-' { b'_' } else { c };

    // We can't just zip() because leading substrings would match
    let ours = a.bytes().map(dedashed);
    let theirs = b.bytes().map(dedashed);
    ours.eq(theirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name() {
        assert_eq!(normalize_module_name("snd-hda-intel").unwrap(), "snd_hda_intel");
        assert_eq!(normalize_module_name("e1000e").unwrap(), "e1000e");
        assert_eq!(normalize_module_name("a_b-c").unwrap(), "a_b_c");

        assert_eq!(normalize_module_name(""), Err(InvalidName::Empty));
        assert!(matches!(
            normalize_module_name("foo/bar"),
            Err(InvalidName::Character(_, '/'))
        ));
        assert!(normalize_module_name("foo.bar").is_err());
        assert!(normalize_module_name("foo[1]").is_err());
        assert!(normalize_module_name("föo").is_err());
    }

    #[test]
    fn test_alias() {
        assert_eq!(
            normalize_alias("pci:v00008086d*sv*sd*bc*sc*i*").unwrap(),
            "pci:v00008086d*sv*sd*bc*sc*i*"
        );
        assert_eq!(normalize_alias("char-major-10-175").unwrap(), "char_major_10_175");
        // dashes inside brackets are character ranges
        assert_eq!(normalize_alias("usb:v[0-9]-x").unwrap(), "usb:v[0-9]_x");

        assert!(matches!(
            normalize_alias("usb:v[0-9"),
            Err(InvalidName::UnbalancedBracket(_))
        ));
        assert!(matches!(
            normalize_alias("usb:v0-9]"),
            Err(InvalidName::UnbalancedBracket(_))
        ));
        assert!(normalize_alias("foo/bar").is_err());
        assert!(normalize_alias("").is_err());
    }

    #[test]
    fn test_modname_eq() {
        assert!(modname_eq("snd-hda", "snd_hda"));
        assert!(modname_eq("snd_hda", "snd_hda"));
        assert!(!modname_eq("snd", "snd_hda"));
        assert!(!modname_eq("snd_hda", "snd"));
        assert!(!modname_eq("snd_hda", "snd_hdb"));
    }
}
