//! Folding kernel command line parameters into the store.

use std::fs::File;

use camino::Utf8Path;
use kmod_kernel_cmdline::bytes::Cmdline;
use kmod_kernel_cmdline::modparam::ModuleParam;
use kmod_kernel_cmdline::{BLACKLIST_PARAM, MODPROBE};

use crate::error::Result;
use crate::modname::normalize_module_name;
use crate::store::Config;

/// Read the kernel command line at `path` and add its module parameters
/// to `config`.
///
/// A missing or unreadable source is logged and contributes nothing.
pub(crate) fn parse_file(config: &mut Config, path: &Utf8Path) -> Result<()> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("could not open '{path}' for reading: {e}");
            return Ok(());
        }
    };
    let cmdline = match Cmdline::read_from(f) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("could not read from '{path}': {e:#}");
            return Ok(());
        }
    };
    parse_cmdline(config, &cmdline)
}

/// Add every module parameter of `cmdline` to `config`.
pub(crate) fn parse_cmdline(config: &mut Config, cmdline: &Cmdline) -> Result<()> {
    for param in cmdline.module_params() {
        add_param(config, &param)?;
    }
    Ok(())
}

fn add_param(config: &mut Config, param: &ModuleParam) -> Result<()> {
    let module = String::from_utf8_lossy(param.module());
    let Ok(text) = std::str::from_utf8(param.param()) else {
        tracing::error!("Ignoring option on kernel command line that is not valid UTF-8 for module '{module}'");
        return Ok(());
    };
    tracing::debug!("{module} {text}");

    if module == MODPROBE && param.key() == BLACKLIST_PARAM.as_bytes() {
        if let Some(value) = param.unquoted_value() {
            return add_blacklist(config, value);
        }
    }

    match normalize_module_name(&module) {
        Ok(modname) => config.add_options(modname, text),
        Err(e) => {
            tracing::error!(
                "Ignoring bad option on kernel command line while parsing module name: '{module}': {e}"
            );
            Ok(())
        }
    }
}

/// `modprobe.blacklist=a,b,c`
fn add_blacklist(config: &mut Config, value: &[u8]) -> Result<()> {
    for piece in value.split(|&b| b == b',').filter(|p| !p.is_empty()) {
        let piece = String::from_utf8_lossy(piece);
        match normalize_module_name(&piece) {
            Ok(modname) => config.add_blacklist(modname)?,
            Err(e) => tracing::error!(
                "Ignoring bad blacklist entry on kernel command line: '{piece}': {e}"
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn parse(line: &str) -> Result<Config> {
        let mut config = Config::default();
        parse_cmdline(&mut config, &Cmdline::from(line))?;
        Ok(config)
    }

    fn options(config: &Config) -> Vec<(&str, &str)> {
        config
            .options()
            .iter()
            .map(|o| (o.modname(), o.options()))
            .collect()
    }

    #[test]
    fn test_options() -> Result<()> {
        let config = parse("BOOT_IMAGE=/vmlinuz ro snd-hda-intel.model=auto e1000e.debug quiet\n")?;
        assert_eq!(
            options(&config),
            [("snd_hda_intel", "model=auto"), ("e1000e", "debug")]
        );
        assert!(config.blacklists().is_empty());
        Ok(())
    }

    #[test]
    fn test_blacklist() -> Result<()> {
        let config = parse("modprobe.blacklist=evbug,pcspkr")?;
        let names: Vec<_> = config.blacklists().iter().map(|b| b.modname()).collect();
        assert_eq!(names, ["evbug", "pcspkr"]);
        assert!(config.options().is_empty());

        let config = parse(r#"modprobe.blacklist="snd-pcsp,,bad/name" modprobe.blacklist="#)?;
        let names: Vec<_> = config.blacklists().iter().map(|b| b.modname()).collect();
        assert_eq!(names, ["snd_pcsp"]);
        assert!(config.options().is_empty());
        Ok(())
    }

    #[test]
    fn test_modprobe_options() -> Result<()> {
        // anything else addressed to modprobe is kept as an option
        let config = parse("modprobe.blacklist modprobe.verbose=1")?;
        assert_eq!(
            options(&config),
            [("modprobe", "blacklist"), ("modprobe", "verbose=1")]
        );
        Ok(())
    }

    #[test]
    fn test_unmangle() -> Result<()> {
        let config = parse(r#""parport.dyndbg=file drivers/parport/ieee1284_ops.c +mpf" quiet"#)?;
        assert_eq!(
            options(&config),
            [("parport", r#"dyndbg="file drivers/parport/ieee1284_ops.c +mpf""#)]
        );
        Ok(())
    }

    #[test]
    fn test_bad_module() -> Result<()> {
        let config = parse("foo:bar.x=1 good.y=2")?;
        assert_eq!(options(&config), [("good", "y=2")]);

        // a slash is not part of a module name either
        let config = parse("foo/bar.x=1 good.y=2 a/b.c=3")?;
        assert_eq!(options(&config), [("good", "y=2")]);
        Ok(())
    }

    #[test]
    fn test_missing_source() -> Result<()> {
        let mut config = Config::default();
        parse_file(&mut config, Utf8Path::new("/no/such/cmdline"))?;
        assert!(config.options().is_empty());
        Ok(())
    }

    #[test]
    fn test_oversized_source() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = camino::Utf8PathBuf::try_from(td.path().join("cmdline"))?;
        let mut line = "a.b=1 ".repeat(kmod_kernel_cmdline::CMDLINE_MAX);
        line.push('\n');
        std::fs::write(&path, line)?;

        let mut config = Config::default();
        parse_file(&mut config, &path)?;
        assert!(config.options().is_empty());
        Ok(())
    }
}
