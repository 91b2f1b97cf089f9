use std::fs::File;
use std::io::Read;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use fn_error_context::context;
use kmod_config::ConfigOptions;

/// The environment variable naming a TOML file with [`ConfigOptions`].
pub(crate) const CONFIG_VAR: &str = "KMODCONF_CONFIG";

/// Load options from the file named by [`CONFIG_VAR`], if set.
#[context("Loading options from ${CONFIG_VAR}")]
pub(crate) fn load() -> Result<Option<ConfigOptions>> {
    let Some(path) = std::env::var_os(CONFIG_VAR) else {
        return Ok(None);
    };
    let path = Utf8PathBuf::try_from(std::path::PathBuf::from(path))?;
    load_from(&path).map(Some)
}

#[context("Parsing {path}")]
pub(crate) fn load_from(path: &camino::Utf8Path) -> Result<ConfigOptions> {
    let mut s = String::new();
    File::open(path)
        .context("Opening")?
        .read_to_string(&mut s)?;
    let opts = toml::from_str(&s)?;
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn test_load_from() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = Utf8PathBuf::try_from(td.path().join("kmodconf.toml"))?;
        std::fs::write(
            &path,
            indoc! {r#"
                config-paths = ["/srv/modprobe.d"]
                kcmdline = "/srv/cmdline"
            "#},
        )?;
        let opts = load_from(&path)?;
        assert_eq!(opts.config_paths, [Utf8PathBuf::from("/srv/modprobe.d")]);
        assert_eq!(opts.kcmdline, Some(Utf8PathBuf::from("/srv/cmdline")));

        std::fs::write(&path, "config-dirs = []\n")?;
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("kmodconf.toml"));
        Ok(())
    }
}
