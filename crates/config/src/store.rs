//! The configuration store.

use std::fs::File;
use std::io::BufReader;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::deps::{SoftDep, WeakDep};
use crate::discovery::ConfFiles;
use crate::entry::{Alias, Blacklist, Command, ConfigPath, ModuleOptions};
use crate::error::{try_push, Result};
use crate::iter::{ConfigEntry, ConfigIter, ConfigKind};
use crate::modname::modname_eq;
use crate::{kcmdline, parser};

/// Well-known file in the module directory generated from module
/// metadata, holding `softdep` lines.
pub const MODULES_SOFTDEP: &str = "modules.softdep";
/// Well-known file in the module directory generated from module
/// metadata, holding `weakdep` lines.
pub const MODULES_WEAKDEP: &str = "modules.weakdep";

/// The configuration roots consulted by default, highest priority first.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/modprobe.d",
    "/run/modprobe.d",
    "/usr/local/lib/modprobe.d",
    "/usr/lib/modprobe.d",
    "/lib/modprobe.d",
];

/// Where configuration is read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigOptions {
    /// Directory holding [`MODULES_SOFTDEP`] and [`MODULES_WEAKDEP`],
    /// usually `/lib/modules/$(uname -r)`.
    pub module_dir: Option<Utf8PathBuf>,
    /// Configuration roots, highest priority first.  Each is either a
    /// directory of `*.conf` files or a single file.
    pub config_paths: Vec<Utf8PathBuf>,
    /// Source of the kernel command line; `None` skips it.
    pub kcmdline: Option<Utf8PathBuf>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            module_dir: default_module_dir(),
            config_paths: DEFAULT_CONFIG_PATHS.iter().map(Utf8PathBuf::from).collect(),
            kcmdline: Some(kmod_kernel_cmdline::PROC_CMDLINE.into()),
        }
    }
}

/// `/lib/modules/<release>` for the running kernel.
pub fn default_module_dir() -> Option<Utf8PathBuf> {
    let uts = rustix::system::uname();
    match uts.release().to_str() {
        Ok(release) => Some(Utf8PathBuf::from(format!("/lib/modules/{release}"))),
        Err(e) => {
            tracing::debug!("Kernel release is not UTF-8: {e}");
            None
        }
    }
}

/// All configuration relevant to loading modules.
///
/// The store is built once by [`Config::new`] and is read-only
/// afterwards.
#[derive(Debug, Default)]
pub struct Config {
    aliases: Vec<Alias>,
    blacklists: Vec<Blacklist>,
    options: Vec<ModuleOptions>,
    install_commands: Vec<Command>,
    remove_commands: Vec<Command>,
    softdeps: Vec<SoftDep>,
    weakdeps: Vec<WeakDep>,
    paths: Vec<ConfigPath>,
}

impl Config {
    /// Read every configuration file and the kernel command line.
    ///
    /// Unreadable files, malformed lines and duplicate file names are
    /// logged and skipped.  Only failing to allocate an entry is an
    /// error.
    pub fn new(opts: &ConfigOptions) -> Result<Self> {
        let mut files = ConfFiles::default();
        if let Some(dir) = opts.module_dir.as_deref() {
            files.insert(dir, Some(MODULES_SOFTDEP));
            files.insert(dir, Some(MODULES_WEAKDEP));
        }

        let mut paths = Vec::new();
        for root in &opts.config_paths {
            match files.add_root(root) {
                Ok(stamp) => try_push(&mut paths, ConfigPath::new(root, stamp), root.as_str())?,
                Err(e) => tracing::debug!("{e:#}"),
            }
        }

        let mut config = Config {
            paths,
            ..Default::default()
        };

        for cf in files.iter() {
            let path = cf.path();
            match File::open(&path) {
                Ok(f) => {
                    tracing::debug!("parsing file '{path}'");
                    parser::parse(&mut config, BufReader::new(f), &path)?;
                }
                Err(e) => tracing::debug!("could not open '{path}': {e}"),
            }
        }

        if let Some(kcmdline) = opts.kcmdline.as_deref() {
            kcmdline::parse_file(&mut config, kcmdline)?;
        }

        Ok(config)
    }

    pub(crate) fn add_alias(&mut self, name: String, modname: String) -> Result<()> {
        tracing::debug!("name={name} modname={modname}");
        let alias = Alias::new(name, modname);
        let modname = alias.modname().to_owned();
        try_push(&mut self.aliases, alias, &modname)
    }

    pub(crate) fn add_blacklist(&mut self, modname: String) -> Result<()> {
        tracing::debug!("modname={modname}");
        let entry = Blacklist::new(modname);
        let modname = entry.modname().to_owned();
        try_push(&mut self.blacklists, entry, &modname)
    }

    pub(crate) fn add_options(&mut self, modname: String, options: &str) -> Result<()> {
        tracing::debug!("modname='{modname}' options='{options}'");
        let entry = ModuleOptions::new(modname, options);
        let modname = entry.modname().to_owned();
        try_push(&mut self.options, entry, &modname)
    }

    pub(crate) fn add_command(&mut self, kind: ConfigKind, modname: String, command: &str) -> Result<()> {
        tracing::debug!("modname='{modname}' cmd='{} {command}'", kind.directive());
        let entry = Command::new(modname, command);
        let modname = entry.modname().to_owned();
        let list = match kind {
            ConfigKind::Remove => &mut self.remove_commands,
            _ => &mut self.install_commands,
        };
        try_push(list, entry, &modname)
    }

    pub(crate) fn add_softdep(&mut self, modname: &str, line: &str) -> Result<()> {
        let dep = SoftDep::new(modname, line)?;
        try_push(&mut self.softdeps, dep, modname)
    }

    pub(crate) fn add_weakdep(&mut self, modname: &str, line: &str) -> Result<()> {
        let dep = WeakDep::new(modname, line)?;
        try_push(&mut self.weakdeps, dep, modname)
    }

    /// All `alias` entries, in parse order.
    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// All `blacklist` entries, in parse order.
    pub fn blacklists(&self) -> &[Blacklist] {
        &self.blacklists
    }

    /// All `options` entries, in parse order.
    pub fn options(&self) -> &[ModuleOptions] {
        &self.options
    }

    /// All `install` entries, in parse order.
    pub fn install_commands(&self) -> &[Command] {
        &self.install_commands
    }

    /// All `remove` entries, in parse order.
    pub fn remove_commands(&self) -> &[Command] {
        &self.remove_commands
    }

    /// All `softdep` entries, in parse order.
    pub fn softdeps(&self) -> &[SoftDep] {
        &self.softdeps
    }

    /// All `weakdep` entries, in parse order.
    pub fn weakdeps(&self) -> &[WeakDep] {
        &self.weakdeps
    }

    /// The configuration roots that were scanned.
    pub fn paths(&self) -> &[ConfigPath] {
        &self.paths
    }

    /// A cursor over one kind of entry.
    pub fn iter(&self, kind: ConfigKind) -> ConfigIter<'_> {
        ConfigIter::new(self, kind)
    }

    /// Iterate over one kind of entry.
    pub fn entries(&self, kind: ConfigKind) -> impl Iterator<Item = ConfigEntry<'_>> + '_ {
        (0..).map_while(move |i| ConfigEntry::get(self, kind, i))
    }

    /// Whether any configuration root changed since this store was built.
    pub fn needs_reload(&self) -> bool {
        self.paths.iter().any(|p| {
            let stale = p.is_stale();
            if stale {
                tracing::debug!("{} changed", p.path());
            }
            stale
        })
    }

    /// Every option string for `modname`, joined with spaces.
    pub fn module_options(&self, modname: &str) -> Option<String> {
        let opts: Vec<&str> = self
            .options
            .iter()
            .filter(|o| modname_eq(o.modname(), modname))
            .map(|o| o.options())
            .collect();
        (!opts.is_empty()).then(|| opts.join(" "))
    }

    /// Whether `modname` is blacklisted.
    pub fn is_blacklisted(&self, modname: &str) -> bool {
        self.blacklists
            .iter()
            .any(|b| modname_eq(b.modname(), modname))
    }

    /// Modules an `alias` line with exactly this name resolves to.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases
            .iter()
            .filter(move |a| modname_eq(a.name(), name))
            .map(|a| a.modname())
    }

    /// The `softdep` entries for `modname`.
    pub fn softdeps_of<'a>(&'a self, modname: &'a str) -> impl Iterator<Item = &'a SoftDep> + 'a {
        self.softdeps
            .iter()
            .filter(move |d| modname_eq(d.name(), modname))
    }

    /// The `weakdep` entries for `modname`.
    pub fn weakdeps_of<'a>(&'a self, modname: &'a str) -> impl Iterator<Item = &'a WeakDep> + 'a {
        self.weakdeps
            .iter()
            .filter(move |d| modname_eq(d.name(), modname))
    }

    /// The `install` commands for `modname`.
    pub fn install_commands_of<'a>(&'a self, modname: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.install_commands
            .iter()
            .filter(move |c| modname_eq(c.modname(), modname))
            .map(|c| c.command())
    }

    /// The `remove` commands for `modname`.
    pub fn remove_commands_of<'a>(&'a self, modname: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.remove_commands
            .iter()
            .filter(move |c| modname_eq(c.modname(), modname))
            .map(|c| c.command())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use anyhow::Result;
    use camino::Utf8Path;
    use indoc::indoc;

    use super::*;

    static_assertions::assert_impl_all!(Config: Send, Sync);
    static_assertions::assert_impl_all!(ConfigOptions: Send, Sync, Clone);

    struct Fixture {
        _td: tempfile::TempDir,
        root: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let td = tempfile::tempdir()?;
            let root = Utf8PathBuf::try_from(td.path().to_owned())?;
            Ok(Self { _td: td, root })
        }

        fn write(&self, rel: &str, contents: &str) -> Result<Utf8PathBuf> {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut f = File::create(&path)?;
            f.write_all(contents.as_bytes())?;
            Ok(path)
        }

        fn opts(&self, roots: &[&str]) -> ConfigOptions {
            ConfigOptions {
                module_dir: Some(self.root.join("modules")),
                config_paths: roots.iter().map(|r| self.root.join(r)).collect(),
                kcmdline: Some(self.root.join("cmdline")),
            }
        }
    }

    #[test]
    fn test_new() -> Result<()> {
        let fx = Fixture::new()?;
        fx.write(
            "etc/modprobe.d/sound.conf",
            indoc! {"
                # sound
                alias snd-card-0 snd-hda-intel
                options snd-hda-intel model=auto\tenable=1
                install snd_hda_intel /sbin/modprobe --ignore-install snd_hda_intel
                remove snd_hda_intel /bin/true
                softdep snd_hda_intel pre: snd_pcm post: snd_seq
                weakdep snd_hda_intel snd_hwdep
                blacklist pcspkr
            "},
        )?;
        fx.write("modules/modules.softdep", "softdep e1000e pre: ptp\n")?;
        fx.write("modules/modules.weakdep", "weakdep e1000e crc32c\n")?;
        fx.write("cmdline", "root=/dev/vda snd-hda-intel.power_save=0 modprobe.blacklist=evbug\n")?;

        let config = Config::new(&fx.opts(&["etc/modprobe.d"]))?;

        assert_eq!(config.aliases().len(), 1);
        assert_eq!(config.aliases()[0].name(), "snd_card_0");
        assert_eq!(config.aliases()[0].modname(), "snd_hda_intel");
        assert_eq!(
            config.module_options("snd-hda-intel").as_deref(),
            Some("model=auto enable=1 power_save=0")
        );
        assert_eq!(
            config.install_commands_of("snd_hda_intel").collect::<Vec<_>>(),
            ["/sbin/modprobe --ignore-install snd_hda_intel"]
        );
        assert_eq!(config.remove_commands_of("snd_hda_intel").collect::<Vec<_>>(), ["/bin/true"]);
        assert!(config.is_blacklisted("pcspkr"));
        assert!(config.is_blacklisted("evbug"));
        assert!(!config.is_blacklisted("snd_hda_intel"));
        assert_eq!(config.resolve_alias("snd-card-0").collect::<Vec<_>>(), ["snd_hda_intel"]);

        // modules.softdep sorts before sound.conf
        let softdeps: Vec<_> = config.softdeps().iter().map(|d| d.name()).collect();
        assert_eq!(softdeps, ["e1000e", "snd_hda_intel"]);
        let weakdeps: Vec<_> = config.weakdeps_of("e1000e").flat_map(|d| d.weak()).collect();
        assert_eq!(weakdeps, ["crc32c"]);

        assert_eq!(config.paths().len(), 1);
        assert!(!config.needs_reload());
        Ok(())
    }

    #[test]
    fn test_first_root_wins() -> Result<()> {
        let fx = Fixture::new()?;
        fx.write("etc/foo.conf", "options foo from=etc\n")?;
        fx.write("lib/foo.conf", "options foo from=lib\n")?;
        fx.write("lib/bar.conf", "options bar from=lib\n")?;

        let config = Config::new(&fx.opts(&["etc", "lib"]))?;
        assert_eq!(config.module_options("foo").as_deref(), Some("from=etc"));
        assert_eq!(config.module_options("bar").as_deref(), Some("from=lib"));
        assert_eq!(config.paths().len(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_everything() -> Result<()> {
        let fx = Fixture::new()?;
        let config = Config::new(&fx.opts(&["nope", "also-nope"]))?;
        assert!(config.aliases().is_empty());
        assert!(config.options().is_empty());
        assert!(config.blacklists().is_empty());
        // roots that could not be read are not recorded
        assert!(config.paths().is_empty());
        assert!(!config.needs_reload());
        Ok(())
    }

    #[test]
    fn test_single_file_root() -> Result<()> {
        let fx = Fixture::new()?;
        fx.write("extra/custom-name", "blacklist floppy\n")?;
        fx.write("dir/custom-name.conf", "blacklist other\n")?;

        let config = Config::new(&fx.opts(&["extra/custom-name", "dir"]))?;
        let names: Vec<_> = config.blacklists().iter().map(|b| b.modname()).collect();
        assert_eq!(names, ["floppy", "other"]);
        Ok(())
    }

    #[test]
    fn test_needs_reload() -> Result<()> {
        let fx = Fixture::new()?;
        fx.write("etc/a.conf", "blacklist a\n")?;
        let etc = fx.root.join("etc");
        let f = File::open(&etc)?;
        f.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10))?;
        drop(f);

        let config = Config::new(&fx.opts(&["etc"]))?;
        assert!(!config.needs_reload());

        let f = File::open(&etc)?;
        f.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(20))?;
        drop(f);
        assert!(config.needs_reload());
        Ok(())
    }

    #[test]
    fn test_options_from_toml() -> Result<()> {
        let opts: ConfigOptions = toml::from_str(indoc! {r#"
            module-dir = "/lib/modules/6.1.0"
            config-paths = ["/etc/modprobe.d"]
        "#})?;
        assert_eq!(opts.module_dir.as_deref(), Some(Utf8Path::new("/lib/modules/6.1.0")));
        assert_eq!(opts.config_paths, [Utf8PathBuf::from("/etc/modprobe.d")]);
        // unset fields keep their defaults
        assert_eq!(opts.kcmdline.as_deref(), Some(Utf8Path::new("/proc/cmdline")));

        assert!(toml::from_str::<ConfigOptions>("bogus = 1").is_err());
        Ok(())
    }

    #[test]
    fn test_default_options() {
        let opts = ConfigOptions::default();
        assert_eq!(opts.config_paths.len(), DEFAULT_CONFIG_PATHS.len());
        assert_eq!(opts.config_paths[0], "/etc/modprobe.d");
        if let Some(dir) = opts.module_dir {
            assert!(dir.starts_with("/lib/modules"));
        }
    }
}
