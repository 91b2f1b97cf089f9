//! Show the configuration the kernel module loader would use.
//!
//! If the environment variable `KMODCONF_CONFIG` is set, it must name a
//! TOML file holding the same settings as the command line flags; flags
//! given on the command line take precedence.

use std::borrow::Cow;
use std::io::Write;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use kmod_config::{Config, ConfigKind, ConfigOptions};
use serde::Serialize;

mod config;

#[derive(Debug, Parser)]
#[command(name = kmod_utils::NAME, version, about)]
struct Opt {
    /// Configuration root, a directory of `*.conf` files or a single
    /// file.  May be repeated; earlier roots take precedence.
    #[arg(long = "config-dir", value_name = "PATH", global = true)]
    config_dirs: Vec<Utf8PathBuf>,

    /// Directory holding modules.softdep and modules.weakdep.
    #[arg(long, value_name = "DIR", global = true)]
    module_dir: Option<Utf8PathBuf>,

    /// Read the kernel command line from this file.
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "no_cmdline")]
    cmdline: Option<Utf8PathBuf>,

    /// Ignore the kernel command line.
    #[arg(long, global = true)]
    no_cmdline: bool,

    /// Log more; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print every entry in configuration file syntax (the default).
    Show {
        /// Print JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Print everything configured for one module.
    Module {
        /// The module name; `-` and `_` are interchangeable.
        name: String,
    },
    /// Print the modules an alias resolves to.
    Alias {
        /// The alias name.
        name: String,
    },
}

impl Opt {
    /// Apply flags on top of `base`.
    fn options(&self, base: ConfigOptions) -> ConfigOptions {
        let mut opts = base;
        if !self.config_dirs.is_empty() {
            opts.config_paths = self.config_dirs.clone();
        }
        if let Some(dir) = &self.module_dir {
            opts.module_dir = Some(dir.clone());
        }
        if let Some(path) = &self.cmdline {
            opts.kcmdline = Some(path.clone());
        }
        if self.no_cmdline {
            opts.kcmdline = None;
        }
        opts
    }
}

#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    kind: &'static str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Cow<'a, str>>,
}

fn show(config: &Config, json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        let entries: Vec<_> = ConfigKind::ALL
            .into_iter()
            .flat_map(|kind| config.entries(kind))
            .map(|e| JsonEntry {
                kind: e.kind().directive(),
                key: e.key(),
                value: e.value(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &entries)?;
        writeln!(out)?;
        return Ok(());
    }

    for kind in ConfigKind::ALL {
        let mut it = config.iter(kind);
        while it.advance() {
            let Some(key) = it.key() else { break };
            match it.value() {
                Some(v) if !v.is_empty() => writeln!(out, "{kind} {key} {v}")?,
                _ => writeln!(out, "{kind} {key}")?,
            }
        }
    }
    Ok(())
}

fn show_module(config: &Config, name: &str, out: &mut impl Write) -> Result<()> {
    // Print the name the way configuration stores it.
    let canonical = kmod_config::normalize_module_name(name);
    let name = canonical.as_deref().unwrap_or(name);
    if config.is_blacklisted(name) {
        writeln!(out, "blacklist {name}")?;
    }
    for alias in config.aliases().iter().filter(|a| kmod_config::modname_eq(a.modname(), name)) {
        writeln!(out, "alias {} {}", alias.name(), alias.modname())?;
    }
    if let Some(options) = config.module_options(name) {
        writeln!(out, "options {name} {options}")?;
    }
    for cmd in config.install_commands_of(name) {
        writeln!(out, "install {name} {cmd}")?;
    }
    for cmd in config.remove_commands_of(name) {
        writeln!(out, "remove {name} {cmd}")?;
    }
    for dep in config.softdeps_of(name) {
        if let Some(v) = dep.to_display() {
            writeln!(out, "softdep {} {v}", dep.name())?;
        }
    }
    for dep in config.weakdeps_of(name) {
        if let Some(v) = dep.to_display() {
            writeln!(out, "weakdep {} {v}", dep.name())?;
        }
    }
    Ok(())
}

fn run() -> Result<()> {
    let opt = Opt::parse();
    kmod_utils::initialize_tracing(opt.verbose);
    tracing::trace!("starting {}", env!("CARGO_PKG_NAME"));

    let base = config::load()?.unwrap_or_default();
    let opts = opt.options(base);
    tracing::debug!("{opts:?}");
    let config = Config::new(&opts).context("Loading configuration")?;

    let mut out = anstream::stdout().lock();
    match opt.cmd.unwrap_or(Cmd::Show { json: false }) {
        Cmd::Show { json } => show(&config, json, &mut out)?,
        Cmd::Module { name } => show_module(&config, &name, &mut out)?,
        Cmd::Alias { name } => {
            for modname in config.resolve_alias(&name) {
                writeln!(out, "{modname}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    kmod_utils::run_main(run)
}
