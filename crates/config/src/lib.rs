//! Module loader configuration.
//!
//! This crate reads the `modprobe.d` configuration consulted before
//! loading or unloading kernel modules:
//!
//! ```text
//! alias <alias-name> <module-name>
//! blacklist <module-name>
//! options <module-name> <options...>
//! install <module-name> <command...>
//! remove <module-name> <command...>
//! softdep <module-name> [pre: <modules...>] [post: <modules...>]
//! weakdep <module-name> <modules...>
//! ```
//!
//! Files are collected from several roots (see [`DEFAULT_CONFIG_PATHS`]),
//! merged by file name with earlier roots taking precedence, and parsed
//! in name order.  Module parameters found on the kernel command line
//! (`module.param=value`, `modprobe.blacklist=a,b`) are folded in last.
//!
//! ```no_run
//! use kmod_config::{Config, ConfigOptions};
//!
//! let config = Config::new(&ConfigOptions::default())?;
//! if !config.is_blacklisted("pcspkr") {
//!     println!("{:?}", config.module_options("pcspkr"));
//! }
//! # Ok::<(), kmod_config::ConfigError>(())
//! ```

mod deps;
mod discovery;
mod entry;
mod error;
mod iter;
mod kcmdline;
mod modname;
mod parser;
mod store;

pub use deps::{Deps, SoftDep, WeakDep};
pub use entry::{Alias, Blacklist, Command, ConfigPath, ModuleOptions};
pub use error::{ConfigError, Result};
pub use iter::{ConfigEntry, ConfigIter, ConfigKind};
pub use modname::{modname_eq, normalize_alias, normalize_module_name, InvalidName};
pub use store::{
    default_module_dir, Config, ConfigOptions, DEFAULT_CONFIG_PATHS, MODULES_SOFTDEP,
    MODULES_WEAKDEP,
};
