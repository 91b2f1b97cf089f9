//! Kernel command line parsing for module parameters.
//!
//! The boot loader hands the kernel a single line of parameters.  Those
//! addressed to loadable modules take the form `module.param=value`, and
//! the module loader needs to pick them out so they can be applied when
//! the module is eventually inserted.
//!
//! The kernel command line is not required to be UTF-8.  The `bytes`
//! module reads the raw line from its source, and `modparam` scans it
//! in the same manner as the module loader historically has, including
//! repairing quotes that some boot loaders misplace.

pub mod bytes;
pub mod modparam;

/// The procfs file exposing the boot parameters.
pub const PROC_CMDLINE: &str = "/proc/cmdline";

/// Size of the buffer the boot parameters are read into, including the
/// terminator.  Anything longer is treated as a read error.
pub const CMDLINE_MAX: usize = 4096;

/// The pseudo-module whose parameters are directed at the loader itself.
pub const MODPROBE: &str = "modprobe";

/// Parameter of [`MODPROBE`] carrying a comma-separated list of modules
/// that must not be loaded.
pub const BLACKLIST_PARAM: &str = "blacklist";
