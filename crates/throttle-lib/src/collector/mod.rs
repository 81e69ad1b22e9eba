//! cpu.stat acquisition from inside containers
//!
//! This module locates the cgroup CPU statistics file through the remote
//! command capability, parses it, and takes one or two snapshots per
//! target. It handles cgroup v2 (unified hierarchy) and cgroup v1 (legacy
//! hierarchy) layouts as well as operator-supplied paths.

mod locator;
mod parser;
mod sampler;


pub use locator::{CgroupLocator, LocatedStat, FOUND_MARKER, NOT_FOUND_MARKER};
pub use parser::parse_cpu_stat;
pub use sampler::Sampler;
