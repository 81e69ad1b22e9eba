//! Locating cpu.stat inside a container
//!
//! The container's cgroup layout is unknown up front, so every candidate
//! path is tried inside a single shell probe. The probe prints a sentinel
//! naming the file it found, followed by the file itself, or a not-found
//! sentinel listing what it tried.

use crate::error::{ExecError, Result, ThrottleError};
use crate::models::{PathHint, Target};
use crate::remote::{shell_command, RemoteExecutor};
use shell_escape::unix::escape;
use std::borrow::Cow;
use tracing::debug;

/// Prefix of the line naming the file that was read
pub const FOUND_MARKER: &str = "Found: ";

/// Prefix of the line emitted when no candidate exists
pub const NOT_FOUND_MARKER: &str = "NotFound: ";

/// Raw probe output plus the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedStat {
    pub raw: String,
    pub path: String,
}

/// Finds and reads cpu.stat for a target
#[derive(Debug, Clone, Default)]
pub struct CgroupLocator {
    hint: PathHint,
    diagnostics: bool,
}

impl CgroupLocator {
    pub fn new(hint: PathHint) -> Self {
        Self {
            hint,
            diagnostics: false,
        }
    }

    /// List the cgroup directory when nothing is found (best effort)
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn hint(&self) -> &PathHint {
        &self.hint
    }

    /// Build the probe script for the configured hint
    pub fn probe_script(&self) -> String {
        let candidates = self.hint.candidates();
        let quoted: Vec<String> = candidates.iter().map(|p| quote(p)).collect();

        format!(
            "for p in {list}; do \
             if [ -f \"$p\" ]; then echo \"{found}$p\"; cat \"$p\"; exit $?; fi; \
             done; echo {not_found}; exit 0",
            list = quoted.join(" "),
            found = FOUND_MARKER,
            not_found = quote(&format!("{}{}", NOT_FOUND_MARKER, candidates.join(" "))),
        )
    }

    /// Probe the target and return cpu.stat contents with provenance
    pub async fn locate(&self, executor: &dyn RemoteExecutor, target: &Target) -> Result<LocatedStat> {
        let candidates = self.hint.candidates();
        let command = shell_command(self.probe_script());

        debug!(pod = %target, candidates = ?candidates, "Probing for cpu.stat");

        let output = executor
            .execute(target, &command)
            .await
            .map_err(|source| ThrottleError::RemoteExecution {
                target: target.clone(),
                attempted: candidates.join(", "),
                source,
            })?;

        for line in output.lines() {
            let line = line.trim();
            if let Some(path) = line.strip_prefix(FOUND_MARKER) {
                let path = path.trim().to_string();
                debug!(pod = %target, path = %path, "Located cpu.stat");
                return Ok(LocatedStat { raw: output, path });
            }
            if line.starts_with(NOT_FOUND_MARKER) {
                if self.diagnostics {
                    self.list_cgroup_dir(executor, target).await;
                }
                return Err(ThrottleError::StatsNotFound {
                    target: target.clone(),
                    attempted: candidates,
                });
            }
        }

        Err(ThrottleError::RemoteExecution {
            target: target.clone(),
            attempted: candidates.join(", "),
            source: ExecError::transport(format!(
                "probe produced no sentinel line (output: {:?})",
                truncate(&output, 200)
            )),
        })
    }

    /// Log a recursive listing of the cgroup root; failures are only logged
    async fn list_cgroup_dir(&self, executor: &dyn RemoteExecutor, target: &Target) {
        let root = self.hint.diagnostic_root();
        let command = shell_command(format!("ls -R {}", quote(&root)));

        match executor.execute(target, &command).await {
            Ok(listing) => {
                debug!(
                    event = "cgroup_listing",
                    pod = %target,
                    root = %root,
                    listing = %listing,
                    "Available files under cgroup root"
                );
            }
            Err(e) => {
                debug!(pod = %target, root = %root, error = %e, "Could not list cgroup root");
            }
        }
    }
}

fn quote(s: &str) -> String {
    escape(Cow::Borrowed(s)).into_owned()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
