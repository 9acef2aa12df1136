//! Host probing for OS-level dependencies.
//!
//! Recipes can declare packages the host operating system must provide
//! (`osdependencies`). Whether such a package is actually present is a
//! question for an external collaborator, abstracted as [`HostProbe`].
//!
//! The default implementation, [`SystemProbe`], tries two detection
//! routes per candidate: a PATH lookup (many OS dependencies are
//! commands), then a query against whichever system package manager is
//! available. Package-manager queries run with a bounded timeout; a probe
//! that cannot answer in time reports "not found" rather than failing the
//! resolution.

use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::constants::OS_PROBE_TIMEOUT;

/// External collaborator answering "is at least one of these packages
/// present on this host?".
pub trait HostProbe: Send + Sync {
    /// Returns `true` when at least one candidate is detected.
    fn has_os_package(&self, candidates: &[String]) -> bool;
}

/// Default probe: PATH lookup plus package-manager queries.
pub struct SystemProbe {
    timeout: Duration,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self { timeout: OS_PROBE_TIMEOUT }
    }
}

impl SystemProbe {
    /// Creates a probe with a custom per-query timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn query_package_manager(&self, package: &str) -> bool {
        // first package manager present on PATH decides
        let queries: [(&str, &[&str]); 3] =
            [("dpkg", &["-s", package]), ("rpm", &["-q", package]), ("pacman", &["-Q", package])];
        for (manager, args) in queries {
            if which::which(manager).is_err() {
                continue;
            }
            return run_with_timeout(manager, args, self.timeout).unwrap_or_else(|| {
                debug!("{manager} query for {package} timed out, treating as not found");
                false
            });
        }
        false
    }
}

impl HostProbe for SystemProbe {
    fn has_os_package(&self, candidates: &[String]) -> bool {
        for candidate in candidates {
            if which::which(candidate).is_ok() {
                trace!("OS dependency {candidate} found on PATH");
                return true;
            }
            if self.query_package_manager(candidate) {
                trace!("OS dependency {candidate} found via package manager");
                return true;
            }
        }
        false
    }
}

/// Runs a command and reports whether it exited successfully, or `None`
/// when the timeout elapsed or the command could not be spawned.
fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Option<bool> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let (sender, receiver) = mpsc::channel();
    let pid_watch = thread::spawn(move || {
        let status = child.wait();
        let _ = sender.send(status.map(|s| s.success()).unwrap_or(false));
    });

    match receiver.recv_timeout(timeout) {
        Ok(success) => {
            let _ = pid_watch.join();
            Some(success)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe with a fixed answer set, for validation-engine tests.
    pub struct FixedProbe(pub Vec<String>);

    impl HostProbe for FixedProbe {
        fn has_os_package(&self, candidates: &[String]) -> bool {
            candidates.iter().any(|c| self.0.contains(c))
        }
    }

    #[test]
    fn test_system_probe_finds_a_shell() {
        // sh is on PATH in any environment these tests run in
        let probe = SystemProbe::default();
        assert!(probe.has_os_package(&["sh".to_string()]));
    }

    #[test]
    fn test_system_probe_misses_nonsense_package() {
        let probe = SystemProbe::with_timeout(Duration::from_secs(2));
        assert!(!probe.has_os_package(&["definitely-not-a-real-package-xyzzy".to_string()]));
    }

    #[test]
    fn test_fixed_probe_alternatives() {
        let probe = FixedProbe(vec!["libssl-dev".to_string()]);
        assert!(probe.has_os_package(&["openssl-devel".to_string(), "libssl-dev".to_string()]));
        assert!(!probe.has_os_package(&["openssl-devel".to_string()]));
    }
}
