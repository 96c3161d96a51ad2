//! Network namespace handles.

use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Handle to a named Linux network namespace.
///
/// [`Namespace::create`] makes the namespace and deletes it again on drop;
/// [`Namespace::attach`] wraps one that already exists (a node of a running
/// emulation session) and never touches its lifetime. All commands inside
/// the namespace run via `sudo ip netns exec`.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    owned: bool,
}

impl Namespace {
    /// Create a fresh namespace, replacing any stale one with the same name.
    pub fn create(name: &str) -> Result<Self> {
        // Stale namespace with the same name is removed first (idempotent)
        let _ = sudo(&["ip", "netns", "del", name]);

        sudo_checked(&["ip", "netns", "add", name])
            .with_context(|| format!("create netns '{name}'"))?;

        debug!(ns = name, "created network namespace");

        // Loopback is best-effort, failure is non-fatal
        let _ = sudo(&["ip", "netns", "exec", name, "ip", "link", "set", "lo", "up"]);

        Ok(Self {
            name: name.to_string(),
            owned: true,
        })
    }

    /// Wrap an existing namespace without taking ownership of its lifetime.
    pub fn attach(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owned: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a command inside this namespace, returning raw output.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut full_args = vec!["ip", "netns", "exec", &self.name, cmd];
        full_args.extend_from_slice(args);
        sudo(&full_args).with_context(|| format!("exec '{cmd}' in ns '{}'", self.name))
    }

    /// Run a command inside this namespace, failing if it exits non-zero.
    pub fn exec_checked(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut full_args = vec!["ip", "netns", "exec", &self.name, cmd];
        full_args.extend_from_slice(args);
        sudo_checked(&full_args).with_context(|| format!("exec '{cmd}' in ns '{}'", self.name))
    }

    /// Create a veth pair connecting this namespace to `peer`.
    ///
    /// The pair is created under scratch names in the host namespace (so
    /// concurrent setups cannot collide) and renamed while moving into the
    /// target namespaces. Each end gets an IP address assigned and is
    /// brought up. Interface names must be <= 15 chars (Linux limit).
    pub fn connect_veth(
        &self,
        peer: &Namespace,
        local_iface: &str,
        peer_iface: &str,
        local_ip: &str,
        peer_ip: &str,
    ) -> Result<()> {
        let tmp_local = scratch_iface_name();
        let tmp_peer = scratch_iface_name();

        sudo_checked(&[
            "ip",
            "link",
            "add",
            &tmp_local,
            "type",
            "veth",
            "peer",
            "name",
            &tmp_peer,
        ])
        .context("create veth pair")?;

        sudo_checked(&[
            "ip", "link", "set", &tmp_local, "netns", &self.name, "name", local_iface,
        ])
        .context("move local veth")?;
        sudo_checked(&[
            "ip", "link", "set", &tmp_peer, "netns", &peer.name, "name", peer_iface,
        ])
        .context("move peer veth")?;

        self.exec_checked("ip", &["addr", "add", local_ip, "dev", local_iface])
            .context("set local IP")?;
        self.exec_checked("ip", &["link", "set", local_iface, "up"])
            .context("bring local link up")?;

        peer.exec_checked("ip", &["addr", "add", peer_ip, "dev", peer_iface])
            .context("set peer IP")?;
        peer.exec_checked("ip", &["link", "set", peer_iface, "up"])
            .context("bring peer link up")?;

        debug!(
            ns_local = self.name,
            ns_peer = peer.name,
            local_iface,
            peer_iface,
            "veth link configured"
        );

        Ok(())
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        if self.owned {
            debug!(ns = self.name, "deleting network namespace");
            let _ = sudo(&["ip", "netns", "del", &self.name]);
        }
    }
}

// -- helpers --

/// Host-side scratch interface name, unique within and across processes.
fn scratch_iface_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id() % 0xffff;
    format!("vtmp{pid:x}x{seq}")
}

/// Run `sudo <args>`, returning raw output.
pub(crate) fn sudo(args: &[&str]) -> Result<Output> {
    Command::new("sudo")
        .args(args)
        .output()
        .with_context(|| format!("sudo {}", args.join(" ")))
}

/// Run `sudo <args>`, returning output on success or bailing with stderr.
pub(crate) fn sudo_checked(args: &[&str]) -> Result<Output> {
    let output = sudo(args)?;
    if !output.status.success() {
        bail!(
            "command failed: sudo {}\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}
