//! Test-only helpers: privilege probing and throwaway session construction.

use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;

use crate::ns::Namespace;
use crate::session::node_ns_name;

static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns `true` if the environment supports namespace-based tests
/// (requires `ip` tool and passwordless `sudo`).
pub fn check_privileges() -> bool {
    let has_ip = Command::new("ip")
        .arg("netns")
        .output()
        .is_ok_and(|o| o.status.success());

    has_ip
        && Command::new("sudo")
            .args(["-n", "ip", "netns", "list"])
            .output()
            .is_ok_and(|o| o.status.success())
}

/// Generate a unique namespace/interface name safe for parallel tests.
///
/// Combines prefix + PID + atomic counter, truncated to 15 chars
/// (Linux netdev name limit).
pub fn unique_name(prefix: &str) -> String {
    let seq = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id() % 0xffff;
    let name = format!("{prefix}_{pid:x}_{seq}");
    if name.len() > 15 { name[..15].to_string() } else { name }
}

/// Session id unlikely to collide across parallel test processes.
pub fn unique_session_id() -> u32 {
    let seq = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    10_000 + (std::process::id() % 10_000) + seq * 20_000
}

/// Create the namespaces and veth links of a throwaway session.
///
/// `links` lists the node pairs to connect. Namespaces follow the session
/// naming convention so [`crate::Session::connect`] can discover them, and
/// are owned: they are deleted again when the returned handles drop.
pub fn build_session(
    id: u32,
    prefix: &str,
    links: &[(u32, u32)],
) -> Result<Vec<(u32, Namespace)>> {
    let mut node_ids: Vec<u32> = links.iter().flat_map(|&(a, b)| [a, b]).collect();
    node_ids.sort_unstable();
    node_ids.dedup();

    let mut nodes: Vec<(u32, Namespace)> = Vec::with_capacity(node_ids.len());
    for node in node_ids {
        let ns = Namespace::create(&node_ns_name(prefix, id, node))?;
        nodes.push((node, ns));
    }

    let ns_of = |node: u32| {
        nodes
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, ns)| ns)
            .expect("node created above")
    };

    for (idx, &(a, b)) in links.iter().enumerate() {
        let subnet = (id % 200) as u8;
        ns_of(a).connect_veth(
            ns_of(b),
            &format!("vn{b}"),
            &format!("vn{a}"),
            &format!("10.{subnet}.{idx}.1/24", idx = idx + 1),
            &format!("10.{subnet}.{idx}.2/24", idx = idx + 1),
        )?;
    }

    Ok(nodes)
}
