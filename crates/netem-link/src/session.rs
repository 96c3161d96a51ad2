//! Emulation session discovery.
//!
//! A session's nodes are network namespaces named `<prefix><session>-n<node>`
//! (e.g. `emu1-n3` for node 3 of session 1). The veth end on node A facing
//! node B is named `vn<B>`. Nodes and links are discovered once, when
//! attaching to the session.

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::ns::{Namespace, sudo_checked};
use crate::shape::{LinkShape, apply_shape};

/// Default namespace prefix for session nodes.
pub const DEFAULT_NS_PREFIX: &str = "emu";

/// Namespace name of one session node.
pub fn node_ns_name(prefix: &str, session: u32, node: u32) -> String {
    format!("{prefix}{session}-n{node}")
}

/// One discovered link: the two veth ends of a node pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmuLink {
    pub node_a: u32,
    pub node_b: u32,
    /// Interface on `node_a` facing `node_b`.
    pub iface_a: String,
    /// Interface on `node_b` facing `node_a`.
    pub iface_b: String,
}

/// A running emulation session: attached node namespaces plus the links
/// discovered between them.
#[derive(Debug)]
pub struct Session {
    id: u32,
    nodes: Vec<(u32, Namespace)>,
    links: Vec<EmuLink>,
}

impl Session {
    /// Attach to a running session by id.
    ///
    /// Fails when no namespace matches the session's naming pattern, so an
    /// absent session is caught before any scheduling starts.
    pub fn connect(id: u32, prefix: &str) -> Result<Self> {
        let names = list_namespaces().context("list network namespaces")?;

        let mut nodes: Vec<(u32, Namespace)> = names
            .iter()
            .filter_map(|name| parse_node_ns(name, prefix, id).map(|n| (n, Namespace::attach(name))))
            .collect();

        if nodes.is_empty() {
            bail!("no namespaces matching '{prefix}{id}-n*' (is session {id} running?)");
        }
        nodes.sort_by_key(|(n, _)| *n);

        let ends = collect_link_ends(&nodes)?;
        let links = pair_links(ends);

        info!(
            session = id,
            nodes = nodes.len(),
            links = links.len(),
            "attached to emulation session"
        );

        Ok(Self { id, nodes, links })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn links(&self) -> &[EmuLink] {
        &self.links
    }

    pub fn node_ns(&self, node: u32) -> Option<&Namespace> {
        self.nodes
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, ns)| ns)
    }

    /// Apply `shape` to both ends of `link`.
    pub fn shape_link(&self, link: &EmuLink, shape: &LinkShape) -> Result<()> {
        let ns_a = self
            .node_ns(link.node_a)
            .with_context(|| format!("node {} not in session {}", link.node_a, self.id))?;
        apply_shape(ns_a, &link.iface_a, shape)?;

        let ns_b = self
            .node_ns(link.node_b)
            .with_context(|| format!("node {} not in session {}", link.node_b, self.id))?;
        apply_shape(ns_b, &link.iface_b, shape)?;

        debug!(
            node_a = link.node_a,
            node_b = link.node_b,
            ?shape,
            "link shaped"
        );
        Ok(())
    }
}

/// Names of all network namespaces on the host.
fn list_namespaces() -> Result<Vec<String>> {
    let out = sudo_checked(&["ip", "netns", "list"])?;
    Ok(String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().next().map(str::to_string))
        .collect())
}

/// Parse a namespace name into a node id, if it belongs to the session.
pub(crate) fn parse_node_ns(name: &str, prefix: &str, session: u32) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let (sess, node) = rest.split_once("-n")?;
    if sess.parse::<u32>().ok()? != session {
        return None;
    }
    node.parse().ok()
}

/// Parse a `vn<peer>` interface name into the peer node id.
pub(crate) fn parse_peer_iface(iface: &str) -> Option<u32> {
    iface.strip_prefix("vn")?.parse().ok()
}

/// Extract the interface name from one `ip -o link show` line
/// (`2: vn3@if5: <BROADCAST,...> ...` -> `vn3`).
pub(crate) fn parse_link_show_line(line: &str) -> Option<&str> {
    let name = line.split_whitespace().nth(1)?;
    let name = name.trim_end_matches(':');
    Some(name.split('@').next().unwrap_or(name))
}

/// One veth end as seen from inside a node: (node, peer, iface).
type LinkEnd = (u32, u32, String);

/// Enumerate every `vn<peer>` interface of every node.
fn collect_link_ends(nodes: &[(u32, Namespace)]) -> Result<Vec<LinkEnd>> {
    let mut ends = Vec::new();
    for (node, ns) in nodes {
        let out = ns.exec_checked("ip", &["-o", "link", "show"])?;
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            if let Some(iface) = parse_link_show_line(line)
                && let Some(peer) = parse_peer_iface(iface)
            {
                ends.push((*node, peer, iface.to_string()));
            }
        }
    }
    Ok(ends)
}

/// Match opposing veth ends into links. An end with no counterpart in the
/// peer's namespace is dropped with a warning.
pub(crate) fn pair_links(ends: Vec<LinkEnd>) -> Vec<EmuLink> {
    let mut links = Vec::new();
    for (node, peer, iface) in &ends {
        if node >= peer {
            continue;
        }
        match ends
            .iter()
            .find(|(n, p, _)| (n, p) == (peer, node))
        {
            Some((_, _, peer_iface)) => links.push(EmuLink {
                node_a: *node,
                node_b: *peer,
                iface_a: iface.clone(),
                iface_b: peer_iface.clone(),
            }),
            None => warn!("node {node} has {iface} but node {peer} has no matching end"),
        }
    }
    links
}
