//! Link controller: the capability that resolves node pairs to emulated
//! links and mutates their parameters.

use rustc_hash::FxHashMap;
use tracing::debug;

use netem_link::{LinkShape, Session};

use crate::contact::{Contact, NodeId};
use crate::error::{Error, Result};

/// Loss value representing a dead link (percentage scale).
pub const FULL_LOSS_PERCENT: f32 = 100.0;

/// Opaque handle to one link in a controller's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub(crate) usize);

impl LinkId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Resolves node pairs to links and applies contact parameters to them.
///
/// The scheduler only ever talks to this trait; the production
/// implementation is [`NetemController`], tests use the recording mock in
/// `test_helpers`.
pub trait LinkController {
    /// Resolve the link between two nodes. Symmetric: node order is
    /// irrelevant.
    fn find_link(&self, a: NodeId, b: NodeId) -> Option<LinkId>;

    /// Shape `link` to carry an active contact.
    fn apply_contact(&mut self, link: LinkId, contact: &Contact) -> Result<()>;

    /// Force `link` into a fully-lossy condition representing an ended
    /// contact. The link stays in place; only its loss is saturated.
    fn deactivate(&mut self, link: LinkId) -> Result<()>;
}

/// Production controller: shapes the veth pairs of a live emulation
/// session with `tc netem`.
pub struct NetemController {
    session: Session,
    by_pair: FxHashMap<(NodeId, NodeId), LinkId>,
    tbf_shaping: bool,
}

impl NetemController {
    /// Attach to a running emulation session and index its links.
    ///
    /// An unreachable session fails here, before any scheduling starts.
    pub fn connect(session_id: u32, ns_prefix: &str, tbf_shaping: bool) -> Result<Self> {
        let session =
            Session::connect(session_id, ns_prefix).map_err(|err| Error::SessionConnect {
                session: session_id,
                reason: err.to_string(),
            })?;

        let mut by_pair = FxHashMap::default();
        for (idx, link) in session.links().iter().enumerate() {
            by_pair.insert(pair_key(link.node_a, link.node_b), LinkId(idx));
        }
        debug!(links = by_pair.len(), "link table indexed");

        Ok(Self {
            session,
            by_pair,
            tbf_shaping,
        })
    }
}

impl LinkController for NetemController {
    fn find_link(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.by_pair.get(&pair_key(a, b)).copied()
    }

    fn apply_contact(&mut self, link: LinkId, contact: &Contact) -> Result<()> {
        let shape = contact_shape(contact, self.tbf_shaping);
        let link = &self.session.links()[link.0];
        self.session
            .shape_link(link, &shape)
            .map_err(Error::ControllerUnavailable)
    }

    fn deactivate(&mut self, link: LinkId) -> Result<()> {
        let shape = LinkShape {
            loss_percent: Some(FULL_LOSS_PERCENT),
            ..Default::default()
        };
        let link = &self.session.links()[link.0];
        self.session
            .shape_link(link, &shape)
            .map_err(Error::ControllerUnavailable)
    }
}

/// Normalized map key for an unordered node pair.
fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Translate a contact's parameters into a tc-level shape.
/// Bandwidth is bits/sec in the plan and kbit/sec for tc.
pub(crate) fn contact_shape(contact: &Contact, tbf_shaping: bool) -> LinkShape {
    LinkShape {
        rate_kbit: Some((contact.bw / 1000).max(1)),
        delay_ms: Some(contact.delay),
        jitter_ms: (contact.jitter > 0).then_some(contact.jitter),
        loss_percent: Some(contact.loss),
        tbf_shaping,
    }
}
