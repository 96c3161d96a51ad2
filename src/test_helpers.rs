#![cfg(any(test, feature = "test-internals"))]
#![allow(dead_code)] // Allow unused helpers - they're used by library tests but not binary tests

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::time::Instant;

use crate::contact::{Contact, NodeId};
use crate::controller::{LinkController, LinkId};
use crate::error::{Error, Result};
use crate::plan::ContactPlan;

/// One controller call as observed by [`MockController`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCall {
    /// Timer timestamp of the call (paused-clock time in tests).
    pub at: Instant,
    pub kind: CallKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Apply {
        link: LinkId,
        bw: u64,
        loss: f32,
        delay: u32,
        jitter: u32,
    },
    Deactivate {
        link: LinkId,
    },
}

/// Recording test double for [`LinkController`].
///
/// Holds a fixed link table, records every successful call with its
/// timestamp, and can be told to fail all calls on a given link.
pub struct MockController {
    links: Vec<(NodeId, NodeId)>,
    failing: Vec<LinkId>,
    calls: Arc<Mutex<Vec<ControllerCall>>>,
}

impl MockController {
    pub fn new(links: &[(NodeId, NodeId)]) -> Self {
        Self {
            links: links.to_vec(),
            failing: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every apply/deactivate on the link at `index` fail.
    pub fn failing(mut self, index: usize) -> Self {
        self.failing.push(LinkId(index));
        self
    }

    /// Shared handle to the call log; stays valid after the controller has
    /// been moved into a scheduler.
    pub fn calls(&self) -> Arc<Mutex<Vec<ControllerCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, kind: CallKind) {
        self.calls.lock().unwrap().push(ControllerCall {
            at: Instant::now(),
            kind,
        });
    }
}

impl LinkController for MockController {
    fn find_link(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.links
            .iter()
            .position(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
            .map(LinkId)
    }

    fn apply_contact(&mut self, link: LinkId, contact: &Contact) -> Result<()> {
        if self.failing.contains(&link) {
            return Err(Error::ControllerUnavailable(anyhow!("injected failure")));
        }
        self.record(CallKind::Apply {
            link,
            bw: contact.bw,
            loss: contact.loss,
            delay: contact.delay,
            jitter: contact.jitter,
        });
        Ok(())
    }

    fn deactivate(&mut self, link: LinkId) -> Result<()> {
        if self.failing.contains(&link) {
            return Err(Error::ControllerUnavailable(anyhow!("injected failure")));
        }
        self.record(CallKind::Deactivate { link });
        Ok(())
    }
}

/// Parse a plan text that is expected to be valid.
pub fn plan(text: &str) -> ContactPlan {
    ContactPlan::parse(text).expect("valid plan")
}
