//! Contact plan: parsed contacts, per-contact lifecycle state, temporal
//! queries.

use std::fmt;
use std::path::Path;

use smallvec::SmallVec;
use tracing::debug;

use crate::contact::{Contact, ContactId, ContactState};
use crate::error::Result;

/// Contacts due at a single tick, almost always a handful.
pub type DueBatch = SmallVec<[ContactId; 4]>;

/// A parsed contact plan: an arena of contacts with a parallel state table,
/// plus the loop flag.
///
/// The plan is created once at startup and mutated in place by the
/// scheduler as time advances.
#[derive(Debug)]
pub struct ContactPlan {
    loop_enabled: bool,
    contacts: Vec<Contact>,
    states: Vec<ContactState>,
}

impl ContactPlan {
    /// Read and parse a plan file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(&text)
    }

    /// Parse a line-oriented plan description.
    ///
    /// Two directive shapes are recognized: `s loop <0|1>` and
    /// `a contact <start> <end> <node1> <node2> <bw> <loss> <delay> <jitter>`.
    /// A contact directive with a wrong field count or non-numeric fields
    /// fails the whole load. Every other line is ignored, so plans carrying
    /// directives for other tools still load.
    pub fn parse(text: &str) -> Result<Self> {
        let mut loop_enabled = false;
        let mut contacts = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let fields: Vec<&str> = raw.split_whitespace().collect();
            match fields.as_slice() {
                ["s", "loop", value] => loop_enabled = *value == "1",
                ["a", "contact", rest @ ..] => {
                    contacts.push(Contact::from_fields(rest, idx + 1)?);
                }
                _ => {}
            }
        }

        debug!(
            contacts = contacts.len(),
            loop_enabled, "contact plan parsed"
        );

        let states = vec![ContactState::Pre; contacts.len()];
        Ok(Self {
            loop_enabled,
            contacts,
            states,
        })
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Override the plan's `s loop` directive.
    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    pub fn contact(&self, id: ContactId) -> &Contact {
        &self.contacts[id.0]
    }

    pub fn state(&self, id: ContactId) -> ContactState {
        self.states[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ContactId> + '_ {
        (0..self.contacts.len()).map(ContactId)
    }

    /// Contacts whose timespan contains `t`, independent of state.
    pub fn at(&self, t: u64) -> DueBatch {
        self.ids()
            .filter(|id| self.contact(*id).overlaps(t))
            .collect()
    }

    /// Contacts due to activate at `t`: inside their window and still
    /// `Pre`. Always a subset of [`ContactPlan::at`].
    pub fn need_activation(&self, t: u64) -> DueBatch {
        self.at(t)
            .into_iter()
            .filter(|id| self.state(*id) == ContactState::Pre)
            .collect()
    }

    /// Contacts due to deactivate at `t`: past their end and still `Live`.
    /// A contact deactivates exactly once, even if the loop is delayed past
    /// its end.
    pub fn need_deactivation(&self, t: u64) -> DueBatch {
        self.ids()
            .filter(|id| self.contact(*id).end() <= t && self.state(*id) == ContactState::Live)
            .collect()
    }

    /// Earliest start among `Pre` contacts at or after `t`.
    pub fn next_activation(&self, t: u64) -> Option<u64> {
        self.ids()
            .filter(|id| self.state(*id) == ContactState::Pre)
            .map(|id| self.contact(id).start())
            .filter(|start| *start >= t)
            .min()
    }

    /// Earliest end among `Live` contacts at or after `t`.
    pub fn next_deactivation(&self, t: u64) -> Option<u64> {
        self.ids()
            .filter(|id| self.state(*id) == ContactState::Live)
            .map(|id| self.contact(id).end())
            .filter(|end| *end >= t)
            .min()
    }

    /// Record an activation. Only valid on a `Pre` contact.
    pub(crate) fn mark_live(&mut self, id: ContactId) {
        debug_assert_eq!(self.states[id.0], ContactState::Pre);
        self.states[id.0] = ContactState::Live;
    }

    /// Record a deactivation. Only valid on a `Live` contact.
    pub(crate) fn mark_post(&mut self, id: ContactId) {
        debug_assert_eq!(self.states[id.0], ContactState::Live);
        self.states[id.0] = ContactState::Post;
    }

    /// Return every contact to `Pre`. Idempotent; used when looping.
    pub fn reset(&mut self) {
        self.states.fill(ContactState::Pre);
    }
}

impl fmt::Display for ContactPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plan with {} contact(s), loop {}",
            self.contacts.len(),
            if self.loop_enabled { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_directive_last_one_wins() {
        let plan = ContactPlan::parse("s loop 1\ns loop 0\n").unwrap();
        assert!(!plan.loop_enabled());

        let plan = ContactPlan::parse("s loop 0\ns loop 1\n").unwrap();
        assert!(plan.loop_enabled());
    }

    #[test]
    fn unknown_lines_are_ignored() {
        let text = "\
# a comment
a range 10 20 1 2 50000
s version 2
random garbage here

a contact 10 20 1 2 1000000 0.0 5 1
";
        let plan = ContactPlan::parse(text).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!plan.loop_enabled());
    }

    #[test]
    fn malformed_contact_fails_the_load() {
        let text = "s loop 0\na contact 10 20 1 2 1000000\n";
        let err = ContactPlan::parse(text).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
