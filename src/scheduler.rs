//! Discrete-event loop driving a contact plan against a link controller.

use tokio::sync::watch;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::contact::ContactId;
use crate::controller::LinkController;
use crate::error::Error;
use crate::plan::ContactPlan;

/// How a scheduler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The plan was exhausted with looping disabled.
    Finished,
    /// Shutdown was requested during a wait. No event at the pending
    /// timestamp was marked fired.
    Interrupted,
}

/// The event loop: owns the current plan time, waits out the gap to the
/// next due event, and applies every transition due at that tick.
pub struct Scheduler<C> {
    plan: ContactPlan,
    controller: C,
    current_time: u64,
    shutdown: watch::Receiver<bool>,
}

impl<C: LinkController> Scheduler<C> {
    pub fn new(plan: ContactPlan, controller: C, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            plan,
            controller,
            current_time: 0,
            shutdown,
        }
    }

    pub fn plan(&self) -> &ContactPlan {
        &self.plan
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    /// Run until the plan is exhausted (forever when looping) or until
    /// shutdown is requested.
    ///
    /// One tick of plan time is one second of timer time. Per-event
    /// controller failures are logged and never stop the loop.
    pub async fn run(&mut self) -> RunOutcome {
        if self.plan.is_empty() {
            // An empty plan with looping on would otherwise reset forever
            info!("plan has no contacts");
            return RunOutcome::Finished;
        }

        loop {
            let next_activation = self.plan.next_activation(self.current_time);
            let next_deactivation = self.plan.next_deactivation(self.current_time);

            let next_event = match (next_activation, next_deactivation) {
                (None, None) => {
                    if self.plan.loop_enabled() {
                        info!("plan exhausted, looping");
                        self.current_time = 0;
                        self.plan.reset();
                        continue;
                    }
                    info!("no more events");
                    return RunOutcome::Finished;
                }
                (Some(a), Some(d)) => a.min(d),
                (Some(a), None) => a,
                (None, Some(d)) => d,
            };

            debug!(
                now = self.current_time,
                next = next_event,
                "waiting for next event"
            );

            // Zero-duration waits still go through the timer, so events
            // sharing a timestamp are applied on a fresh iteration.
            let wait = Duration::from_secs(next_event - self.current_time);
            tokio::select! {
                _ = sleep(wait) => {}
                // A closed shutdown channel counts as a shutdown request.
                _ = self.shutdown.changed() => {
                    info!("shutdown requested, stopping before t={next_event}");
                    return RunOutcome::Interrupted;
                }
            }
            self.current_time = next_event;

            // All activations due at this tick fire before its
            // deactivations; the second batch is computed after the first
            // has been applied so a zero-length contact goes through both.
            for id in self.plan.need_activation(self.current_time) {
                self.activate(id);
            }
            for id in self.plan.need_deactivation(self.current_time) {
                self.deactivate(id);
            }
        }
    }

    /// Transition one contact to `Live` and push its parameters to the
    /// link. The contact goes `Live` even when the link is missing or the
    /// apply fails: the plan timeline wins over external link state, and a
    /// failed apply is never retried within a cycle.
    fn activate(&mut self, id: ContactId) {
        let contact = self.plan.contact(id).clone();
        info!("[{}] activating {contact}", self.current_time);
        self.plan.mark_live(id);

        let (a, b) = contact.nodes;
        match self.controller.find_link(a, b) {
            Some(link) => {
                if let Err(err) = self.controller.apply_contact(link, &contact) {
                    warn!("[{}] apply failed for {contact}: {err}", self.current_time);
                }
            }
            None => warn!(
                "[{}] {}, skipping apply",
                self.current_time,
                Error::LinkNotFound { a, b }
            ),
        }
    }

    /// Transition one contact to `Post` and force its link into a
    /// fully-lossy condition.
    fn deactivate(&mut self, id: ContactId) {
        let contact = self.plan.contact(id).clone();
        info!("[{}] deactivating {contact}", self.current_time);
        self.plan.mark_post(id);

        let (a, b) = contact.nodes;
        match self.controller.find_link(a, b) {
            Some(link) => {
                if let Err(err) = self.controller.deactivate(link) {
                    warn!(
                        "[{}] deactivate failed for {contact}: {err}",
                        self.current_time
                    );
                }
            }
            None => warn!(
                "[{}] {}, skipping deactivate",
                self.current_time,
                Error::LinkNotFound { a, b }
            ),
        }
    }
}
