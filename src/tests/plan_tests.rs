#[cfg(test)]
mod tests {
    use crate::contact::ContactState;
    use crate::error::Error;
    use crate::plan::ContactPlan;
    use crate::test_helpers::plan;

    const TWO_CONTACTS: &str = "\
s loop 0
a contact 10 20 1 2 1000000 0.0 5 1
a contact 15 30 2 3 500000 1.5 10 0
";

    #[test]
    fn test_at_returns_contacts_containing_t() {
        let p = plan(TWO_CONTACTS);

        assert!(p.at(5).is_empty());
        assert_eq!(p.at(10).len(), 1);
        assert_eq!(p.at(15).len(), 2);
        assert_eq!(p.at(20).len(), 2);
        assert_eq!(p.at(21).len(), 1);
        assert_eq!(p.at(30).len(), 1);
        assert!(p.at(31).is_empty());
    }

    #[test]
    fn test_at_is_independent_of_state() {
        let mut p = plan(TWO_CONTACTS);
        let id = p.at(10)[0];
        p.mark_live(id);
        p.mark_post(id);
        assert_eq!(p.at(10).len(), 1);
    }

    #[test]
    fn test_need_activation_is_subset_of_at() {
        let mut p = plan(TWO_CONTACTS);

        for t in [5, 10, 15, 20, 30, 31] {
            let at: Vec<_> = p.at(t).into_iter().collect();
            for id in p.need_activation(t) {
                assert!(at.contains(&id), "need_activation(t={t}) not within at");
            }
        }

        // A Live contact is no longer due for activation
        let id = p.need_activation(10)[0];
        p.mark_live(id);
        assert!(p.need_activation(10).is_empty());
    }

    #[test]
    fn test_need_deactivation_requires_live_state() {
        let mut p = plan(TWO_CONTACTS);

        // Nothing is Live yet, so nothing deactivates even past all ends
        assert!(p.need_deactivation(100).is_empty());

        let id = p.need_activation(10)[0];
        p.mark_live(id);
        assert!(p.need_deactivation(19).is_empty());
        assert_eq!(p.need_deactivation(20).len(), 1);
        // Overdue Live contacts still report, long past their end
        assert_eq!(p.need_deactivation(100).len(), 1);

        p.mark_post(id);
        assert!(p.need_deactivation(20).is_empty());
    }

    #[test]
    fn test_next_activation_skips_non_pre() {
        let mut p = plan(TWO_CONTACTS);

        assert_eq!(p.next_activation(0), Some(10));
        assert_eq!(p.next_activation(11), Some(15));

        for id in p.need_activation(10) {
            p.mark_live(id);
        }
        assert_eq!(p.next_activation(0), Some(15));
    }

    #[test]
    fn test_next_deactivation_only_live_at_or_after_t() {
        let mut p = plan(TWO_CONTACTS);
        assert_eq!(p.next_deactivation(0), None);

        for id in p.need_activation(15) {
            p.mark_live(id);
        }
        assert_eq!(p.next_deactivation(0), Some(20));
        assert_eq!(p.next_deactivation(21), Some(30));
        assert_eq!(p.next_deactivation(31), None);
    }

    #[test]
    fn test_exhausted_plan_reports_no_events() {
        let mut p = plan(TWO_CONTACTS);
        for id in p.need_activation(15) {
            p.mark_live(id);
        }
        for id in p.need_deactivation(30) {
            p.mark_post(id);
        }
        assert_eq!(p.next_activation(31), None);
        assert_eq!(p.next_deactivation(31), None);
    }

    #[test]
    fn test_reset_restores_pre_and_is_idempotent() {
        let mut p = plan(TWO_CONTACTS);
        let ids: Vec<_> = p.ids().collect();

        p.mark_live(ids[0]);
        p.mark_post(ids[0]);
        p.mark_live(ids[1]);

        p.reset();
        for id in &ids {
            assert_eq!(p.state(*id), ContactState::Pre);
        }

        p.reset();
        for id in &ids {
            assert_eq!(p.state(*id), ContactState::Pre);
        }
    }

    #[test]
    fn test_replay_after_reset_is_identical() {
        let mut p = plan(TWO_CONTACTS);

        let run = |p: &mut ContactPlan| {
            let mut events = Vec::new();
            let mut t = 0;
            loop {
                let next = match (p.next_activation(t), p.next_deactivation(t)) {
                    (None, None) => break,
                    (a, d) => a.into_iter().chain(d).min().unwrap(),
                };
                t = next;
                for id in p.need_activation(t) {
                    p.mark_live(id);
                    events.push((t, "up", id));
                }
                for id in p.need_deactivation(t) {
                    p.mark_post(id);
                    events.push((t, "down", id));
                }
            }
            events
        };

        let first = run(&mut p);
        assert!(!first.is_empty());
        p.reset();
        let second = run(&mut p);
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_contact_timeline_queries() {
        let mut p = plan("s loop 0\na contact 10 20 1 2 1000000 0.0 5 1\n");
        assert!(!p.loop_enabled());

        assert!(p.need_activation(5).is_empty());

        let due = p.need_activation(10);
        assert_eq!(due.len(), 1);
        assert_eq!(p.contact(due[0]).nodes, (1, 2));
        p.mark_live(due[0]);

        let down = p.need_deactivation(20);
        assert_eq!(down.len(), 1);
        p.mark_post(down[0]);

        assert_eq!(p.next_activation(21), None);
        assert_eq!(p.next_deactivation(21), None);
    }

    #[test]
    fn test_malformed_contact_is_not_partially_loaded() {
        let text = "\
a contact 0 5 1 2 1000000 0.0 5 1
a contact 10 20 1 2 1000000
";
        match ContactPlan::parse(text) {
            Err(Error::MalformedContact { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedContact, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_flag_can_be_overridden() {
        let mut p = plan("s loop 1\n");
        assert!(p.loop_enabled());
        p.set_loop(false);
        assert!(!p.loop_enabled());
    }

    #[test]
    fn test_contact_order_in_file_is_irrelevant() {
        let reversed = "\
a contact 15 30 2 3 500000 1.5 10 0
a contact 10 20 1 2 1000000 0.0 5 1
";
        let p = plan(reversed);
        assert_eq!(p.next_activation(0), Some(10));
        assert_eq!(p.at(15).len(), 2);
    }
}
