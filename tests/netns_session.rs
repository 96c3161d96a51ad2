//! Session discovery and link shaping against real network namespaces.
//!
//! These tests require `ip` and passwordless sudo; they skip cleanly
//! otherwise.

mod common;

use ccm::contact::Contact;
use ccm::controller::{LinkController, NetemController};
use common::{qdisc_contains, skip_without_netns};
use netem_link::{Session, build_session, unique_session_id};

const PREFIX: &str = "ccmt";

fn test_contact(a: u32, b: u32) -> Contact {
    Contact {
        timespan: (0, 60),
        nodes: (a, b),
        bw: 1_000_000,
        loss: 1.5,
        delay: 25,
        jitter: 5,
    }
}

#[test]
fn discovers_nodes_and_links_of_a_session() {
    if skip_without_netns() {
        return;
    }

    let id = unique_session_id();
    let _nodes = build_session(id, PREFIX, &[(1, 2), (2, 3)]).expect("build session");

    let session = Session::connect(id, PREFIX).expect("connect");
    assert_eq!(session.links().len(), 2);

    let pairs: Vec<(u32, u32)> = session
        .links()
        .iter()
        .map(|l| (l.node_a, l.node_b))
        .collect();
    assert!(pairs.contains(&(1, 2)));
    assert!(pairs.contains(&(2, 3)));
}

#[test]
fn connect_fails_for_an_absent_session() {
    if skip_without_netns() {
        return;
    }

    // Nothing was built for this id
    let err = Session::connect(unique_session_id(), PREFIX).unwrap_err();
    assert!(err.to_string().contains("running"), "{err}");
}

#[test]
fn controller_applies_and_deactivates_a_contact() {
    if skip_without_netns() {
        return;
    }

    let id = unique_session_id();
    let nodes = build_session(id, PREFIX, &[(1, 2)]).expect("build session");

    let mut controller = NetemController::connect(id, PREFIX, false).expect("connect");

    // Lookup is symmetric
    let link = controller.find_link(2, 1).expect("find link");
    assert_eq!(controller.find_link(1, 2), Some(link));
    assert_eq!(controller.find_link(1, 9), None);

    let contact = test_contact(1, 2);
    controller.apply_contact(link, &contact).expect("apply");

    let ns1 = &nodes[0].1;
    assert!(qdisc_contains(ns1, "vn2", "netem"), "netem missing on vn2");
    assert!(qdisc_contains(ns1, "vn2", "delay"), "delay missing on vn2");
    let ns2 = &nodes[1].1;
    assert!(qdisc_contains(ns2, "vn1", "netem"), "netem missing on vn1");

    controller.deactivate(link).expect("deactivate");
    assert!(
        qdisc_contains(ns1, "vn2", "loss 100%"),
        "saturated loss missing after deactivate"
    );
}
