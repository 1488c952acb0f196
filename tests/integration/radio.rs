use std::sync::Arc;

use cluck_channels::{BooleanCell, FloatCell, Input, Output};
use cluck_core::ChannelKind;
use cluck_node::Subscription;

use crate::*;

#[test]
fn test_drivetrain_value_crosses_radio() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    let pair = radio_pair(&robot, "console", &console, "peer");

    let left = Arc::new(FloatCell::new(0.0));
    robot.publish_float_input("drivetrain/left", left.clone()).unwrap();

    let remote = console.subscribe_float_input("peer/drivetrain/left");
    wait_until("subscribe reply", || pair.a.stats().received() == 1);

    left.set(0.5).unwrap();
    wait_until("value over radio", || remote.get() == 0.5);
    assert_eq!(pair.a.stats().dropped(), 0);
    assert_eq!(pair.b.stats().dropped(), 0);
}

#[test]
fn test_checked_out_remote_reads_over_radio() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    let pair = radio_pair(&robot, "console", &console, "peer");

    let left = Arc::new(FloatCell::new(0.0));
    robot.publish_float_input("drivetrain/left", left.clone()).unwrap();

    let sub = console
        .subscribe("peer/drivetrain/left", ChannelKind::FloatProducer)
        .unwrap();
    let Subscription::Remote(remote) = &sub else {
        panic!("expected a remote subscription, got {sub:?}");
    };
    assert!(!remote.is_bound());
    let reading = remote.checkout().unwrap().as_float_input().unwrap();
    assert!(remote.is_bound());
    wait_until("subscribe reply", || pair.a.stats().received() == 1);

    left.set(0.5).unwrap();
    wait_until("value over radio", || reading.get() == 0.5);
    assert_eq!(pair.a.stats().dropped(), 0);
}

#[test]
fn test_corrupt_frames_are_dropped_and_traffic_resumes() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    let pair = radio_pair(&robot, "console", &console, "peer");

    let left = Arc::new(FloatCell::new(0.0));
    robot.publish_float_input("drivetrain/left", left.clone()).unwrap();
    let remote = console.subscribe_float_input("peer/drivetrain/left");
    wait_until("subscribe reply", || pair.b.stats().received() == 1);

    pair.a_to_b.corrupt_next();
    left.set(0.7).unwrap();
    wait_until("corrupt frame dropped", || pair.b.stats().dropped() == 1);
    assert_eq!(remote.get(), 0.0);

    left.set(0.8).unwrap();
    wait_until("next value", || remote.get() == 0.8);
}

#[test]
fn test_remote_settable_over_radio() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    let pair = radio_pair(&robot, "console", &console, "peer");

    let enabled = Arc::new(BooleanCell::new(false));
    robot.publish_boolean_output("enabled", enabled.clone()).unwrap();

    console.subscribe_boolean_output("peer/enabled").set(true).unwrap();
    wait_until("remote write", || enabled.get());
    assert_eq!(pair.b.stats().sent(), 1);
}
