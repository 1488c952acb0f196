use std::sync::{Arc, Mutex};

use cluck_channels::{FloatCell, Input, Output};
use cluck_core::ChannelKind;
use cluck_node::{LoopbackLink, Remote};

use crate::*;

fn collect(node: &cluck_node::Node) -> Arc<Mutex<Vec<Remote>>> {
    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = found.clone();
    node.discover(move |remote| sink.lock().unwrap().push(remote));
    found
}

fn listing(found: &Mutex<Vec<Remote>>) -> Vec<(String, Option<ChannelKind>)> {
    let mut listing: Vec<_> = found
        .lock()
        .unwrap()
        .iter()
        .map(|r| (r.path().to_string(), r.kind()))
        .collect();
    listing.sort();
    listing
}

#[test]
fn test_discovery_lists_published_channels_across_links() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    let coprocessor = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();
    LoopbackLink::connect(&robot, "coprocessor", &coprocessor, "robot").unwrap();

    robot
        .publish_float_input("drivetrain/left", Arc::new(FloatCell::new(0.0)))
        .unwrap();
    robot
        .publish_float_output("arm", Arc::new(FloatCell::new(0.0)))
        .unwrap();
    coprocessor
        .publish_float_input("gyro", Arc::new(FloatCell::new(0.0)))
        .unwrap();
    // Subscription endpoints are bound but not published.
    let _ = robot.subscribe_float_input("coprocessor/gyro");

    let found = collect(&console);
    assert_eq!(
        listing(&found),
        vec![
            ("robot/arm".to_string(), Some(ChannelKind::FloatSettable)),
            (
                "robot/coprocessor/gyro".to_string(),
                Some(ChannelKind::FloatProducer)
            ),
            (
                "robot/drivetrain/left".to_string(),
                Some(ChannelKind::FloatProducer)
            ),
        ]
    );
}

#[test]
fn test_discovered_channels_check_out_into_working_proxies() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();

    let left = Arc::new(FloatCell::new(0.5));
    robot.publish_float_input("drivetrain/left", left.clone()).unwrap();
    let arm = Arc::new(FloatCell::new(0.0));
    robot.publish_float_output("arm", arm.clone()).unwrap();

    let found = collect(&console);
    let found = found.lock().unwrap();
    let by_path = |path: &str| found.iter().find(|r| r.path() == path).unwrap();

    let left_remote = by_path("robot/drivetrain/left");
    assert!(!left_remote.is_bound());
    let reading = left_remote.checkout().unwrap().as_float_input().unwrap();
    assert!(left_remote.is_bound());
    assert_eq!(reading.get(), 0.5);
    left.set(-0.5).unwrap();
    assert_eq!(reading.get(), -0.5);

    let setter = by_path("robot/arm").checkout().unwrap().as_float_output().unwrap();
    setter.set(0.8).unwrap();
    assert_eq!(arm.get(), 0.8);
}

#[test]
fn test_discovery_includes_local_channels() {
    init_tracing();
    let node = quiet_node();
    node.publish_float_output("arm", Arc::new(FloatCell::new(0.0)))
        .unwrap();

    let found = collect(&node);
    assert_eq!(
        listing(&found),
        vec![("arm".to_string(), Some(ChannelKind::FloatSettable))]
    );
}
