use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;

use cluck_channels::{FloatCell, Input, Output};
use cluck_core::config::StreamConfig;
use cluck_core::ChannelKind;
use cluck_node::{Node, StreamLink};

use crate::*;

/// Robot listens, console dials in. Returns once both sides have the link.
async fn connect_pair(robot: &Node, console: &Node) -> Arc<StreamLink> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(StreamLink::accept_loop(
        listener,
        "console",
        robot.clone(),
        StreamConfig::default(),
    ));
    let link = StreamLink::connect(addr, "robot", console, &StreamConfig::default())
        .await
        .unwrap();
    wait_until_async("accept", || !robot.link_names().is_empty()).await;
    link
}

#[tokio::test]
async fn test_values_and_writes_cross_tcp() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    connect_pair(&robot, &console).await;

    let left = Arc::new(FloatCell::new(0.25));
    robot.publish_float_input("drivetrain/left", left.clone()).unwrap();
    let arm = Arc::new(FloatCell::new(0.0));
    robot.publish_float_output("arm", arm.clone()).unwrap();

    let remote = console.subscribe_float_input("robot/drivetrain/left");
    wait_until_async("subscribe reply", || remote.get() == 0.25).await;
    left.set(0.5).unwrap();
    wait_until_async("pushed value", || remote.get() == 0.5).await;

    console.subscribe_float_output("robot/arm").set(-1.0).unwrap();
    wait_until_async("remote write", || arm.get() == -1.0).await;
}

#[tokio::test]
async fn test_discovery_over_tcp() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    connect_pair(&robot, &console).await;
    robot
        .publish_float_output("arm", Arc::new(FloatCell::new(0.0)))
        .unwrap();

    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = found.clone();
    console.discover(move |remote| {
        sink.lock()
            .unwrap()
            .push((remote.path().to_string(), remote.kind()));
    });

    wait_until_async("discovery reply", || !found.lock().unwrap().is_empty()).await;
    assert_eq!(
        *found.lock().unwrap(),
        vec![("robot/arm".to_string(), Some(ChannelKind::FloatSettable))]
    );
}

#[tokio::test]
async fn test_closing_one_end_removes_link_on_both() {
    init_tracing();
    let robot = quiet_node();
    let console = quiet_node();
    let link = connect_pair(&robot, &console).await;
    assert_eq!(robot.link_names(), vec!["console-0".to_string()]);

    link.close();
    wait_until_async("client detach", || console.link_names().is_empty()).await;
    wait_until_async("server detach", || robot.link_names().is_empty()).await;
}
