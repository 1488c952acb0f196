use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cluck_channels::{
    byte_sink_fn, event_fn, BooleanCell, ByteSink, ChannelError, EventCell, EventInput, EventOutput, FloatCell,
    Input, LogLevel, LogTarget, Output,
};
use cluck_node::{Link, LoopbackLink, Node};

use crate::*;

#[derive(Default)]
struct RecordingLink(Mutex<Vec<String>>);

impl Link for RecordingLink {
    fn transmit(&self, dest: &str, _source: &str, _data: &[u8]) -> bool {
        self.0.lock().unwrap().push(dest.to_string());
        true
    }
}

#[test]
fn test_values_cross_two_hops() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    let coprocessor = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();
    LoopbackLink::connect(&robot, "coprocessor", &coprocessor, "robot").unwrap();

    let gyro = Arc::new(FloatCell::new(90.0));
    coprocessor.publish_float_input("gyro", gyro.clone()).unwrap();

    let heading = console.subscribe_float_input("robot/coprocessor/gyro");
    assert_eq!(heading.get(), 90.0);

    gyro.set(45.0).unwrap();
    assert_eq!(heading.get(), 45.0);
}

#[test]
fn test_remote_settables_and_events() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();

    let enabled = Arc::new(BooleanCell::new(false));
    robot.publish_boolean_output("enabled", enabled.clone()).unwrap();
    let resets = Arc::new(AtomicUsize::new(0));
    let r = resets.clone();
    robot
        .publish_event_output(
            "reset",
            event_fn(move || {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    console.subscribe_boolean_output("robot/enabled").set(true).unwrap();
    console.subscribe_event_output("robot/reset").event().unwrap();

    assert!(enabled.get());
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[test]
fn test_remote_event_source_reaches_listeners() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();

    let match_start = Arc::new(EventCell::new());
    robot.publish_event_input("match-start", match_start.clone()).unwrap();

    let heard = Arc::new(AtomicUsize::new(0));
    let h = heard.clone();
    console
        .subscribe_event_input("robot/match-start")
        .on_event(event_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

    match_start.event().unwrap();
    match_start.event().unwrap();
    assert_eq!(heard.load(Ordering::SeqCst), 2);
}

#[test]
fn test_remote_log_and_byte_sink() {
    struct Capture(Mutex<Vec<(LogLevel, String)>>);
    impl LogTarget for Capture {
        fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push((level, message.to_string()));
            Ok(())
        }
    }

    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    LoopbackLink::connect(&robot, "console", &console, "robot").unwrap();

    let capture = Arc::new(Capture(Mutex::new(Vec::new())));
    console.publish_log_target("log", capture.clone()).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let rec = recorded.clone();
    console
        .publish_byte_sink(
            "recorder",
            byte_sink_fn(move |bytes| {
                rec.lock().unwrap().extend_from_slice(bytes);
                Ok(())
            }),
        )
        .unwrap();

    let log = robot.subscribe_log_target("console/log", LogLevel::Info);
    log.log(LogLevel::Finer, "loop timing").unwrap();
    log.log(LogLevel::Warning, "brownout").unwrap();
    robot.subscribe_byte_sink("console/recorder").write(b"frame-1").unwrap();

    assert_eq!(
        *capture.0.lock().unwrap(),
        vec![(LogLevel::Warning, "brownout".to_string())]
    );
    assert_eq!(&*recorded.lock().unwrap(), b"frame-1");
}

#[test]
fn test_lost_subscriber_is_pruned() {
    init_tracing();
    let console = quiet_node();
    let robot = quiet_node();
    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();

    let gyro = Arc::new(FloatCell::new(0.0));
    robot.publish_float_input("gyro", gyro.clone()).unwrap();
    let _heading = console.subscribe_float_input("robot/gyro");

    // Console goes away: the next push has nowhere to go and is refused.
    robot.remove_link("console");
    gyro.set(1.0).unwrap();

    let recording = Arc::new(RecordingLink::default());
    robot.add_link("console", recording.clone()).unwrap();
    gyro.set(2.0).unwrap();
    assert!(recording.0.lock().unwrap().is_empty());
}

#[test]
fn test_link_added_later_triggers_resubscribe() {
    init_tracing();
    let console = Node::new();
    let robot = Node::new();

    let gyro = Arc::new(FloatCell::new(12.0));
    robot.publish_float_input("gyro", gyro.clone()).unwrap();

    // Nothing routes to "robot" yet, so the first request goes nowhere.
    let heading = console.subscribe_float_input("robot/gyro");
    assert_eq!(heading.get(), 0.0);

    LoopbackLink::connect(&console, "robot", &robot, "console").unwrap();
    wait_until("re-subscription after link added", || heading.get() == 12.0);

    gyro.set(13.0).unwrap();
    assert_eq!(heading.get(), 13.0);
}

#[test]
fn test_local_subscription_bypasses_links() {
    init_tracing();
    let robot = quiet_node();
    let recording = Arc::new(RecordingLink::default());
    robot.add_link("console", recording.clone()).unwrap();

    let arm = Arc::new(FloatCell::new(0.0));
    robot.publish_float_output("arm", arm.clone()).unwrap();
    let sub = robot
        .subscribe("arm", cluck_core::ChannelKind::FloatSettable)
        .unwrap();
    sub.proxy().unwrap().as_float_output().unwrap().set(0.3).unwrap();

    assert_eq!(arm.get(), 0.3);
    assert!(recording.0.lock().unwrap().is_empty());
}
