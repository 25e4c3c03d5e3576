use super::*;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

#[test]
fn stats_frame_becomes_telemetry() {
    let event = decode_frame(
        r#"{"type":"stats","stats":{"fps":30,"gesture_count":5,"confidence":0.92}}"#,
        now(),
    )
    .expect("decode");

    let NormalizedEvent::Telemetry(telemetry) = event else {
        panic!("expected telemetry, got {event:?}");
    };
    assert_eq!(telemetry.fps, 30.0);
    assert_eq!(telemetry.gesture_total, 5);
    assert_eq!(telemetry.confidence, 0.92);
    assert_eq!(telemetry.rounded_fps(), 30);
    assert_eq!(telemetry.confidence_percent(), 92);
}

#[test]
fn stats_frame_tolerates_extra_fields_and_missing_counters() {
    let event = decode_frame(
        r#"{"type":"stats","timestamp":1.5,"cpu":12.0,"stats":{"fps":12.4}}"#,
        now(),
    )
    .expect("decode");

    assert_eq!(
        event,
        NormalizedEvent::Telemetry(Telemetry::new(12.4, 0.0, 0))
    );
}

#[test]
fn null_stats_counters_read_as_zero() {
    let event = decode_frame(
        r#"{"type":"stats","stats":{"fps":30,"gesture_count":5,"confidence":null}}"#,
        now(),
    )
    .expect("decode");
    assert_eq!(event, NormalizedEvent::Telemetry(Telemetry::new(30.0, 0.0, 5)));

    let event = decode_frame(
        r#"{"type":"stats","stats":{"fps":null,"gesture_count":null,"detection_count":null,"confidence":0.5}}"#,
        now(),
    )
    .expect("decode");
    assert_eq!(event, NormalizedEvent::Telemetry(Telemetry::new(0.0, 0.5, 0)));
}

#[test]
fn gesture_frame_keeps_command_and_backend_timestamp() {
    let event = decode_frame(
        r#"{"type":"gesture_command","timestamp":1700000001.25,"command":"THUMBS_UP","parameters":{}}"#,
        now(),
    )
    .expect("decode");

    let NormalizedEvent::GestureCommand { command, timestamp } = event else {
        panic!("expected gesture command");
    };
    assert_eq!(command, "THUMBS_UP");
    assert_eq!(timestamp.timestamp(), 1_700_000_001);
    assert_eq!(timestamp.timestamp_subsec_millis(), 250);
}

#[test]
fn gesture_frame_without_timestamp_uses_receive_time() {
    let event = decode_frame(r#"{"type":"gesture_command","command":"fist"}"#, now())
        .expect("decode");
    assert_eq!(
        event,
        NormalizedEvent::GestureCommand {
            command: "fist".to_string(),
            timestamp: now(),
        }
    );
}

#[test]
fn non_json_payload_is_unparseable() {
    let err = decode_frame("{not json", now()).expect_err("must fail");
    assert!(matches!(err, PipelineError::FrameUnparseable(_)));
    assert!(err.to_string().starts_with("parse error"));
}

#[test]
fn unknown_or_missing_type_is_unrecognized() {
    let err = decode_frame(r#"{"type":"heartbeat"}"#, now()).expect_err("unknown type");
    assert_eq!(
        err,
        PipelineError::FrameUnrecognized("unknown type `heartbeat`".to_string())
    );

    let err = decode_frame(r#"{"stats":{"fps":1}}"#, now()).expect_err("missing type");
    assert!(matches!(err, PipelineError::FrameUnrecognized(_)));

    let err = decode_frame("[1,2,3]", now()).expect_err("array");
    assert!(matches!(err, PipelineError::FrameUnrecognized(_)));
}

#[test]
fn known_type_with_invalid_body_is_unrecognized() {
    let err = decode_frame(r#"{"type":"gesture_command"}"#, now()).expect_err("no command");
    assert!(matches!(err, PipelineError::FrameUnrecognized(_)));
}

#[test]
fn telemetry_is_clamped_into_range() {
    let telemetry = Telemetry::new(-4.0, 1.7, 3);
    assert_eq!(telemetry.fps, 0.0);
    assert_eq!(telemetry.confidence, 1.0);

    let telemetry = Telemetry::new(f64::NAN, f64::NAN, 0);
    assert_eq!(telemetry.fps, 0.0);
    assert_eq!(telemetry.confidence, 0.0);
}

#[test]
fn frames_serialize_with_type_tag() {
    let frame = BackendFrame::gesture_command("peace", now());
    let text = serde_json::to_string(&frame).expect("serialize");
    let value: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["type"], "gesture_command");
    assert_eq!(value["command"], "peace");
    assert_eq!(value["timestamp"], 1_700_000_000.0);
}
