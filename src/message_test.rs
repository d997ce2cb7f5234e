use super::*;
use serde_json::json;

fn msg_json(id: i64) -> Value {
    json!({
        "id": id,
        "room": "global",
        "user_id": 7,
        "username": "alice",
        "display_name": "",
        "content": format!("hello {id}"),
        "image_urls": null,
        "created_at": 1_700_000_000 + id,
        "avatar": "https://cdn.test/a.png",
        "usage_rank": 3
    })
}

// =============================================================
// Inbound decoding
// =============================================================

#[test]
fn init_decodes_messages_in_order() {
    let text = json!({"type": "init", "data": {"messages": [msg_json(1), msg_json(2)]}}).to_string();
    let Some(Inbound::Init(messages)) = parse_inbound(&text) else {
        panic!("expected init");
    };
    assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(messages[0].timestamp, 1_700_000_001);
    assert!(messages[0].images().is_empty());
}

#[test]
fn init_without_messages_is_empty_snapshot() {
    assert_eq!(parse_inbound(r#"{"type":"init"}"#), Some(Inbound::Init(Vec::new())));
    assert_eq!(
        parse_inbound(r#"{"type":"init","data":{"messages":null}}"#),
        Some(Inbound::Init(Vec::new()))
    );
}

#[test]
fn init_drops_malformed_entries_only() {
    let text = json!({
        "type": "init",
        "data": {"messages": [msg_json(1), {"content": "no id"}, "junk", msg_json(3)]}
    })
    .to_string();
    let Some(Inbound::Init(messages)) = parse_inbound(&text) else {
        panic!("expected init");
    };
    assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn init_with_non_array_messages_is_ignored() {
    assert_eq!(parse_inbound(r#"{"type":"init","data":{"messages":"nope"}}"#), None);
}

#[test]
fn message_event_decodes_single_message() {
    let text = json!({"type": "message", "data": {"message": msg_json(9)}}).to_string();
    let Some(Inbound::Message(m)) = parse_inbound(&text) else {
        panic!("expected message");
    };
    assert_eq!(m.id, 9);
    assert_eq!(m.content, "hello 9");
    assert_eq!(m.author(), "alice");
}

#[test]
fn message_event_without_payload_is_ignored() {
    assert_eq!(parse_inbound(r#"{"type":"message","data":{}}"#), None);
    assert_eq!(parse_inbound(r#"{"type":"message","data":{"message":{"content":"x"}}}"#), None);
}

#[test]
fn error_event_uses_message_or_generic_text() {
    assert_eq!(
        parse_inbound(r#"{"type":"error","data":{"message":"too long"}}"#),
        Some(Inbound::Error("too long".into()))
    );
    assert_eq!(parse_inbound(r#"{"type":"error"}"#), Some(Inbound::Error(GENERIC_ERROR.into())));
    assert_eq!(
        parse_inbound(r#"{"type":"error","data":{"message":""}}"#),
        Some(Inbound::Error(GENERIC_ERROR.into()))
    );
    assert_eq!(parse_inbound(r#"{"type":"error","data":{"message":42}}"#), Some(Inbound::Error("42".into())));
    assert_eq!(parse_inbound(r#"{"type":"error","data":{"message":true}}"#), Some(Inbound::Error("true".into())));
}

#[test]
fn falsy_error_payloads_use_generic_text() {
    for payload in ["false", "0", "0.0", "null"] {
        let frame = format!(r#"{{"type":"error","data":{{"message":{payload}}}}}"#);
        assert_eq!(parse_inbound(&frame), Some(Inbound::Error(GENERIC_ERROR.into())), "{payload}");
    }
}

#[test]
fn unknown_or_malformed_frames_are_ignored() {
    assert_eq!(parse_inbound("not json"), None);
    assert_eq!(parse_inbound("[]"), None);
    assert_eq!(parse_inbound(r#"{"data":{}}"#), None);
    assert_eq!(parse_inbound(r#"{"type":7}"#), None);
    assert_eq!(parse_inbound(r#"{"type":"presence","data":{}}"#), None);
}

#[test]
fn author_prefers_display_name() {
    let mut m: Message = serde_json::from_value(msg_json(1)).unwrap();
    assert_eq!(m.author(), "alice");
    m.display_name = "Alice A.".into();
    assert_eq!(m.author(), "Alice A.");
}

// =============================================================
// Outbound encoding
// =============================================================

#[test]
fn send_frame_matches_wire_shape() {
    let frame = Outbound::send("hi", "global", vec!["/api/chat/images/2025-01-01/a.png".into()]);
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "send",
            "data": {
                "content": "hi",
                "room": "global",
                "image_urls": ["/api/chat/images/2025-01-01/a.png"]
            }
        })
    );
}

#[test]
fn send_frame_keeps_empty_image_list() {
    let value = serde_json::to_value(Outbound::send("", "r", Vec::new())).unwrap();
    assert_eq!(value["data"]["image_urls"], json!([]));
}
