use lunaricorn::signaling::model::{BrowseRequest, PushReply, OWNERLESS};

#[test]
fn ownerless_is_the_documented_sentinel() {
    assert_eq!(OWNERLESS, "ownerless");
}

#[test]
fn push_reply_success_serializes_with_eid() {
    let reply = PushReply::Success { eid: 42 };
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["status"], "success");
    assert_eq!(value["eid"], 42);
}

#[test]
fn push_reply_error_serializes_with_message() {
    let reply = PushReply::Error {
        message: "Missing required field: message".to_string(),
    };
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["message"], "Missing required field: message");
}

#[test]
fn push_reply_failed_serializes_without_extra_fields() {
    let reply = PushReply::Failed;
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["status"], "failed");
}

#[test]
fn browse_request_defaults_have_no_filters_and_no_limit() {
    let req: BrowseRequest = serde_json::from_str(r#"{"timestamp": 0}"#).unwrap();
    assert_eq!(req.timestamp, 0);
    assert!(req.event_types.is_none());
    assert!(req.sources.is_none());
    assert!(req.tags.is_none());
    assert!(req.affected.is_none());
    assert!(req.limit.is_none());
}

#[test]
fn browse_request_parses_full_filter_set() {
    let req: BrowseRequest = serde_json::from_str(
        r#"{"timestamp": 100, "event_types": ["alpha"], "sources": ["s1"],
            "affected": ["obj-1"], "tags": ["x"], "limit": 5}"#,
    )
    .unwrap();
    assert_eq!(req.event_types, Some(vec!["alpha".to_string()]));
    assert_eq!(req.sources, Some(vec!["s1".to_string()]));
    assert_eq!(req.affected, Some(vec!["obj-1".to_string()]));
    assert_eq!(req.tags, Some(vec!["x".to_string()]));
    assert_eq!(req.limit, Some(5));
}
