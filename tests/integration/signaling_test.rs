use lunaricorn::core::signaling::model::BrowseRequest;
use lunaricorn::core::signaling::store::EventStore;

use super::test_helpers;

#[tokio::test]
async fn push_and_browse_round_trip() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();

    let source = test_helpers::unique("s1");
    let eid = events
        .append(
            "alpha",
            &serde_json::json!({"k": 1}),
            &None,
            &Some(vec!["x".to_string()]),
            Some(&source),
            1,
        )
        .await
        .unwrap();
    assert!(eid >= 1);

    let found = events
        .browse(&BrowseRequest {
            timestamp: 0,
            event_types: Some(vec!["alpha".to_string()]),
            sources: None,
            affected: None,
            tags: None,
            limit: None,
        })
        .await
        .unwrap();
    let event = found
        .iter()
        .find(|e| e.eid == eid)
        .expect("pushed event must be visible through browse");
    assert_eq!(event.event_type, "alpha");
    assert_eq!(event.payload, serde_json::json!({"k": 1}));
    assert_eq!(event.source, source);
    assert_eq!(event.tags, Some(vec!["x".to_string()]));
}

#[tokio::test]
async fn unspecified_source_defaults_to_ownerless() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();

    let eid = events
        .append("beta", &serde_json::json!(null), &None, &None, None, 1)
        .await
        .unwrap();
    let found = events
        .browse(&BrowseRequest {
            timestamp: 0,
            event_types: Some(vec!["beta".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    let event = found.iter().find(|e| e.eid == eid).unwrap();
    assert_eq!(event.source, "ownerless");
}

#[tokio::test]
async fn eid_ordering_matches_ctime_ordering() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();

    let marker = test_helpers::unique("seq");
    let a = events
        .append("seq", &serde_json::json!({"m": &marker}), &None, &None, None, 10)
        .await
        .unwrap();
    let b = events
        .append("seq", &serde_json::json!({"m": &marker}), &None, &None, None, 20)
        .await
        .unwrap();
    assert!(a < b, "later inserts get strictly larger eids");
}

#[tokio::test]
async fn browse_rejects_sql_metacharacters_in_filter_values() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();

    let result = events
        .browse(&BrowseRequest {
            timestamp: 0,
            sources: Some(vec!["x'; DROP TABLE signaling_events;--".to_string()]),
            ..Default::default()
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn browse_limit_zero_applies_no_limit() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();

    let marker = test_helpers::unique("limit-zero");
    for _ in 0..3 {
        events
            .append(&marker, &serde_json::json!(null), &None, &None, None, 1)
            .await
            .unwrap();
    }
    let found = events
        .browse(&BrowseRequest {
            timestamp: 0,
            event_types: Some(vec![marker.clone()]),
            limit: Some(0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
}
