use lunaricorn::orb::model::{OrbData, OrbDataSubtype, OrbMeta};

#[test]
fn subtype_round_trips_through_its_wire_string() {
    assert_eq!(OrbDataSubtype::parse("@json"), OrbDataSubtype::Json);
    assert_eq!(OrbDataSubtype::parse("@raw"), OrbDataSubtype::Raw);
    assert_eq!(OrbDataSubtype::Json.as_str(), "@json");
    assert_eq!(OrbDataSubtype::Raw.as_str(), "@raw");
}

#[test]
fn subtype_parse_defaults_unknown_values_to_json() {
    assert_eq!(OrbDataSubtype::parse("bogus"), OrbDataSubtype::Json);
    assert_eq!(OrbDataSubtype::parse(""), OrbDataSubtype::Json);
}

#[test]
fn subtype_serializes_to_its_wire_string() {
    let json = serde_json::to_string(&OrbDataSubtype::Json).unwrap();
    assert_eq!(json, "\"@json\"");
    let raw = serde_json::to_string(&OrbDataSubtype::Raw).unwrap();
    assert_eq!(raw, "\"@raw\"");
}

#[test]
fn orb_data_default_has_no_primary_key_and_json_subtype() {
    let data = OrbData::default();
    assert!(data.u.is_none());
    assert_eq!(data.subtype, OrbDataSubtype::Json);
    assert!(data.flags.is_empty());
    assert!(data.data.is_null());
}

#[test]
fn orb_meta_default_is_treated_as_a_new_record() {
    let meta = OrbMeta::default();
    assert!(meta.id <= 0);
    assert_eq!(meta.data_type, "@json");
}

#[test]
fn orb_meta_missing_data_type_deserializes_to_json_default() {
    let meta: OrbMeta = serde_json::from_str(
        r#"{"id": 0, "u": null, "ctime": 0, "flags": [], "handle": 7}"#,
    )
    .unwrap();
    assert_eq!(meta.data_type, "@json");
    assert_eq!(meta.handle, 7);
}

#[test]
fn chain_fields_can_form_a_cycle_since_they_are_unvalidated_handles() {
    let id = uuid::Uuid::now_v7();
    let data = OrbData {
        u: Some(id),
        chain_left: Some(id),
        chain_right: Some(id),
        parent: Some(id),
        ..Default::default()
    };
    // The store never resolves these fields; a record is free to point
    // at itself.
    assert_eq!(data.chain_left, data.u);
    assert_eq!(data.parent, data.u);
}
