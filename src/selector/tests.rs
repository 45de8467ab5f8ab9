//! Tests for selector module

use super::*;
use crate::decode::JsonlDecoder;
use crate::error::Error;
use crate::http::HttpResponse;
use crate::incremental::{DeclarativeCursor, IncrementingCountCursor};
use crate::record::{Record, StreamSlice, StreamState};
use crate::template::TemplateContext;
use crate::types::{JsonObject, JsonValue};
use pretty_assertions::assert_eq;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::sync::Arc;

fn obj(value: JsonValue) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn response(body: &JsonValue) -> HttpResponse {
    HttpResponse::json_ok(body)
}

fn select(selector: &DefaultRecordSelector, body: &JsonValue) -> Vec<JsonValue> {
    selector
        .select_records(
            &response(body),
            &StreamState::new(),
            &JsonValue::Null,
            &StreamSlice::empty(),
            None,
        )
        .unwrap()
        .into_iter()
        .map(|r| JsonValue::Object(r.into_data()))
        .collect()
}

// ============================================================================
// Extractor Tests
// ============================================================================

#[test]
fn test_extract_root_array_and_object() {
    let extractor = DpathExtractor::default();
    assert_eq!(
        extractor.extract(json!([{"id": 1}, {"id": 2}])).unwrap(),
        vec![json!({"id": 1}), json!({"id": 2})]
    );
    assert_eq!(extractor.extract(json!({"id": 1})).unwrap(), vec![json!({"id": 1})]);
    assert!(extractor.extract(json!({})).unwrap().is_empty());
}

#[test]
fn test_extract_nested_path() {
    let extractor = DpathExtractor::new(["data", "items"]);
    let doc = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
    assert_eq!(extractor.extract(doc).unwrap().len(), 2);

    let single = DpathExtractor::from_dotted("data.user");
    assert_eq!(
        single.extract(json!({"data": {"user": {"id": 7}}})).unwrap(),
        vec![json!({"id": 7})]
    );
}

#[test]
fn test_extract_missing_path_yields_nothing() {
    let extractor = DpathExtractor::new(["data", "missing"]);
    assert!(extractor.extract(json!({"data": {}})).unwrap().is_empty());
    assert!(extractor.extract(json!({"data": 5})).unwrap().is_empty());
}

#[test]
fn test_extract_array_index_segment() {
    let extractor = DpathExtractor::new(["pages", "1", "rows"]);
    let doc = json!({"pages": [{"rows": [1]}, {"rows": [{"id": "b"}]}]});
    assert_eq!(extractor.extract(doc).unwrap(), vec![json!({"id": "b"})]);
}

#[test]
fn test_extract_wildcard() {
    let extractor = DpathExtractor::new(["groups", "*", "members"]);
    let doc = json!({"groups": [
        {"members": [{"id": 1}]},
        {"members": [{"id": 2}, {"id": 3}]}
    ]});
    assert_eq!(
        extractor.extract(doc).unwrap(),
        vec![json!([{"id": 1}]), json!([{"id": 2}, {"id": 3}])]
    );
}

#[test]
fn test_extract_templated_segment() {
    let extractor =
        DpathExtractor::new(["{{ config.root }}"]).with_config(json!({"root": "results"}));
    assert_eq!(
        extractor.extract(json!({"results": [{"id": 1}]})).unwrap(),
        vec![json!({"id": 1})]
    );
}

// ============================================================================
// Filter Tests
// ============================================================================

#[test]
fn test_field_filters() {
    let active = Record::new(obj(json!({"status": {"name": "active"}})), "s", None);
    let closed = Record::new(obj(json!({"status": {"name": "closed"}})), "s", None);
    let unknown = Record::new(obj(json!({"id": 1})), "s", None);

    let equals = FieldFilter::equals("status.name", "active");
    assert!(equals.keep(&active));
    assert!(!equals.keep(&closed));
    assert!(!equals.keep(&unknown));

    let not_equals = FieldFilter::not_equals("status.name", "closed");
    assert!(not_equals.keep(&active));
    assert!(!not_equals.keep(&closed));
    assert!(not_equals.keep(&unknown));
}

#[test]
fn test_field_filter_serde() {
    let filter: FieldFilter = serde_json::from_value(json!({
        "type": "field_equals",
        "path": "kind",
        "value": "issue"
    }))
    .unwrap();
    assert_eq!(filter, FieldFilter::equals("kind", "issue"));
}

#[test]
fn test_cursor_filter_uses_state() {
    let cursor = Arc::new(IncrementingCountCursor::new("seq"));
    cursor.set_initial_state(&obj(json!({"seq": 10}))).unwrap();

    let selector = DefaultRecordSelector::new("events", DpathExtractor::default())
        .with_filter(Arc::new(CursorFilter::new(cursor)));
    let records = select(&selector, &json!([{"seq": 9}, {"seq": 10}, {"seq": 11}]));
    assert_eq!(records, vec![json!({"seq": 10}), json!({"seq": 11})]);
}

// ============================================================================
// Transformation Tests
// ============================================================================

#[test]
fn test_add_field_from_record_and_config() {
    let mut data = obj(json!({"id": 3, "owner": {"login": "octo"}}));
    let ctx = TemplateContext::with_config(json!({"tenant": "acme"}));

    RecordTransformation::add_field(["meta", "owner"], "{{ record.owner.login }}")
        .apply(&mut data, &ctx)
        .unwrap();
    RecordTransformation::add_field(["tenant"], "{{ config.tenant }}")
        .apply(&mut data, &ctx)
        .unwrap();

    assert_eq!(
        JsonValue::Object(data),
        json!({"id": 3, "owner": {"login": "octo"}, "meta": {"owner": "octo"}, "tenant": "acme"})
    );
}

#[test]
fn test_add_field_under_scalar_fails() {
    let mut data = obj(json!({"meta": 1}));
    let err = RecordTransformation::add_field(["meta", "x"], 1)
        .apply(&mut data, &TemplateContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_remove_and_rename_fields() {
    let mut data = obj(json!({"id": 1, "secret": "x", "nested": {"drop": 1, "keep": 2}}));
    let ctx = TemplateContext::new();

    RecordTransformation::RemoveFields {
        field_pointers: vec![
            vec!["secret".into()],
            vec!["nested".into(), "drop".into()],
            vec!["missing".into(), "field".into()],
        ],
    }
    .apply(&mut data, &ctx)
    .unwrap();
    RecordTransformation::RenameField {
        from: "id".into(),
        to: "user_id".into(),
    }
    .apply(&mut data, &ctx)
    .unwrap();

    assert_eq!(
        JsonValue::Object(data),
        json!({"user_id": 1, "nested": {"keep": 2}})
    );
}

#[test]
fn test_transformation_serde() {
    let transformation: RecordTransformation = serde_json::from_value(json!({
        "type": "remove_fields",
        "field_pointers": [["a", "b"]]
    }))
    .unwrap();
    assert_eq!(transformation, RecordTransformation::remove_field(["a", "b"]));
}

// ============================================================================
// Selector Tests
// ============================================================================

#[test]
fn test_selector_pipeline_order() {
    let selector = DefaultRecordSelector::new("users", DpathExtractor::new(["data"]))
        .with_filter(Arc::new(FieldFilter::equals("active", true)))
        .with_transformation(RecordTransformation::remove_field(["active"]));

    let records = select(
        &selector,
        &json!({"data": [
            {"id": 1, "active": true},
            {"id": 2, "active": false},
            {"id": 3, "active": true}
        ]}),
    );
    assert_eq!(records, vec![json!({"id": 1}), json!({"id": 3})]);
}

#[test]
fn test_selector_attaches_slice_and_stream() {
    let selector = DefaultRecordSelector::new("repos", DpathExtractor::default());
    let slice = StreamSlice::from_partition(obj(json!({"org": "acme"})));

    let records = selector
        .select_records(
            &response(&json!([{"id": 1}])),
            &StreamState::new(),
            &JsonValue::Null,
            &slice,
            None,
        )
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].stream_name(), "repos");
    assert_eq!(records[0].associated_slice(), Some(&slice));
}

#[test]
fn test_selector_slice_templates() {
    let selector = DefaultRecordSelector::new("repos", DpathExtractor::default())
        .with_transformation(RecordTransformation::add_field(
            ["org"],
            "{{ stream_partition.org }}",
        ));
    let slice = StreamSlice::from_partition(obj(json!({"org": "acme"})));

    let records = selector
        .select_records(
            &response(&json!([{"id": 1}])),
            &StreamState::new(),
            &JsonValue::Null,
            &slice,
            None,
        )
        .unwrap();
    assert_eq!(records[0].get("org"), Some(&json!("acme")));
}

#[test]
fn test_selector_rejects_non_object_records() {
    let selector = DefaultRecordSelector::new("ids", DpathExtractor::new(["ids"]));
    let err = selector
        .select_records(
            &response(&json!({"ids": [1, 2]})),
            &StreamState::new(),
            &JsonValue::Null,
            &StreamSlice::empty(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_selector_malformed_body_is_fatal() {
    let selector = DefaultRecordSelector::new("users", DpathExtractor::default());
    let broken = HttpResponse::new(200, HeaderMap::new(), "{oops", "https://api.example.com");
    let err = selector
        .select_records(
            &broken,
            &StreamState::new(),
            &JsonValue::Null,
            &StreamSlice::empty(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_selector_jsonl_decoder() {
    let selector = DefaultRecordSelector::new("events", DpathExtractor::default())
        .with_decoder(Box::new(JsonlDecoder));
    let body = HttpResponse::new(
        200,
        HeaderMap::new(),
        "{\"id\": 1}\n{\"id\": 2}\n",
        "https://api.example.com",
    );
    let records = selector
        .select_records(
            &body,
            &StreamState::new(),
            &JsonValue::Null,
            &StreamSlice::empty(),
            None,
        )
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_schema_normalization() {
    let schema = json!({"properties": {
        "count": {"type": "integer"},
        "ratio": {"type": ["null", "number"]},
        "flag": {"type": "boolean"},
        "code": {"type": "string"},
        "name": {"type": "string"}
    }});
    let selector = DefaultRecordSelector::new("stats", DpathExtractor::default())
        .with_schema_normalization(SchemaNormalization::Default);

    let records = selector
        .select_records(
            &response(&json!([{
                "count": "12",
                "ratio": "0.5",
                "flag": "true",
                "code": 404,
                "name": "plain",
                "extra": "7"
            }])),
            &StreamState::new(),
            &schema,
            &StreamSlice::empty(),
            None,
        )
        .unwrap();

    assert_eq!(
        JsonValue::Object(records[0].data().clone()),
        json!({"count": 12, "ratio": 0.5, "flag": true, "code": "404", "name": "plain", "extra": "7"})
    );
}
