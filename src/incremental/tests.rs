//! Tests for incremental module

use super::*;
use crate::error::Error;
use crate::partition::{ListPartitionRouter, StreamSlicer};
use crate::record::{Record, StreamSlice, StreamState};
use crate::request_options::{RequestBody, RequestOption, RequestOptionsProvider};
use crate::types::{JsonObject, JsonValue};
use chrono::{Duration, TimeZone, Utc};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;

const MICRO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%f%z";

fn obj(value: JsonValue) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn record(data: JsonValue) -> Record {
    Record::new(obj(data), "test_stream", None)
}

fn cursor(definition: JsonValue) -> DatetimeBasedCursor {
    let definition: DatetimeCursorConfig = serde_json::from_value(definition).unwrap();
    DatetimeBasedCursor::from_config(&definition, &json!({})).unwrap()
}

fn daily_cursor(extra: JsonValue) -> DatetimeBasedCursor {
    let mut definition = json!({
        "cursor_field": "created_at",
        "datetime_format": MICRO_FORMAT,
        "start_datetime": "2021-01-01T00:00:00.000000+0000",
        "end_datetime": "2021-01-10T00:00:00.000000+0000",
        "step": "P1D",
        "cursor_granularity": "PT0.000001S"
    });
    for (key, value) in obj(extra) {
        definition[key] = value;
    }
    cursor(definition)
}

async fn cursor_slices(slicer: &dyn DeclarativeCursor) -> Vec<JsonValue> {
    slicer
        .stream_slices()
        .map(|slice| slice.unwrap().to_value())
        .collect()
        .await
}

fn window(start: &str, end: &str) -> JsonValue {
    json!({"start_time": start, "end_time": end})
}

// ============================================================================
// Duration Tests
// ============================================================================

#[test_case("P1D", Duration::days(1) ; "one day")]
#[test_case("P1W", Duration::weeks(1) ; "one week")]
#[test_case("PT1H30M", Duration::minutes(90) ; "hours and minutes")]
#[test_case("PT0.000001S", Duration::microseconds(1) ; "one microsecond")]
#[test_case("P1DT12H", Duration::hours(36) ; "day and hours")]
#[test_case("2h", Duration::hours(2) ; "short form hours")]
#[test_case("30m", Duration::minutes(30) ; "short form minutes")]
fn test_parse_exact_duration(input: &str, expected: Duration) {
    assert_eq!(
        CalendarDuration::parse(input).unwrap(),
        CalendarDuration::exact(expected)
    );
}

#[test]
fn test_calendar_month_duration() {
    let month = CalendarDuration::parse("P1M").unwrap();
    let jan_31 = Utc.with_ymd_and_hms(2021, 1, 31, 0, 0, 0).unwrap();
    assert_eq!(
        month.add_to(jan_31),
        Some(Utc.with_ymd_and_hms(2021, 2, 28, 0, 0, 0).unwrap())
    );

    let year = CalendarDuration::parse("P1Y").unwrap();
    assert_eq!(
        year.sub_from(jan_31),
        Some(Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap())
    );
}

#[test_case("P" ; "bare designator")]
#[test_case("PT" ; "bare time designator")]
#[test_case("one day" ; "prose")]
#[test_case("1y" ; "unknown suffix")]
fn test_parse_invalid_duration(input: &str) {
    assert!(matches!(
        CalendarDuration::parse(input),
        Err(Error::Config { .. })
    ));
}

// ============================================================================
// Format Tests
// ============================================================================

#[test]
fn test_format_and_parse_datetime() {
    let dt = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

    assert_eq!(format_datetime(dt, "%s"), "1609459200");
    assert_eq!(format_datetime(dt, "%ms"), "1609459200000");
    assert_eq!(format_datetime(dt, "%Y%m%d"), "20210101");
    assert_eq!(
        format_datetime(dt, MICRO_FORMAT),
        "2021-01-01T00:00:00.000000+0000"
    );

    assert_eq!(parse_datetime("1609459200", "%s").unwrap(), dt);
    assert_eq!(parse_datetime("1609459200000", "%ms").unwrap(), dt);
    assert_eq!(parse_datetime("20210101", "%Y%m%d").unwrap(), dt);
    assert_eq!(parse_datetime("2021-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(), dt);
    assert_eq!(
        parse_datetime("2021-01-01T02:00:00.000000+0200", MICRO_FORMAT).unwrap(),
        dt
    );
}

#[test]
fn test_parse_datetime_any_falls_back_to_rfc3339() {
    let dt = parse_datetime_any("2021-01-01T00:00:00Z", &["%Y-%m-%d"]).unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());

    let err = parse_datetime_any("yesterday", &["%Y-%m-%d"]).unwrap_err();
    assert!(matches!(err, Error::Datetime { .. }));
}

// ============================================================================
// Datetime Slicing Tests
// ============================================================================

#[tokio::test]
async fn test_daily_windows_end_one_granule_before_next_start() {
    let slices = cursor_slices(&daily_cursor(json!({}))).await;

    assert_eq!(slices.len(), 10);
    assert_eq!(
        slices[0],
        window(
            "2021-01-01T00:00:00.000000+0000",
            "2021-01-01T23:59:59.999999+0000"
        )
    );
    assert_eq!(
        slices[1],
        window(
            "2021-01-02T00:00:00.000000+0000",
            "2021-01-02T23:59:59.999999+0000"
        )
    );
    assert_eq!(
        slices[9],
        window(
            "2021-01-10T00:00:00.000000+0000",
            "2021-01-10T00:00:00.000000+0000"
        )
    );
}

#[tokio::test]
async fn test_step_beyond_end_yields_single_window() {
    let slices = cursor_slices(&daily_cursor(json!({"step": "P12D"}))).await;
    assert_eq!(
        slices,
        vec![window(
            "2021-01-01T00:00:00.000000+0000",
            "2021-01-10T00:00:00.000000+0000"
        )]
    );
}

#[tokio::test]
async fn test_start_after_end_yields_end_only() {
    let slices = cursor_slices(&daily_cursor(json!({
        "start_datetime": "2021-01-10T00:00:00.000000+0000",
        "end_datetime": "2021-01-05T00:00:00.000000+0000"
    })))
    .await;
    assert_eq!(
        slices,
        vec![window(
            "2021-01-05T00:00:00.000000+0000",
            "2021-01-05T00:00:00.000000+0000"
        )]
    );
}

#[tokio::test]
async fn test_multi_day_step() {
    let slices = cursor_slices(&daily_cursor(json!({
        "start_datetime": "2021-01-05T00:00:00.000000+0000",
        "step": "P2D"
    })))
    .await;
    assert_eq!(
        slices,
        vec![
            window(
                "2021-01-05T00:00:00.000000+0000",
                "2021-01-06T23:59:59.999999+0000"
            ),
            window(
                "2021-01-07T00:00:00.000000+0000",
                "2021-01-08T23:59:59.999999+0000"
            ),
            window(
                "2021-01-09T00:00:00.000000+0000",
                "2021-01-10T00:00:00.000000+0000"
            ),
        ]
    );
}

#[tokio::test]
async fn test_state_moves_start_forward() {
    let cursor = daily_cursor(json!({}));
    cursor
        .set_initial_state(&obj(json!({"created_at": "2021-01-05T00:00:00.000000+0000"})))
        .unwrap();

    let slices = cursor_slices(&cursor).await;
    assert_eq!(slices.len(), 6);
    assert_eq!(slices[0]["start_time"], "2021-01-05T00:00:00.000000+0000");
}

#[tokio::test]
async fn test_lookback_applies_to_state() {
    let cursor = daily_cursor(json!({"lookback_window": "P3D"}));
    cursor
        .set_initial_state(&obj(json!({"created_at": "2021-01-05T00:00:00.000000+0000"})))
        .unwrap();

    let slices = cursor_slices(&cursor).await;
    assert_eq!(slices[0]["start_time"], "2021-01-02T00:00:00.000000+0000");
}

#[tokio::test]
async fn test_lookback_applies_to_start_without_state() {
    let cursor = daily_cursor(json!({"lookback_window": "P3D"}));
    cursor
        .set_initial_state(&obj(json!({"other_field": "2021-01-05"})))
        .unwrap();

    let slices = cursor_slices(&cursor).await;
    assert_eq!(slices.len(), 13);
    assert_eq!(slices[0]["start_time"], "2020-12-29T00:00:00.000000+0000");
}

#[tokio::test]
async fn test_date_only_format_with_day_granularity() {
    let cursor = cursor(json!({
        "cursor_field": "date",
        "datetime_format": "%Y-%m-%d",
        "start_datetime": "2021-01-01",
        "end_datetime": "2021-01-03",
        "step": "P1D",
        "cursor_granularity": "P1D"
    }));

    assert_eq!(
        cursor_slices(&cursor).await,
        vec![
            window("2021-01-01", "2021-01-01"),
            window("2021-01-02", "2021-01-02"),
            window("2021-01-03", "2021-01-03"),
        ]
    );
}

#[tokio::test]
async fn test_without_step_single_window_with_custom_fields() {
    let definition: DatetimeCursorConfig = serde_json::from_value(json!({
        "cursor_field": "updated",
        "datetime_format": "%Y-%m-%d",
        "start_datetime": "{{ config.start_date }}",
        "end_datetime": "2024-03-01",
        "partition_field_start": "from",
        "partition_field_end": "to"
    }))
    .unwrap();
    let cursor =
        DatetimeBasedCursor::from_config(&definition, &json!({"start_date": "2024-01-01"}))
            .unwrap();

    assert_eq!(
        cursor_slices(&cursor).await,
        vec![json!({"from": "2024-01-01", "to": "2024-03-01"})]
    );
}

#[test_case(json!({"step": "P1D"}) ; "step only")]
#[test_case(json!({"cursor_granularity": "P1D"}) ; "granularity only")]
fn test_step_and_granularity_go_together(extra: JsonValue) {
    let mut definition = json!({
        "cursor_field": "updated",
        "datetime_format": "%Y-%m-%d",
        "start_datetime": "2024-01-01"
    });
    for (key, value) in obj(extra) {
        definition[key] = value;
    }
    let definition: DatetimeCursorConfig = serde_json::from_value(definition).unwrap();

    let err = DatetimeBasedCursor::from_config(&definition, &json!({})).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn test_end_defaults_to_now() {
    let start = Utc::now() - Duration::days(2);
    let cursor = DatetimeBasedCursor::new("updated", start)
        .with_step(
            CalendarDuration::parse("P1D").unwrap(),
            CalendarDuration::parse("PT1S").unwrap(),
        );

    let windows: Vec<_> = cursor.windows().collect();
    assert_eq!(windows.len(), 3);
    assert_eq!(windows[0].0, start);
    assert!(windows[2].1 <= Utc::now());
}

// ============================================================================
// Datetime State Tests
// ============================================================================

#[test]
fn test_close_slice_without_record_keeps_state() {
    let cursor = daily_cursor(json!({}));
    cursor
        .close_slice(&StreamSlice::empty(), None)
        .unwrap();
    assert_eq!(cursor.get_stream_state(), StreamState::new());
}

#[test]
fn test_close_slice_advances_but_never_regresses() {
    let cursor = daily_cursor(json!({}));
    let slice = StreamSlice::empty();

    cursor
        .close_slice(
            &slice,
            Some(&record(json!({"created_at": "2021-01-03T00:00:00.000000+0000"}))),
        )
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        obj(json!({"created_at": "2021-01-03T00:00:00.000000+0000"}))
    );

    cursor
        .close_slice(
            &slice,
            Some(&record(json!({"created_at": "2021-01-02T00:00:00.000000+0000"}))),
        )
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        obj(json!({"created_at": "2021-01-03T00:00:00.000000+0000"}))
    );

    cursor
        .close_slice(
            &slice,
            Some(&record(json!({"created_at": "2021-01-04T10:00:00.000000+0000"}))),
        )
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        obj(json!({"created_at": "2021-01-04T10:00:00.000000+0000"}))
    );
}

#[test]
fn test_close_slice_rejects_unparseable_cursor() {
    let cursor = daily_cursor(json!({}));
    let err = cursor
        .close_slice(
            &StreamSlice::empty(),
            Some(&record(json!({"created_at": "not a date"}))),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Datetime { .. }));
}

#[test]
fn test_cursor_datetime_formats_parse_records() {
    let cursor = daily_cursor(json!({"cursor_datetime_formats": ["%s"]}));
    cursor
        .close_slice(&StreamSlice::empty(), Some(&record(json!({"created_at": 1609632000}))))
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        obj(json!({"created_at": "2021-01-03T00:00:00.000000+0000"}))
    );
}

#[test]
fn test_should_be_synced() {
    let cursor = daily_cursor(json!({}));
    cursor
        .set_initial_state(&obj(json!({"created_at": "2021-01-05T00:00:00.000000+0000"})))
        .unwrap();

    assert!(cursor.should_be_synced(&record(json!({"created_at": "2021-01-06T00:00:00.000000+0000"}))));
    assert!(!cursor.should_be_synced(&record(json!({"created_at": "2021-01-04T00:00:00.000000+0000"}))));
    assert!(!cursor.should_be_synced(&record(json!({"created_at": "2021-02-01T00:00:00.000000+0000"}))));
    assert!(cursor.should_be_synced(&record(json!({"id": 1}))));
}

#[test]
fn test_is_greater_than_or_equal() {
    let cursor = daily_cursor(json!({}));
    let early = record(json!({"created_at": "2021-01-02T00:00:00.000000+0000"}));
    let late = record(json!({"created_at": "2021-01-03T00:00:00.000000+0000"}));
    let missing = record(json!({"id": 1}));

    assert!(cursor.is_greater_than_or_equal(&late, &early));
    assert!(!cursor.is_greater_than_or_equal(&early, &late));
    assert!(cursor.is_greater_than_or_equal(&early, &early.clone()));
    assert!(cursor.is_greater_than_or_equal(&early, &missing));
    assert!(!cursor.is_greater_than_or_equal(&missing, &early));
}

#[test_case(RequestOption::request_parameter("since"), RequestOption::request_parameter("until") ; "query parameters")]
#[test_case(RequestOption::header("since"), RequestOption::header("until") ; "headers")]
#[test_case(RequestOption::body_json("since"), RequestOption::body_json("until") ; "json body")]
#[test_case(RequestOption::body_data("since"), RequestOption::body_data("until") ; "form body")]
fn test_window_request_options(start_option: RequestOption, end_option: RequestOption) {
    let cursor = DatetimeBasedCursor::new("updated", Utc::now())
        .with_start_time_option(start_option.clone())
        .with_end_time_option(end_option);
    let slice = StreamSlice::from_cursor(obj(json!({
        "start_time": "2021-01-01",
        "end_time": "2021-01-02"
    })));

    let options = cursor.request_options(Some(&slice), None).unwrap();
    let expected = obj(json!({"since": "2021-01-01", "until": "2021-01-02"}));
    match start_option.inject_into {
        crate::request_options::RequestOptionType::RequestParameter => {
            assert_eq!(options.params, expected);
        }
        crate::request_options::RequestOptionType::Header => assert_eq!(options.headers, expected),
        crate::request_options::RequestOptionType::BodyJson => {
            assert_eq!(options.body_json, expected);
        }
        crate::request_options::RequestOptionType::BodyData => {
            assert_eq!(options.body_data, RequestBody::Form(expected));
        }
    }

    assert!(cursor.request_options(None, None).unwrap().is_empty());
}

// ============================================================================
// Incrementing Cursor Tests
// ============================================================================

#[tokio::test]
async fn test_incrementing_cursor_slices_from_state() {
    let cursor = IncrementingCountCursor::new("id")
        .with_start_value(100.0)
        .with_start_value_option(RequestOption::request_parameter("since_id"));

    assert_eq!(cursor_slices(&cursor).await, vec![json!({"start": 100})]);

    cursor.set_initial_state(&obj(json!({"id": 250}))).unwrap();
    assert_eq!(cursor_slices(&cursor).await, vec![json!({"start": 250})]);

    let slice = StreamSlice::from_cursor(obj(json!({"start": 250})));
    let options = cursor.request_options(Some(&slice), None).unwrap();
    assert_eq!(options.params, obj(json!({"since_id": 250})));
}

#[tokio::test]
async fn test_incrementing_cursor_without_bound_has_empty_slice() {
    let cursor = IncrementingCountCursor::new("id");
    assert_eq!(cursor_slices(&cursor).await, vec![json!({})]);
    assert!(cursor.should_be_synced(&record(json!({"id": 1}))));
}

#[test]
fn test_incrementing_cursor_state() {
    let cursor = IncrementingCountCursor::new("seq");
    let slice = StreamSlice::empty();

    cursor.close_slice(&slice, None).unwrap();
    assert!(cursor.get_stream_state().is_empty());

    cursor.close_slice(&slice, Some(&record(json!({"seq": 7})))).unwrap();
    cursor.close_slice(&slice, Some(&record(json!({"seq": "3"})))).unwrap();
    assert_eq!(cursor.get_stream_state(), obj(json!({"seq": 7})));

    assert!(cursor.should_be_synced(&record(json!({"seq": 7}))));
    assert!(!cursor.should_be_synced(&record(json!({"seq": 6}))));
}

#[test]
fn test_incrementing_cursor_rejects_non_numeric_state() {
    let cursor = IncrementingCountCursor::new("seq");
    let err = cursor
        .set_initial_state(&obj(json!({"seq": {"nested": true}})))
        .unwrap_err();
    assert!(matches!(err, Error::State { .. }));
}

#[test]
fn test_incrementing_cursor_from_config() {
    let definition: IncrementingCursorConfig = serde_json::from_value(json!({
        "cursor_field": "id",
        "start_value": "not a number"
    }))
    .unwrap();
    assert!(IncrementingCountCursor::from_config(&definition).is_err());
}

#[test]
fn test_cursor_value_ordering() {
    assert!(CursorValue::Number(2.0) > CursorValue::Number(1.0));
    assert!(CursorValue::Text("b".into()) > CursorValue::Text("a".into()));
    assert_eq!(
        CursorValue::Number(1.0).partial_cmp(&CursorValue::Text("1".into())),
        None
    );
    assert_eq!(CursorValue::Number(3.0).to_json(), json!(3));
    assert_eq!(CursorValue::Number(2.5).to_json(), json!(2.5));
}

// ============================================================================
// Per-Partition Cursor Tests
// ============================================================================

fn per_partition() -> PerPartitionCursor {
    let router = ListPartitionRouter::new(vec![json!("a"), json!("b")], "account")
        .with_request_option(RequestOption::request_parameter("account"));
    let factory: CursorFactory = Arc::new(|| {
        Ok(Arc::new(
            IncrementingCountCursor::new("seq")
                .with_start_value_option(RequestOption::request_parameter("since")),
        ) as Arc<dyn DeclarativeCursor>)
    });
    PerPartitionCursor::new(Arc::new(router), factory).unwrap()
}

fn partition_slice(account: &str) -> StreamSlice {
    StreamSlice::from_partition(obj(json!({"account": account})))
}

#[tokio::test]
async fn test_per_partition_slices() {
    let cursor = per_partition();
    assert_eq!(cursor.cursor_field(), "seq");

    let slices: Vec<StreamSlice> = cursor
        .stream_slices()
        .map(|s| s.unwrap())
        .collect()
        .await;
    assert_eq!(slices, vec![partition_slice("a"), partition_slice("b")]);
    assert_eq!(cursor.partition_count(), 2);
}

#[tokio::test]
async fn test_per_partition_state_round_trip() {
    let cursor = per_partition();
    let _: Vec<_> = cursor.stream_slices().collect().await;

    cursor
        .close_slice(&partition_slice("b"), Some(&record(json!({"seq": 12}))))
        .unwrap();
    cursor.close_slice(&partition_slice("a"), None).unwrap();

    let state = cursor.get_stream_state();
    assert_eq!(
        state,
        obj(json!({"states": [
            {"partition": {"account": "a"}, "cursor": {}},
            {"partition": {"account": "b"}, "cursor": {"seq": 12}}
        ]}))
    );

    let restored = per_partition();
    restored.set_initial_state(&state).unwrap();
    assert_eq!(restored.get_stream_state(), state);

    let slices: Vec<StreamSlice> = restored
        .stream_slices()
        .map(|s| s.unwrap())
        .collect()
        .await;
    assert_eq!(slices[1].cursor_slice, obj(json!({"start": 12})));
}

#[tokio::test]
async fn test_per_partition_request_options_merge_router_and_cursor() {
    let cursor = per_partition();
    cursor
        .set_initial_state(&obj(json!({"states": [
            {"partition": {"account": "a"}, "cursor": {"seq": 5}}
        ]})))
        .unwrap();

    let slices: Vec<StreamSlice> = cursor
        .stream_slices()
        .map(|s| s.unwrap())
        .collect()
        .await;
    let options = cursor.request_options(Some(&slices[0]), None).unwrap();
    assert_eq!(options.params, obj(json!({"account": "a", "since": 5})));
}

#[tokio::test]
async fn test_per_partition_global_state_applies_to_new_partitions() {
    let cursor = per_partition();
    cursor.set_initial_state(&obj(json!({"seq": 40}))).unwrap();

    let slices: Vec<StreamSlice> = cursor
        .stream_slices()
        .map(|s| s.unwrap())
        .collect()
        .await;
    assert!(slices
        .iter()
        .all(|s| s.cursor_slice == obj(json!({"start": 40}))));
}

#[test]
fn test_per_partition_rejects_malformed_state() {
    let cursor = per_partition();
    let err = cursor
        .set_initial_state(&obj(json!({"states": [{"cursor": {}}]})))
        .unwrap_err();
    assert!(matches!(err, Error::State { .. }));
}

#[test]
fn test_per_partition_should_be_synced_uses_partition_cursor() {
    let cursor = per_partition();
    cursor
        .set_initial_state(&obj(json!({"states": [
            {"partition": {"account": "a"}, "cursor": {"seq": 5}}
        ]})))
        .unwrap();

    let in_a = |seq: i64| {
        Record::new(obj(json!({"seq": seq})), "test_stream", Some(partition_slice("a")))
    };
    assert!(cursor.should_be_synced(&in_a(6)));
    assert!(!cursor.should_be_synced(&in_a(4)));

    let unknown = Record::new(obj(json!({"seq": 1})), "test_stream", Some(partition_slice("z")));
    assert!(cursor.should_be_synced(&unknown));
}
