//! Datetime cursor
//!
//! Slices a stream into date windows and tracks the latest record datetime.

use super::types::{advance, lock, CursorValue, DeclarativeCursor};
use crate::error::{Error, Result};
use crate::partition::StreamSlicer;
use crate::record::{NextPageToken, Record, SliceStream, StreamSlice, StreamState};
use crate::request_options::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::template::{self, TemplateContext};
use crate::types::{value_to_string, JsonObject, JsonValue};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{LazyLock, Mutex};
use tracing::warn;

/// Default format for datetimes in slices and state
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

// ============================================================================
// Durations
// ============================================================================

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,](\d+))?S)?)?$",
    )
    .expect("duration regex is valid")
});

static SHORT_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([wdhms])$").expect("duration regex is valid"));

/// A duration with a calendar part (months) and an exact part
///
/// Parsed from ISO-8601 (`P1D`, `PT0.000001S`, `P1M`) or the short form
/// `1d`, `2h`, `30m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDuration {
    months: u32,
    exact: Duration,
}

impl CalendarDuration {
    /// An exact duration without a calendar part
    pub fn exact(duration: Duration) -> Self {
        Self {
            months: 0,
            exact: duration,
        }
    }

    /// Parse an ISO-8601 or short-form duration
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(caps) = ISO_DURATION.captures(s) {
            if s == "P" || s.ends_with('T') {
                return Err(Error::config(format!("Invalid duration: {s}")));
            }
            let num = |i: usize| -> Result<i64> {
                caps.get(i).map_or(Ok(0), |m| {
                    m.as_str()
                        .parse()
                        .map_err(|_| Error::config(format!("Invalid duration: {s}")))
                })
            };
            let nanos = caps.get(8).map_or(0, |m| {
                let digits: String = m
                    .as_str()
                    .chars()
                    .chain(std::iter::repeat('0'))
                    .take(9)
                    .collect();
                digits.parse::<i64>().unwrap_or(0)
            });

            let months = num(1)? * 12 + num(2)?;
            let exact = Duration::weeks(num(3)?)
                + Duration::days(num(4)?)
                + Duration::hours(num(5)?)
                + Duration::minutes(num(6)?)
                + Duration::seconds(num(7)?)
                + Duration::nanoseconds(nanos);

            return Ok(Self {
                months: u32::try_from(months)
                    .map_err(|_| Error::config(format!("Duration too large: {s}")))?,
                exact,
            });
        }

        if let Some(caps) = SHORT_DURATION.captures(s) {
            let num: i64 = caps[1]
                .parse()
                .map_err(|_| Error::config(format!("Invalid duration number: {s}")))?;
            let exact = match &caps[2] {
                "w" => Duration::weeks(num),
                "d" => Duration::days(num),
                "h" => Duration::hours(num),
                "m" => Duration::minutes(num),
                _ => Duration::seconds(num),
            };
            return Ok(Self::exact(exact));
        }

        Err(Error::config(format!("Invalid duration: {s}")))
    }

    /// Whether the duration is zero
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.exact.is_zero()
    }

    /// `dt + self`, `None` on overflow
    pub fn add_to(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        dt.checked_add_months(Months::new(self.months))?
            .checked_add_signed(self.exact)
    }

    /// `dt - self`, `None` on overflow
    pub fn sub_from(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        dt.checked_sub_months(Months::new(self.months))?
            .checked_sub_signed(self.exact)
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Translate `%f` (microseconds) to chrono's fixed six-digit form
fn chrono_format(format: &str) -> String {
    format.replace("%f", "%6f")
}

/// Format a datetime; supports `%s` (epoch seconds) and `%ms` (epoch millis)
pub fn format_datetime(dt: DateTime<Utc>, format: &str) -> String {
    match format {
        "%s" => dt.timestamp().to_string(),
        "%ms" => dt.timestamp_millis().to_string(),
        _ => dt.format(&chrono_format(format)).to_string(),
    }
}

/// Parse a datetime with one format
///
/// Formats without an offset are read as UTC; date-only formats as midnight.
pub fn parse_datetime(value: &str, format: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    let invalid = || Error::datetime(value, format!("does not match format '{format}'"));

    match format {
        "%s" => {
            let secs: i64 = value.parse().map_err(|_| invalid())?;
            DateTime::from_timestamp(secs, 0).ok_or_else(invalid)
        }
        "%ms" => {
            let millis: i64 = value.parse().map_err(|_| invalid())?;
            DateTime::from_timestamp_millis(millis).ok_or_else(invalid)
        }
        _ => {
            let fmt = chrono_format(format);
            if let Ok(dt) = DateTime::parse_from_str(value, &fmt) {
                return Ok(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(value, &fmt) {
                return Ok(ndt.and_utc());
            }
            if let Ok(nd) = NaiveDate::parse_from_str(value, &fmt) {
                return Ok(nd.and_time(NaiveTime::MIN).and_utc());
            }
            Err(invalid())
        }
    }
}

/// Parse a datetime trying each format in order, then RFC 3339
pub fn parse_datetime_any(value: &str, formats: &[&str]) -> Result<DateTime<Utc>> {
    for format in formats {
        if let Ok(dt) = parse_datetime(value, format) {
            return Ok(dt);
        }
    }
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::datetime(value, format!("does not match any of {formats:?}")))
}

// ============================================================================
// Configuration
// ============================================================================

fn default_datetime_format() -> String {
    DEFAULT_DATETIME_FORMAT.to_string()
}

fn default_start_field() -> String {
    "start_time".to_string()
}

fn default_end_field() -> String {
    "end_time".to_string()
}

/// Declarative definition of a datetime cursor
///
/// `start_datetime` and `end_datetime` may be templates over `config`.
/// `end_datetime` of `now` (or absent) means the time slices are computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatetimeCursorConfig {
    /// Record field holding the cursor datetime
    pub cursor_field: String,
    /// Format of datetimes in slices, requests and state
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,
    /// Formats record cursor values may use (defaults to `datetime_format`)
    #[serde(default)]
    pub cursor_datetime_formats: Vec<String>,
    /// Earliest datetime to sync
    pub start_datetime: String,
    /// Latest datetime to sync
    #[serde(default)]
    pub end_datetime: Option<String>,
    /// Window size
    #[serde(default)]
    pub step: Option<String>,
    /// Smallest cursor increment; window ends are `start + step - granularity`
    #[serde(default)]
    pub cursor_granularity: Option<String>,
    /// How far before the state cursor to re-read
    #[serde(default)]
    pub lookback_window: Option<String>,
    /// Injection of the window start
    #[serde(default)]
    pub start_time_option: Option<RequestOption>,
    /// Injection of the window end
    #[serde(default)]
    pub end_time_option: Option<RequestOption>,
    /// Slice key of the window start
    #[serde(default = "default_start_field")]
    pub partition_field_start: String,
    /// Slice key of the window end
    #[serde(default = "default_end_field")]
    pub partition_field_end: String,
}

// ============================================================================
// Datetime Based Cursor
// ============================================================================

/// Cursor over a datetime field, slicing by date windows
#[derive(Debug)]
pub struct DatetimeBasedCursor {
    cursor_field: String,
    datetime_format: String,
    cursor_datetime_formats: Vec<String>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    window: Option<(CalendarDuration, CalendarDuration)>,
    lookback: Option<CalendarDuration>,
    start_time_option: Option<RequestOption>,
    end_time_option: Option<RequestOption>,
    partition_field_start: String,
    partition_field_end: String,
    state: Mutex<Option<CursorValue>>,
}

impl DatetimeBasedCursor {
    /// Create a cursor syncing from `start` to now in a single window
    pub fn new(cursor_field: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            datetime_format: default_datetime_format(),
            cursor_datetime_formats: Vec::new(),
            start,
            end: None,
            window: None,
            lookback: None,
            start_time_option: None,
            end_time_option: None,
            partition_field_start: default_start_field(),
            partition_field_end: default_end_field(),
            state: Mutex::new(None),
        }
    }

    /// Build a cursor from its declarative definition
    pub fn from_config(definition: &DatetimeCursorConfig, config: &JsonValue) -> Result<Self> {
        let ctx = TemplateContext::with_config(config.clone());
        let render = |s: &str| template::render(s, &ctx);

        let mut formats: Vec<&str> = definition
            .cursor_datetime_formats
            .iter()
            .map(String::as_str)
            .collect();
        formats.push(&definition.datetime_format);

        let start = parse_datetime_any(&render(&definition.start_datetime)?, &formats)?;
        let end = match definition.end_datetime.as_deref().map(str::trim) {
            None | Some("now" | "{{ now }}") => None,
            Some(end) => Some(parse_datetime_any(&render(end)?, &formats)?),
        };

        let window = match (&definition.step, &definition.cursor_granularity) {
            (Some(step), Some(granularity)) => Some((
                CalendarDuration::parse(step)?,
                CalendarDuration::parse(granularity)?,
            )),
            (None, None) => None,
            _ => {
                return Err(Error::config(
                    "step and cursor_granularity must be set together",
                ))
            }
        };
        if let Some((step, _)) = &window {
            if step.is_zero() {
                return Err(Error::config("step must not be zero"));
            }
        }

        let mut cursor = Self::new(&definition.cursor_field, start)
            .with_datetime_format(&definition.datetime_format)
            .with_cursor_datetime_formats(definition.cursor_datetime_formats.clone())
            .with_partition_fields(
                &definition.partition_field_start,
                &definition.partition_field_end,
            );
        cursor.end = end;
        cursor.window = window;
        cursor.lookback = definition
            .lookback_window
            .as_deref()
            .map(CalendarDuration::parse)
            .transpose()?;
        cursor.start_time_option = definition.start_time_option.clone();
        cursor.end_time_option = definition.end_time_option.clone();
        Ok(cursor)
    }

    /// Fix the end of the sync range
    #[must_use]
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Slice into windows of `step`, each ending `granularity` before the next
    #[must_use]
    pub fn with_step(mut self, step: CalendarDuration, granularity: CalendarDuration) -> Self {
        self.window = Some((step, granularity));
        self
    }

    /// Re-read this far before the stored cursor
    #[must_use]
    pub fn with_lookback(mut self, lookback: CalendarDuration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    /// Set the slice and state format
    #[must_use]
    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }

    /// Set the formats record values may use
    #[must_use]
    pub fn with_cursor_datetime_formats(mut self, formats: Vec<String>) -> Self {
        self.cursor_datetime_formats = formats;
        self
    }

    /// Inject the window start into requests
    #[must_use]
    pub fn with_start_time_option(mut self, option: RequestOption) -> Self {
        self.start_time_option = Some(option);
        self
    }

    /// Inject the window end into requests
    #[must_use]
    pub fn with_end_time_option(mut self, option: RequestOption) -> Self {
        self.end_time_option = Some(option);
        self
    }

    /// Rename the slice keys of the window bounds
    #[must_use]
    pub fn with_partition_fields(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.partition_field_start = start.into();
        self.partition_field_end = end.into();
        self
    }

    fn parse_value(&self, value: &str) -> Result<DateTime<Utc>> {
        let mut formats: Vec<&str> = self
            .cursor_datetime_formats
            .iter()
            .map(String::as_str)
            .collect();
        formats.push(&self.datetime_format);
        parse_datetime_any(value, &formats)
    }

    fn state_datetime(&self) -> Option<DateTime<Utc>> {
        match *lock(&self.state) {
            Some(CursorValue::DateTime(dt)) => Some(dt),
            _ => None,
        }
    }

    fn end_datetime(&self) -> DateTime<Utc> {
        self.end.unwrap_or_else(Utc::now)
    }

    /// Earliest datetime still to sync: `max(start, state) - lookback`
    fn earliest_datetime(&self) -> DateTime<Utc> {
        let from = match self.state_datetime() {
            Some(state) if state > self.start => state,
            _ => self.start,
        };
        self.lookback
            .and_then(|lookback| lookback.sub_from(from))
            .unwrap_or(from)
    }

    /// Date windows to read, in order
    pub fn windows(&self) -> DatetimeWindows {
        let end = self.end_datetime();
        DatetimeWindows {
            next_start: Some(self.earliest_datetime().min(end)),
            end,
            window: self.window,
        }
    }

    fn window_slice(&self, (start, end): (DateTime<Utc>, DateTime<Utc>)) -> StreamSlice {
        let mut cursor_slice = JsonObject::new();
        cursor_slice.insert(
            self.partition_field_start.clone(),
            JsonValue::String(format_datetime(start, &self.datetime_format)),
        );
        cursor_slice.insert(
            self.partition_field_end.clone(),
            JsonValue::String(format_datetime(end, &self.datetime_format)),
        );
        StreamSlice::from_cursor(cursor_slice)
    }
}

/// Iterator over `[start, end]` date windows
#[derive(Debug, Clone)]
pub struct DatetimeWindows {
    next_start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    window: Option<(CalendarDuration, CalendarDuration)>,
}

impl Iterator for DatetimeWindows {
    type Item = (DateTime<Utc>, DateTime<Utc>);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.take()?;
        if start > self.end {
            return None;
        }

        let Some((step, granularity)) = self.window else {
            return Some((start, self.end));
        };

        let next_start = step.add_to(start);
        let window_end = next_start
            .and_then(|next| granularity.sub_from(next))
            .map_or(self.end, |end| end.min(self.end));
        self.next_start = next_start;
        Some((start, window_end))
    }
}

impl RequestOptionsProvider for DatetimeBasedCursor {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        _next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        let Some(slice) = stream_slice else {
            return Ok(options);
        };

        for (option, field) in [
            (&self.start_time_option, &self.partition_field_start),
            (&self.end_time_option, &self.partition_field_end),
        ] {
            if let (Some(option), Some(value)) = (option, slice.cursor_slice.get(field)) {
                option.inject(value.clone(), &mut options);
            }
        }
        Ok(options)
    }
}

impl StreamSlicer for DatetimeBasedCursor {
    fn stream_slices(&self) -> SliceStream<'_> {
        stream::iter(
            self.windows()
                .map(|window| Ok::<_, Error>(self.window_slice(window))),
        )
        .boxed()
    }
}

impl DeclarativeCursor for DatetimeBasedCursor {
    fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    fn set_initial_state(&self, stream_state: &StreamState) -> Result<()> {
        let value = match stream_state.get(&self.cursor_field) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(CursorValue::DateTime(
                self.parse_value(&value_to_string(value))?,
            )),
        };
        *lock(&self.state) = value;
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let mut state = StreamState::new();
        if let Some(dt) = self.state_datetime() {
            state.insert(
                self.cursor_field.clone(),
                JsonValue::String(format_datetime(dt, &self.datetime_format)),
            );
        }
        state
    }

    fn close_slice(
        &self,
        _stream_slice: &StreamSlice,
        most_recent_record: Option<&Record>,
    ) -> Result<()> {
        let Some(record) = most_recent_record else {
            return Ok(());
        };
        let Some(raw) = record.get_path(&self.cursor_field) else {
            warn!(cursor_field = %self.cursor_field, "Most recent record has no cursor value");
            return Ok(());
        };
        let value = self.parse_value(&value_to_string(raw))?;
        advance(&self.state, CursorValue::DateTime(value));
        Ok(())
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        let Some(raw) = record.get_path(&self.cursor_field) else {
            warn!(
                cursor_field = %self.cursor_field,
                "Record has no cursor value, assuming it needs to be synced"
            );
            return true;
        };
        match self.parse_value(&value_to_string(raw)) {
            Ok(value) => value >= self.earliest_datetime() && value <= self.end_datetime(),
            Err(e) => {
                warn!(error = %e, "Unparseable cursor value, assuming it needs to be synced");
                true
            }
        }
    }

    fn record_cursor_value(&self, record: &Record) -> Option<CursorValue> {
        let raw = record.get_path(&self.cursor_field)?;
        self.parse_value(&value_to_string(raw))
            .ok()
            .map(CursorValue::DateTime)
    }
}
