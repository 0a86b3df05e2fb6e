//! Backend payloads and the domain types decoded from them.
//!
//! `/activity` and `/accounts` use snake_case keys; `/probability` is keyed
//! by capitalised weekday names.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Wire format of `last_active`, interpreted in local time.
pub const ACTIVITY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw `/activity` payload. Missing fields fall back to empty/false.
#[derive(Debug, Clone, Default, Deserialize)]
struct ActivityPayload {
    #[serde(default)]
    last_active: String,
    #[serde(default)]
    elapsed_idle: String,
    #[serde(default)]
    active_idle: String,
    #[serde(default)]
    is_active: bool,
}

/// Current store activity. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityState {
    pub last_active_at: DateTime<Local>,
    pub is_active: bool,
    /// Server-formatted idle durations, passed through for display.
    pub elapsed_idle: String,
    pub active_idle: String,
}

impl ActivityState {
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let payload: ActivityPayload = serde_json::from_slice(bytes)?;
        let last_active_at = parse_activity_timestamp(&payload.last_active)?;

        Ok(Self {
            last_active_at,
            is_active: payload.is_active,
            elapsed_idle: payload.elapsed_idle,
            active_idle: payload.active_idle,
        })
    }

    /// Time since `last_active_at`, never negative.
    pub fn elapsed(&self, now: DateTime<Local>) -> Duration {
        let elapsed = now.signed_duration_since(self.last_active_at);
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    pub fn status_line(&self, now: DateTime<Local>) -> String {
        let label = if self.is_active { "Active" } else { "Inactive" };
        format!(
            "Store is {} for {}",
            label,
            format_elapsed(self.elapsed(now))
        )
    }
}

fn parse_activity_timestamp(raw: &str) -> Result<DateTime<Local>, FetchError> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), ACTIVITY_TIMESTAMP_FORMAT)
        .map_err(|e| FetchError::Decode(format!("invalid last_active '{}': {}", raw, e)))?;

    // DST gaps have no local representation; folds resolve to the earlier instant.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| FetchError::Decode(format!("nonexistent local time '{}'", raw)))
}

/// Render a duration as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Busy probability for one weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayProbability {
    pub probability: f64,
    pub busy_hours: HashMap<String, f64>,
}

impl DayProbability {
    /// Hours in clock order ("1 am" .. "11 pm"); unrecognised labels last.
    pub fn sorted_hours(&self) -> Vec<(&str, f64)> {
        let mut hours: Vec<(&str, f64)> = self
            .busy_hours
            .iter()
            .map(|(label, value)| (label.as_str(), *value))
            .collect();
        hours.sort_by(|(a, _), (b, _)| {
            let key_a = hour_of_day(a).unwrap_or(u32::MAX);
            let key_b = hour_of_day(b).unwrap_or(u32::MAX);
            key_a.cmp(&key_b).then_with(|| a.cmp(b))
        });
        hours
    }
}

/// Parse labels like "1 am" or "12 pm" into a 0-23 hour.
fn hour_of_day(label: &str) -> Option<u32> {
    let mut parts = label.split_whitespace();
    let hour: u32 = parts.next()?.parse().ok()?;
    let meridiem = parts.next()?.to_ascii_lowercase();
    if parts.next().is_some() || !(1..=12).contains(&hour) {
        return None;
    }
    match meridiem.as_str() {
        "am" => Some(hour % 12),
        "pm" => Some(hour % 12 + 12),
        _ => None,
    }
}

/// Weekly busy-hours table from `/probability`. Every weekday is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyProbability {
    #[serde(rename = "Monday")]
    pub monday: DayProbability,
    #[serde(rename = "Tuesday")]
    pub tuesday: DayProbability,
    #[serde(rename = "Wednesday")]
    pub wednesday: DayProbability,
    #[serde(rename = "Thursday")]
    pub thursday: DayProbability,
    #[serde(rename = "Friday")]
    pub friday: DayProbability,
    #[serde(rename = "Saturday")]
    pub saturday: DayProbability,
    #[serde(rename = "Sunday")]
    pub sunday: DayProbability,
}

impl BusyProbability {
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Days in chart order, Sunday first, with short labels.
    pub fn days(&self) -> [(&'static str, &DayProbability); 7] {
        [
            ("Sun", &self.sunday),
            ("Mon", &self.monday),
            ("Tue", &self.tuesday),
            ("Wed", &self.wednesday),
            ("Thu", &self.thursday),
            ("Fri", &self.friday),
            ("Sat", &self.saturday),
        ]
    }
}

/// A customer account with a live cart. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub recently_ordered: bool,
}

impl Account {
    pub fn decode_list(bytes: &[u8]) -> Result<Vec<Self>, FetchError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
