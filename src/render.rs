//! Plain-text views of the dashboard snapshot.
//!
//! Every renderer accepts a partially populated snapshot; sections whose
//! data has not arrived yet render a placeholder line.

use chrono::{DateTime, Local};

use crate::snapshot::Snapshot;
use crate::types::{Account, BusyProbability};

pub fn activity_line(snapshot: &Snapshot, now: DateTime<Local>) -> String {
    match &snapshot.activity {
        Some(activity) => activity.status_line(now),
        None => "Store activity: loading...".to_string(),
    }
}

/// One row per day, Sunday first: label, busy probability, hourly intensity.
pub fn busy_hours_table(probability: &BusyProbability) -> Vec<String> {
    probability
        .days()
        .iter()
        .map(|(label, day)| {
            let hours: Vec<String> = day
                .sorted_hours()
                .iter()
                .map(|&(hour, value)| format!("{} {:.2}", hour, value.clamp(0.0, 1.0)))
                .collect();
            format!(
                "{:<4}{:>4.0}%  {}",
                label,
                day.probability * 100.0,
                hours.join(", ")
            )
        })
        .collect()
}

pub fn live_cart_line(account: &Account) -> String {
    let status = if account.recently_ordered {
        "Completed"
    } else {
        "Pending"
    };
    format!("{} <{}> {}", account.name, account.email, status)
}

pub fn render_snapshot(snapshot: &Snapshot, now: DateTime<Local>) -> String {
    let mut lines = vec![activity_line(snapshot, now), String::new()];

    lines.push("Activity via Day & Hour".to_string());
    match &snapshot.probability {
        Some(probability) => lines.extend(busy_hours_table(probability)),
        None => lines.push("  loading...".to_string()),
    }

    lines.push(String::new());
    lines.push(format!("Live Carts ({})", snapshot.accounts.len()));
    if snapshot.accounts.is_empty() {
        lines.push("  none".to_string());
    }
    lines.extend(
        snapshot
            .accounts
            .iter()
            .map(|account| format!("  {}", live_cart_line(account))),
    );

    lines.join("\n")
}

/// Full view when the snapshot changed since `last_revision`, otherwise only
/// the activity line, whose clock moves on its own.
pub fn render_frame(snapshot: &Snapshot, last_revision: Option<u64>, now: DateTime<Local>) -> String {
    if last_revision == Some(snapshot.revision) {
        activity_line(snapshot, now)
    } else {
        render_snapshot(snapshot, now)
    }
}
