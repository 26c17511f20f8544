//! Text rendering of the snapshot log artifacts.
//!
//! The literal markers (`Markets by sport:`, `Entry N: Sport ..`,
//! `Markets (N): ..`, `Odds payload:`) are read back by [`super::parser`].

use serde_json::Value;

use crate::odds_api::types::format_iso;

use super::types::{
    MarketSnapshotResult, PlayerNamesSnapshotResult, SportNamesSnapshotResult,
    TeamNamesSnapshotResult,
};

fn heading(key: &str, title: Option<&str>) -> String {
    match title {
        Some(title) => format!("{} ({})", key, title),
        None => key.to_string(),
    }
}

fn push_warnings(lines: &mut Vec<String>, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }

    lines.push("Warnings:".to_string());
    for (index, warning) in warnings.iter().enumerate() {
        lines.push(format!("  {}. {}", index + 1, warning));
    }
}

fn list_or_none(items: &[String], separator: &str) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(separator)
    }
}

/// Pretty-print a payload with every line indented by `indent` spaces.
pub fn indent_json(value: &Value, indent: usize) -> Result<String, serde_json::Error> {
    let pad = " ".repeat(indent);
    let pretty = serde_json::to_string_pretty(value)?;

    Ok(pretty
        .lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Render `LatestSnapshotMarket.log`.
pub fn format_market_snapshot_log(snapshot: &MarketSnapshotResult) -> Result<String, serde_json::Error> {
    let mut lines = vec![
        format!("Market snapshot captured at {}", format_iso(snapshot.captured_at)),
        snapshot.options.summary_line(),
        format!("Sports checked: {}", snapshot.sports_checked),
        format!("Events captured: {}", snapshot.events_captured),
    ];
    push_warnings(&mut lines, &snapshot.warnings);

    if !snapshot.markets_by_sport.is_empty() {
        lines.push(String::new());
        lines.push("Markets by sport:".to_string());

        for summary in &snapshot.markets_by_sport {
            lines.push(format!("- {}", heading(&summary.sport_key, summary.sport_title.as_deref())));
            lines.push(format!(
                "  Markets ({}): {}",
                summary.market_keys.len(),
                list_or_none(&summary.market_keys, ", ")
            ));
        }
    }

    for (index, entry) in snapshot.entries.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!(
            "Entry {}: Sport {}",
            index + 1,
            heading(&entry.sport_key, entry.sport_title.as_deref())
        ));
        lines.push(format!(
            "  Event {} :: {} @ {}",
            entry.event_id,
            entry.teams.join(" vs "),
            format_iso(entry.start_time)
        ));
        lines.push(format!(
            "  Markets ({}): {}",
            entry.market_keys.len(),
            list_or_none(&entry.market_keys, ", ")
        ));
        lines.push(format!("  Odds fetched at {}", format_iso(entry.odds_fetched_at)));
        lines.push("  Odds payload:".to_string());
        lines.push(indent_json(&entry.odds, 4)?);
    }

    Ok(lines.join("\n"))
}

/// Render `LatestSnapshotSportNames.log`.
pub fn format_sport_names_log(snapshot: &SportNamesSnapshotResult) -> String {
    let mut lines = vec![
        format!("Sport names snapshot captured at {}", format_iso(snapshot.captured_at)),
        snapshot.options.summary_line(),
        format!("Sports checked: {}", snapshot.sports_checked),
    ];
    push_warnings(&mut lines, &snapshot.warnings);

    if !snapshot.sport_names.is_empty() {
        lines.push(String::new());
        lines.push("Sport names:".to_string());

        for sport in &snapshot.sport_names {
            lines.push(format!("- {}", heading(&sport.sport_key, sport.sport_title.as_deref())));
            lines.push(format!("  Group: {}", sport.group));
            if let Some(description) = sport.description.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("  Description: {}", description));
            }
            lines.push(format!("  Has outrights: {}", sport.has_outrights.unwrap_or(false)));
        }
    }

    lines.join("\n")
}

/// Render `LatestSnapshotTeamNames.log`.
pub fn format_team_names_log(snapshot: &TeamNamesSnapshotResult) -> String {
    let mut lines = vec![
        format!("Team names snapshot captured at {}", format_iso(snapshot.captured_at)),
        snapshot.options.summary_line(),
        format!("Sports checked: {}", snapshot.sports_checked),
        format!("Events captured: {}", snapshot.events_captured),
    ];
    push_warnings(&mut lines, &snapshot.warnings);

    if !snapshot.teams_by_sport.is_empty() {
        lines.push(String::new());
        lines.push("Teams by sport:".to_string());

        for entry in &snapshot.teams_by_sport {
            lines.push(format!("- {}", heading(&entry.sport_key, entry.sport_title.as_deref())));
            lines.push(format!("  Events checked: {}", entry.events_checked));
            lines.push(format!(
                "  Teams ({}): {}",
                entry.teams.len(),
                list_or_none(&entry.teams, ", ")
            ));
        }
    }

    lines.join("\n")
}

/// Render `LatestSnapshotPlayerNames.log`.
pub fn format_player_names_log(snapshot: &PlayerNamesSnapshotResult) -> String {
    let mut lines = vec![
        format!("Player names snapshot captured at {}", format_iso(snapshot.captured_at)),
        snapshot.options.summary_line(),
        format!("Sports checked: {}", snapshot.sports_checked),
        format!("Events captured: {}", snapshot.events_captured),
        format!("Markets captured: {}", snapshot.markets_captured),
    ];
    push_warnings(&mut lines, &snapshot.warnings);

    if !snapshot.player_names_by_sport.is_empty() {
        lines.push(String::new());
        lines.push("Player-like outcome names by sport:".to_string());

        for entry in &snapshot.player_names_by_sport {
            lines.push(format!("- {}", heading(&entry.sport_key, entry.sport_title.as_deref())));
            lines.push(format!("  Events checked: {}", entry.events_checked));
            lines.push(format!("  Markets checked: {}", entry.markets_checked));
            lines.push(format!(
                "  Outcome names ({}): {}",
                entry.player_names.len(),
                list_or_none(&entry.player_names, ", ")
            ));
        }
    }

    lines.join("\n")
}
