// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn today() -> Date {
    now().date()
}

pub fn parse_date(input: &str) -> Result<Date> {
    let trimmed = input.trim();
    Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
        .map_err(|_| anyhow!("invalid date {trimmed:?} -- use {DATE_LAYOUT}"))
}

pub fn format_date(value: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        value.year(),
        u8::from(value.month()),
        value.day()
    )
}

/// Store timestamps are RFC 3339; Postgres also emits `2025-03-01T10:00:00.123+00:00`
/// and occasionally a space instead of `T`.
pub fn parse_timestamp(input: &str) -> Result<OffsetDateTime> {
    let trimmed = input.trim();
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(value);
    }
    let normalized = trimmed.replacen(' ', "T", 1);
    OffsetDateTime::parse(&normalized, &Rfc3339)
        .with_context(|| format!("parse timestamp {trimmed:?}"))
}

pub fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).context("format timestamp")
}

/// `yyyy/MM/dd HH:mm:ss`, used for the header clock and completion column.
pub fn format_clock(value: OffsetDateTime) -> String {
    format!(
        "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
        value.year(),
        u8::from(value.month()),
        value.day(),
        value.hour(),
        value.minute(),
        value.second()
    )
}

pub fn add_days(date: Date, days: i64) -> Date {
    date.saturating_add(Duration::days(days))
}

/// Calendar-month arithmetic. The day clamps to the last day of the target
/// month, so Jan 31 + 1 month is Feb 28 (or 29).
pub fn add_months(date: Date, months: i32) -> Date {
    let base = i32::from(u8::from(date.month())) - 1 + months;
    let year = date.year() + base.div_euclid(12);
    let month = Month::January.nth_next(base.rem_euclid(12) as u8);
    let day = date.day().min(last_day_of_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

fn last_day_of_month(year: i32, month: Month) -> u8 {
    let (next_year, next_month) = if month == Month::December {
        (year + 1, Month::January)
    } else {
        (year, month.next())
    };
    Date::from_calendar_date(next_year, next_month, 1)
        .ok()
        .and_then(Date::previous_day)
        .map_or(28, |last| last.day())
}

pub fn first_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}
