// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Month, UtcOffset};

use crate::dates;
use crate::model::{Asset, AssetStatus};

pub const TOP_NAMES: usize = 10;

const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub month: Month,
    pub count: usize,
    /// Running average: sum of counts through this month over months elapsed.
    pub trend: f64,
}

impl MonthBucket {
    pub fn label(&self) -> &'static str {
        month_label(self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedName {
    pub rank: usize,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionRange {
    Week,
    Month,
    Quarter,
    Year,
}

impl CompletionRange {
    pub const ALL: [Self; 4] = [Self::Week, Self::Month, Self::Quarter, Self::Year];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Week => "this week",
            Self::Month => "this month",
            Self::Quarter => "this quarter",
            Self::Year => "this year",
        }
    }

    /// First day of the window containing `today`. Weeks start on Monday.
    pub fn start(self, today: Date) -> Date {
        match self {
            Self::Week => dates::add_days(
                today,
                -i64::from(today.weekday().number_days_from_monday()),
            ),
            Self::Month => dates::first_of_month(today),
            Self::Quarter => {
                let month_index = u8::from(today.month()) - 1;
                let quarter_month = Month::January.nth_next(month_index / 3 * 3);
                Date::from_calendar_date(today.year(), quarter_month, 1).unwrap_or(today)
            }
            Self::Year => Date::from_calendar_date(today.year(), Month::January, 1).unwrap_or(today),
        }
    }

    /// Last day of the window containing `today`.
    pub fn end(self, today: Date) -> Date {
        let start = self.start(today);
        let next = match self {
            Self::Week => return dates::add_days(start, 6),
            Self::Month => dates::add_months(start, 1),
            Self::Quarter => dates::add_months(start, 3),
            Self::Year => dates::add_months(start, 12),
        };
        dates::add_days(next, -1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionWindow {
    pub range: CompletionRange,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub year: i32,
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub monthly: Vec<MonthBucket>,
    pub top_names: Vec<RankedName>,
    pub completion_windows: Vec<CompletionWindow>,
}

impl StatsSnapshot {
    /// `all` is every asset; `created_in_year` is the subset created during
    /// `year`, fetched separately. Stored timestamps are bucketed on the
    /// calendar of `offset`.
    pub fn build(
        all: &[Asset],
        created_in_year: &[Asset],
        year: i32,
        today: Date,
        offset: UtcOffset,
    ) -> Self {
        let (pending, completed) = status_counts(all);
        Self {
            year,
            total: all.len(),
            pending,
            completed,
            monthly: monthly_series(created_in_year, year, offset),
            top_names: top_names(all, TOP_NAMES),
            completion_windows: completion_windows(all, today, offset),
        }
    }

    /// Pending and completed counts, in that order.
    pub fn status_distribution(&self) -> [(AssetStatus, usize); 2] {
        [
            (AssetStatus::Pending, self.pending),
            (AssetStatus::Completed, self.completed),
        ]
    }
}

pub fn status_counts(rows: &[Asset]) -> (usize, usize) {
    rows.iter()
        .fold((0, 0), |(pending, completed), asset| match asset.status {
            AssetStatus::Pending => (pending + 1, completed),
            AssetStatus::Completed => (pending, completed + 1),
        })
}

/// Name frequency, most common first. Equal counts keep first-encounter order.
pub fn top_names(rows: &[Asset], limit: usize) -> Vec<RankedName> {
    let mut positions = HashMap::<&str, usize>::new();
    let mut counts = Vec::<(&str, usize)>::new();
    for asset in rows {
        match positions.get(asset.name.as_str()) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(asset.name.as_str(), counts.len());
                counts.push((asset.name.as_str(), 1));
            }
        }
    }
    counts.sort_by(|left, right| right.1.cmp(&left.1));
    counts
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (name, count))| RankedName {
            rank: index + 1,
            name: name.to_owned(),
            count,
        })
        .collect()
}

/// Twelve buckets for `year`, zero-filled. Rows created in other years are
/// ignored.
pub fn monthly_series(rows: &[Asset], year: i32, offset: UtcOffset) -> Vec<MonthBucket> {
    let mut counts = [0usize; 12];
    for asset in rows {
        let created = asset.created_at.to_offset(offset);
        if created.year() == year {
            counts[usize::from(u8::from(created.month())) - 1] += 1;
        }
    }

    let mut cumulative = 0usize;
    MONTHS
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(index, (month, count))| {
            cumulative += count;
            MonthBucket {
                month: *month,
                count,
                trend: cumulative as f64 / (index + 1) as f64,
            }
        })
        .collect()
}

/// Completions whose local date falls inside the week, month, quarter and
/// year containing `today`.
pub fn completion_windows(rows: &[Asset], today: Date, offset: UtcOffset) -> Vec<CompletionWindow> {
    CompletionRange::ALL
        .iter()
        .map(|range| {
            let window = range.start(today)..=range.end(today);
            let count = rows
                .iter()
                .filter(|asset| asset.status == AssetStatus::Completed)
                .filter_map(|asset| asset.completion_date)
                .filter(|at| window.contains(&at.to_offset(offset).date()))
                .count();
            CompletionWindow {
                range: *range,
                count,
            }
        })
        .collect()
}

pub const fn month_label(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}
