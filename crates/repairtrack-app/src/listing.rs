// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use time::Date;

use crate::dates;
use crate::model::{Asset, AssetColumn, SortDirection};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub show_all_statuses: bool,
    pub tomorrow_only: bool,
    pub query: String,
}

impl ListFilter {
    pub fn matches(&self, asset: &Asset, today: Date) -> bool {
        if !self.show_all_statuses && asset.is_completed() {
            return false;
        }
        if self.tomorrow_only && asset.tracking_date != dates::add_days(today, 1) {
            return false;
        }
        let needle = self.query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        asset.asset_number.to_lowercase().contains(&needle)
            || asset.name.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub column: Option<AssetColumn>,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            column: None,
            direction: SortDirection::Asc,
        }
    }
}

impl SortConfig {
    /// Same column flips direction; a different column starts ascending.
    pub fn select(&mut self, column: AssetColumn) {
        if self.column == Some(column) {
            self.direction = self.direction.toggled();
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Asc;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn compare(&self, left: &Asset, right: &Asset) -> Ordering {
        let Some(column) = self.column else {
            return Ordering::Equal;
        };
        let ordering = match column {
            AssetColumn::AssetNumber => locale_compare(&left.asset_number, &right.asset_number),
            AssetColumn::Name => locale_compare(&left.name, &right.name),
            AssetColumn::Status => locale_compare(left.status.as_str(), right.status.as_str()),
            AssetColumn::CompletedBy => {
                return compare_present(
                    left.completed_by.as_deref(),
                    right.completed_by.as_deref(),
                    self.direction,
                    locale_compare,
                );
            }
            AssetColumn::CompletionDate => {
                return compare_present(
                    left.completion_date,
                    right.completion_date,
                    self.direction,
                    |a, b| a.cmp(&b),
                );
            }
            AssetColumn::TrackingDate => left.tracking_date.cmp(&right.tracking_date),
            AssetColumn::CreatedAt => left.created_at.cmp(&right.created_at),
            AssetColumn::Id => left.id.cmp(&right.id),
        };
        apply_direction(ordering, self.direction)
    }

    pub fn indicator(&self, column: AssetColumn) -> Option<&'static str> {
        if self.column != Some(column) {
            return None;
        }
        Some(match self.direction {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        })
    }
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Missing values sort after present ones regardless of direction.
fn compare_present<T>(
    left: Option<T>,
    right: Option<T>,
    direction: SortDirection,
    compare: impl Fn(T, T) -> Ordering,
) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => apply_direction(compare(left, right), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Collation-style comparison: case-folded text first, raw text breaks ties
/// so the order stays total.
pub fn locale_compare(left: &str, right: &str) -> Ordering {
    let folded = left.to_lowercase().cmp(&right.to_lowercase());
    if folded != Ordering::Equal {
        return folded;
    }
    left.cmp(right)
}

/// Filtered, sorted projection of the accumulated list. Ties keep feed order.
pub fn visible_assets<'a>(
    items: &'a [Asset],
    filter: &ListFilter,
    sort: &SortConfig,
    today: Date,
) -> Vec<&'a Asset> {
    let mut rows = items
        .iter()
        .filter(|asset| filter.matches(asset, today))
        .collect::<Vec<_>>();
    if sort.column.is_some() {
        rows.sort_by(|left, right| sort.compare(left, right));
    }
    rows
}
