// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashSet;

use crate::model::Asset;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuggestPhase {
    #[default]
    Idle,
    Open,
    Navigating(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestKey {
    Down,
    Up,
    Enter,
    Esc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestOutcome {
    /// The key was not consumed; let the form handle it.
    Ignored,
    Moved,
    Committed(String),
    Cancelled,
}

/// Keyboard state for one suggestion list. The form owns one per
/// autocompleting field and passes in that field's current suggestions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Autocomplete {
    phase: SuggestPhase,
}

impl Autocomplete {
    pub fn phase(&self) -> SuggestPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != SuggestPhase::Idle
    }

    pub fn highlighted(&self) -> Option<usize> {
        match self.phase {
            SuggestPhase::Navigating(index) => Some(index),
            _ => None,
        }
    }

    /// Typing re-opens the list with nothing highlighted. Clearing the field
    /// closes it.
    pub fn on_input(&mut self, value: &str) {
        self.phase = if value.trim().is_empty() {
            SuggestPhase::Idle
        } else {
            SuggestPhase::Open
        };
    }

    pub fn close(&mut self) {
        self.phase = SuggestPhase::Idle;
    }

    pub fn handle_key(&mut self, key: SuggestKey, suggestions: &[String]) -> SuggestOutcome {
        if self.phase == SuggestPhase::Idle {
            return SuggestOutcome::Ignored;
        }
        let last = suggestions.len().checked_sub(1);
        match key {
            SuggestKey::Down => {
                let Some(last) = last else {
                    return SuggestOutcome::Ignored;
                };
                self.phase = match self.phase {
                    SuggestPhase::Navigating(index) => SuggestPhase::Navigating((index + 1).min(last)),
                    _ => SuggestPhase::Navigating(0),
                };
                SuggestOutcome::Moved
            }
            SuggestKey::Up => match self.phase {
                SuggestPhase::Navigating(0) => {
                    self.phase = SuggestPhase::Open;
                    SuggestOutcome::Moved
                }
                SuggestPhase::Navigating(index) => {
                    let clamped = last.map_or(0, |last| index.min(last + 1));
                    self.phase = match clamped.checked_sub(1) {
                        Some(next) => SuggestPhase::Navigating(next),
                        None => SuggestPhase::Open,
                    };
                    SuggestOutcome::Moved
                }
                _ => SuggestOutcome::Ignored,
            },
            SuggestKey::Enter => {
                let Some(value) = self.highlighted().and_then(|index| suggestions.get(index))
                else {
                    return SuggestOutcome::Ignored;
                };
                self.phase = SuggestPhase::Idle;
                SuggestOutcome::Committed(value.clone())
            }
            SuggestKey::Esc => {
                self.phase = SuggestPhase::Idle;
                SuggestOutcome::Cancelled
            }
        }
    }
}

/// Distinct non-blank values in first-seen order.
pub fn distinct_values<'a>(
    items: &'a [Asset],
    field: impl Fn(&'a Asset) -> &'a str,
) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(field)
        .filter(|value| !value.trim().is_empty())
        .filter(|value| seen.insert(*value))
        .map(str::to_owned)
        .collect()
}

/// Case-insensitive substring filter. An empty input suggests nothing.
pub fn filter_suggestions(pool: &[String], input: &str) -> Vec<String> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    pool.iter()
        .filter(|value| value.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        Autocomplete, SuggestKey, SuggestOutcome, SuggestPhase, distinct_values,
        filter_suggestions,
    };
    use crate::{Asset, AssetId, AssetStatus};
    use time::macros::{date, datetime};

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    fn opened() -> Autocomplete {
        let mut state = Autocomplete::default();
        state.on_input("a");
        state
    }

    #[test]
    fn idle_ignores_navigation() {
        let mut state = Autocomplete::default();
        let suggestions = list(&["A1"]);
        assert_eq!(
            state.handle_key(SuggestKey::Down, &suggestions),
            SuggestOutcome::Ignored
        );
        assert_eq!(state.phase(), SuggestPhase::Idle);
    }

    #[test]
    fn down_clamps_at_last_index() {
        let mut state = opened();
        let suggestions = list(&["A1", "A2"]);
        for _ in 0..5 {
            state.handle_key(SuggestKey::Down, &suggestions);
        }
        assert_eq!(state.highlighted(), Some(1));
    }

    #[test]
    fn up_clamps_at_no_highlight() {
        let mut state = opened();
        let suggestions = list(&["A1", "A2"]);
        state.handle_key(SuggestKey::Down, &suggestions);
        for _ in 0..3 {
            state.handle_key(SuggestKey::Up, &suggestions);
        }
        assert_eq!(state.phase(), SuggestPhase::Open);
        assert_eq!(state.highlighted(), None);
    }

    #[test]
    fn up_after_list_shrinks_stays_in_range() {
        let mut state = opened();
        let long = list(&["A1", "A2", "A3", "A4"]);
        for _ in 0..4 {
            state.handle_key(SuggestKey::Down, &long);
        }
        let short = list(&["A1", "A2"]);
        state.handle_key(SuggestKey::Up, &short);
        assert_eq!(state.highlighted(), Some(1));
    }

    #[test]
    fn enter_commits_highlighted_value() {
        let mut state = opened();
        let suggestions = list(&["A1", "A2"]);
        state.handle_key(SuggestKey::Down, &suggestions);
        state.handle_key(SuggestKey::Down, &suggestions);
        assert_eq!(
            state.handle_key(SuggestKey::Enter, &suggestions),
            SuggestOutcome::Committed("A2".to_owned())
        );
        assert!(!state.is_open());
    }

    #[test]
    fn enter_without_highlight_passes_through() {
        let mut state = opened();
        let suggestions = list(&["A1"]);
        assert_eq!(
            state.handle_key(SuggestKey::Enter, &suggestions),
            SuggestOutcome::Ignored
        );
        assert!(state.is_open());
    }

    #[test]
    fn escape_closes_and_clears_index() {
        let mut state = opened();
        let suggestions = list(&["A1"]);
        state.handle_key(SuggestKey::Down, &suggestions);
        assert_eq!(
            state.handle_key(SuggestKey::Esc, &suggestions),
            SuggestOutcome::Cancelled
        );
        assert_eq!(state.phase(), SuggestPhase::Idle);
        assert_eq!(state.highlighted(), None);
    }

    #[test]
    fn typing_reopens_without_highlight() {
        let mut state = opened();
        let suggestions = list(&["A1"]);
        state.handle_key(SuggestKey::Down, &suggestions);
        state.on_input("A");
        assert_eq!(state.phase(), SuggestPhase::Open);
        state.on_input("");
        assert_eq!(state.phase(), SuggestPhase::Idle);
    }

    #[test]
    fn down_on_empty_list_is_ignored() {
        let mut state = opened();
        assert_eq!(
            state.handle_key(SuggestKey::Down, &[]),
            SuggestOutcome::Ignored
        );
        assert_eq!(state.phase(), SuggestPhase::Open);
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let make = |id: i64, number: &str, name: &str| Asset {
            id: AssetId::new(id),
            asset_number: number.to_owned(),
            name: name.to_owned(),
            tracking_date: date!(2025 - 01 - 01),
            status: AssetStatus::Pending,
            completion_date: None,
            completed_by: None,
            created_at: datetime!(2025-01-01 00:00 UTC),
        };
        let items = vec![
            make(1, "A2", "Drill"),
            make(2, "A1", "Saw"),
            make(3, "A2", "Drill"),
            make(4, " ", "Ladder"),
        ];
        assert_eq!(
            distinct_values(&items, |asset| asset.asset_number.as_str()),
            list(&["A2", "A1"])
        );
        assert_eq!(
            distinct_values(&items, |asset| asset.name.as_str()),
            list(&["Drill", "Saw", "Ladder"])
        );
    }

    #[test]
    fn filter_suggestions_is_case_insensitive() {
        let pool = list(&["Drill", "drill press", "Saw"]);
        assert_eq!(
            filter_suggestions(&pool, "DRI"),
            list(&["Drill", "drill press"])
        );
        assert!(filter_suggestions(&pool, "  ").is_empty());
    }
}
