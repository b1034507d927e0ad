// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::listing::{ListFilter, SortConfig};
use crate::{AppMode, AssetColumn, FormKind, TabKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub filter: ListFilter,
    pub sort: SortConfig,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Assets,
            filter: ListFilter::default(),
            sort: SortConfig::default(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    ExitToNav,
    EnterSearch,
    OpenForm(FormKind),
    SearchInput(char),
    SearchBackspace,
    ClearSearch,
    ToggleShowAll,
    ToggleTomorrow,
    SortBy(AssetColumn),
    ClearSort,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    FilterChanged,
    SortChanged,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::EnterSearch => {
                self.mode = AppMode::Search;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SearchInput(ch) => {
                self.filter.query.push(ch);
                vec![AppEvent::FilterChanged]
            }
            AppCommand::SearchBackspace => {
                if self.filter.query.pop().is_none() {
                    return Vec::new();
                }
                vec![AppEvent::FilterChanged]
            }
            AppCommand::ClearSearch => {
                self.filter.query.clear();
                vec![AppEvent::FilterChanged, self.set_status("search cleared")]
            }
            AppCommand::ToggleShowAll => {
                self.filter.show_all_statuses = !self.filter.show_all_statuses;
                let label = if self.filter.show_all_statuses {
                    "showing all statuses"
                } else {
                    "showing pending only"
                };
                vec![AppEvent::FilterChanged, self.set_status(label)]
            }
            AppCommand::ToggleTomorrow => {
                self.filter.tomorrow_only = !self.filter.tomorrow_only;
                let label = if self.filter.tomorrow_only {
                    "due tomorrow only"
                } else {
                    "all tracking dates"
                };
                vec![AppEvent::FilterChanged, self.set_status(label)]
            }
            AppCommand::SortBy(column) => {
                self.sort.select(column);
                let label = format!("sort {} {}", column.label(), self.sort.direction.as_str());
                vec![AppEvent::SortChanged, self.set_status(&label)]
            }
            AppCommand::ClearSort => {
                self.sort.clear();
                vec![AppEvent::SortChanged, self.set_status("sort cleared")]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
