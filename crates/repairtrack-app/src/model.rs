// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::AssetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Pending,
    Completed,
}

impl AssetStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A tracked physical item awaiting (or finished with) repair.
///
/// `completion_date` and `completed_by` are set together when the status is
/// `Completed` and cleared together when it is `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub asset_number: String,
    pub name: String,
    pub tracking_date: Date,
    pub status: AssetStatus,
    pub completion_date: Option<OffsetDateTime>,
    pub completed_by: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Asset {
    pub fn is_completed(&self) -> bool {
        self.status == AssetStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub asset_number: String,
    pub name: String,
    pub tracking_date: Date,
    pub status: AssetStatus,
}

impl NewAsset {
    pub fn pending(asset_number: impl Into<String>, name: impl Into<String>, date: Date) -> Self {
        Self {
            asset_number: asset_number.into(),
            name: name.into(),
            tracking_date: date,
            status: AssetStatus::Pending,
        }
    }
}

/// Partial update. `None` leaves a column untouched; the nested options on
/// the completion columns distinguish "clear" from "leave alone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPatch {
    pub asset_number: Option<String>,
    pub name: Option<String>,
    pub tracking_date: Option<Date>,
    pub status: Option<AssetStatus>,
    pub completion_date: Option<Option<OffsetDateTime>>,
    pub completed_by: Option<Option<String>>,
}

impl AssetPatch {
    pub fn details(asset_number: impl Into<String>, name: impl Into<String>, date: Date) -> Self {
        Self {
            asset_number: Some(asset_number.into()),
            name: Some(name.into()),
            tracking_date: Some(date),
            ..Self::default()
        }
    }

    pub fn completion(completed_by: impl Into<String>, at: OffsetDateTime) -> Self {
        Self {
            status: Some(AssetStatus::Completed),
            completion_date: Some(Some(at)),
            completed_by: Some(Some(completed_by.into())),
            ..Self::default()
        }
    }

    pub fn reversion() -> Self {
        Self {
            status: Some(AssetStatus::Pending),
            completion_date: Some(None),
            completed_by: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, asset: &mut Asset) {
        if let Some(value) = &self.asset_number {
            asset.asset_number.clone_from(value);
        }
        if let Some(value) = &self.name {
            asset.name.clone_from(value);
        }
        if let Some(value) = self.tracking_date {
            asset.tracking_date = value;
        }
        if let Some(value) = self.status {
            asset.status = value;
        }
        if let Some(value) = self.completion_date {
            asset.completion_date = value;
        }
        if let Some(value) = &self.completed_by {
            asset.completed_by.clone_from(value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetColumn {
    Id,
    AssetNumber,
    Name,
    TrackingDate,
    Status,
    CompletionDate,
    CompletedBy,
    CreatedAt,
}

impl AssetColumn {
    /// Columns the list view can sort by, in display order.
    pub const SORTABLE: [Self; 6] = [
        Self::AssetNumber,
        Self::Name,
        Self::TrackingDate,
        Self::Status,
        Self::CompletionDate,
        Self::CompletedBy,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::AssetNumber => "asset_number",
            Self::Name => "name",
            Self::TrackingDate => "tracking_date",
            Self::Status => "status",
            Self::CompletionDate => "completion_date",
            Self::CompletedBy => "completed_by",
            Self::CreatedAt => "created_at",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::AssetNumber => "asset #",
            Self::Name => "name",
            Self::TrackingDate => "tracking",
            Self::Status => "status",
            Self::CompletionDate => "completed",
            Self::CompletedBy => "by",
            Self::CreatedAt => "created",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Assets,
    Statistics,
}

impl TabKind {
    pub const ALL: [Self; 2] = [Self::Assets, Self::Statistics];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Statistics => "statistics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Create,
    Edit(AssetId),
    Report,
}

impl FormKind {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Create => "new asset",
            Self::Edit(_) => "edit asset",
            Self::Report => "quick report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Search,
    Form(FormKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    SessionUser,
    UiDarkMode,
}

impl SettingKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionUser => "session.user",
            Self::UiDarkMode => "ui.dark_mode",
        }
    }

    pub const fn expected_value_kind(self) -> SettingValueKind {
        match self {
            Self::SessionUser => SettingValueKind::Text,
            Self::UiDarkMode => SettingValueKind::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValueKind {
    Bool,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    pub fn parse_for_key(key: SettingKey, raw: &str) -> Option<Self> {
        match key.expected_value_kind() {
            SettingValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(Self::Bool(true)),
                "0" | "false" | "off" | "no" => Some(Self::Bool(false)),
                _ => None,
            },
            SettingValueKind::Text => Some(Self::Text(raw.to_owned())),
        }
    }

    pub fn to_storage(&self, key: SettingKey) -> Option<String> {
        match (key.expected_value_kind(), self) {
            (SettingValueKind::Bool, Self::Bool(value)) => {
                Some(if *value { "true" } else { "false" }.to_owned())
            }
            (SettingValueKind::Text, Self::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }
}
