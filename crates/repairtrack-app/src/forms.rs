// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use time::Date;

use crate::dates;
use crate::ids::AssetId;
use crate::model::{Asset, AssetPatch, FormKind, NewAsset};
use crate::suggest::{
    Autocomplete, SuggestKey, SuggestOutcome, distinct_values, filter_suggestions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickDate {
    Tomorrow,
    OneWeek,
    TwoWeeks,
    OneMonth,
    MonthAndHalf,
}

impl QuickDate {
    pub const ALL: [Self; 5] = [
        Self::Tomorrow,
        Self::OneWeek,
        Self::TwoWeeks,
        Self::OneMonth,
        Self::MonthAndHalf,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tomorrow => "tomorrow",
            Self::OneWeek => "1 week",
            Self::TwoWeeks => "2 weeks",
            Self::OneMonth => "1 month",
            Self::MonthAndHalf => "1.5 months",
        }
    }

    pub fn apply(self, today: Date) -> Date {
        match self {
            Self::Tomorrow => dates::add_days(today, 1),
            Self::OneWeek => dates::add_days(today, 7),
            Self::TwoWeeks => dates::add_days(today, 14),
            Self::OneMonth => dates::add_months(today, 1),
            Self::MonthAndHalf => dates::add_days(dates::add_months(today, 1), 15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    AssetNumber,
    Name,
    TrackingDate,
}

impl FormField {
    pub const ALL: [Self; 3] = [Self::AssetNumber, Self::Name, Self::TrackingDate];

    pub const fn label(self) -> &'static str {
        match self {
            Self::AssetNumber => "asset number",
            Self::Name => "name",
            Self::TrackingDate => "tracking date",
        }
    }

    fn offset(self, delta: isize) -> Self {
        let position = Self::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0) as isize;
        let len = Self::ALL.len() as isize;
        Self::ALL[(position + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDraft {
    pub asset_number: String,
    pub name: String,
    pub tracking_date: String,
}

impl AssetDraft {
    pub fn blank(today: Date) -> Self {
        Self {
            asset_number: String::new(),
            name: String::new(),
            tracking_date: dates::format_date(today),
        }
    }

    pub fn from_asset(asset: &Asset) -> Self {
        Self {
            asset_number: asset.asset_number.clone(),
            name: asset.name.clone(),
            tracking_date: dates::format_date(asset.tracking_date),
        }
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::AssetNumber => &self.asset_number,
            FormField::Name => &self.name,
            FormField::TrackingDate => &self.tracking_date,
        }
    }

    pub fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::AssetNumber => &mut self.asset_number,
            FormField::Name => &mut self.name,
            FormField::TrackingDate => &mut self.tracking_date,
        }
    }

    fn validated(&self) -> Result<(String, String, Date)> {
        let asset_number = self.asset_number.trim();
        if asset_number.is_empty() {
            bail!("asset number is required -- enter an asset number and retry");
        }
        let name = self.name.trim();
        if name.is_empty() {
            bail!("name is required -- describe the item and retry");
        }
        if self.tracking_date.trim().is_empty() {
            bail!("tracking date is required -- pick a date and retry");
        }
        let tracking_date = dates::parse_date(&self.tracking_date).context("tracking date")?;
        Ok((asset_number.to_owned(), name.to_owned(), tracking_date))
    }

    pub fn to_new_asset(&self) -> Result<NewAsset> {
        let (asset_number, name, tracking_date) = self.validated()?;
        Ok(NewAsset::pending(asset_number, name, tracking_date))
    }

    pub fn to_patch(&self) -> Result<AssetPatch> {
        let (asset_number, name, tracking_date) = self.validated()?;
        Ok(AssetPatch::details(asset_number, name, tracking_date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Create(NewAsset),
    Edit { id: AssetId, patch: AssetPatch },
    Report(NewAsset),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Create(_) => FormKind::Create,
            Self::Edit { id, .. } => FormKind::Edit(*id),
            Self::Report(_) => FormKind::Report,
        }
    }
}

/// Distinct asset numbers and names of the rows currently loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionPool {
    pub asset_numbers: Vec<String>,
    pub names: Vec<String>,
}

impl SuggestionPool {
    pub fn from_items(items: &[Asset]) -> Self {
        Self {
            asset_numbers: distinct_values(items, |asset| asset.asset_number.as_str()),
            names: distinct_values(items, |asset| asset.name.as_str()),
        }
    }

    fn for_field(&self, field: FormField) -> &[String] {
        match field {
            FormField::AssetNumber => &self.asset_numbers,
            FormField::Name => &self.names,
            FormField::TrackingDate => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub kind: FormKind,
    pub draft: AssetDraft,
    pub focus: FormField,
    pub number_suggest: Autocomplete,
    pub name_suggest: Autocomplete,
    pub scanning: bool,
}

impl FormState {
    pub fn new(kind: FormKind, today: Date) -> Self {
        Self {
            kind,
            draft: AssetDraft::blank(today),
            focus: FormField::AssetNumber,
            number_suggest: Autocomplete::default(),
            name_suggest: Autocomplete::default(),
            scanning: false,
        }
    }

    pub fn for_edit(asset: &Asset) -> Self {
        Self {
            kind: FormKind::Edit(asset.id),
            draft: AssetDraft::from_asset(asset),
            focus: FormField::AssetNumber,
            number_suggest: Autocomplete::default(),
            name_suggest: Autocomplete::default(),
            scanning: false,
        }
    }

    /// Only the create form offers suggestions.
    pub fn autocompletes(&self) -> bool {
        self.kind == FormKind::Create
    }

    pub fn payload(&self) -> Result<FormPayload> {
        Ok(match self.kind {
            FormKind::Create => FormPayload::Create(self.draft.to_new_asset()?),
            FormKind::Report => FormPayload::Report(self.draft.to_new_asset()?),
            FormKind::Edit(id) => FormPayload::Edit {
                id,
                patch: self.draft.to_patch()?,
            },
        })
    }

    pub fn clear(&mut self, today: Date) {
        self.draft = AssetDraft::blank(today);
        self.focus = FormField::AssetNumber;
        self.close_suggestions();
        self.scanning = false;
    }

    pub fn focus_next(&mut self) {
        self.close_suggestions();
        self.focus = self.focus.offset(1);
    }

    pub fn focus_prev(&mut self) {
        self.close_suggestions();
        self.focus = self.focus.offset(-1);
    }

    pub fn insert_char(&mut self, ch: char) {
        self.draft.field_mut(self.focus).push(ch);
        self.after_edit();
    }

    pub fn backspace(&mut self) {
        self.draft.field_mut(self.focus).pop();
        self.after_edit();
    }

    pub fn apply_quick_date(&mut self, quick: QuickDate, today: Date) {
        self.draft.tracking_date = dates::format_date(quick.apply(today));
    }

    /// Decoded scanner text becomes the asset number and the scanner closes.
    pub fn accept_scan(&mut self, text: &str) {
        self.draft.asset_number = text.trim().to_owned();
        self.scanning = false;
        self.number_suggest.close();
    }

    pub fn suggestions(&self, pool: &SuggestionPool) -> Vec<String> {
        if !self.autocompletes() || !self.active_suggest().is_some_and(|s| s.is_open()) {
            return Vec::new();
        }
        filter_suggestions(pool.for_field(self.focus), self.draft.field(self.focus))
    }

    pub fn active_suggest(&self) -> Option<&Autocomplete> {
        match self.focus {
            FormField::AssetNumber => Some(&self.number_suggest),
            FormField::Name => Some(&self.name_suggest),
            FormField::TrackingDate => None,
        }
    }

    /// Routes a navigation key to the focused field's suggestion list.
    /// A committed suggestion replaces the field value.
    pub fn handle_suggest_key(
        &mut self,
        key: SuggestKey,
        pool: &SuggestionPool,
    ) -> SuggestOutcome {
        if !self.autocompletes() {
            return SuggestOutcome::Ignored;
        }
        let suggestions = self.suggestions(pool);
        let focus = self.focus;
        let Some(state) = self.suggest_mut(focus) else {
            return SuggestOutcome::Ignored;
        };
        let outcome = state.handle_key(key, &suggestions);
        if let SuggestOutcome::Committed(value) = &outcome {
            self.draft.field_mut(focus).clone_from(value);
        }
        outcome
    }

    fn suggest_mut(&mut self, field: FormField) -> Option<&mut Autocomplete> {
        match field {
            FormField::AssetNumber => Some(&mut self.number_suggest),
            FormField::Name => Some(&mut self.name_suggest),
            FormField::TrackingDate => None,
        }
    }

    fn after_edit(&mut self) {
        if !self.autocompletes() {
            return;
        }
        let focus = self.focus;
        let value = self.draft.field(focus).to_owned();
        if let Some(state) = self.suggest_mut(focus) {
            state.on_input(&value);
        }
    }

    fn close_suggestions(&mut self) {
        self.number_suggest.close();
        self.name_suggest.close();
    }
}
