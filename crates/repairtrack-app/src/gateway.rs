// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::cmp::Ordering;
use time::{Date, OffsetDateTime};

use crate::dates;
use crate::ids::AssetId;
use crate::model::{Asset, AssetColumn, AssetPatch, AssetStatus, NewAsset, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Lte => "lte",
        }
    }

    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Date(Date),
    Timestamp(OffsetDateTime),
}

impl FilterValue {
    /// Text form shared by the SQL parameters and the REST query string.
    pub fn render(&self) -> Result<String> {
        match self {
            Self::Int(value) => Ok(value.to_string()),
            Self::Text(value) => Ok(value.clone()),
            Self::Date(value) => Ok(dates::format_date(*value)),
            Self::Timestamp(value) => dates::format_timestamp(*value),
        }
    }

    /// Orders two values of the same kind; mixed kinds are incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(left), Self::Int(right)) => Some(left.cmp(right)),
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Date(left), Self::Date(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl From<AssetStatus> for FilterValue {
    fn from(value: AssetStatus) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<AssetId> for FilterValue {
    fn from(value: AssetId) -> Self {
        Self::Int(value.get())
    }
}

impl From<Date> for FilterValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<OffsetDateTime> for FilterValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: AssetColumn,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn eq(column: AssetColumn, value: impl Into<FilterValue>) -> Self {
        Self {
            column,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(column: AssetColumn, value: impl Into<FilterValue>) -> Self {
        Self {
            column,
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(column: AssetColumn, value: impl Into<FilterValue>) -> Self {
        Self {
            column,
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    /// Evaluates the filter in memory. A missing column value never matches.
    pub fn matches(&self, asset: &Asset) -> bool {
        let Some(actual) = column_value(asset, self.column) else {
            return false;
        };
        let Some(ordering) = actual.compare(&self.value) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
        }
    }
}

pub fn column_value(asset: &Asset, column: AssetColumn) -> Option<FilterValue> {
    match column {
        AssetColumn::Id => Some(FilterValue::Int(asset.id.get())),
        AssetColumn::AssetNumber => Some(FilterValue::Text(asset.asset_number.clone())),
        AssetColumn::Name => Some(FilterValue::Text(asset.name.clone())),
        AssetColumn::TrackingDate => Some(FilterValue::Date(asset.tracking_date)),
        AssetColumn::Status => Some(asset.status.into()),
        AssetColumn::CompletionDate => asset.completion_date.map(FilterValue::Timestamp),
        AssetColumn::CompletedBy => asset.completed_by.clone().map(FilterValue::Text),
        AssetColumn::CreatedAt => Some(FilterValue::Timestamp(asset.created_at)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: AssetColumn,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetQuery {
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub range: Option<RowRange>,
}

impl AssetQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: AssetColumn, direction: SortDirection) -> Self {
        self.order.push(OrderBy { column, direction });
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(RowRange { offset, limit });
        self
    }
}

/// One slice of a select together with the exact number of rows matching the
/// filters, ignoring the range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

/// Table-oriented access to the asset store.
///
/// Every state change in the dashboard is one of these four calls; there is no
/// client-side cache beyond the pages the feed has accumulated.
pub trait AssetGateway {
    fn select(&self, query: &AssetQuery) -> Result<Page<Asset>>;

    /// Inserts one row and returns it as stored, including the assigned id
    /// and `created_at`.
    fn insert(&self, asset: &NewAsset) -> Result<Asset>;

    /// Applies `patch` to every row matching all `filters`; returns the number
    /// of rows touched.
    fn update(&self, filters: &[Filter], patch: &AssetPatch) -> Result<usize>;

    fn delete(&self, filters: &[Filter]) -> Result<usize>;
}

impl<G: AssetGateway + ?Sized> AssetGateway for &G {
    fn select(&self, query: &AssetQuery) -> Result<Page<Asset>> {
        (**self).select(query)
    }

    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        (**self).insert(asset)
    }

    fn update(&self, filters: &[Filter], patch: &AssetPatch) -> Result<usize> {
        (**self).update(filters, patch)
    }

    fn delete(&self, filters: &[Filter]) -> Result<usize> {
        (**self).delete(filters)
    }
}
