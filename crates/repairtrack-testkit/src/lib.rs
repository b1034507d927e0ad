// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use repairtrack_app::gateway::column_value;
use repairtrack_app::{
    Asset, AssetGateway, AssetId, AssetPatch, AssetQuery, AssetStatus, Filter, NewAsset, Page,
    SortDirection,
};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Date, Duration, Month, OffsetDateTime};

const ITEM_NAMES: [&str; 16] = [
    "Cordless Drill",
    "Extension Ladder",
    "Circular Saw",
    "Air Compressor",
    "Pressure Washer",
    "Projector",
    "Label Printer",
    "Office Chair",
    "Monitor",
    "Laptop",
    "Forklift Battery",
    "Pallet Jack",
    "Vacuum",
    "Desk Lamp",
    "Router",
    "Barcode Scanner",
];

const PREFIXES: [&str; 5] = ["EQ", "IT", "FAC", "WH", "OF"];

const OPERATORS: [&str; 8] = [
    "alice", "bob", "casey", "drew", "emery", "finley", "harper", "jules",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// A generated asset before it reaches a store. `completed` carries the
/// completion timestamp and operator when the asset should be seeded as done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAsset {
    pub asset: NewAsset,
    pub created_at: OffsetDateTime,
    pub completed: Option<(OffsetDateTime, String)>,
}

#[derive(Debug, Clone)]
pub struct AssetFaker {
    rng: DeterministicRng,
    sequence: u32,
}

impl AssetFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            sequence: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// Unique within one faker: the sequence number is part of the value.
    pub fn asset_number(&mut self) -> String {
        self.sequence += 1;
        let prefix = self.pick(&PREFIXES);
        format!("{prefix}-{:04}", self.sequence)
    }

    pub fn item_name(&mut self) -> String {
        self.pick(&ITEM_NAMES).to_owned()
    }

    pub fn operator(&mut self) -> String {
        self.pick(&OPERATORS).to_owned()
    }

    /// Pending asset tracked within two months of `today`.
    pub fn new_asset(&mut self, today: Date) -> NewAsset {
        let offset = self.rng.int_n(60) as i64 - 10;
        NewAsset::pending(
            self.asset_number(),
            self.item_name(),
            today.saturating_add(Duration::days(offset)),
        )
    }

    /// Asset created during `today`'s year, completed about a third of the time.
    pub fn asset(&mut self, today: Date) -> FakeAsset {
        let mut asset = self.new_asset(today);
        let year_start = midnight_utc(today.year(), Month::January, 1);
        let now = today.midnight().assume_utc();
        let created_at = self.datetime_between(year_start, now);

        let completed = if self.rng.int_n(3) == 0 {
            let at = self.datetime_between(created_at, now + Duration::hours(23));
            asset.status = AssetStatus::Completed;
            Some((at, self.operator()))
        } else {
            None
        };
        FakeAsset {
            asset,
            created_at,
            completed,
        }
    }

    pub fn date_in_year(&mut self, year: i32) -> OffsetDateTime {
        let start = midnight_utc(year, Month::January, 1);
        let end = midnight_utc(year + 1, Month::January, 1) - Duration::seconds(1);
        self.datetime_between(start, end)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn datetime_between(&mut self, start: OffsetDateTime, end: OffsetDateTime) -> OffsetDateTime {
        let start_ts = start.unix_timestamp();
        let end_ts = end.unix_timestamp();
        if end_ts <= start_ts {
            return start;
        }
        let span = (end_ts - start_ts) as u64;
        let offset = self.rng.next_u64() % (span + 1);
        start + Duration::seconds(offset as i64)
    }
}

fn midnight_utc(year: i32, month: Month, day: u8) -> OffsetDateTime {
    Date::from_calendar_date(year, month, day)
        .map_or(OffsetDateTime::UNIX_EPOCH, |date| date.midnight().assume_utc())
}

/// In-memory [`AssetGateway`] for tests. Setting a failure makes every call
/// return that error until cleared.
#[derive(Debug)]
pub struct MemoryGateway {
    rows: RefCell<Vec<Asset>>,
    next_id: Cell<i64>,
    clock: Cell<OffsetDateTime>,
    failure: RefCell<Option<String>>,
    selects: Cell<usize>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            clock: Cell::new(fixture_datetime()),
            failure: RefCell::new(None),
            selects: Cell::new(0),
        }
    }

    pub fn with_assets(assets: Vec<Asset>) -> Self {
        let gateway = Self::new();
        let next = assets.iter().map(|asset| asset.id.get()).max().unwrap_or(0) + 1;
        gateway.next_id.set(next);
        *gateway.rows.borrow_mut() = assets;
        gateway
    }

    /// `created_at` assigned to subsequent inserts.
    pub fn set_clock(&self, at: OffsetDateTime) {
        self.clock.set(at);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.borrow_mut() = Some(message.to_owned());
    }

    pub fn clear_failure(&self) {
        *self.failure.borrow_mut() = None;
    }

    pub fn rows(&self) -> Vec<Asset> {
        self.rows.borrow().clone()
    }

    pub fn get(&self, id: AssetId) -> Option<Asset> {
        self.rows.borrow().iter().find(|asset| asset.id == id).cloned()
    }

    pub fn select_count(&self) -> usize {
        self.selects.get()
    }

    fn check_failure(&self) -> Result<()> {
        if let Some(message) = self.failure.borrow().as_deref() {
            bail!("{message}");
        }
        Ok(())
    }
}

fn matches_all(asset: &Asset, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(asset))
}

impl AssetGateway for MemoryGateway {
    fn select(&self, query: &AssetQuery) -> Result<Page<Asset>> {
        self.check_failure()?;
        self.selects.set(self.selects.get() + 1);

        let mut rows = self
            .rows
            .borrow()
            .iter()
            .filter(|asset| matches_all(asset, &query.filters))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| {
            for order in &query.order {
                let ordering = match (
                    column_value(left, order.column),
                    column_value(right, order.column),
                ) {
                    (Some(a), Some(b)) => {
                        let ordering = a.compare(&b).unwrap_or(Ordering::Equal);
                        match order.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let total = rows.len();
        if let Some(range) = query.range {
            rows = rows.into_iter().skip(range.offset).take(range.limit).collect();
        }
        Ok(Page { rows, total })
    }

    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        self.check_failure()?;
        let id = AssetId::new(self.next_id.get());
        self.next_id.set(id.get() + 1);
        let row = Asset {
            id,
            asset_number: asset.asset_number.clone(),
            name: asset.name.clone(),
            tracking_date: asset.tracking_date,
            status: asset.status,
            completion_date: None,
            completed_by: None,
            created_at: self.clock.get(),
        };
        self.rows.borrow_mut().push(row.clone());
        Ok(row)
    }

    fn update(&self, filters: &[Filter], patch: &AssetPatch) -> Result<usize> {
        self.check_failure()?;
        let mut touched = 0;
        for asset in self.rows.borrow_mut().iter_mut() {
            if matches_all(asset, filters) {
                patch.apply_to(asset);
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn delete(&self, filters: &[Filter]) -> Result<usize> {
        self.check_failure()?;
        let mut rows = self.rows.borrow_mut();
        let before = rows.len();
        rows.retain(|asset| !matches_all(asset, filters));
        Ok(before - rows.len())
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("repairtrack.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

pub fn item_names() -> &'static [&'static str] {
    &ITEM_NAMES
}

#[cfg(test)]
mod tests {
    use super::{AssetFaker, MemoryGateway, fixture_datetime, item_names};
    use repairtrack_app::{
        AssetColumn, AssetGateway, AssetPatch, AssetQuery, AssetStatus, Filter, NewAsset,
        SortDirection,
    };
    use std::collections::BTreeSet;
    use time::macros::date;

    #[test]
    fn fixture_datetime_is_stable() {
        let at = fixture_datetime();
        assert_eq!(at.date(), date!(2026 - 02 - 19));
        assert_eq!((at.hour(), at.minute(), at.second()), (12, 34, 56));
    }

    #[test]
    fn new_deterministic_seed() {
        let mut left = AssetFaker::new(42);
        let mut right = AssetFaker::new(42);
        let today = date!(2025 - 06 - 15);
        assert_eq!(left.asset(today), right.asset(today));
    }

    #[test]
    fn asset_numbers_are_unique() {
        let mut faker = AssetFaker::new(7);
        let numbers = (0..200)
            .map(|_| faker.asset_number())
            .collect::<BTreeSet<_>>();
        assert_eq!(numbers.len(), 200);
    }

    #[test]
    fn fake_assets_stay_consistent() {
        let today = date!(2025 - 06 - 15);
        let mut faker = AssetFaker::new(3);
        for _ in 0..100 {
            let fake = faker.asset(today);
            assert!(item_names().contains(&fake.asset.name.as_str()));
            assert_eq!(fake.created_at.year(), 2025);
            match &fake.completed {
                Some((at, by)) => {
                    assert_eq!(fake.asset.status, AssetStatus::Completed);
                    assert!(*at >= fake.created_at);
                    assert!(!by.is_empty());
                }
                None => assert_eq!(fake.asset.status, AssetStatus::Pending),
            }
        }
    }

    #[test]
    fn date_in_year_stays_in_year() {
        let mut faker = AssetFaker::new(11);
        for _ in 0..100 {
            assert_eq!(faker.date_in_year(2024).year(), 2024);
        }
    }

    #[test]
    fn memory_gateway_orders_and_ranges() {
        let gateway = MemoryGateway::new();
        for (number, date) in [
            ("C", date!(2025 - 03 - 03)),
            ("A", date!(2025 - 03 - 01)),
            ("B", date!(2025 - 03 - 02)),
        ] {
            gateway
                .insert(&NewAsset::pending(number, "Drill", date))
                .expect("insert");
        }

        let page = gateway
            .select(
                &AssetQuery::all()
                    .order_by(AssetColumn::TrackingDate, SortDirection::Asc)
                    .range(1, 5),
            )
            .expect("select");
        assert_eq!(page.total, 3);
        let numbers = page
            .rows
            .iter()
            .map(|asset| asset.asset_number.as_str())
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["B", "C"]);
    }

    #[test]
    fn memory_gateway_update_delete_and_failure() {
        let gateway = MemoryGateway::new();
        let row = gateway
            .insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))
            .expect("insert");
        let by_id = [Filter::eq(AssetColumn::Id, row.id)];

        let touched = gateway
            .update(&by_id, &AssetPatch::completion("alice", fixture_datetime()))
            .expect("update");
        assert_eq!(touched, 1);
        assert_eq!(
            gateway.get(row.id).map(|asset| asset.status),
            Some(AssetStatus::Completed)
        );

        gateway.fail_with("store offline");
        let error = gateway.delete(&by_id).expect_err("failure injected");
        assert_eq!(error.to_string(), "store offline");
        gateway.clear_failure();

        assert_eq!(gateway.delete(&by_id).expect("delete"), 1);
        assert!(gateway.rows().is_empty());
    }
}
