// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use repairtrack_app::actions::{self, SubmitOutcome};
use repairtrack_app::forms::FormPayload;
use repairtrack_app::paging::AssetFeed;
use repairtrack_app::{
    AssetColumn, AssetGateway, AssetId, AssetPatch, AssetQuery, AssetStatus, Filter, NewAsset,
    SettingKey, SettingValue, SortDirection,
};
use repairtrack_db::{Store, validate_db_path};
use repairtrack_testkit::{AssetFaker, fixture_datetime, temp_db_path};
use time::macros::{date, datetime};

fn bootstrapped() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/repairtrack.db").is_ok());
    assert!(validate_db_path(":memory:").is_ok());
}

#[test]
fn bootstrap_is_idempotent_and_survives_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.bootstrap()?;
        store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;
    }

    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    let page = reopened.select(&AssetQuery::all())?;
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].asset_number, "A1");
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.raw_connection().execute_batch(
        "
        CREATE TABLE assets (
          id INTEGER PRIMARY KEY,
          asset_number TEXT NOT NULL,
          name TEXT NOT NULL
        );
        CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL);
        ",
    )?;

    let error = store.bootstrap().expect_err("schema should be rejected");
    let message = error.to_string();
    assert!(message.contains("tracking_date"), "{message}");
    assert!(message.contains("completed_by"), "{message}");
    Ok(())
}

#[test]
fn insert_returns_stored_row() -> Result<()> {
    let store = bootstrapped()?;
    let created = store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;

    assert!(created.id.get() > 0);
    assert_eq!(created.name, "Drill");
    assert_eq!(created.tracking_date, date!(2025 - 03 - 01));
    assert_eq!(created.status, AssetStatus::Pending);
    assert_eq!(created.completion_date, None);
    assert_eq!(created.completed_by, None);
    assert_eq!(store.get_asset(created.id)?, created);
    Ok(())
}

#[test]
fn select_counts_every_match_but_returns_only_the_range() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AssetFaker::new(11);
    for _ in 0..23 {
        store.insert(&faker.new_asset(date!(2025 - 06 - 01)))?;
    }

    let page = store.select(
        &AssetQuery::all()
            .order_by(AssetColumn::TrackingDate, SortDirection::Asc)
            .order_by(AssetColumn::Id, SortDirection::Asc)
            .range(20, 10),
    )?;
    assert_eq!(page.total, 23);
    assert_eq!(page.rows.len(), 3);

    let all = store.select(
        &AssetQuery::all()
            .order_by(AssetColumn::TrackingDate, SortDirection::Asc)
            .order_by(AssetColumn::Id, SortDirection::Asc),
    )?;
    let dates = all
        .rows
        .iter()
        .map(|asset| asset.tracking_date)
        .collect::<Vec<_>>();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    Ok(())
}

#[test]
fn feed_pages_through_store_in_tracking_order() -> Result<()> {
    let store = bootstrapped()?;
    for day in [5u8, 1, 3] {
        let tracking = time::Date::from_calendar_date(2025, time::Month::April, day)?;
        store.insert(&NewAsset::pending(format!("N{day}"), "Saw", tracking))?;
    }

    let mut feed = AssetFeed::with_page_size(2);
    while let Some(request) = feed.load_next_page(false) {
        let result = actions::fetch_page(&store, &request);
        feed.finish(request, result)?;
    }

    let numbers = feed
        .items()
        .iter()
        .map(|asset| asset.asset_number.as_str())
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec!["N1", "N3", "N5"]);
    assert!(!feed.has_more());
    Ok(())
}

#[test]
fn complete_then_revert_round_trips_in_single_updates() -> Result<()> {
    let store = bootstrapped()?;
    let drill = store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;
    let completed_at = fixture_datetime();

    actions::complete_asset(&store, drill.id, "alice", completed_at)?;
    let completed = store.get_asset(drill.id)?;
    assert_eq!(completed.status, AssetStatus::Completed);
    assert_eq!(completed.completed_by.as_deref(), Some("alice"));
    assert_eq!(completed.completion_date, Some(completed_at));

    let only_completed = store.select(
        &AssetQuery::all().filter(Filter::eq(AssetColumn::Status, AssetStatus::Completed)),
    )?;
    assert_eq!(only_completed.total, 1);

    actions::revert_asset(&store, drill.id)?;
    let reverted = store.get_asset(drill.id)?;
    assert_eq!(reverted.status, AssetStatus::Pending);
    assert_eq!(reverted.completion_date, None);
    assert_eq!(reverted.completed_by, None);
    Ok(())
}

#[test]
fn update_and_delete_report_missing_rows() -> Result<()> {
    let store = bootstrapped()?;
    let missing = AssetId::new(404);

    let updated = store.update(
        &[Filter::eq(AssetColumn::Id, missing)],
        &AssetPatch::details("X", "Y", date!(2025 - 01 - 01)),
    )?;
    assert_eq!(updated, 0);
    assert!(actions::delete_asset(&store, missing).is_err());
    Ok(())
}

#[test]
fn unfiltered_writes_and_empty_patches_are_refused() -> Result<()> {
    let store = bootstrapped()?;
    let drill = store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;

    assert!(store.delete(&[]).is_err());
    assert!(store.update(&[], &AssetPatch::reversion()).is_err());
    assert!(
        store
            .update(&[Filter::eq(AssetColumn::Id, drill.id)], &AssetPatch::default())
            .is_err()
    );
    assert_eq!(store.select(&AssetQuery::all())?.total, 1);
    Ok(())
}

#[test]
fn created_at_range_filters_compare_across_offsets() -> Result<()> {
    let store = bootstrapped()?;
    let asset = NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01));
    store.insert_at(&asset, datetime!(2024-12-31 23:30 UTC))?;
    store.insert_at(
        &NewAsset::pending("A2", "Saw", date!(2025 - 03 - 01)),
        datetime!(2025-01-01 01:00 +02:00),
    )?;
    store.insert_at(
        &NewAsset::pending("A3", "Lamp", date!(2025 - 03 - 01)),
        datetime!(2025-06-15 12:00 UTC),
    )?;

    let in_2025 = store.select(
        &AssetQuery::all()
            .filter(Filter::gte(AssetColumn::CreatedAt, datetime!(2025-01-01 00:00 UTC)))
            .filter(Filter::lte(
                AssetColumn::CreatedAt,
                datetime!(2025-12-31 23:59:59.999999999 UTC),
            )),
    )?;
    let numbers = in_2025
        .rows
        .iter()
        .map(|asset| asset.asset_number.as_str())
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec!["A3"]);
    Ok(())
}

#[test]
fn descending_order_keeps_missing_values_last() -> Result<()> {
    let store = bootstrapped()?;
    let first = store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;
    let second = store.insert(&NewAsset::pending("A2", "Saw", date!(2025 - 03 - 02)))?;
    actions::complete_asset(&store, second.id, "bob", fixture_datetime())?;

    let page = store.select(
        &AssetQuery::all().order_by(AssetColumn::CompletionDate, SortDirection::Desc),
    )?;
    assert_eq!(page.rows[0].id, second.id);
    assert_eq!(page.rows[1].id, first.id);

    let page = store.select(
        &AssetQuery::all().order_by(AssetColumn::CompletionDate, SortDirection::Asc),
    )?;
    assert_eq!(page.rows[0].id, second.id);
    Ok(())
}

#[test]
fn duplicate_check_sees_stored_numbers() -> Result<()> {
    let store = bootstrapped()?;
    store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;

    let duplicate = FormPayload::Create(NewAsset::pending("A1", "Saw", date!(2025 - 03 - 02)));
    assert!(actions::submit_form(&store, &duplicate, true).is_err());

    let outcome = actions::submit_form(&store, &duplicate, false)?;
    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    assert_eq!(store.select(&AssetQuery::all())?.total, 2);
    Ok(())
}

#[test]
fn session_and_theme_settings_round_trip() -> Result<()> {
    let store = bootstrapped()?;
    assert_eq!(store.session_user()?, None);
    assert_eq!(store.dark_mode()?, None);

    store.put_session_user("  alice ")?;
    store.put_dark_mode(true)?;
    assert_eq!(store.session_user()?.as_deref(), Some("alice"));
    assert_eq!(store.dark_mode()?, Some(true));

    store.put_session_user("bob")?;
    assert_eq!(store.session_user()?.as_deref(), Some("bob"));

    store.clear_session_user()?;
    assert_eq!(store.session_user()?, None);
    assert!(store.put_session_user("   ").is_err());
    Ok(())
}

#[test]
fn invalid_stored_setting_is_reported() -> Result<()> {
    let store = bootstrapped()?;
    store.raw_connection().execute(
        "INSERT INTO settings (key, value, updated_at) VALUES ('ui.dark_mode', 'maybe', '')",
        [],
    )?;

    let error = store.dark_mode().expect_err("invalid value should fail");
    assert!(error.to_string().contains("ui.dark_mode"));

    store.put_setting(SettingKey::UiDarkMode, SettingValue::Bool(false))?;
    assert_eq!(store.dark_mode()?, Some(false));
    Ok(())
}
