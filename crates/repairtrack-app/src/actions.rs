// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Gateway round trips behind each user action. Every failure is logged here
//! and returned; nothing is retried.

use anyhow::{Context, Result, bail};
use time::{Date, Month, OffsetDateTime, UtcOffset};
use tracing::{debug, error, info, warn};

use crate::forms::FormPayload;
use crate::gateway::{AssetGateway, AssetQuery, Filter, Page};
use crate::model::{Asset, AssetColumn, AssetPatch};
use crate::paging::PageRequest;
use crate::ids::AssetId;
use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(Asset),
    Updated(AssetId),
    Reported(Asset),
}

/// A write the dashboard hands to its runtime. Owned so it can travel to a
/// worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Submit {
        payload: FormPayload,
        check_duplicates: bool,
    },
    Complete {
        id: AssetId,
        user: String,
        at: OffsetDateTime,
    },
    Revert(AssetId),
    Delete(AssetId),
}

impl Mutation {
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Submit { payload, .. } => match payload {
                FormPayload::Create(_) => "create",
                FormPayload::Edit { .. } => "edit",
                FormPayload::Report(_) => "report",
            },
            Self::Complete { .. } => "complete",
            Self::Revert(_) => "revert",
            Self::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Submitted(SubmitOutcome),
    Completed(AssetId),
    Reverted(AssetId),
    Deleted(AssetId),
}

pub fn apply_mutation<G: AssetGateway + ?Sized>(
    gateway: &G,
    mutation: &Mutation,
) -> Result<MutationOutcome> {
    match mutation {
        Mutation::Submit {
            payload,
            check_duplicates,
        } => submit_form(gateway, payload, *check_duplicates).map(MutationOutcome::Submitted),
        Mutation::Complete { id, user, at } => {
            complete_asset(gateway, *id, user, *at).map(|()| MutationOutcome::Completed(*id))
        }
        Mutation::Revert(id) => revert_asset(gateway, *id).map(|()| MutationOutcome::Reverted(*id)),
        Mutation::Delete(id) => delete_asset(gateway, *id).map(|()| MutationOutcome::Deleted(*id)),
    }
}

fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    result.inspect_err(|failure| {
        error!(operation, error = %format!("{failure:#}"), "gateway call failed");
    })
}

pub fn fetch_page<G: AssetGateway + ?Sized>(
    gateway: &G,
    request: &PageRequest,
) -> Result<Page<Asset>> {
    debug!(
        offset = request.offset,
        limit = request.limit,
        reset = request.reset,
        "fetching page"
    );
    logged(
        "fetch page",
        gateway
            .select(&request.query())
            .with_context(|| format!("load assets from offset {}", request.offset)),
    )
}

/// Read-then-write check; a concurrent insert between this call and the
/// insert itself can still create a duplicate.
pub fn asset_number_exists<G: AssetGateway + ?Sized>(
    gateway: &G,
    asset_number: &str,
) -> Result<bool> {
    let query = AssetQuery::all()
        .filter(Filter::eq(AssetColumn::AssetNumber, asset_number))
        .range(0, 1);
    let page = gateway
        .select(&query)
        .with_context(|| format!("check asset number {asset_number:?}"))?;
    Ok(page.total > 0 || !page.rows.is_empty())
}

pub fn submit_form<G: AssetGateway + ?Sized>(
    gateway: &G,
    payload: &FormPayload,
    check_duplicates: bool,
) -> Result<SubmitOutcome> {
    match payload {
        FormPayload::Create(asset) => {
            if check_duplicates {
                match asset_number_exists(gateway, &asset.asset_number) {
                    Ok(true) => {
                        warn!(
                            asset_number = %asset.asset_number,
                            "duplicate asset number rejected"
                        );
                        bail!(
                            "asset number {} already exists -- choose a different number and retry",
                            asset.asset_number
                        );
                    }
                    Ok(false) => {}
                    Err(failure) => {
                        warn!(error = %format!("{failure:#}"), "duplicate check skipped");
                    }
                }
            }
            let created = logged(
                "create asset",
                gateway.insert(asset).context("create asset"),
            )?;
            info!(id = %created.id, asset_number = %created.asset_number, "asset created");
            Ok(SubmitOutcome::Created(created))
        }
        FormPayload::Report(asset) => {
            let created = logged(
                "report asset",
                gateway.insert(asset).context("report asset"),
            )?;
            info!(id = %created.id, asset_number = %created.asset_number, "asset reported");
            Ok(SubmitOutcome::Reported(created))
        }
        FormPayload::Edit { id, patch } => {
            update_one(gateway, "edit asset", *id, patch)?;
            info!(id = %id, "asset updated");
            Ok(SubmitOutcome::Updated(*id))
        }
    }
}

/// Marks the asset completed by `user` at `at`, in one update.
pub fn complete_asset<G: AssetGateway + ?Sized>(
    gateway: &G,
    id: AssetId,
    user: &str,
    at: OffsetDateTime,
) -> Result<()> {
    update_one(gateway, "complete asset", id, &AssetPatch::completion(user, at))?;
    info!(id = %id, user, "asset completed");
    Ok(())
}

pub fn revert_asset<G: AssetGateway + ?Sized>(gateway: &G, id: AssetId) -> Result<()> {
    update_one(gateway, "revert asset", id, &AssetPatch::reversion())?;
    info!(id = %id, "asset reverted");
    Ok(())
}

pub fn delete_asset<G: AssetGateway + ?Sized>(gateway: &G, id: AssetId) -> Result<()> {
    let deleted = logged(
        "delete asset",
        gateway
            .delete(&[Filter::eq(AssetColumn::Id, id)])
            .with_context(|| format!("delete asset {id}")),
    )?;
    if deleted == 0 {
        bail!("asset {id} not found -- refresh the list and retry");
    }
    info!(id = %id, "asset deleted");
    Ok(())
}

fn update_one<G: AssetGateway + ?Sized>(
    gateway: &G,
    operation: &'static str,
    id: AssetId,
    patch: &AssetPatch,
) -> Result<()> {
    if patch.is_empty() {
        bail!("{operation} {id} has no changes -- edit a field and retry");
    }
    let updated = logged(
        operation,
        gateway
            .update(&[Filter::eq(AssetColumn::Id, id)], patch)
            .with_context(|| format!("{operation} {id}")),
    )?;
    if updated == 0 {
        bail!("asset {id} not found -- refresh the list and retry");
    }
    Ok(())
}

/// Two selects: every asset for the counts and ranking, then the assets
/// created during `year` for the monthly series. `now` fixes both the local
/// calendar and the offset that year boundaries are taken at.
pub fn load_statistics<G: AssetGateway + ?Sized>(
    gateway: &G,
    year: i32,
    now: OffsetDateTime,
) -> Result<StatsSnapshot> {
    let offset: UtcOffset = now.offset();
    let all = logged(
        "load statistics",
        gateway.select(&AssetQuery::all()).context("load all assets"),
    )?;

    let start = Date::from_calendar_date(year, Month::January, 1)
        .with_context(|| format!("invalid statistics year {year}"))?
        .midnight()
        .assume_offset(offset);
    let end = Date::from_calendar_date(year, Month::December, 31)
        .with_context(|| format!("invalid statistics year {year}"))?
        .with_hms_nano(23, 59, 59, 999_999_999)
        .context("end of year")?
        .assume_offset(offset);
    let created_in_year = logged(
        "load statistics",
        gateway
            .select(
                &AssetQuery::all()
                    .filter(Filter::gte(AssetColumn::CreatedAt, start))
                    .filter(Filter::lte(AssetColumn::CreatedAt, end)),
            )
            .with_context(|| format!("load assets created in {year}")),
    )?;

    Ok(StatsSnapshot::build(
        &all.rows,
        &created_in_year.rows,
        year,
        now.date(),
        offset,
    ))
}
