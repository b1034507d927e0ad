// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use repairtrack_app::dates;
use repairtrack_app::{
    Asset, AssetGateway, AssetId, AssetPatch, AssetQuery, AssetStatus, Filter, FilterValue,
    NewAsset, Page, SettingKey, SettingValue, SortDirection,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

pub const APP_NAME: &str = "repairtrack";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "assets",
        &[
            "id",
            "asset_number",
            "name",
            "tracking_date",
            "status",
            "completion_date",
            "completed_by",
            "created_at",
        ],
    ),
    ("settings", &["key", "value", "updated_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_assets_tracking_date_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_assets_tracking_date_id ON assets (tracking_date, id);",
    },
    RequiredIndex {
        name: "idx_assets_asset_number",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_assets_asset_number ON assets (asset_number);",
    },
    RequiredIndex {
        name: "idx_assets_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_assets_created_at ON assets (created_at);",
    },
];

const ASSET_COLUMNS: &str = "id, asset_number, name, tracking_date, status, completion_date, completed_by, created_at";

/// Local SQLite table with the same select/insert/update/delete surface as the
/// hosted REST table.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created asset schema");
        }

        ensure_required_indexes(&self.conn)
    }

    /// Inserts with an explicit creation time; used when seeding history.
    pub fn insert_at(&self, asset: &NewAsset, created_at: OffsetDateTime) -> Result<Asset> {
        self.conn
            .execute(
                "
                INSERT INTO assets (
                  asset_number, name, tracking_date, status, created_at
                ) VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    asset.asset_number,
                    asset.name,
                    dates::format_date(asset.tracking_date),
                    asset.status.as_str(),
                    format_stored_timestamp(created_at)?,
                ],
            )
            .with_context(|| format!("insert asset {}", asset.asset_number))?;

        self.get_asset(AssetId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_asset(&self, id: AssetId) -> Result<Asset> {
        self.conn
            .query_row(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?"),
                params![id.get()],
                asset_from_row,
            )
            .optional()
            .with_context(|| format!("load asset {id}"))?
            .ok_or_else(|| anyhow!("asset {id} not found -- refresh the list and retry"))
    }

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting {key}"))
    }

    fn put_setting_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = format_stored_timestamp(OffsetDateTime::now_utc())?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert setting {key}"))?;
        Ok(())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        let raw = self.get_setting_raw(key.as_str())?;
        raw.map(|value| {
            SettingValue::parse_for_key(key, &value).ok_or_else(|| {
                anyhow!(
                    "setting `{}` has invalid value `{}`; run `repairtrack --check`, then toggle it again",
                    key.as_str(),
                    value
                )
            })
        })
        .transpose()
    }

    pub fn put_setting(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        let raw = value.to_storage(key).ok_or_else(|| {
            anyhow!(
                "setting `{}` expected {:?} value",
                key.as_str(),
                key.expected_value_kind()
            )
        })?;
        self.put_setting_raw(key.as_str(), &raw)
    }

    pub fn delete_setting(&self, key: SettingKey) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", params![key.as_str()])
            .with_context(|| format!("delete setting {}", key.as_str()))?;
        Ok(())
    }

    /// The remembered session user. A blank stored value counts as logged out.
    pub fn session_user(&self) -> Result<Option<String>> {
        match self.get_setting(SettingKey::SessionUser)? {
            Some(SettingValue::Text(user)) if !user.trim().is_empty() => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub fn put_session_user(&self, user: &str) -> Result<()> {
        let trimmed = user.trim();
        if trimmed.is_empty() {
            bail!("username is required -- enter a name and retry");
        }
        self.put_setting(SettingKey::SessionUser, SettingValue::Text(trimmed.to_owned()))
    }

    pub fn clear_session_user(&self) -> Result<()> {
        self.delete_setting(SettingKey::SessionUser)
    }

    pub fn dark_mode(&self) -> Result<Option<bool>> {
        match self.get_setting(SettingKey::UiDarkMode)? {
            Some(SettingValue::Bool(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn put_dark_mode(&self, enabled: bool) -> Result<()> {
        self.put_setting(SettingKey::UiDarkMode, SettingValue::Bool(enabled))
    }
}

impl AssetGateway for Store {
    fn select(&self, query: &AssetQuery) -> Result<Page<Asset>> {
        let (clause, filter_params) = where_clause(&query.filters)?;

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM assets{clause}"),
                params_from_iter(filter_params.iter()),
                |row| row.get(0),
            )
            .context("count assets")?;

        let mut sql = format!("SELECT {ASSET_COLUMNS} FROM assets{clause}");
        sql.push_str(&order_clause(query));
        let mut select_params = filter_params;
        if let Some(range) = query.range {
            sql.push_str(" LIMIT ? OFFSET ?");
            select_params.push(Value::Integer(
                i64::try_from(range.limit).context("page limit out of range")?,
            ));
            select_params.push(Value::Integer(
                i64::try_from(range.offset).context("page offset out of range")?,
            ));
        }

        let mut stmt = self.conn.prepare(&sql).context("prepare assets query")?;
        let rows = stmt
            .query_map(params_from_iter(select_params.iter()), asset_from_row)
            .context("query assets")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect assets")?;

        debug!(rows = rows.len(), total, "selected assets");
        Ok(Page {
            rows,
            total: usize::try_from(total).context("negative asset count")?,
        })
    }

    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        self.insert_at(asset, OffsetDateTime::now_utc())
    }

    fn update(&self, filters: &[Filter], patch: &AssetPatch) -> Result<usize> {
        if filters.is_empty() {
            bail!("refusing to update every asset -- pass at least one filter");
        }
        let (assignments, mut values) = patch_assignments(patch)?;
        if assignments.is_empty() {
            bail!("asset update has no changes -- edit a field and retry");
        }
        let (clause, filter_params) = where_clause(filters)?;
        values.extend(filter_params);

        let sql = format!("UPDATE assets SET {}{clause}", assignments.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .context("update assets")
    }

    fn delete(&self, filters: &[Filter]) -> Result<usize> {
        if filters.is_empty() {
            bail!("refusing to delete every asset -- pass at least one filter");
        }
        let (clause, filter_params) = where_clause(filters)?;
        self.conn
            .execute(
                &format!("DELETE FROM assets{clause}"),
                params_from_iter(filter_params.iter()),
            )
            .context("delete assets")
    }
}

fn where_clause(filters: &[Filter]) -> Result<(String, Vec<Value>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut terms = Vec::with_capacity(filters.len());
    let mut values = Vec::with_capacity(filters.len());
    for filter in filters {
        terms.push(format!("{} {} ?", filter.column.as_str(), filter.op.sql()));
        values.push(filter_param(&filter.value)?);
    }
    Ok((format!(" WHERE {}", terms.join(" AND ")), values))
}

fn order_clause(query: &AssetQuery) -> String {
    if query.order.is_empty() {
        return " ORDER BY id ASC".to_owned();
    }
    let terms = query
        .order
        .iter()
        .map(|order| {
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {direction} NULLS LAST", order.column.as_str())
        })
        .collect::<Vec<_>>();
    format!(" ORDER BY {}", terms.join(", "))
}

fn patch_assignments(patch: &AssetPatch) -> Result<(Vec<&'static str>, Vec<Value>)> {
    let mut assignments = Vec::new();
    let mut values = Vec::new();
    if let Some(number) = &patch.asset_number {
        assignments.push("asset_number = ?");
        values.push(Value::Text(number.clone()));
    }
    if let Some(name) = &patch.name {
        assignments.push("name = ?");
        values.push(Value::Text(name.clone()));
    }
    if let Some(date) = patch.tracking_date {
        assignments.push("tracking_date = ?");
        values.push(Value::Text(dates::format_date(date)));
    }
    if let Some(status) = patch.status {
        assignments.push("status = ?");
        values.push(Value::Text(status.as_str().to_owned()));
    }
    if let Some(completion) = patch.completion_date {
        assignments.push("completion_date = ?");
        values.push(match completion {
            Some(at) => Value::Text(format_stored_timestamp(at)?),
            None => Value::Null,
        });
    }
    if let Some(completed_by) = &patch.completed_by {
        assignments.push("completed_by = ?");
        values.push(completed_by.clone().map_or(Value::Null, Value::Text));
    }
    Ok((assignments, values))
}

fn filter_param(value: &FilterValue) -> Result<Value> {
    Ok(match value {
        FilterValue::Int(value) => Value::Integer(*value),
        FilterValue::Text(value) => Value::Text(value.clone()),
        FilterValue::Date(value) => Value::Text(dates::format_date(*value)),
        FilterValue::Timestamp(value) => Value::Text(format_stored_timestamp(*value)?),
    })
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let status_raw: String = row.get(4)?;
    let status = AssetStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown asset status {status_raw}"),
            )),
        )
    })?;

    let tracking_raw: String = row.get(3)?;
    let completion_raw: Option<String> = row.get(5)?;
    let created_raw: String = row.get(7)?;

    Ok(Asset {
        id: AssetId::new(row.get(0)?),
        asset_number: row.get(1)?,
        name: row.get(2)?,
        tracking_date: dates::parse_date(&tracking_raw).map_err(to_sql_error)?,
        status,
        completion_date: completion_raw
            .as_deref()
            .map(dates::parse_timestamp)
            .transpose()
            .map_err(to_sql_error)?,
        completed_by: row.get(6)?,
        created_at: dates::parse_timestamp(&created_raw).map_err(to_sql_error)?,
    })
}

/// Timestamps are stored as fixed-width UTC text so range filters can compare
/// them lexically.
fn format_stored_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .context("format stored timestamp")
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("REPAIRTRACK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set REPAIRTRACK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("repairtrack.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point --config at a repairtrack database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; move the old database aside and relaunch",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!("database is missing required indexes: {}", missing.join(", "));
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
