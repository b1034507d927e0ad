// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use repairtrack_app::dates;
use repairtrack_app::{
    Asset, AssetGateway, AssetId, AssetPatch, AssetQuery, AssetStatus, Filter, NewAsset, Page,
    SortDirection,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::debug;
use url::Url;

const COUNT_EXACT: &str = "count=exact";
const RETURN_REPRESENTATION: &str = "return=representation";

/// PostgREST client bound to one table.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    table: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, table: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("gateway.url must not be empty -- set it in the config file");
        }
        Url::parse(&base_url).with_context(|| {
            format!("gateway.url {base_url:?} is not a valid URL -- use https://<project>.supabase.co")
        })?;
        if api_key.trim().is_empty() {
            bail!("gateway.api_key must not be empty -- set it or REPAIRTRACK_GATEWAY_KEY");
        }
        if table.trim().is_empty() {
            bail!("gateway.table must not be empty");
        }

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).context("api key is not a valid header")?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("api key is not a valid header")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = HttpClient::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            table: table.to_owned(),
            http,
        })
    }

    /// Cheapest possible round trip; used by `--check`.
    pub fn ping(&self) -> Result<()> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");
        let response = self.send(self.http.get(url))?;
        let _: Vec<Value> = response.json().context("decode ping response")?;
        Ok(())
    }

    fn table_url(&self) -> Result<Url> {
        Url::parse(&format!("{}/rest/v1/{}", self.base_url, self.table))
            .with_context(|| format!("build URL for table {}", self.table))
    }

    fn filtered_url(&self, filters: &[Filter]) -> Result<Url> {
        let mut url = self.table_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                pairs.append_pair(
                    filter.column.as_str(),
                    &format!("{}.{}", filter.op.as_str(), filter.value.render()?),
                );
            }
        }
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

impl AssetGateway for Client {
    fn select(&self, query: &AssetQuery) -> Result<Page<Asset>> {
        let mut url = self.filtered_url(&query.filters)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if !query.order.is_empty() {
                let order = query
                    .order
                    .iter()
                    .map(|order| {
                        let direction = match order.direction {
                            SortDirection::Asc => "asc",
                            SortDirection::Desc => "desc",
                        };
                        format!("{}.{direction}.nullslast", order.column.as_str())
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.append_pair("order", &order);
            }
            if let Some(range) = query.range {
                pairs.append_pair("offset", &range.offset.to_string());
                pairs.append_pair("limit", &range.limit.to_string());
            }
        }

        debug!(table = %self.table, url = %url, "select");
        let response = self.send(self.http.get(url).header("Prefer", COUNT_EXACT))?;
        let total = response
            .headers()
            .get("Content-Range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        let rows: Vec<AssetRow> = response.json().context("decode asset rows")?;
        let rows = rows
            .into_iter()
            .map(Asset::try_from)
            .collect::<Result<Vec<_>>>()?;

        let offset = query.range.map_or(0, |range| range.offset);
        Ok(Page {
            total: total.unwrap_or(offset + rows.len()),
            rows,
        })
    }

    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        let body = json!([InsertRow::from(asset)]);
        let response = self.send(
            self.http
                .post(self.table_url()?)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&body),
        )?;
        let rows: Vec<AssetRow> = response.json().context("decode inserted asset")?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert returned no rows -- check table permissions"))?;
        Asset::try_from(row)
    }

    fn update(&self, filters: &[Filter], patch: &AssetPatch) -> Result<usize> {
        if filters.is_empty() {
            bail!("refusing to update every asset -- pass at least one filter");
        }
        let body = patch_body(patch)?;
        if body.is_empty() {
            bail!("asset update has no changes -- edit a field and retry");
        }
        let response = self.send(
            self.http
                .patch(self.filtered_url(filters)?)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&Value::Object(body)),
        )?;
        let rows: Vec<Value> = response.json().context("decode updated assets")?;
        Ok(rows.len())
    }

    fn delete(&self, filters: &[Filter]) -> Result<usize> {
        if filters.is_empty() {
            bail!("refusing to delete every asset -- pass at least one filter");
        }
        let response = self.send(
            self.http
                .delete(self.filtered_url(filters)?)
                .header("Prefer", RETURN_REPRESENTATION),
        )?;
        let rows: Vec<Value> = response.json().context("decode deleted assets")?;
        Ok(rows.len())
    }
}

/// Total row count from a `Content-Range` header such as `0-9/57` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<usize> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn patch_body(patch: &AssetPatch) -> Result<Map<String, Value>> {
    let mut body = Map::new();
    if let Some(number) = &patch.asset_number {
        body.insert("asset_number".to_owned(), json!(number));
    }
    if let Some(name) = &patch.name {
        body.insert("name".to_owned(), json!(name));
    }
    if let Some(date) = patch.tracking_date {
        body.insert("tracking_date".to_owned(), json!(dates::format_date(date)));
    }
    if let Some(status) = patch.status {
        body.insert("status".to_owned(), json!(status.as_str()));
    }
    if let Some(completion) = patch.completion_date {
        let value = match completion {
            Some(at) => json!(dates::format_timestamp(at)?),
            None => Value::Null,
        };
        body.insert("completion_date".to_owned(), value);
    }
    if let Some(completed_by) = &patch.completed_by {
        body.insert("completed_by".to_owned(), json!(completed_by));
    }
    Ok(body)
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    asset_number: &'a str,
    name: &'a str,
    tracking_date: String,
    status: &'static str,
}

impl<'a> From<&'a NewAsset> for InsertRow<'a> {
    fn from(asset: &'a NewAsset) -> Self {
        Self {
            asset_number: &asset.asset_number,
            name: &asset.name,
            tracking_date: dates::format_date(asset.tracking_date),
            status: asset.status.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetRow {
    id: i64,
    asset_number: String,
    name: String,
    tracking_date: String,
    status: String,
    completion_date: Option<String>,
    completed_by: Option<String>,
    created_at: String,
}

impl TryFrom<AssetRow> for Asset {
    type Error = anyhow::Error;

    fn try_from(row: AssetRow) -> Result<Self> {
        let status = AssetStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("asset {} has unknown status {:?}", row.id, row.status))?;
        // Timestamp columns sometimes come back for the date column too.
        let tracking_raw = row.tracking_date.get(..10).unwrap_or(&row.tracking_date);
        Ok(Self {
            id: AssetId::new(row.id),
            asset_number: row.asset_number,
            name: row.name,
            tracking_date: dates::parse_date(tracking_raw)?,
            status,
            completion_date: row
                .completion_date
                .as_deref()
                .map(dates::parse_timestamp)
                .transpose()?,
            completed_by: row.completed_by,
            created_at: dates::parse_timestamp(&row.created_at)?,
        })
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [gateway].url and your network ({})",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct RestErrorEnvelope {
    message: Option<String>,
    hint: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<RestErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        if let Some(hint) = parsed.hint
            && !hint.is_empty()
        {
            return anyhow!("server error ({}): {} -- {}", status.as_u16(), message, hint);
        }
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "server rejected credentials ({}) -- check [gateway].api_key",
            status.as_u16()
        );
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{AssetRow, clean_error_response, parse_content_range_total, patch_body};
    use repairtrack_app::{Asset, AssetPatch, AssetStatus};
    use reqwest::StatusCode;
    use serde_json::Value;
    use time::macros::{date, datetime};

    #[test]
    fn content_range_total_is_after_the_slash() {
        assert_eq!(parse_content_range_total("0-9/57"), Some(57));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn reversion_patch_sends_explicit_nulls() {
        let body = patch_body(&AssetPatch::reversion()).expect("patch body");
        assert_eq!(body.get("status"), Some(&Value::from("pending")));
        assert_eq!(body.get("completion_date"), Some(&Value::Null));
        assert_eq!(body.get("completed_by"), Some(&Value::Null));
        assert!(!body.contains_key("name"));
    }

    #[test]
    fn completion_patch_sends_user_and_time() {
        let body = patch_body(&AssetPatch::completion(
            "alice",
            datetime!(2025-03-01 10:00 UTC),
        ))
        .expect("patch body");
        assert_eq!(body.get("completed_by"), Some(&Value::from("alice")));
        assert_eq!(
            body.get("completion_date"),
            Some(&Value::from("2025-03-01T10:00:00Z"))
        );
    }

    #[test]
    fn rows_accept_postgres_timestamp_shapes() {
        let row = AssetRow {
            id: 4,
            asset_number: "A1".to_owned(),
            name: "Drill".to_owned(),
            tracking_date: "2025-03-01T00:00:00".to_owned(),
            status: "completed".to_owned(),
            completion_date: Some("2025-03-02 08:15:00.123+00:00".to_owned()),
            completed_by: Some("alice".to_owned()),
            created_at: "2025-02-27T09:00:00+00:00".to_owned(),
        };
        let asset = Asset::try_from(row).expect("row converts");
        assert_eq!(asset.tracking_date, date!(2025 - 03 - 01));
        assert_eq!(asset.status, AssetStatus::Completed);
        assert!(asset.completion_date.is_some());
    }

    #[test]
    fn error_bodies_reduce_to_one_line() {
        let error = clean_error_response(
            StatusCode::BAD_REQUEST,
            r#"{"code":"PGRST100","message":"failed to parse filter","hint":null}"#,
        );
        assert_eq!(error.to_string(), "server error (400): failed to parse filter");

        let error = clean_error_response(StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("api_key"));
    }
}
