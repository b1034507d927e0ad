// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use repairtrack_app::actions::{self, Mutation, MutationOutcome};
use repairtrack_app::paging::PageRequest;
use repairtrack_app::stats::StatsSnapshot;
use repairtrack_app::{Asset, AssetColumn, AssetGateway, AssetPatch, Filter, Page, dates};
use repairtrack_db::Store;
use repairtrack_remote::Client;
use repairtrack_testkit::AssetFaker;
use repairtrack_tui::{
    AppRuntime, InternalEvent, apply_mutation_now, fetch_page_now, load_statistics_now,
};
use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;
use time::Date;
use tracing::{debug, info, warn};

const DEMO_SEED: u64 = 42;

/// Wires the dashboard to a gateway. Assets live in the remote table when a
/// client is configured and in the local store otherwise; session and theme
/// always stay in the local store.
pub struct GatewayRuntime<'a> {
    store: &'a Store,
    remote: Option<Client>,
    scanner_command: Option<String>,
}

impl<'a> GatewayRuntime<'a> {
    pub fn local(store: &'a Store) -> Self {
        Self {
            store,
            remote: None,
            scanner_command: None,
        }
    }

    pub fn remote(store: &'a Store, client: Client) -> Self {
        Self {
            store,
            remote: Some(client),
            scanner_command: None,
        }
    }

    pub fn with_scanner(mut self, command: Option<&str>) -> Self {
        self.scanner_command = command.map(str::to_owned);
        self
    }

    fn gateway(&self) -> &dyn AssetGateway {
        match &self.remote {
            Some(client) => client as &dyn AssetGateway,
            None => self.store,
        }
    }
}

/// Runs `job` against its own client clone on a named worker thread and
/// posts the resulting event back to the dashboard.
fn spawn_remote<F>(
    client: Client,
    name: &'static str,
    tx: Sender<InternalEvent>,
    job: F,
) -> Result<()>
where
    F: FnOnce(&Client) -> InternalEvent + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            if tx.send(job(&client)).is_err() {
                debug!(worker = name, "result arrived after the dashboard closed");
            }
        })
        .with_context(|| format!("spawn {name} thread"))?;
    Ok(())
}

impl AppRuntime for GatewayRuntime<'_> {
    fn fetch_page(&mut self, request: PageRequest) -> Result<Page<Asset>> {
        actions::fetch_page(self.gateway(), &request)
    }

    fn apply_mutation(&mut self, mutation: &Mutation) -> Result<MutationOutcome> {
        actions::apply_mutation(self.gateway(), mutation)
    }

    fn load_statistics(&mut self, year: i32) -> Result<StatsSnapshot> {
        actions::load_statistics(self.gateway(), year, dates::now())
    }

    // HTTP round trips run on worker threads so the dashboard keeps drawing
    // and reading keys. Local calls stay inline.

    fn spawn_page_fetch(&mut self, request: PageRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let Some(client) = self.remote.clone() else {
            return fetch_page_now(self, request, &tx);
        };
        spawn_remote(client, "page-fetch", tx, move |client| {
            let result =
                actions::fetch_page(client, &request).map_err(|error| format!("{error:#}"));
            InternalEvent::PageLoaded { request, result }
        })
    }

    fn spawn_mutation(&mut self, mutation: Mutation, tx: Sender<InternalEvent>) -> Result<()> {
        let Some(client) = self.remote.clone() else {
            return apply_mutation_now(self, mutation, &tx);
        };
        spawn_remote(client, "mutation", tx, move |client| {
            let result =
                actions::apply_mutation(client, &mutation).map_err(|error| format!("{error:#}"));
            InternalEvent::MutationDone { mutation, result }
        })
    }

    fn spawn_statistics_load(&mut self, year: i32, tx: Sender<InternalEvent>) -> Result<()> {
        let Some(client) = self.remote.clone() else {
            return load_statistics_now(self, year, &tx);
        };
        let now = dates::now();
        spawn_remote(client, "statistics", tx, move |client| {
            let result = actions::load_statistics(client, year, now)
                .map_err(|error| format!("{error:#}"));
            InternalEvent::StatsLoaded { year, result }
        })
    }

    fn save_session_user(&mut self, user: Option<&str>) -> Result<()> {
        match user {
            Some(user) => self.store.put_session_user(user),
            None => self.store.clear_session_user(),
        }
    }

    fn save_dark_mode(&mut self, dark: bool) -> Result<()> {
        self.store.put_dark_mode(dark)
    }

    fn scan_asset_code(&mut self) -> Result<String> {
        let Some(command) = self.scanner_command.as_deref() else {
            bail!("no scanner configured -- set [scanner].command and retry");
        };
        run_scanner(command)
    }
}

/// Runs the scanner command and returns the first non-empty line it prints.
pub fn run_scanner(command: &str) -> Result<String> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("scanner command is blank -- set [scanner].command and retry");
    };

    let output = Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("run scanner {program:?} -- check [scanner].command"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.lines().find(|line| !line.trim().is_empty());
        warn!(program, status = %output.status, "scanner failed");
        match reason {
            Some(reason) => bail!("scanner {program:?} failed ({}): {}", output.status, reason.trim()),
            None => bail!("scanner {program:?} failed ({})", output.status),
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(code) => {
            info!(program, "asset code scanned");
            Ok(code.to_owned())
        }
        None => bail!("scanner {program:?} returned no code -- hold the code in view and retry"),
    }
}

/// Fills an empty store with generated assets for `--demo`. About a third
/// of them are seeded as completed.
pub fn seed_demo_data(store: &Store, today: Date, count: usize) -> Result<usize> {
    let mut faker = AssetFaker::new(DEMO_SEED);
    for _ in 0..count {
        let fake = faker.asset(today);
        let created = store
            .insert_at(&fake.asset, fake.created_at)
            .context("seed demo asset")?;
        if let Some((at, operator)) = fake.completed {
            store
                .update(
                    &[Filter::eq(AssetColumn::Id, created.id)],
                    &AssetPatch::completion(operator, at),
                )
                .context("seed demo completion")?;
        }
    }
    info!(count, "demo data seeded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::{GatewayRuntime, run_scanner, seed_demo_data};
    use anyhow::{Result, anyhow};
    use repairtrack_app::actions::{Mutation, MutationOutcome, SubmitOutcome};
    use repairtrack_app::forms::FormPayload;
    use repairtrack_app::paging::AssetFeed;
    use repairtrack_app::{AssetGateway, AssetQuery, AssetStatus, NewAsset};
    use repairtrack_db::Store;
    use repairtrack_remote::Client;
    use repairtrack_testkit::fixture_datetime;
    use repairtrack_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use time::macros::date;
    use tiny_http::{Header, Response, Server};

    fn store() -> Result<Store> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        Ok(store)
    }

    #[test]
    fn local_runtime_round_trips_through_the_store() -> Result<()> {
        let store = store()?;
        let mut runtime = GatewayRuntime::local(&store);

        let payload = FormPayload::Create(NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)));
        let submit = Mutation::Submit {
            payload,
            check_duplicates: true,
        };
        let MutationOutcome::Submitted(SubmitOutcome::Created(created)) =
            runtime.apply_mutation(&submit)?
        else {
            return Err(anyhow!("create should report Created"));
        };
        runtime.apply_mutation(&Mutation::Complete {
            id: created.id,
            user: "alice".to_owned(),
            at: fixture_datetime(),
        })?;
        assert_eq!(store.get_asset(created.id)?.status, AssetStatus::Completed);

        runtime.apply_mutation(&Mutation::Revert(created.id))?;
        assert_eq!(store.get_asset(created.id)?.completed_by, None);

        let mut feed = AssetFeed::new();
        let request = feed.invalidate().ok_or_else(|| anyhow!("feed should load"))?;
        let page = runtime.fetch_page(request)?;
        assert_eq!(page.total, 1);

        runtime.apply_mutation(&Mutation::Delete(created.id))?;
        assert_eq!(store.select(&AssetQuery::all())?.total, 0);
        Ok(())
    }

    #[test]
    fn session_and_theme_persist_in_the_store() -> Result<()> {
        let store = store()?;
        let mut runtime = GatewayRuntime::local(&store);

        runtime.save_session_user(Some("alice"))?;
        runtime.save_dark_mode(true)?;
        assert_eq!(store.session_user()?.as_deref(), Some("alice"));
        assert_eq!(store.dark_mode()?, Some(true));

        runtime.save_session_user(None)?;
        assert_eq!(store.session_user()?, None);
        Ok(())
    }

    #[test]
    fn local_page_fetch_reports_inline() -> Result<()> {
        let store = store()?;
        store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;
        let mut runtime = GatewayRuntime::local(&store);

        let (tx, rx) = mpsc::channel();
        let request = AssetFeed::new()
            .invalidate()
            .ok_or_else(|| anyhow!("feed should load"))?;
        runtime.spawn_page_fetch(request, tx)?;

        let InternalEvent::PageLoaded { result, .. } = rx.try_recv()? else {
            return Err(anyhow!("expected a page event"));
        };
        assert_eq!(result.map_err(anyhow::Error::msg)?.rows.len(), 1);
        Ok(())
    }

    #[test]
    fn remote_page_fetch_arrives_from_a_worker_thread() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            let response = Response::from_string(
                r#"[{"id":7,"asset_number":"R7","name":"Lamp","tracking_date":"2025-04-02","status":"pending","completion_date":null,"completed_by":null,"created_at":"2025-03-30T08:00:00+00:00"}]"#,
            )
            .with_header(Header::from_bytes("Content-Range", "0-0/1").expect("valid header"));
            request.respond(response).expect("response should succeed");
        });

        let store = store()?;
        let client = Client::new(&addr, "anon-key", "assets", Duration::from_secs(2))?;
        let mut runtime = GatewayRuntime::remote(&store, client);

        let (tx, rx) = mpsc::channel();
        let request = AssetFeed::new()
            .invalidate()
            .ok_or_else(|| anyhow!("feed should load"))?;
        runtime.spawn_page_fetch(request, tx)?;

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        let InternalEvent::PageLoaded { request: echoed, result } = event else {
            return Err(anyhow!("expected a page event"));
        };
        assert_eq!(echoed, request);
        let page = result.map_err(anyhow::Error::msg)?;
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].asset_number, "R7");
        assert_eq!(store.select(&AssetQuery::all())?.total, 0, "assets stay remote");
        Ok(())
    }

    #[test]
    fn remote_mutation_arrives_from_a_worker_thread() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            let method = request.method().to_string();
            let url = request.url().to_owned();
            let response = Response::from_string(
                r#"[{"id":7,"asset_number":"R7","name":"Lamp","tracking_date":"2025-04-02","status":"pending","completion_date":null,"completed_by":null,"created_at":"2025-03-30T08:00:00+00:00"}]"#,
            );
            request.respond(response).expect("response should succeed");
            (method, url)
        });

        let store = store()?;
        let client = Client::new(&addr, "anon-key", "assets", Duration::from_secs(2))?;
        let mut runtime = GatewayRuntime::remote(&store, client);

        let (tx, rx) = mpsc::channel();
        let id = repairtrack_app::AssetId::new(7);
        runtime.spawn_mutation(Mutation::Revert(id), tx)?;

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        let (method, url) = handle.join().map_err(|_| anyhow!("server thread panicked"))?;
        assert_eq!(method, "PATCH");
        assert!(url.contains("id=eq.7"), "url = {url}");
        let InternalEvent::MutationDone { mutation, result } = event else {
            return Err(anyhow!("expected a mutation event"));
        };
        assert_eq!(mutation, Mutation::Revert(id));
        assert_eq!(result.map_err(anyhow::Error::msg)?, MutationOutcome::Reverted(id));
        Ok(())
    }

    #[test]
    fn local_statistics_load_reports_inline() -> Result<()> {
        let store = store()?;
        store.insert(&NewAsset::pending("A1", "Drill", date!(2025 - 03 - 01)))?;
        let mut runtime = GatewayRuntime::local(&store);

        let (tx, rx) = mpsc::channel();
        runtime.spawn_statistics_load(2025, tx)?;
        let InternalEvent::StatsLoaded { year, result } = rx.try_recv()? else {
            return Err(anyhow!("expected a statistics event"));
        };
        assert_eq!(year, 2025);
        assert_eq!(result.map_err(anyhow::Error::msg)?.total, 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn scanner_returns_first_non_empty_line() -> Result<()> {
        assert_eq!(run_scanner("echo QR-77")?, "QR-77");

        let error = run_scanner("false").expect_err("failing scanner should error");
        assert!(error.to_string().contains("failed"));
        Ok(())
    }

    #[test]
    fn missing_scanner_is_actionable() -> Result<()> {
        let store = store()?;
        let mut runtime = GatewayRuntime::local(&store).with_scanner(None);
        let error = runtime
            .scan_asset_code()
            .expect_err("no scanner configured");
        assert!(error.to_string().contains("[scanner].command"));

        let error = run_scanner("repairtrack-no-such-scanner").expect_err("missing program");
        assert!(format!("{error:#}").contains("[scanner].command"));
        Ok(())
    }

    #[test]
    fn demo_seed_mixes_pending_and_completed() -> Result<()> {
        let store = store()?;
        seed_demo_data(&store, date!(2026 - 06 - 15), 30)?;

        let rows = store.select(&AssetQuery::all())?.rows;
        assert_eq!(rows.len(), 30);
        let completed = rows.iter().filter(|asset| asset.is_completed()).count();
        assert!(completed > 0 && completed < 30, "completed = {completed}");
        assert!(
            rows.iter()
                .filter(|asset| asset.is_completed())
                .all(|asset| asset.completion_date.is_some() && asset.completed_by.is_some())
        );
        Ok(())
    }
}
