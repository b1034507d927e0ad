// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use repairtrack_app::actions::{Mutation, MutationOutcome, SubmitOutcome};
use repairtrack_app::dates;
use repairtrack_app::forms::{FormField, FormState, QuickDate, SuggestionPool};
use repairtrack_app::listing::visible_assets;
use repairtrack_app::paging::{AssetFeed, PageRequest};
use repairtrack_app::stats::StatsSnapshot;
use repairtrack_app::suggest::{SuggestKey, SuggestOutcome};
use repairtrack_app::{
    AppCommand, AppContext, AppMode, AppState, Asset, AssetColumn, AssetId, FormKind, Page,
    TabKind, Theme,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Date, OffsetDateTime};

/// Rows from the end of the visible list at which the next page is requested.
const SENTINEL_ROWS: usize = 5;
const HEADER_ROWS: u16 = 3;
const STATUS_ROWS: u16 = 3;
/// Table border plus header line.
const TABLE_CHROME_ROWS: u16 = 3;

/// Everything the dashboard needs from the outside world.
///
/// Gateway work is started through the `spawn_*` methods and answered over
/// the internal channel. The defaults run inline; runtimes backed by a slow
/// gateway override them to work off the UI thread.
pub trait AppRuntime {
    fn fetch_page(&mut self, request: PageRequest) -> Result<Page<Asset>>;
    fn apply_mutation(&mut self, mutation: &Mutation) -> Result<MutationOutcome>;
    fn load_statistics(&mut self, year: i32) -> Result<StatsSnapshot>;
    fn save_session_user(&mut self, user: Option<&str>) -> Result<()>;
    fn save_dark_mode(&mut self, dark: bool) -> Result<()>;
    /// Runs the external scanner and returns the decoded text.
    fn scan_asset_code(&mut self) -> Result<String>;

    fn spawn_page_fetch(&mut self, request: PageRequest, tx: Sender<InternalEvent>) -> Result<()> {
        fetch_page_now(self, request, &tx)
    }

    fn spawn_mutation(&mut self, mutation: Mutation, tx: Sender<InternalEvent>) -> Result<()> {
        apply_mutation_now(self, mutation, &tx)
    }

    fn spawn_statistics_load(&mut self, year: i32, tx: Sender<InternalEvent>) -> Result<()> {
        load_statistics_now(self, year, &tx)
    }
}

pub fn fetch_page_now<R: AppRuntime + ?Sized>(
    runtime: &mut R,
    request: PageRequest,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let result = runtime
        .fetch_page(request)
        .map_err(|error| format!("{error:#}"));
    tx.send(InternalEvent::PageLoaded { request, result })
        .map_err(|_| anyhow!("page event channel closed"))
}

pub fn apply_mutation_now<R: AppRuntime + ?Sized>(
    runtime: &mut R,
    mutation: Mutation,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let result = runtime
        .apply_mutation(&mutation)
        .map_err(|error| format!("{error:#}"));
    tx.send(InternalEvent::MutationDone { mutation, result })
        .map_err(|_| anyhow!("mutation event channel closed"))
}

pub fn load_statistics_now<R: AppRuntime + ?Sized>(
    runtime: &mut R,
    year: i32,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let result = runtime
        .load_statistics(year)
        .map_err(|error| format!("{error:#}"));
    tx.send(InternalEvent::StatsLoaded { year, result })
        .map_err(|_| anyhow!("statistics event channel closed"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    PageLoaded {
        request: PageRequest,
        result: std::result::Result<Page<Asset>, String>,
    },
    MutationDone {
        mutation: Mutation,
        result: std::result::Result<MutationOutcome, String>,
    },
    StatsLoaded {
        year: i32,
        result: std::result::Result<StatsSnapshot, String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LoginUiState {
    input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alert {
    title: String,
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingDelete {
    id: AssetId,
    label: String,
}

#[derive(Debug, Clone, PartialEq)]
enum StatsView {
    NotLoaded,
    Loading,
    Loaded(StatsSnapshot),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    today: Date,
    feed: AssetFeed,
    selected: usize,
    viewport_rows: usize,
    load_failed: bool,
    form: Option<FormState>,
    login: Option<LoginUiState>,
    alert: Option<Alert>,
    pending_delete: Option<PendingDelete>,
    /// Label of the write awaiting its gateway round trip. One at a time.
    in_flight: Option<String>,
    help_visible: bool,
    stats: StatsView,
    status_token: u64,
}

impl ViewData {
    fn new(today: Date, logged_in: bool) -> Self {
        Self {
            today,
            feed: AssetFeed::new(),
            selected: 0,
            viewport_rows: 10,
            load_failed: false,
            form: None,
            login: (!logged_in).then(LoginUiState::default),
            alert: None,
            pending_delete: None,
            in_flight: None,
            help_visible: false,
            stats: StatsView::NotLoaded,
            status_token: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    fg: Color,
    bg: Color,
    accent: Color,
    muted: Color,
    selected_bg: Color,
    status: Color,
    alert: Color,
}

const fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            fg: Color::Black,
            bg: Color::White,
            accent: Color::Blue,
            muted: Color::Gray,
            selected_bg: Color::LightBlue,
            status: Color::Magenta,
            alert: Color::Red,
        },
        Theme::Dark => Palette {
            fg: Color::White,
            bg: Color::Black,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selected_bg: Color::DarkGray,
            status: Color::Yellow,
            alert: Color::LightRed,
        },
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(dates::today(), context.is_logged_in());
    let (internal_tx, internal_rx) = mpsc::channel();

    if context.is_logged_in() {
        request_page(state, runtime, &mut view_data, &internal_tx, true);
    }

    let mut result = Ok(());
    loop {
        view_data.today = dates::today();
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        match terminal.size() {
            Ok(size) => view_data.viewport_rows = body_rows(size.height),
            Err(error) => {
                result = Err(error).context("read terminal size");
                break;
            }
        }
        maybe_load_more(state, context, runtime, &mut view_data, &internal_tx);

        let now = dates::now();
        if let Err(error) = terminal.draw(|frame| render(frame, state, context, &view_data, now)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(200)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, context, runtime, &mut view_data, &internal_tx, key)
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn body_rows(height: u16) -> usize {
    usize::from(height.saturating_sub(HEADER_ROWS + STATUS_ROWS + TABLE_CHROME_ROWS)).max(1)
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::PageLoaded { request, result } => {
                let outcome = view_data
                    .feed
                    .finish(request, result.map_err(anyhow::Error::msg));
                match outcome {
                    Ok(()) => view_data.load_failed = false,
                    Err(error) => {
                        view_data.load_failed = true;
                        emit_status(state, view_data, tx, format!("load failed: {error:#}"));
                    }
                }
                if let Some(next) = view_data.feed.take_resync() {
                    dispatch_page_fetch(state, runtime, view_data, tx, next);
                }
                clamp_selection(state, view_data);
            }
            InternalEvent::MutationDone { mutation, result } => {
                let label = view_data.in_flight.take().unwrap_or_default();
                match result {
                    Ok(outcome) => finish_mutation(state, runtime, view_data, tx, outcome, &label),
                    Err(error) => show_alert(
                        view_data,
                        format!("{} failed", mutation.operation()),
                        error,
                    ),
                }
            }
            InternalEvent::StatsLoaded { result, .. } => {
                view_data.stats = match result {
                    Ok(snapshot) => StatsView::Loaded(snapshot),
                    Err(error) => StatsView::Failed(error),
                };
            }
        }
    }
}

/// Applies a successful write to the view, then resyncs the list so the
/// change shows up.
fn finish_mutation<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    outcome: MutationOutcome,
    label: &str,
) {
    match outcome {
        MutationOutcome::Submitted(SubmitOutcome::Reported(asset)) => {
            let today = view_data.today;
            if let Some(form) = view_data.form.as_mut()
                && form.kind == FormKind::Report
            {
                form.clear(today);
            }
            show_alert(
                view_data,
                "reported",
                format!("asset {} reported", asset_label(&asset)),
            );
        }
        MutationOutcome::Submitted(SubmitOutcome::Created(asset)) => {
            close_form(state, view_data);
            emit_status(state, view_data, tx, format!("created {}", asset_label(&asset)));
        }
        MutationOutcome::Submitted(SubmitOutcome::Updated(id)) => {
            close_form(state, view_data);
            emit_status(state, view_data, tx, format!("updated asset {id}"));
        }
        MutationOutcome::Completed(_) => {
            emit_status(state, view_data, tx, format!("completed {label}"));
        }
        MutationOutcome::Reverted(_) => {
            emit_status(state, view_data, tx, format!("reverted {label}"));
        }
        MutationOutcome::Deleted(_) => {
            emit_status(state, view_data, tx, format!("deleted {label}"));
        }
    }
    request_page(state, runtime, view_data, tx, true);
}

/// Hands a write to the runtime unless another one is still in flight.
fn start_mutation<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    mutation: Mutation,
    label: String,
) {
    if let Some(busy) = &view_data.in_flight {
        let message = format!("still saving {busy}; try again when it finishes");
        emit_status(state, view_data, tx, message);
        return;
    }
    let operation = mutation.operation();
    view_data.in_flight = Some(label);
    if let Err(error) = runtime.spawn_mutation(mutation, tx.clone()) {
        view_data.in_flight = None;
        show_alert(view_data, format!("{operation} failed"), format!("{error:#}"));
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn show_alert(view_data: &mut ViewData, title: impl Into<String>, message: impl Into<String>) {
    view_data.alert = Some(Alert {
        title: title.into(),
        message: message.into(),
    });
}

/// Starts a page load through the feed. `reset` drops the accumulated list
/// and reloads from the first page.
fn request_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    reset: bool,
) {
    let request = if reset {
        view_data.feed.invalidate()
    } else {
        view_data.feed.load_next_page(false)
    };
    if let Some(request) = request {
        dispatch_page_fetch(state, runtime, view_data, tx, request);
    }
}

fn dispatch_page_fetch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    request: PageRequest,
) {
    if let Err(error) = runtime.spawn_page_fetch(request, tx.clone()) {
        view_data.load_failed = true;
        let message = format!("load failed: {error:#}");
        // `finish` hands the same error back; the message above already carries it.
        let _ = view_data.feed.finish(request, Err(error));
        emit_status(state, view_data, tx, message);
    }
}

fn sentinel_visible(visible_len: usize, selected: usize, viewport_rows: usize) -> bool {
    visible_len < viewport_rows.max(1) || selected + SENTINEL_ROWS >= visible_len
}

fn maybe_load_more<R: AppRuntime>(
    state: &mut AppState,
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if !context.is_logged_in()
        || state.active_tab != TabKind::Assets
        || view_data.load_failed
        || view_data.feed.is_loading()
        || !view_data.feed.has_more()
    {
        return;
    }
    let visible = visible_rows(state, view_data).len();
    if sentinel_visible(visible, view_data.selected, view_data.viewport_rows) {
        request_page(state, runtime, view_data, tx, false);
    }
}

fn visible_rows<'a>(state: &AppState, view_data: &'a ViewData) -> Vec<&'a Asset> {
    visible_assets(
        view_data.feed.items(),
        &state.filter,
        &state.sort,
        view_data.today,
    )
}

fn selected_asset(state: &AppState, view_data: &ViewData) -> Option<Asset> {
    visible_rows(state, view_data)
        .get(view_data.selected)
        .map(|asset| (*asset).clone())
}

fn clamp_selection(state: &AppState, view_data: &mut ViewData) {
    let len = visible_rows(state, view_data).len();
    view_data.selected = view_data.selected.min(len.saturating_sub(1));
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    if control && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return true;
    }

    if view_data.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            view_data.alert = None;
        }
        return false;
    }

    if view_data.login.is_some() {
        handle_login_key(state, context, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.pending_delete.is_some() {
        handle_delete_confirm_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match state.mode {
        AppMode::Form(_) => {
            handle_form_key(state, context, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Search => {
            handle_search_key(state, view_data, key);
            false
        }
        AppMode::Nav => handle_nav_key(state, context, runtime, view_data, internal_tx, key),
    }
}

fn handle_login_key<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(login) = view_data.login.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            login.input.push(ch);
        }
        KeyCode::Backspace => {
            login.input.pop();
        }
        KeyCode::Enter => {
            let input = login.input.clone();
            let user = match context.login(&input) {
                Ok(user) => user.to_owned(),
                Err(error) => {
                    show_alert(view_data, "login failed", format!("{error:#}"));
                    return;
                }
            };
            view_data.login = None;
            match runtime.save_session_user(Some(&user)) {
                Ok(()) => emit_status(state, view_data, internal_tx, format!("logged in as {user}")),
                Err(error) => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("logged in as {user}; session not saved: {error:#}"),
                ),
            }
            view_data.load_failed = false;
            request_page(state, runtime, view_data, internal_tx, true);
        }
        _ => {}
    }
}

fn handle_delete_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(pending) = view_data.pending_delete.clone() else {
        return;
    };
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            view_data.pending_delete = None;
            start_mutation(
                state,
                runtime,
                view_data,
                internal_tx,
                Mutation::Delete(pending.id),
                pending.label,
            );
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.pending_delete = None;
            emit_status(state, view_data, internal_tx, "delete cancelled");
        }
        _ => {}
    }
}

fn handle_search_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            state.dispatch(AppCommand::ClearSearch);
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            state.dispatch(AppCommand::SearchBackspace);
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.dispatch(AppCommand::SearchInput(ch));
        }
        _ => return,
    }
    view_data.selected = 0;
    clamp_selection(state, view_data);
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => {
            state.dispatch(AppCommand::NextTab);
            on_tab_changed(state, context, runtime, view_data, internal_tx);
        }
        KeyCode::BackTab => {
            state.dispatch(AppCommand::PrevTab);
            on_tab_changed(state, context, runtime, view_data, internal_tx);
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('D') => toggle_theme(state, context, runtime, view_data, internal_tx),
        KeyCode::Char('L') => logout(state, context, runtime, view_data, internal_tx),
        KeyCode::Char('R') => {
            if state.active_tab == TabKind::Statistics {
                load_statistics(context, runtime, view_data, internal_tx);
            } else {
                view_data.load_failed = false;
                request_page(state, runtime, view_data, internal_tx, true);
                emit_status(state, view_data, internal_tx, "reloading");
            }
        }
        KeyCode::Char('p') => {
            let form = FormState::new(FormKind::Report, view_data.today);
            open_form(state, view_data, form);
        }
        _ if state.active_tab == TabKind::Assets => {
            handle_assets_key(state, context, runtime, view_data, internal_tx, key);
        }
        _ => {}
    }
    false
}

fn handle_assets_key<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_selection(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_selection(state, view_data, -1),
        KeyCode::Char('g') | KeyCode::Home => view_data.selected = 0,
        KeyCode::Char('G') | KeyCode::End => {
            view_data.selected = visible_rows(state, view_data).len().saturating_sub(1);
        }
        KeyCode::Char('/') => {
            state.dispatch(AppCommand::EnterSearch);
        }
        KeyCode::Esc => {
            if !state.filter.query.is_empty() {
                state.dispatch(AppCommand::ClearSearch);
                clamp_selection(state, view_data);
            }
        }
        KeyCode::Char('f') => {
            state.dispatch(AppCommand::ToggleTomorrow);
            view_data.selected = 0;
        }
        KeyCode::Char('v') => {
            state.dispatch(AppCommand::ToggleShowAll);
            view_data.selected = 0;
        }
        KeyCode::Char('0') => {
            state.dispatch(AppCommand::ClearSort);
        }
        KeyCode::Char(digit @ '1'..='6') => {
            let index = usize::from(digit as u8 - b'1');
            if let Some(column) = AssetColumn::SORTABLE.get(index) {
                state.dispatch(AppCommand::SortBy(*column));
            }
        }
        KeyCode::Char('n') => {
            let form = FormState::new(FormKind::Create, view_data.today);
            open_form(state, view_data, form);
        }
        KeyCode::Char('e') => match selected_asset(state, view_data) {
            Some(asset) => open_form(state, view_data, FormState::for_edit(&asset)),
            None => emit_status(state, view_data, internal_tx, "no asset selected"),
        },
        KeyCode::Char('c') => complete_selected(state, context, runtime, view_data, internal_tx),
        KeyCode::Char('r') => revert_selected(state, runtime, view_data, internal_tx),
        KeyCode::Char('d') => match selected_asset(state, view_data) {
            Some(asset) => {
                view_data.pending_delete = Some(PendingDelete {
                    id: asset.id,
                    label: asset_label(&asset),
                });
            }
            None => emit_status(state, view_data, internal_tx, "no asset selected"),
        },
        _ => {}
    }
    clamp_selection(state, view_data);
}

fn move_selection(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = visible_rows(state, view_data).len();
    if len == 0 {
        view_data.selected = 0;
        return;
    }
    let next = view_data.selected.saturating_add_signed(delta);
    view_data.selected = next.min(len - 1);
}

fn asset_label(asset: &Asset) -> String {
    format!("{} {}", asset.asset_number, asset.name)
}

fn on_tab_changed<R: AppRuntime>(
    state: &AppState,
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if state.active_tab == TabKind::Statistics {
        load_statistics(context, runtime, view_data, tx);
    }
}

fn load_statistics<R: AppRuntime>(
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if view_data.stats == StatsView::Loading {
        return;
    }
    view_data.stats = StatsView::Loading;
    if let Err(error) = runtime.spawn_statistics_load(context.stats_year, tx.clone()) {
        view_data.stats = StatsView::Failed(format!("{error:#}"));
    }
}

fn toggle_theme<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let theme = context.toggle_theme();
    let label = if theme.is_dark() { "dark" } else { "light" };
    match runtime.save_dark_mode(theme.is_dark()) {
        Ok(()) => emit_status(state, view_data, internal_tx, format!("{label} theme")),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("{label} theme; preference not saved: {error:#}"),
        ),
    }
}

fn logout<R: AppRuntime>(
    state: &mut AppState,
    context: &mut AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    context.logout();
    view_data.form = None;
    view_data.login = Some(LoginUiState::default());
    state.dispatch(AppCommand::ExitToNav);
    if let Err(error) = runtime.save_session_user(None) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("session not cleared: {error:#}"),
        );
    }
}

fn complete_selected<R: AppRuntime>(
    state: &mut AppState,
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(asset) = selected_asset(state, view_data) else {
        emit_status(state, view_data, internal_tx, "no asset selected");
        return;
    };
    if asset.is_completed() {
        emit_status(state, view_data, internal_tx, "asset already completed");
        return;
    }
    let user = match context.require_user() {
        Ok(user) => user.to_owned(),
        Err(error) => {
            show_alert(view_data, "complete failed", format!("{error:#}"));
            return;
        }
    };
    let mutation = Mutation::Complete {
        id: asset.id,
        user,
        at: dates::now(),
    };
    start_mutation(state, runtime, view_data, internal_tx, mutation, asset_label(&asset));
}

fn revert_selected<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(asset) = selected_asset(state, view_data) else {
        emit_status(state, view_data, internal_tx, "no asset selected");
        return;
    };
    if !asset.is_completed() {
        emit_status(state, view_data, internal_tx, "asset is still pending");
        return;
    }
    start_mutation(
        state,
        runtime,
        view_data,
        internal_tx,
        Mutation::Revert(asset.id),
        asset_label(&asset),
    );
}

fn open_form(state: &mut AppState, view_data: &mut ViewData, form: FormState) {
    state.dispatch(AppCommand::OpenForm(form.kind));
    view_data.form = Some(form);
}

fn close_form(state: &mut AppState, view_data: &mut ViewData) {
    view_data.form = None;
    state.dispatch(AppCommand::ExitToNav);
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let pool = SuggestionPool::from_items(view_data.feed.items());
    let today = view_data.today;
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let control = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => {
            if form.handle_suggest_key(SuggestKey::Esc, &pool) == SuggestOutcome::Ignored {
                close_form(state, view_data);
            }
        }
        KeyCode::Down => {
            if form.handle_suggest_key(SuggestKey::Down, &pool) == SuggestOutcome::Ignored {
                form.focus_next();
            }
        }
        KeyCode::Up => {
            if form.handle_suggest_key(SuggestKey::Up, &pool) == SuggestOutcome::Ignored {
                form.focus_prev();
            }
        }
        KeyCode::Enter => {
            if form.handle_suggest_key(SuggestKey::Enter, &pool) == SuggestOutcome::Ignored {
                submit_form(state, context, runtime, view_data, internal_tx);
            }
        }
        KeyCode::Char('s') if control => submit_form(state, context, runtime, view_data, internal_tx),
        KeyCode::Tab => form.focus_next(),
        KeyCode::BackTab => form.focus_prev(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::F(number @ 1..=5) => {
            let quick = QuickDate::ALL[usize::from(number - 1)];
            form.apply_quick_date(quick, today);
        }
        KeyCode::F(6) if form.kind == FormKind::Report => {
            form.scanning = true;
            let scanned = runtime.scan_asset_code();
            match scanned {
                Ok(text) => {
                    form.accept_scan(&text);
                    emit_status(state, view_data, internal_tx, "asset number scanned");
                }
                Err(error) => {
                    form.scanning = false;
                    show_alert(view_data, "scan failed", format!("{error:#}"));
                }
            }
        }
        KeyCode::Char(ch) if !control => form.insert_char(ch),
        _ => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    context: &AppContext,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_ref() else {
        return;
    };
    let (operation, label) = match form.kind {
        FormKind::Create => ("create", "new asset".to_owned()),
        FormKind::Edit(id) => ("edit", format!("asset {id}")),
        FormKind::Report => ("report", "report".to_owned()),
    };
    let payload = match form.payload() {
        Ok(payload) => payload,
        Err(error) => {
            show_alert(view_data, format!("{operation} failed"), format!("{error:#}"));
            return;
        }
    };

    let mutation = Mutation::Submit {
        payload,
        check_duplicates: context.check_duplicates,
    };
    start_mutation(state, runtime, view_data, internal_tx, mutation, label);
}

fn render(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    context: &AppContext,
    view_data: &ViewData,
    now: OffsetDateTime,
) {
    let colors = palette(context.theme);
    let base = Style::default().fg(colors.fg).bg(colors.bg);
    frame.render_widget(Block::default().style(base), frame.area());

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_ROWS),
            Constraint::Min(1),
            Constraint::Length(STATUS_ROWS),
        ])
        .split(frame.area());

    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(44)])
        .split(layout[0]);
    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(TabKind::ALL.iter().map(|tab| tab.label()).collect::<Vec<_>>())
        .block(Block::default().title("repairtrack").borders(Borders::ALL))
        .style(base)
        .highlight_style(
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, header[0]);
    let session = Paragraph::new(header_text(context, now))
        .style(base)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(session, header[1]);

    match state.active_tab {
        TabKind::Assets => render_assets(frame, layout[1], state, view_data, colors),
        TabKind::Statistics => render_statistics(frame, layout[1], view_data, colors),
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(colors.status).bg(colors.bg))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let pool = SuggestionPool::from_items(view_data.feed.items());
        let overlay = Paragraph::new(render_form_text(form, &pool))
            .style(base)
            .block(Block::default().title(form_title(form.kind)).borders(Borders::ALL));
        frame.render_widget(overlay, area);
    }

    if let Some(pending) = &view_data.pending_delete {
        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new(format!("delete {}?\n\ny confirm | n cancel", pending.label))
            .style(base)
            .block(Block::default().title("delete").borders(Borders::ALL));
        frame.render_widget(confirm, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .style(base)
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }

    if let Some(login) = &view_data.login {
        let area = centered_rect(50, 25, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(format!(
            "username: {}_\n\nenter log in | ctrl+c quit",
            login.input
        ))
        .style(base)
        .block(Block::default().title("log in").borders(Borders::ALL));
        frame.render_widget(prompt, area);
    }

    if let Some(alert) = &view_data.alert {
        let area = centered_rect(60, 25, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(format!("{}\n\nenter dismiss", alert.message))
            .style(Style::default().fg(colors.alert).bg(colors.bg))
            .block(Block::default().title(alert.title.as_str()).borders(Borders::ALL));
        frame.render_widget(body, area);
    }
}

fn header_text(context: &AppContext, now: OffsetDateTime) -> String {
    let user = context.user().unwrap_or("not logged in");
    format!("{user} | {}", dates::format_clock(now))
}

fn form_title(kind: FormKind) -> String {
    match kind {
        FormKind::Edit(id) => format!("{} {id}", kind.title()),
        _ => kind.title().to_owned(),
    }
}

fn render_assets(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
    colors: Palette,
) {
    let rows = visible_rows(state, view_data);
    let height = usize::from(area.height.saturating_sub(TABLE_CHROME_ROWS)).max(1);
    let start = view_data.selected.saturating_sub(height - 1);

    let header = Row::new(AssetColumn::SORTABLE.iter().enumerate().map(|(index, column)| {
        Cell::from(column_header(state, index, *column)).style(
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let body = rows
        .iter()
        .enumerate()
        .skip(start)
        .take(height)
        .map(|(index, asset)| {
            let mut style = Style::default().fg(colors.fg);
            if asset.is_completed() {
                style = style.fg(colors.muted);
            }
            if index == view_data.selected {
                style = style.bg(colors.selected_bg).add_modifier(Modifier::BOLD);
            }
            Row::new(asset_cells(asset)).style(style)
        });

    let widths = [
        Constraint::Length(12),
        Constraint::Min(16),
        Constraint::Length(11),
        Constraint::Length(10),
        Constraint::Length(20),
        Constraint::Length(12),
    ];
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(assets_title(state, view_data, rows.len()))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn column_header(state: &AppState, index: usize, column: AssetColumn) -> String {
    let mut label = format!("{} {}", index + 1, column.label());
    if let Some(indicator) = state.sort.indicator(column) {
        label.push(' ');
        label.push_str(indicator);
    }
    label
}

fn asset_cells(asset: &Asset) -> Vec<String> {
    vec![
        asset.asset_number.clone(),
        asset.name.clone(),
        dates::format_date(asset.tracking_date),
        asset.status.as_str().to_owned(),
        asset
            .completion_date
            .map(dates::format_clock)
            .unwrap_or_default(),
        asset.completed_by.clone().unwrap_or_default(),
    ]
}

fn assets_title(state: &AppState, view_data: &ViewData, visible: usize) -> String {
    let feed = &view_data.feed;
    let mut title = format!("assets {visible} shown | {}/{} loaded", feed.items().len(), feed.total());
    if !state.filter.show_all_statuses {
        title.push_str(" | pending");
    }
    if state.filter.tomorrow_only {
        title.push_str(" | tomorrow");
    }
    if !state.filter.query.is_empty() {
        title.push_str(&format!(" | /{}", state.filter.query));
    }
    if feed.is_loading() {
        title.push_str(" | loading…");
    } else if !feed.has_more() && !feed.items().is_empty() {
        title.push_str(" | end");
    }
    title
}

fn render_statistics(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    view_data: &ViewData,
    colors: Palette,
) {
    let snapshot = match &view_data.stats {
        StatsView::Loaded(snapshot) => snapshot,
        StatsView::NotLoaded | StatsView::Loading => {
            let body = Paragraph::new("loading statistics…")
                .block(Block::default().title("statistics").borders(Borders::ALL));
            frame.render_widget(body, area);
            return;
        }
        StatsView::Failed(error) => {
            let body = Paragraph::new(format!("statistics unavailable: {error}\n\nR retry"))
                .style(Style::default().fg(colors.alert))
                .block(Block::default().title("statistics").borders(Borders::ALL));
            frame.render_widget(body, area);
            return;
        }
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(8)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(layout[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(layout[1]);

    let summary = Paragraph::new(render_summary_text(snapshot))
        .block(Block::default().title("overview").borders(Borders::ALL));
    frame.render_widget(summary, top[0]);

    let trend = Paragraph::new(render_trend_text(snapshot)).block(
        Block::default()
            .title(format!("trend {}", snapshot.year))
            .borders(Borders::ALL),
    );
    frame.render_widget(trend, top[1]);

    let bars = snapshot
        .monthly
        .iter()
        .map(|bucket| (bucket.label(), bucket.count as u64))
        .collect::<Vec<_>>();
    let chart = BarChart::default()
        .block(
            Block::default()
                .title(format!("created per month {}", snapshot.year))
                .borders(Borders::ALL),
        )
        .data(bars.as_slice())
        .bar_width(4)
        .bar_gap(1)
        .bar_style(Style::default().fg(colors.accent))
        .value_style(Style::default().fg(colors.bg).bg(colors.accent));
    frame.render_widget(chart, bottom[0]);

    let ranking = Table::new(
        snapshot.top_names.iter().map(|ranked| {
            Row::new(vec![
                ranked.rank.to_string(),
                ranked.name.clone(),
                ranked.count.to_string(),
            ])
        }),
        [
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(6),
        ],
    )
    .header(Row::new(vec!["#", "name", "count"]).style(Style::default().fg(colors.accent)))
    .block(Block::default().title("top items").borders(Borders::ALL));
    frame.render_widget(ranking, bottom[1]);
}

fn render_summary_text(snapshot: &StatsSnapshot) -> String {
    let mut lines = vec![format!("total {}", snapshot.total)];
    for (status, count) in snapshot.status_distribution() {
        lines.push(format!("{} {count}", status.as_str()));
    }
    let windows = snapshot
        .completion_windows
        .iter()
        .map(|window| format!("{} {}", window.range.label(), window.count))
        .collect::<Vec<_>>()
        .join(" | ");
    lines.push(format!("completed: {windows}"));
    lines.join("\n")
}

fn render_trend_text(snapshot: &StatsSnapshot) -> String {
    snapshot
        .monthly
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .map(|bucket| format!("{} {:.1}", bucket.label(), bucket.trend))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_form_text(form: &FormState, pool: &SuggestionPool) -> String {
    let mut lines = Vec::new();
    let suggestions = form.suggestions(pool);
    let highlighted = form.active_suggest().and_then(|suggest| suggest.highlighted());
    for field in FormField::ALL {
        let marker = if field == form.focus { ">" } else { " " };
        lines.push(format!("{marker} {}: {}", field.label(), form.draft.field(field)));
        if field == form.focus {
            for (index, suggestion) in suggestions.iter().enumerate() {
                let pointer = if Some(index) == highlighted { "▸" } else { " " };
                lines.push(format!("    {pointer} {suggestion}"));
            }
        }
    }
    lines.push(String::new());
    let quick = QuickDate::ALL
        .iter()
        .enumerate()
        .map(|(index, quick)| format!("F{} {}", index + 1, quick.label()))
        .collect::<Vec<_>>()
        .join(" | ");
    lines.push(quick);
    if form.kind == FormKind::Report {
        let scan = if form.scanning {
            "scanning…"
        } else {
            "F6 scan asset code"
        };
        lines.push(scan.to_owned());
    }
    lines.push("tab/shift+tab field | up/down suggestions | enter submit | esc cancel".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+c/ctrl+q quit | tab/shift+tab switch tab | ? help | D theme | L log out\n\
assets: j/k move | g/G top/bottom | / search | esc clear search | f due tomorrow | v all statuses\n\
assets: 1-6 sort by column (again to flip) | 0 clear sort | R reload\n\
edit: n new | e edit | p quick report | c complete | r revert | d delete\n\
form: tab/shift+tab field | up/down suggestions | enter pick/submit | F1-F5 quick dates | F6 scan | esc cancel\n\
statistics: R reload"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let mode = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Search => "SEARCH",
        AppMode::Form(_) => "FORM",
    };
    let hints = match state.mode {
        AppMode::Nav if state.active_tab == TabKind::Statistics => "tab assets | R reload | ? help | q quit",
        AppMode::Nav => "j/k | / f v | 1-6 sort | n e p | c r d | ? help | q quit",
        AppMode::Search => "type to filter | enter keep | esc clear",
        AppMode::Form(_) => "enter submit | esc cancel",
    };
    let mut parts = vec![mode.to_owned()];
    if state.mode == AppMode::Search {
        parts.push(format!("/{}", state.filter.query));
    }
    if let Some(status) = &state.status_line {
        parts.push(status.clone());
    }
    if let Some(label) = &view_data.in_flight {
        parts.push(format!("saving {label}…"));
    }
    if view_data.feed.resync_pending() {
        parts.push("resync queued".to_owned());
    }
    parts.push(hints.to_owned());
    parts.join(" | ")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
