// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::gateway::{AssetQuery, Page};
use crate::model::{Asset, AssetColumn, SortDirection};

pub const PAGE_SIZE: usize = 10;

/// A page fetch the feed has committed to. Hand it back to
/// [`AssetFeed::finish`] together with the gateway result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    pub reset: bool,
}

impl PageRequest {
    /// Feed order is stable across pages: tracking date, then id.
    pub fn query(&self) -> AssetQuery {
        AssetQuery::all()
            .order_by(AssetColumn::TrackingDate, SortDirection::Asc)
            .order_by(AssetColumn::Id, SortDirection::Asc)
            .range(self.offset, self.limit)
    }
}

/// Accumulated asset list plus the offset bookkeeping for infinite scroll.
///
/// At most one page is in flight. A non-reset request while loading is
/// dropped; a reset request while loading is remembered and surfaces through
/// [`AssetFeed::take_resync`] once the in-flight page settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFeed {
    items: Vec<Asset>,
    page: usize,
    page_size: usize,
    loading: bool,
    has_more: bool,
    total: usize,
    resync_pending: bool,
}

impl Default for AssetFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetFeed {
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page: 0,
            page_size: page_size.max(1),
            loading: false,
            has_more: true,
            total: 0,
            resync_pending: false,
        }
    }

    pub fn items(&self) -> &[Asset] {
        &self.items
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn resync_pending(&self) -> bool {
        self.resync_pending
    }

    /// Starts a page load. Returns `None` when nothing should be fetched.
    pub fn load_next_page(&mut self, reset: bool) -> Option<PageRequest> {
        if self.loading {
            if reset {
                self.resync_pending = true;
            }
            return None;
        }
        if !reset && !self.has_more {
            return None;
        }

        let offset = if reset { 0 } else { self.page * self.page_size };
        self.loading = true;
        Some(PageRequest {
            offset,
            limit: self.page_size,
            reset,
        })
    }

    /// Drops the accumulated view of the store and reloads from offset 0.
    /// Called after every insert, update, or delete.
    pub fn invalidate(&mut self) -> Option<PageRequest> {
        self.load_next_page(true)
    }

    /// Applies a finished fetch. On error the accumulated list is left as it
    /// was and the error is handed back for reporting.
    pub fn finish(&mut self, request: PageRequest, result: Result<Page<Asset>>) -> Result<()> {
        self.loading = false;
        let page = result?;

        let received = page.rows.len();
        if request.reset {
            self.items = page.rows;
            self.page = 1;
        } else {
            self.items.extend(page.rows);
            self.page += 1;
        }
        self.total = page.total;
        // An empty page ends the feed even if the count says otherwise, so a
        // stale total cannot make the sentinel refetch the same offset forever.
        self.has_more = received > 0 && self.items.len() < self.total;
        Ok(())
    }

    /// Returns the deferred reset, if one was requested while loading.
    pub fn take_resync(&mut self) -> Option<PageRequest> {
        if !self.resync_pending || self.loading {
            return None;
        }
        self.resync_pending = false;
        self.load_next_page(true)
    }
}
