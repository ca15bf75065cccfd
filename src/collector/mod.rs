// src/collector/mod.rs
//! The page loop: fetch, snapshot, deduplicate, emit, advance.
//!
//! Cursor changes made while walking pages are held locally and written
//! once the loop ends. An error mid-run therefore leaves the cursor file
//! as it was, apart from an account id resolved at the start.

mod dedup;

pub use dedup::DedupSet;

use crate::api::LikesApi;
use crate::error::AppError;
use crate::output::{ItemSink, RawSnapshots};
use crate::store::{CursorState, CursorStore};
use crate::types::{AccessToken, AccountId, ItemId};
use chrono::Utc;

/// Collects liked posts for the token's account.
pub struct Collector {
    api: LikesApi,
    cursors: CursorStore,
    sink: Box<dyn ItemSink>,
    snapshots: RawSnapshots,
    dedup: DedupSet,
}

impl Collector {
    pub fn new(
        api: LikesApi,
        cursors: CursorStore,
        sink: Box<dyn ItemSink>,
        snapshots: RawSnapshots,
    ) -> Self {
        Self {
            api,
            cursors,
            sink,
            snapshots,
            dedup: DedupSet::new(),
        }
    }

    pub fn set_access_token(&mut self, token: AccessToken) {
        self.api.set_access_token(token);
    }

    /// Distinct items emitted by this collector so far.
    pub fn dedup_len(&self) -> usize {
        self.dedup.len()
    }

    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// Whether the configured pagination mode resumes from the stored cursor.
    pub fn resumes(&self) -> bool {
        self.api.config().pagination_mode.resumes()
    }

    /// [`run`](Self::run) with `resume` taken from the collector's config.
    pub async fn run_configured(&mut self, max_pages: u32) -> Result<u32, AppError> {
        let resume = self.resumes();
        self.run(max_pages, resume).await
    }

    async fn resolve_account(&self, state: &mut CursorState) -> Result<AccountId, AppError> {
        if let Some(account) = &state.account_id {
            return Ok(account.clone());
        }
        let account = self.api.fetch_account().await?;
        log::info!("Resolved account id {}", account);
        state.account_id = Some(account.clone());
        self.cursors.save(state)?;
        Ok(account)
    }

    /// Walks pages until the source runs out or `max_pages` (0 = no limit)
    /// is reached. Returns the number of pages fetched.
    ///
    /// With `resume`, only items newer than the stored newest cursor are
    /// requested; without one stored, the run is a full walk.
    pub async fn run(&mut self, max_pages: u32, resume: bool) -> Result<u32, AppError> {
        let mut state = self.cursors.load()?;
        let account = self.resolve_account(&mut state).await?;

        let since_id = if resume {
            state.newest_seen_id.clone()
        } else {
            None
        };
        match &since_id {
            Some(since) => log::info!("Collecting likes for {} newer than {}", account, since),
            None if resume => {
                log::info!("No stored cursor for {}; walking all pages", account)
            }
            None => log::info!("Collecting all likes for {}", account),
        }

        let mut newest: Option<ItemId> = state.newest_seen_id.clone();
        let mut oldest: Option<ItemId> = state.oldest_seen_id.clone();
        let mut pages: u32 = 0;
        let mut next_token: Option<String> = None;

        loop {
            if max_pages > 0 && pages >= max_pages {
                log::info!("Reached page limit ({})", max_pages);
                break;
            }

            let request = self
                .api
                .page_request(&account, since_id.as_ref(), next_token.as_deref());
            let reply = self.api.fetch_raw(&request).await?;
            let source_page = self.snapshots.write(pages, &reply.body, Utc::now())?;
            let page = self.api.parse_page(reply)?;

            let mut emitted = 0usize;
            for item in &page.items {
                if self.dedup.contains(&item.id) {
                    continue;
                }
                self.sink.write_item(item, &page.includes, &source_page)?;
                self.dedup.insert(item.id.clone());
                emitted += 1;
            }
            self.sink.finish_page()?;

            if pages == 0 {
                if let Some(candidate) = page.newest_item_id() {
                    let advance = since_id.is_none()
                        || newest.as_ref().map_or(true, |n| candidate.is_newer_than(n));
                    if advance {
                        newest = Some(candidate.clone());
                    }
                }
            }
            if page.is_last() && since_id.is_none() {
                if let Some(last) = page.last_item_id() {
                    oldest = Some(last.clone());
                }
            }

            pages += 1;
            log::info!(
                "Page {}: {} items, {} new ({})",
                pages,
                page.items.len(),
                emitted,
                source_page
            );

            match page.next_page_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        state.newest_seen_id = newest;
        state.oldest_seen_id = oldest;
        state.last_run_at = Some(Utc::now());
        state.pages_fetched_total += u64::from(pages);
        self.cursors.save(&state)?;

        log::info!("Finished. Pages fetched this run: {}", pages);
        Ok(pages)
    }
}
