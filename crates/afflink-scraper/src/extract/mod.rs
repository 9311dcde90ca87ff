//! Resolves affiliate links for the ranked items with a pool of workers.
//!
//! Each worker owns one page: it bootstraps the same listing, then claims
//! items from a shared counter until none are left. A claimed index is
//! processed by exactly one worker and its result lands in the slot with
//! the same index, so results can't cross between items and no lock guards
//! the result vector.
//!
//! Per item the worker snapshots the rendered rows, resolves the item's
//! identity to a row, re-reads that row right before and after clicking it,
//! and only then accepts the link the panel produced. Any doubt yields a
//! null link for that item, never someone else's.

pub mod identity;
pub mod panel;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use afflink_core::SearchQuery;
use futures::stream::{self, StreamExt};

use crate::driver::{Browser, Page, ResourceKind, SessionBlob};
use crate::error::ExtractFailure;
use crate::listing::{bootstrap, scan_rows, BootstrapTimings};
use crate::matcher::Lexicon;
use crate::selectors::Selectors;
use crate::session::close_quietly;
use crate::types::{RankedItem, RawRow};

pub use identity::{resolve, same_row, Resolution, ResolveParams};
pub use panel::{LinkPanel, PanelState, PanelTimings};

/// Worker pool and per-item tuning.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Upper bound on concurrent workers; clamped to `1..=items`.
    pub workers: usize,
    pub bootstrap: BootstrapTimings,
    pub panel: PanelTimings,
    pub resolve: ResolveParams,
    pub blocked: Vec<ResourceKind>,
    /// Snapshot/resolve rounds before giving up on a row that keeps moving.
    pub relocate_attempts: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            bootstrap: BootstrapTimings::default(),
            panel: PanelTimings::default(),
            resolve: ResolveParams::default(),
            blocked: vec![ResourceKind::Image, ResourceKind::Media, ResourceKind::Font],
            relocate_attempts: 3,
        }
    }
}

/// Borrowed context every worker shares.
#[derive(Clone, Copy)]
pub struct ExtractContext<'a> {
    pub browser: &'a dyn Browser,
    pub session: &'a SessionBlob,
    pub listing_url: &'a str,
    pub query: &'a SearchQuery,
    pub selectors: &'a Selectors,
    pub lexicon: &'a Lexicon,
    pub settings: &'a ExtractSettings,
}

#[derive(Debug, Default)]
struct WorkerReport {
    worker: usize,
    claimed: usize,
    resolved: usize,
}

/// Fills `affiliate_url` on each item. Order and length are preserved;
/// items that could not be resolved keep `None`.
pub async fn extract_links(ctx: ExtractContext<'_>, mut items: Vec<RankedItem>) -> Vec<RankedItem> {
    if items.is_empty() {
        return items;
    }
    let workers = ctx.settings.workers.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    let slots: Vec<OnceLock<Option<String>>> = items.iter().map(|_| OnceLock::new()).collect();

    let reports: Vec<WorkerReport> = stream::iter(0..workers)
        .map(|worker| run_worker(worker, ctx, &items, &next, &slots))
        .buffer_unordered(workers)
        .collect()
        .await;

    for report in &reports {
        tracing::debug!(
            worker = report.worker,
            claimed = report.claimed,
            resolved = report.resolved,
            "extract worker finished"
        );
    }

    for (item, slot) in items.iter_mut().zip(slots) {
        item.affiliate_url = slot.into_inner().flatten();
    }
    let resolved = items.iter().filter(|i| i.affiliate_url.is_some()).count();
    tracing::info!(workers, items = items.len(), resolved, "affiliate links extracted");
    items
}

async fn run_worker(
    worker: usize,
    ctx: ExtractContext<'_>,
    items: &[RankedItem],
    next: &AtomicUsize,
    slots: &[OnceLock<Option<String>>],
) -> WorkerReport {
    let mut report = WorkerReport {
        worker,
        ..WorkerReport::default()
    };
    let page = match ctx.browser.open_page(Some(ctx.session)).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(worker, error = %e, "worker could not open a page");
            return report;
        }
    };
    work(worker, ctx, page.as_ref(), items, next, slots, &mut report).await;
    close_quietly(page).await;
    report
}

async fn prepare(worker: usize, ctx: ExtractContext<'_>, page: &dyn Page) -> bool {
    match bootstrap(page, ctx.listing_url, ctx.query, ctx.selectors, &ctx.settings.bootstrap).await {
        Ok(done) => {
            tracing::debug!(worker, rows = done.rows, relaxed = done.relaxed, "worker listing ready");
            true
        }
        Err(e) => {
            tracing::warn!(worker, error = %e, "worker bootstrap failed");
            false
        }
    }
}

async fn work(
    worker: usize,
    ctx: ExtractContext<'_>,
    page: &dyn Page,
    items: &[RankedItem],
    next: &AtomicUsize,
    slots: &[OnceLock<Option<String>>],
    report: &mut WorkerReport,
) {
    if let Err(e) = page.block_resources(&ctx.settings.blocked).await {
        tracing::debug!(worker, error = %e, "resource blocking unavailable");
    }
    // A worker that cannot reach the listing claims nothing.
    if !prepare(worker, ctx, page).await {
        return;
    }

    let mut panel = LinkPanel::new(page, ctx.selectors, &ctx.settings.panel);
    loop {
        let rank = next.fetch_add(1, Ordering::SeqCst);
        let Some(item) = items.get(rank) else {
            break;
        };
        report.claimed += 1;

        let link = match extract_one(ctx, page, &mut panel, item).await {
            Ok(url) => {
                tracing::info!(worker, rank, identity = %item.identity().key(), "link resolved");
                report.resolved += 1;
                Some(url)
            }
            Err(e) => {
                tracing::warn!(worker, rank, identity = %item.identity().key(), error = %e, "no link for item");
                None
            }
        };
        if slots[rank].set(link).is_err() {
            tracing::error!(worker, rank, "result slot written twice");
        }

        if panel.close().await.is_err() {
            tracing::warn!(worker, "panel stuck open; reloading listing");
            panel.reset();
            if !prepare(worker, ctx, page).await {
                break;
            }
        }
    }
}

/// Snapshot → resolve → verify → open panel → verify again → link.
async fn extract_one(
    ctx: ExtractContext<'_>,
    page: &dyn Page,
    panel: &mut LinkPanel<'_>,
    item: &RankedItem,
) -> Result<String, ExtractFailure> {
    let sel = ctx.selectors;
    let mut rows = scan_rows(page, sel, usize::MAX).await?;

    for attempt in 0..ctx.settings.relocate_attempts.max(1) {
        let resolution = resolve(item.identity(), &rows, ctx.lexicon, &ctx.settings.resolve)
            .ok_or(ExtractFailure::IdentityNotFound)?;
        let nth = resolution.nth();
        let Some(target) = row_at(&rows, nth).cloned() else {
            return Err(ExtractFailure::IdentityNotFound);
        };

        let before = scan_rows(page, sel, usize::MAX).await?;
        if !row_at(&before, nth).is_some_and(|r| same_row(&target, r)) {
            tracing::debug!(attempt, nth, "row moved before click; resolving again");
            rows = before;
            continue;
        }

        tracing::debug!(?resolution, "opening link panel");
        let link = panel.fetch(nth).await?;

        let after = scan_rows(page, sel, usize::MAX).await?;
        if !row_at(&after, nth).is_some_and(|r| same_row(&target, r)) {
            return Err(ExtractFailure::RowMoved);
        }
        return Ok(link);
    }
    Err(ExtractFailure::RowMoved)
}

fn row_at(rows: &[RawRow], nth: usize) -> Option<&RawRow> {
    rows.iter().find(|r| r.position == nth)
}
