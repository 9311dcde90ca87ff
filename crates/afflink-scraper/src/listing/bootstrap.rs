//! Brings a page to a settled listing for one query.
//!
//! Submission runs as a small state machine:
//!
//! ```text
//! Idle -> Submitted(FormSubmit) -> Submitted(KeyboardConfirm) -> Submitted(ClickSubmit) -> TimedOut
//!              \                        \                            \
//!               +------------------------+----------------------------+--> Stabilized
//! ```
//!
//! Each `Submitted` step waits a bounded time for the grid to change before
//! the next fallback is tried. If the first pass leaves no rows, the whole
//! thing runs once more with the relaxed rating filter.

use std::time::Duration;

use afflink_core::SearchQuery;

use crate::driver::{millis, Page};
use crate::error::ScraperError;
use crate::poll::{self, Settled};
use crate::selectors::Selectors;

/// Time boxes for the bootstrap flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapTimings {
    pub nav_timeout: Duration,
    /// Wait for the search field after navigation.
    pub form_wait: Duration,
    /// Wait for the grid container before submitting. Not fatal on expiry.
    pub grid_wait: Duration,
    /// Wait for a detectable change after each submission step.
    pub step_wait: Duration,
    /// Wait for rows after the submission chain gives up.
    pub rows_wait: Duration,
    pub quiet_window: Duration,
    pub poll_interval: Duration,
    /// Upper bound on the stabilization phase.
    pub settle_bound: Duration,
    /// Rows needed before the listing counts as usable.
    pub min_rows: usize,
}

impl Default for BootstrapTimings {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(45),
            form_wait: Duration::from_secs(20),
            grid_wait: Duration::from_secs(30),
            step_wait: Duration::from_secs(8),
            rows_wait: Duration::from_secs(30),
            quiet_window: Duration::from_millis(700),
            poll_interval: Duration::from_millis(150),
            settle_bound: Duration::from_secs(8),
            min_rows: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStep {
    FormSubmit,
    KeyboardConfirm,
    ClickSubmit,
}

impl SubmitStep {
    fn next(self) -> Option<Self> {
        match self {
            Self::FormSubmit => Some(Self::KeyboardConfirm),
            Self::KeyboardConfirm => Some(Self::ClickSubmit),
            Self::ClickSubmit => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitted(SubmitStep),
    Stabilized { step: SubmitStep, rows: usize },
    TimedOut,
}

/// Drives one pass of the submission fallback chain.
pub struct Submission<'a> {
    page: &'a dyn Page,
    selectors: &'a Selectors,
    timings: &'a BootstrapTimings,
    before_html: Option<String>,
    before_rows: usize,
    state: SubmitState,
}

impl<'a> Submission<'a> {
    /// Captures the "before" snapshot the change detection compares against.
    pub async fn begin(
        page: &'a dyn Page,
        selectors: &'a Selectors,
        timings: &'a BootstrapTimings,
    ) -> Submission<'a> {
        let before_html = page.inner_html(&selectors.grid).await.ok().flatten();
        let before_rows = page.count(&selectors.rows).await.unwrap_or(0);
        Self {
            page,
            selectors,
            timings,
            before_html,
            before_rows,
            state: SubmitState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Performs one transition and returns the new state. Terminal states
    /// are returned unchanged.
    pub async fn advance(&mut self) -> SubmitState {
        self.state = match self.state {
            SubmitState::Idle => self.fire(SubmitStep::FormSubmit).await,
            SubmitState::Submitted(step) => {
                if self.changed_within(self.timings.step_wait).await {
                    let settled = settle_rows(self.page, self.selectors, self.timings).await;
                    SubmitState::Stabilized {
                        step,
                        rows: settled.count,
                    }
                } else if let Some(next) = step.next() {
                    tracing::debug!(?step, ?next, "no change after submission step");
                    self.fire(next).await
                } else {
                    SubmitState::TimedOut
                }
            }
            terminal @ (SubmitState::Stabilized { .. } | SubmitState::TimedOut) => terminal,
        };
        self.state
    }

    /// Advances until a terminal state.
    pub async fn run(mut self) -> SubmitState {
        loop {
            match self.advance().await {
                SubmitState::Idle | SubmitState::Submitted(_) => {}
                terminal => return terminal,
            }
        }
    }

    async fn fire(&self, step: SubmitStep) -> SubmitState {
        let sel = self.selectors;
        let outcome = match step {
            SubmitStep::FormSubmit => self.page.submit_form(&sel.query_input).await.map(|_| ()),
            SubmitStep::KeyboardConfirm => {
                let target = if self.page.count(&sel.max_price_input).await.unwrap_or(0) > 0 {
                    &sel.max_price_input
                } else {
                    &sel.query_input
                };
                self.page.press(target, "Enter").await
            }
            SubmitStep::ClickSubmit => {
                if self.page.is_visible(&sel.submit_button).await.unwrap_or(false) {
                    self.page.click(&sel.submit_button).await
                } else {
                    tracing::debug!("no visible submit control");
                    Ok(())
                }
            }
        };
        if let Err(e) = outcome {
            tracing::debug!(?step, error = %e, "submission step failed");
        }
        SubmitState::Submitted(step)
    }

    async fn changed_within(&self, timeout: Duration) -> bool {
        let min_rows = self.timings.min_rows;
        poll::wait_until(timeout, self.timings.poll_interval, || async {
            let rows = self.page.count(&self.selectors.rows).await.unwrap_or(0);
            if self.before_rows < min_rows && rows >= min_rows {
                return true;
            }
            let html = self.page.inner_html(&self.selectors.grid).await.ok().flatten();
            match (&self.before_html, html) {
                (Some(before), Some(after)) => !after.is_empty() && *before != after,
                (None, Some(after)) => !after.is_empty(),
                _ => false,
            }
        })
        .await
    }
}

async fn settle_rows(page: &dyn Page, selectors: &Selectors, timings: &BootstrapTimings) -> Settled {
    poll::settle(
        timings.quiet_window,
        timings.poll_interval,
        timings.settle_bound,
        || async { page.count(&selectors.rows).await.unwrap_or(0) },
    )
    .await
}

/// What a successful bootstrap ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrapped {
    pub rows: usize,
    pub relaxed: bool,
    pub submit: SubmitState,
}

/// Navigates to the listing, submits `query` and waits for settled rows.
///
/// # Errors
///
/// [`ScraperError::ListingUnavailable`] when the form never appears or no
/// rows render after every fallback and the relaxed retry. This is fatal for
/// the request.
pub async fn bootstrap(
    page: &dyn Page,
    listing_url: &str,
    query: &SearchQuery,
    selectors: &Selectors,
    timings: &BootstrapTimings,
) -> Result<Bootstrapped, ScraperError> {
    page.navigate(listing_url, timings.nav_timeout)
        .await
        .map_err(|e| ScraperError::ListingUnavailable(format!("listing did not load: {e}")))?;
    page.wait_for(&selectors.query_input, timings.form_wait)
        .await
        .map_err(|e| ScraperError::ListingUnavailable(format!("search form missing: {e}")))?;

    let first = search_pass(page, query, selectors, timings, &selectors.rating_quality).await?;
    if first.rows >= timings.min_rows {
        return Ok(first);
    }

    tracing::warn!(query = %query.text, "no rows with the rating filter; retrying relaxed");
    let relaxed = search_pass(page, query, selectors, timings, &selectors.rating_relaxed).await?;
    if relaxed.rows >= timings.min_rows {
        return Ok(Bootstrapped {
            relaxed: true,
            ..relaxed
        });
    }
    Err(ScraperError::ListingUnavailable(format!(
        "no rows for {:?} after {}ms",
        query.text,
        millis(timings.rows_wait)
    )))
}

async fn search_pass(
    page: &dyn Page,
    query: &SearchQuery,
    selectors: &Selectors,
    timings: &BootstrapTimings,
    rating: &str,
) -> Result<Bootstrapped, ScraperError> {
    page.fill(&selectors.query_input, &query.text).await?;
    for (field, value) in [
        (&selectors.min_price_input, query.min_field()),
        (&selectors.max_price_input, query.max_field()),
    ] {
        if let Err(e) = page.fill(field, &value).await {
            tracing::debug!(field = %field, error = %e, "price field not filled");
        }
    }
    if let Err(e) = page.select_option(&selectors.rating_filter, rating).await {
        tracing::debug!(error = %e, "rating filter not set");
    }
    if page.wait_for(&selectors.grid, timings.grid_wait).await.is_err() {
        tracing::debug!("grid container not visible before submit");
    }

    let submit = Submission::begin(page, selectors, timings).await.run().await;
    tracing::debug!(?submit, rating, "submission finished");

    let rows = match submit {
        SubmitState::Stabilized { rows, .. } if rows >= timings.min_rows => rows,
        _ => {
            let min_rows = timings.min_rows;
            let appeared = poll::wait_until(timings.rows_wait, timings.poll_interval, || async {
                page.count(&selectors.rows).await.unwrap_or(0) >= min_rows
            })
            .await;
            if appeared {
                settle_rows(page, selectors, timings).await.count
            } else {
                0
            }
        }
    };
    Ok(Bootstrapped {
        rows,
        relaxed: false,
        submit,
    })
}
