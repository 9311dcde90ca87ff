//! The "get link" panel as an explicit state machine.
//!
//! ```text
//! Closed -> Opening -> Generating -> Ready(url)
//!              |            |
//!              +------------+--> TimedOut
//! ```
//!
//! `Generating` covers both the pending sub-state (where "generate now" has
//! to be clicked) and the wait for a populated link field. A panel must be
//! back in `Closed` before it is opened for another row.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::driver::Page;
use crate::error::{DriverError, ExtractFailure};
use crate::poll;
use crate::selectors::Selectors;

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("valid regex"));

/// Time boxes for one panel round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelTimings {
    /// Wait for either panel section to show after clicking the row button.
    pub open_wait: Duration,
    /// Wait for the ready section after asking for a link to be generated.
    pub ready_wait: Duration,
    /// Extra read attempts for the link fields.
    pub read_retries: u32,
    pub read_backoff_ms: u64,
    pub close_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for PanelTimings {
    fn default() -> Self {
        Self {
            open_wait: Duration::from_secs(10),
            ready_wait: Duration::from_secs(8),
            read_retries: 5,
            read_backoff_ms: 400,
            close_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Opening,
    Generating,
    Ready(String),
    TimedOut,
}

impl PanelState {
    fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Generating => "generating",
            Self::Ready(_) => "ready",
            Self::TimedOut => "timed_out",
        }
    }
}

/// One worker's link panel.
///
/// Remembers every link it has produced, and any URL already sitting in the
/// link fields before it opens, so a leftover value is never returned as the
/// result for a new row.
pub struct LinkPanel<'a> {
    page: &'a dyn Page,
    selectors: &'a Selectors,
    timings: &'a PanelTimings,
    state: PanelState,
    stale: HashSet<String>,
}

impl<'a> LinkPanel<'a> {
    pub fn new(page: &'a dyn Page, selectors: &'a Selectors, timings: &'a PanelTimings) -> Self {
        Self {
            page,
            selectors,
            timings,
            state: PanelState::Closed,
            stale: HashSet::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Opens the panel for row `nth` and reads its link.
    ///
    /// The panel is left open (`Ready` or `TimedOut`); call
    /// [`LinkPanel::close`] before the next row.
    ///
    /// # Errors
    ///
    /// [`ExtractFailure::Timeout`] when a stage runs out of time, or the
    /// driver error that stopped the row click.
    pub async fn fetch(&mut self, nth: usize) -> Result<String, ExtractFailure> {
        if self.state != PanelState::Closed {
            return Err(ExtractFailure::PanelStuck);
        }
        for value in self.read_fields().await {
            self.stale.insert(value);
        }

        self.page
            .click_in_row(
                &self.selectors.rows,
                nth,
                &self.selectors.row_get_link,
                self.selectors.row_get_link_text.as_deref(),
            )
            .await?;
        self.state = PanelState::Opening;

        let sel = self.selectors;
        let shown = poll::wait_until(self.timings.open_wait, self.timings.poll_interval, || async {
            self.visible(&sel.panel_pending).await || self.visible(&sel.panel_ready).await
        })
        .await;
        if !shown {
            return Err(self.time_out());
        }
        self.state = PanelState::Generating;

        if self.visible(&sel.panel_pending).await {
            self.request_generation().await;
            let ready = poll::wait_until(self.timings.ready_wait, self.timings.poll_interval, || {
                self.visible(&sel.panel_ready)
            })
            .await;
            if !ready {
                tracing::debug!("ready section did not show; reading fields anyway");
            }
        }

        let stale = &self.stale;
        let read = poll::retry_with_backoff(
            self.timings.read_retries,
            self.timings.read_backoff_ms,
            "link field",
            || async {
                self.read_fields()
                    .await
                    .into_iter()
                    .find(|v| !stale.contains(v))
                    .ok_or("no fresh link yet")
            },
        )
        .await;

        match read {
            Ok(url) => {
                self.stale.insert(url.clone());
                self.state = PanelState::Ready(url.clone());
                Ok(url)
            }
            Err(_) => Err(self.time_out()),
        }
    }

    /// Closes the panel and confirms nothing of it is still shown.
    ///
    /// # Errors
    ///
    /// [`ExtractFailure::PanelStuck`] if it is still visible after
    /// `close_wait`. The state is left unchanged in that case.
    pub async fn close(&mut self) -> Result<(), ExtractFailure> {
        if self.state == PanelState::Closed {
            return Ok(());
        }
        let sel = self.selectors;
        let clicked = if self.page.count(&sel.panel_close).await.unwrap_or(0) > 0 {
            self.page.click(&sel.panel_close).await
        } else {
            Err(DriverError::NotFound {
                selector: sel.panel_close.clone(),
            })
        };
        if clicked.is_err() {
            if let Err(e) = self.page.press("body", "Escape").await {
                tracing::debug!(error = %e, "escape did not reach the page");
            }
        }

        let closed = poll::wait_until(self.timings.close_wait, self.timings.poll_interval, || {
            self.is_hidden()
        })
        .await;
        if closed {
            self.state = PanelState::Closed;
            Ok(())
        } else {
            Err(ExtractFailure::PanelStuck)
        }
    }

    /// Forgets the open state after the page was reloaded.
    pub fn reset(&mut self) {
        self.state = PanelState::Closed;
    }

    async fn request_generation(&self) {
        let sel = self.selectors;
        if self.page.count(&sel.without_sub_id).await.unwrap_or(0) > 0
            && !self.page.is_checked(&sel.without_sub_id).await.unwrap_or(true)
        {
            if let Err(e) = self.page.set_checked(&sel.without_sub_id, true).await {
                tracing::debug!(error = %e, "could not select the no-sub-id option");
            }
        }
        if self.page.count(&sel.generate_button).await.unwrap_or(0) > 0 {
            if let Err(e) = self.page.click(&sel.generate_button).await {
                tracing::debug!(error = %e, "generate click failed");
            }
        }
    }

    /// URL-looking values currently in the link fields, in field order.
    async fn read_fields(&self) -> Vec<String> {
        let mut found = Vec::new();
        for field in &self.selectors.link_fields {
            if let Ok(Some(value)) = self.page.input_value(field).await {
                let value = value.trim();
                if LINK.is_match(value) {
                    found.push(value.to_string());
                }
            }
        }
        found
    }

    async fn visible(&self, selector: &str) -> bool {
        self.page.is_visible(selector).await.unwrap_or(false)
    }

    async fn is_hidden(&self) -> bool {
        let sel = self.selectors;
        for selector in [&sel.panel_pending, &sel.panel_ready]
            .into_iter()
            .chain(sel.link_fields.iter())
        {
            if self.visible(selector).await {
                return false;
            }
        }
        true
    }

    fn time_out(&mut self) -> ExtractFailure {
        let state = self.state.name();
        self.state = PanelState::TimedOut;
        ExtractFailure::Timeout { state }
    }
}
