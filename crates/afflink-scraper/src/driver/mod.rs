//! Page-automation seam.
//!
//! Everything above this module talks to [`Browser`] and [`Page`] only, so the
//! bootstrap, panel and extraction flows run unchanged against Chromium in
//! production and a scripted page in tests.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::poll;

pub use chromium::{ChromiumBrowser, ChromiumOptions};

/// Opaque authenticated-session state (cookies) exported from one page and
/// applied to new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBlob(pub serde_json::Value);

/// Network resource classes that can be blocked on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Media,
    Font,
    Stylesheet,
}

/// What to read from each row in [`Page::read_rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Element inside the row; `None` reads the row element itself.
    pub selector: Option<String>,
    /// Attribute to read; `None` reads trimmed text content.
    pub attribute: Option<String>,
}

impl FieldSpec {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attribute: None,
        }
    }

    pub fn attr(selector: Option<&str>, attribute: &str) -> Self {
        Self {
            selector: selector.map(str::to_string),
            attribute: Some(attribute.to_string()),
        }
    }
}

/// A browser that hands out independent pages.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Opens a fresh page, applying `session` before any navigation.
    async fn open_page(&self, session: Option<&SessionBlob>) -> Result<Box<dyn Page>, DriverError>;

    /// Closes every page and the browser process. Later calls to
    /// [`Browser::open_page`] may start a new one.
    async fn shutdown(&self) -> Result<(), DriverError>;
}

/// One tab. Selectors are CSS; a selector that matches several elements acts
/// on the first.
#[async_trait]
pub trait Page: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    /// `true` if the element exists and is rendered with a non-empty box.
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Sends a real key press (e.g. `"Enter"`, `"Escape"`) to the element.
    async fn press(&self, selector: &str, key: &str) -> Result<(), DriverError>;

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError>;

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), DriverError>;

    /// Value of an input, `None` when the element is missing.
    async fn input_value(&self, selector: &str) -> Result<Option<String>, DriverError>;

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Submits the form that owns `field_selector`. Returns `false` when
    /// there is no such form.
    async fn submit_form(&self, field_selector: &str) -> Result<bool, DriverError>;

    /// Reads `fields` from every element matching `rows`, in one pass so the
    /// result is a consistent snapshot of the rendered rows.
    async fn read_rows(
        &self,
        rows: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<Vec<Option<String>>>, DriverError>;

    /// Clicks the first `inner` element within the `nth` element matching
    /// `rows` whose visible text contains `label` (see [`label_matches`]).
    async fn click_in_row(
        &self,
        rows: &str,
        nth: usize,
        inner: &str,
        label: Option<&str>,
    ) -> Result<(), DriverError>;

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), DriverError>;

    async fn export_session(&self) -> Result<SessionBlob, DriverError>;

    async fn close(self: Box<Self>) -> Result<(), DriverError>;

    /// Waits until `selector` is visible.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let visible = poll::wait_until(timeout, Duration::from_millis(100), || async {
            self.is_visible(selector).await.unwrap_or(false)
        })
        .await;
        if visible {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                what: selector.to_string(),
                timeout_ms: millis(timeout),
            })
        }
    }
}

/// Case-insensitive containment of `wanted` in an element's visible text,
/// with runs of whitespace treated as one space.
#[must_use]
pub fn label_matches(text: &str, wanted: &str) -> bool {
    let norm = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let wanted = norm(wanted);
    !wanted.is_empty() && norm(text).contains(&wanted)
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
