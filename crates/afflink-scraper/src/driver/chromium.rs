//! Chromium implementation of the driver traits, built on chromiumoxide.
//!
//! Most DOM primitives run as small scripts so that every read is a single
//! round trip. Clicks and key presses go through CDP input events instead,
//! since the listing only reacts to trusted events.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, ErrorReason, ResourceType};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{label_matches, millis, Browser, FieldSpec, Page, ResourceKind, SessionBlob};
use crate::error::DriverError;

/// Launch options for [`ChromiumBrowser`].
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub request_timeout: Duration,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            request_timeout: Duration::from_secs(45),
        }
    }
}

struct Running {
    browser: CdpBrowser,
    handler: JoinHandle<()>,
}

/// A Chromium process launched on first use and reused until
/// [`Browser::shutdown`].
pub struct ChromiumBrowser {
    options: ChromiumOptions,
    running: Mutex<Option<Running>>,
}

impl ChromiumBrowser {
    #[must_use]
    pub fn new(options: ChromiumOptions) -> Self {
        Self {
            options,
            running: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Running, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .request_timeout(self.options.request_timeout);
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| DriverError::Backend(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to launch Chromium: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "chromium handler event error");
                }
            }
        });
        tracing::info!(headless = self.options.headless, "chromium launched");
        Ok(Running { browser, handler })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open_page(&self, session: Option<&SessionBlob>) -> Result<Box<dyn Page>, DriverError> {
        let mut running = self.running.lock().await;
        if running.is_none() {
            *running = Some(self.launch().await?);
        }
        let Some(active) = running.as_ref() else {
            return Err(DriverError::Backend("browser not running".into()));
        };
        let page = active
            .browser
            .new_page("about:blank")
            .await
            .map_err(backend)?;
        drop(running);

        if let Some(blob) = session {
            let cookies: Vec<CookieParam> = serde_json::from_value(blob.0.clone())
                .map_err(|e| DriverError::Session(format!("cookie blob does not decode: {e}")))?;
            if !cookies.is_empty() {
                page.set_cookies(cookies)
                    .await
                    .map_err(|e| DriverError::Session(e.to_string()))?;
            }
        }
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        let Some(mut running) = self.running.lock().await.take() else {
            return Ok(());
        };
        let closed = running.browser.close().await.map_err(backend);
        let _ = running.browser.wait().await;
        running.handler.abort();
        tracing::info!("chromium shut down");
        closed.map(|_| ())
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: CdpPage,
}

fn backend(e: impl std::fmt::Display) -> DriverError {
    DriverError::Backend(e.to_string())
}

/// Quotes a string as a JavaScript literal.
fn js(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        self.page
            .evaluate(script)
            .await
            .map_err(backend)?
            .into_value()
            .map_err(backend)
    }

    /// Runs `body` with `el` bound to the first match, or returns
    /// [`DriverError::NotFound`].
    async fn with_element(&self, selector: &str, body: &str) -> Result<(), DriverError> {
        let found: bool = self
            .eval(format!(
                "(() => {{ const el = document.querySelector({sel}); if (!el) return false; {body}; return true; }})()",
                sel = js(selector),
            ))
            .await?;
        if found {
            Ok(())
        } else {
            Err(DriverError::NotFound {
                selector: selector.to_string(),
            })
        }
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Backend(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(DriverError::Timeout {
                what: format!("navigation to {url}"),
                timeout_ms: millis(timeout),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await.map_err(backend)?.unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        self.eval(format!("document.querySelectorAll({}).length", js(selector)))
            .await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            js(selector)
        ))
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.with_element(
            selector,
            &format!(
                "el.focus(); el.value = {}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}))",
                js(value)
            ),
        )
        .await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.with_element(
            selector,
            &format!(
                "el.value = {}; el.dispatchEvent(new Event('change', {{ bubbles: true }}))",
                js(value)
            ),
        )
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(backend)?;
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound {
                selector: selector.to_string(),
            })?;
        element.focus().await.map_err(backend)?;
        element.press_key(key).await.map_err(backend)?;
        Ok(())
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return !!(el && el.checked); }})()",
            js(selector)
        ))
        .await
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), DriverError> {
        self.with_element(
            selector,
            &format!(
                "if (el.checked !== {checked}) {{ el.checked = {checked}; \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); }}"
            ),
        )
        .await
    }

    async fn input_value(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? String(el.value ?? '') : null; }})()",
            js(selector)
        ))
        .await
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerHTML : null; }})()",
            js(selector)
        ))
        .await
    }

    async fn submit_form(&self, field_selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); const form = el && el.form; \
             if (!form) return false; \
             if (form.requestSubmit) form.requestSubmit(); else form.submit(); return true; }})()",
            js(field_selector)
        ))
        .await
    }

    async fn read_rows(
        &self,
        rows: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<Vec<Option<String>>>, DriverError> {
        let specs = serde_json::json!(fields
            .iter()
            .map(|f| serde_json::json!({ "sel": f.selector, "attr": f.attribute }))
            .collect::<Vec<_>>());
        self.eval(format!(
            "(() => {{ const specs = {specs}; \
             return Array.from(document.querySelectorAll({rows})).map(row => specs.map(s => {{ \
               const el = s.sel ? row.querySelector(s.sel) : row; \
               if (!el) return null; \
               if (s.attr) return el.getAttribute(s.attr); \
               return (el.textContent || '').trim(); \
             }})); }})()",
            rows = js(rows),
        ))
        .await
    }

    async fn click_in_row(
        &self,
        rows: &str,
        nth: usize,
        inner: &str,
        label: Option<&str>,
    ) -> Result<(), DriverError> {
        let row_elements = self.page.find_elements(rows).await.map_err(backend)?;
        let not_found = || DriverError::NotFound {
            selector: match label {
                Some(label) => format!("{rows}:nth({nth}) {inner} with text {label:?}"),
                None => format!("{rows}:nth({nth}) {inner}"),
            },
        };
        let row = row_elements.get(nth).ok_or_else(not_found)?;
        let candidates = row.find_elements(inner).await.map_err(|_| not_found())?;
        for candidate in candidates {
            let wanted = match label {
                None => true,
                Some(label) => candidate
                    .inner_text()
                    .await
                    .map_err(backend)?
                    .is_some_and(|text| label_matches(&text, label)),
            };
            if wanted {
                candidate.click().await.map_err(backend)?;
                return Ok(());
            }
        }
        Err(not_found())
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), DriverError> {
        if kinds.is_empty() {
            return Ok(());
        }
        let patterns = kinds
            .iter()
            .map(|kind| {
                let resource_type = match kind {
                    ResourceKind::Image => ResourceType::Image,
                    ResourceKind::Media => ResourceType::Media,
                    ResourceKind::Font => ResourceType::Font,
                    ResourceKind::Stylesheet => ResourceType::Stylesheet,
                };
                RequestPattern::builder().resource_type(resource_type).build()
            })
            .collect::<Vec<_>>();

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(backend)?;
        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await
            .map_err(backend)?;

        // Only blocked resource types are paused, so every paused request fails.
        let page = self.page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if page.execute(fail).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn export_session(&self) -> Result<SessionBlob, DriverError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;
        let value =
            serde_json::to_value(cookies).map_err(|e| DriverError::Session(e.to_string()))?;
        Ok(SessionBlob(value))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.page.close().await.map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_quotes_selectors() {
        assert_eq!(js("form button[type=\"submit\"]"), r#""form button[type=\"submit\"]""#);
        assert_eq!(js("a'b"), r#""a'b""#);
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium"]
    async fn reads_rows_from_a_data_url() {
        let browser = ChromiumBrowser::new(ChromiumOptions::default());
        let page = browser.open_page(None).await.unwrap();
        page.navigate(
            "data:text/html,<div class='r'><b>One</b></div><div class='r' data-id='2'><b>Two</b></div>",
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        let rows = page
            .read_rows(".r", &[FieldSpec::text("b"), FieldSpec::attr(None, "data-id")])
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Some("One".to_string()), None],
                vec![Some("Two".to_string()), Some("2".to_string())],
            ]
        );
        page.close().await.unwrap();
        browser.shutdown().await.unwrap();
    }
}
