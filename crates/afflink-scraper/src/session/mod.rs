//! Owns the browser and the authenticated-session state shared by every
//! request.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use afflink_core::Credentials;
use tokio::sync::{Mutex, RwLock};

use crate::driver::{Browser, Page, SessionBlob};
use crate::error::{DriverError, ScraperError};
use crate::poll;
use crate::selectors::Selectors;

pub use store::{FileSessionStore, SessionStore};

/// Where and how to log in.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub login_url: String,
    pub listing_url: String,
    pub credentials: Option<Credentials>,
    pub nav_timeout: Duration,
    /// How long to wait for the login form, and for the redirect after it.
    pub login_wait: Duration,
}

/// Browser plus cached session blob.
///
/// The blob is read from the store on first use and replaced whenever a
/// liveness check fails and a fresh login succeeds. Concurrent requests that
/// all find a dead session log in once.
pub struct SessionManager {
    browser: Arc<dyn Browser>,
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
    selectors: Arc<Selectors>,
    cached: RwLock<Option<SessionBlob>>,
    store_read: Mutex<bool>,
    login_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        browser: Arc<dyn Browser>,
        store: Arc<dyn SessionStore>,
        settings: SessionSettings,
        selectors: Arc<Selectors>,
    ) -> Self {
        Self {
            browser,
            store,
            settings,
            selectors,
            cached: RwLock::new(None),
            store_read: Mutex::new(false),
            login_gate: Mutex::new(()),
        }
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub fn listing_url(&self) -> &str {
        &self.settings.listing_url
    }

    /// Returns a blob that passed a liveness check, logging in if needed.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Configuration`] when credentials are not configured.
    ///   Nothing is opened in that case.
    /// - [`ScraperError::Authentication`] when a fresh login does not reach
    ///   the listing.
    pub async fn authenticated(&self) -> Result<SessionBlob, ScraperError> {
        let credentials = self.credentials()?.clone();

        let current = self.current_blob().await?;
        if let Some(blob) = &current {
            if self.check_liveness(blob).await? {
                tracing::debug!("stored session still authenticated");
                return Ok(blob.clone());
            }
            tracing::info!("stored session expired; logging in again");
        }

        let _gate = self.login_gate.lock().await;
        // Another request may have refreshed the session while we waited.
        if let Some(fresh) = self.cached.read().await.clone() {
            if Some(&fresh) != current.as_ref() {
                return Ok(fresh);
            }
        }
        self.login_with(&credentials).await
    }

    /// Forces a fresh login and persists the new blob.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::authenticated`].
    pub async fn login(&self) -> Result<SessionBlob, ScraperError> {
        let credentials = self.credentials()?.clone();
        let _gate = self.login_gate.lock().await;
        self.login_with(&credentials).await
    }

    /// Opens a page with `blob`, loads the listing and reports whether the
    /// site kept us there instead of bouncing to the login page.
    ///
    /// # Errors
    ///
    /// Only when a page cannot be opened at all. A blob the browser refuses
    /// to apply and navigation failures both count as "not authenticated".
    pub async fn check_liveness(&self, blob: &SessionBlob) -> Result<bool, ScraperError> {
        let page = match self.browser.open_page(Some(blob)).await {
            Ok(page) => page,
            Err(e @ DriverError::Session(_)) => {
                tracing::warn!(error = %e, "stored session could not be applied");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let alive = match page
            .navigate(&self.settings.listing_url, self.settings.nav_timeout)
            .await
        {
            Ok(()) => page
                .current_url()
                .await
                .map(|url| !url.contains(&self.selectors.login_marker))
                .unwrap_or(false),
            Err(e) => {
                tracing::warn!(error = %e, "liveness check navigation failed");
                false
            }
        };
        close_quietly(page).await;
        Ok(alive)
    }

    pub async fn shutdown(&self) -> Result<(), ScraperError> {
        self.browser.shutdown().await?;
        Ok(())
    }

    fn credentials(&self) -> Result<&Credentials, ScraperError> {
        self.settings.credentials.as_ref().ok_or_else(|| {
            ScraperError::Configuration(
                "AFFLINK_PUBLISHER_EMAIL / AFFLINK_PUBLISHER_PASSWORD are not set".into(),
            )
        })
    }

    async fn current_blob(&self) -> Result<Option<SessionBlob>, ScraperError> {
        let mut store_read = self.store_read.lock().await;
        if !*store_read {
            let loaded = match self.store.load().await {
                Ok(loaded) => loaded,
                // An unreadable blob is as good as none; the next login overwrites it.
                Err(e @ ScraperError::SessionDecode { .. }) => {
                    tracing::warn!(error = %e, "discarding unreadable persisted session");
                    None
                }
                Err(e) => return Err(e),
            };
            if loaded.is_some() {
                tracing::debug!("loaded persisted session");
            }
            *self.cached.write().await = loaded;
            *store_read = true;
        }
        drop(store_read);
        Ok(self.cached.read().await.clone())
    }

    async fn login_with(&self, credentials: &Credentials) -> Result<SessionBlob, ScraperError> {
        let page = self.browser.open_page(None).await?;
        let outcome = self.drive_login(page.as_ref(), credentials).await;
        close_quietly(page).await;
        let blob = outcome?;

        self.store.save(&blob).await?;
        *self.cached.write().await = Some(blob.clone());
        *self.store_read.lock().await = true;
        tracing::info!("publisher login succeeded");
        Ok(blob)
    }

    async fn drive_login(
        &self,
        page: &dyn Page,
        credentials: &Credentials,
    ) -> Result<SessionBlob, ScraperError> {
        let sel = &self.selectors;
        let auth = |what: &str, e: &dyn std::fmt::Display| {
            ScraperError::Authentication(format!("{what}: {e}"))
        };

        page.navigate(&self.settings.login_url, self.settings.nav_timeout)
            .await
            .map_err(|e| auth("login page did not load", &e))?;
        page.wait_for(&sel.login_username, self.settings.login_wait)
            .await
            .map_err(|e| auth("login form missing", &e))?;
        page.fill(&sel.login_username, &credentials.email).await?;
        page.fill(&sel.login_password, &credentials.password).await?;
        page.click(&sel.login_button).await?;

        // Wait for the redirect; if it never comes the listing check below decides.
        let marker = sel.login_marker.as_str();
        poll::wait_until(self.settings.login_wait, Duration::from_millis(250), || async {
            page.current_url()
                .await
                .is_ok_and(|url| !url.contains(marker))
        })
        .await;

        page.navigate(&self.settings.listing_url, self.settings.nav_timeout)
            .await
            .map_err(|e| auth("listing did not load after login", &e))?;
        let url = page.current_url().await?;
        if url.contains(marker) {
            return Err(ScraperError::Authentication(
                "still on the login page after submitting credentials".into(),
            ));
        }
        Ok(page.export_session().await?)
    }
}

/// Closes a page, logging instead of failing.
pub(crate) async fn close_quietly(page: Box<dyn Page>) {
    if let Err(e) = page.close().await {
        tracing::warn!(error = %e, "failed to close page");
    }
}
