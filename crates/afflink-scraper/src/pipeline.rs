//! End-to-end search: authenticate, scan, classify, rank, extract.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use afflink_core::{AppConfig, SearchQuery};

use crate::classify::{classify_rows, MatchParams};
use crate::driver::{Browser, ChromiumBrowser, ChromiumOptions, Page};
use crate::error::ScraperError;
use crate::extract::{extract_links, ExtractContext, ExtractSettings};
use crate::listing::{bootstrap, scan_rows};
use crate::matcher::Lexicon;
use crate::output;
use crate::rank::{rank, RankParams};
use crate::selectors::Selectors;
use crate::session::{close_quietly, FileSessionStore, SessionManager, SessionSettings, SessionStore};
use crate::types::{OutputRecord, RawRow};

/// Every tunable of a search in one place.
#[derive(Debug, Clone, Default)]
pub struct ScoutSettings {
    pub matching: MatchParams,
    pub rank: RankParams,
    pub extract: ExtractSettings,
    /// Where to drop the debug copy of the last result. `None` disables it.
    pub output_path: Option<PathBuf>,
}

/// The search facade shared by the server and the CLI.
///
/// Owns the session manager (and through it the browser). Cheap to share
/// behind an `Arc`; concurrent searches use independent pages.
pub struct Scout {
    session: Arc<SessionManager>,
    selectors: Arc<Selectors>,
    lexicon: Lexicon,
    settings: ScoutSettings,
}

impl Scout {
    pub fn new(
        session: Arc<SessionManager>,
        selectors: Arc<Selectors>,
        lexicon: Lexicon,
        settings: ScoutSettings,
    ) -> Self {
        Self {
            session,
            selectors,
            lexicon,
            settings,
        }
    }

    /// Wires a Chromium browser and file-backed session store from config.
    /// The browser is not launched until the first search.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let browser: Arc<dyn Browser> = Arc::new(ChromiumBrowser::new(ChromiumOptions {
            executable: config.chromium_path.clone(),
            headless: config.headless,
            request_timeout: Duration::from_millis(config.nav_timeout_ms),
        }));
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_path));
        Self::with_parts(config, browser, store)
    }

    /// Same as [`Scout::from_config`] with caller-supplied browser and store.
    #[must_use]
    pub fn with_parts(
        config: &AppConfig,
        browser: Arc<dyn Browser>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let nav_timeout = Duration::from_millis(config.nav_timeout_ms);
        let selectors = Arc::new(Selectors::default());
        let session = SessionManager::new(
            browser,
            store,
            SessionSettings {
                login_url: config.login_url.clone(),
                listing_url: config.listing_url.clone(),
                credentials: config.credentials.clone(),
                nav_timeout,
                login_wait: Duration::from_secs(20),
            },
            Arc::clone(&selectors),
        );

        let mut settings = ScoutSettings {
            output_path: Some(config.output_path.clone()),
            ..ScoutSettings::default()
        };
        settings.extract.workers = config.extract_workers;
        settings.extract.bootstrap.nav_timeout = nav_timeout;

        Self::new(Arc::new(session), selectors, Lexicon::default(), settings)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn settings(&self) -> &ScoutSettings {
        &self.settings
    }

    /// Validates raw request values, then runs [`Scout::search`].
    ///
    /// # Errors
    ///
    /// [`ScraperError::Validation`] before anything is opened, otherwise as
    /// [`Scout::search`].
    pub async fn search_text(
        &self,
        text: &str,
        min_price: u64,
        max_price: u64,
    ) -> Result<Vec<OutputRecord>, ScraperError> {
        let query = SearchQuery::new(text, min_price, max_price)?;
        self.search(&query).await
    }

    /// Runs one search and returns at most `top_n` records.
    ///
    /// # Errors
    ///
    /// Request-level failures only: configuration, authentication, or a
    /// listing that never produced rows. Per-item link failures show up as
    /// `affiliate_url: null`.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<OutputRecord>, ScraperError> {
        let started = Instant::now();
        let blob = self.session.authenticated().await?;

        let page = self.session.browser().open_page(Some(&blob)).await?;
        let scanned = self.scan(page.as_ref(), query).await;
        close_quietly(page).await;
        let rows = scanned?;

        let tiers = classify_rows(&self.lexicon, &self.settings.matching, query, &rows);
        let ranked = rank(tiers, &self.settings.rank);
        tracing::info!(query = %query.text, scanned = rows.len(), ranked = ranked.len(), "listing ranked");

        let items = if ranked.is_empty() {
            ranked
        } else {
            let ctx = ExtractContext {
                browser: self.session.browser().as_ref(),
                session: &blob,
                listing_url: self.session.listing_url(),
                query,
                selectors: &self.selectors,
                lexicon: &self.lexicon,
                settings: &self.settings.extract,
            };
            extract_links(ctx, ranked).await
        };

        let records: Vec<OutputRecord> = items.into_iter().map(OutputRecord::from).collect();
        if let Some(path) = &self.settings.output_path {
            if let Err(e) = output::write_latest(path, &records).await {
                tracing::warn!(error = %e, "debug output not written");
            }
        }
        tracing::info!(
            query = %query.text,
            results = records.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "search finished"
        );
        Ok(records)
    }

    /// Forces a fresh login and persists the session.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::login`].
    pub async fn login(&self) -> Result<(), ScraperError> {
        self.session.login().await.map(|_| ())
    }

    /// Shuts the browser down. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Err(e) = self.session.shutdown().await {
            tracing::warn!(error = %e, "browser shutdown failed");
        }
    }

    async fn scan(&self, page: &dyn Page, query: &SearchQuery) -> Result<Vec<RawRow>, ScraperError> {
        let done = bootstrap(
            page,
            self.session.listing_url(),
            query,
            &self.selectors,
            &self.settings.extract.bootstrap,
        )
        .await?;
        tracing::debug!(rows = done.rows, relaxed = done.relaxed, "scan page ready");
        Ok(scan_rows(page, &self.selectors, self.settings.rank.scan_limit).await?)
    }
}
