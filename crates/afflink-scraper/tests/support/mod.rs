//! Scripted in-memory marketplace for driving the bootstrap, panel and
//! extraction flows without a browser.
//!
//! Every product's affiliate link embeds a marker derived from its title, so
//! a test can check that the link recorded for an item came from that item's
//! own row.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use afflink_scraper::driver::{label_matches, Browser, FieldSpec, Page, ResourceKind, SessionBlob};
use afflink_scraper::{DriverError, ScraperError, Selectors, SessionStore};
use async_trait::async_trait;

pub const LISTING_URL: &str = "https://market.test/tiktok-shop";
pub const LOGIN_URL: &str = "https://market.test/publisher/login";
pub const EMAIL: &str = "pub@example.com";
pub const PASSWORD: &str = "hunter2";

/// Label of the card button that opens the link panel.
pub const GET_LINK_LABEL: &str = "Get Link";
/// Buttons every card renders, in DOM order. All match `Selectors::row_get_link`.
pub const ROW_BUTTONS: [&str; 2] = ["Detail", GET_LINK_LABEL];

#[derive(Debug, Clone)]
pub struct Product {
    pub id: Option<String>,
    pub title: String,
    pub shop: String,
    pub price: u64,
    pub sold: u64,
    pub commission: u64,
}

impl Product {
    pub fn new(title: &str, shop: &str, price: u64, sold: u64) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            shop: shop.to_string(),
            price,
            sold,
            commission: 1_000,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// The link this product's panel produces.
    pub fn link(&self) -> String {
        link_for(&self.title, &self.shop)
    }
}

pub fn link_for(title: &str, shop: &str) -> String {
    let slug = |s: &str| {
        s.to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    };
    format!("https://aff.example/p/{}--{}", slug(title), slug(shop))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Form,
    Keyboard,
    Click,
    Never,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub products: Vec<Product>,
    pub submit: SubmitMode,
    /// Rows only render when the rating filter is cleared.
    pub require_relaxed: bool,
    /// The panel opens pending and needs "generate now".
    pub needs_generate: bool,
    /// Closing the panel leaves the old link in the fields.
    pub stale_close: bool,
    /// The close button does nothing.
    pub stuck_close: bool,
    /// Each new page renders rows rotated by this many places.
    pub rotate_per_page: usize,
    /// Rows rotate by one after every panel close.
    pub reflow_on_close: bool,
    /// Blob the site accepts as logged in.
    pub valid_session: serde_json::Value,
}

impl MarketConfig {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            submit: SubmitMode::Form,
            require_relaxed: false,
            needs_generate: false,
            stale_close: false,
            stuck_close: false,
            rotate_per_page: 1,
            reflow_on_close: false,
            valid_session: serde_json::json!([{ "name": "sid", "value": "live" }]),
        }
    }
}

/// One click on a row's "get link" button.
#[derive(Debug, Clone)]
pub struct ClickRecord {
    pub page: usize,
    pub nth: usize,
    pub title: String,
}

pub struct Market {
    pub config: MarketConfig,
    pub selectors: Selectors,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub logins: AtomicUsize,
    pub clicks: Mutex<Vec<ClickRecord>>,
    pub blocked: Mutex<Vec<ResourceKind>>,
}

impl Market {
    pub fn new(config: MarketConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            selectors: Selectors::default(),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
            blocked: Mutex::new(Vec::new()),
        })
    }

    pub fn valid_blob(&self) -> SessionBlob {
        SessionBlob(self.config.valid_session.clone())
    }

    pub fn pages_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Opens a page directly, for tests that drive a flow by hand.
    pub fn page(self: &Arc<Self>, logged_in: bool) -> FakePage {
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        FakePage {
            id,
            market: Arc::clone(self),
            state: Mutex::new(PageState {
                logged_in,
                ..PageState::default()
            }),
        }
    }
}

pub struct FakeBrowser {
    pub market: Arc<Market>,
    pub shutdowns: AtomicUsize,
}

impl FakeBrowser {
    pub fn new(market: Arc<Market>) -> Self {
        Self {
            market,
            shutdowns: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open_page(&self, session: Option<&SessionBlob>) -> Result<Box<dyn Page>, DriverError> {
        if session.is_some_and(|b| !b.0.is_array()) {
            return Err(DriverError::Session("cookie blob is not a list".into()));
        }
        let logged_in = session.is_some_and(|b| b.0 == self.market.config.valid_session);
        Ok(Box::new(self.market.page(logged_in)))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Hidden,
    Pending(usize),
    Ready(usize),
}

#[derive(Debug)]
struct PageState {
    url: String,
    logged_in: bool,
    fields: HashMap<String, String>,
    checked: bool,
    /// Indexes into `MarketConfig::products`, in rendered order.
    rows: Vec<usize>,
    rotation: usize,
    panel: Panel,
    links: HashMap<String, String>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            url: "about:blank".into(),
            logged_in: false,
            fields: HashMap::new(),
            checked: false,
            rows: Vec::new(),
            rotation: 0,
            panel: Panel::Hidden,
            links: HashMap::new(),
        }
    }
}

pub struct FakePage {
    pub id: usize,
    market: Arc<Market>,
    state: Mutex<PageState>,
}

impl FakePage {
    fn sel(&self) -> &Selectors {
        &self.market.selectors
    }

    fn cfg(&self) -> &MarketConfig {
        &self.market.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    /// Current value of a form field.
    pub fn field(&self, selector: &str) -> Option<String> {
        self.lock().fields.get(selector).cloned()
    }

    /// Titles in rendered order.
    pub fn rendered_titles(&self) -> Vec<String> {
        let state = self.lock();
        state
            .rows
            .iter()
            .map(|&i| self.cfg().products[i].title.clone())
            .collect()
    }

    fn on_listing(state: &PageState) -> bool {
        state.url == LISTING_URL
    }

    fn render(&self, state: &mut PageState) {
        if !Self::on_listing(state) {
            return;
        }
        let rating = state
            .fields
            .get(&self.sel().rating_filter)
            .cloned()
            .unwrap_or_default();
        if self.cfg().require_relaxed && !rating.is_empty() {
            state.rows.clear();
            return;
        }
        let n = self.cfg().products.len();
        state.rows = (0..n).map(|i| (i + state.rotation) % n.max(1)).collect();
    }

    fn set_ready(&self, state: &mut PageState, product: usize) {
        state.panel = Panel::Ready(product);
        let p = &self.cfg().products[product];
        let field = self.sel().link_fields[0].clone();
        state.links.insert(field, p.link());
    }

    fn close_panel(&self, state: &mut PageState) {
        if self.cfg().stuck_close {
            return;
        }
        state.panel = Panel::Hidden;
        if !self.cfg().stale_close {
            state.links.clear();
        }
        if self.cfg().reflow_on_close && !state.rows.is_empty() {
            state.rows.rotate_left(1);
        }
    }

    fn not_found(selector: &str) -> DriverError {
        DriverError::NotFound {
            selector: selector.to_string(),
        }
    }
}

fn rupiah(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    format!("Rp{out}")
}

#[async_trait]
impl Page for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.url = if url == LISTING_URL && !state.logged_in {
            LOGIN_URL.to_string()
        } else {
            url.to_string()
        };
        state.fields.clear();
        state.rows.clear();
        state.panel = Panel::Hidden;
        state.links.clear();
        state.rotation = self.id * self.cfg().rotate_per_page;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.lock().url.clone())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let state = self.lock();
        let sel = self.sel();
        let n = if selector == sel.rows {
            state.rows.len()
        } else if [&sel.max_price_input, &sel.query_input, &sel.panel_close]
            .iter()
            .any(|s| s.as_str() == selector)
        {
            usize::from(Self::on_listing(&state))
        } else if selector == sel.without_sub_id || selector == sel.generate_button {
            usize::from(matches!(state.panel, Panel::Pending(_)))
        } else {
            0
        };
        Ok(n)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let state = self.lock();
        let sel = self.sel();
        let visible = if selector == sel.login_username {
            state.url == LOGIN_URL
        } else if selector == sel.query_input || selector == sel.grid || selector == sel.submit_button {
            Self::on_listing(&state)
        } else if selector == sel.panel_pending {
            matches!(state.panel, Panel::Pending(_))
        } else if selector == sel.panel_ready {
            matches!(state.panel, Panel::Ready(_))
        } else if sel.link_fields.iter().any(|f| f == selector) {
            state.panel != Panel::Hidden
        } else {
            false
        };
        Ok(visible)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.lock().fields.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.lock().fields.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        let sel = self.sel();
        if selector == sel.submit_button {
            if self.cfg().submit == SubmitMode::Click {
                self.render(&mut state);
            }
        } else if selector == sel.panel_close {
            self.close_panel(&mut state);
        } else if selector == sel.generate_button {
            let panel = state.panel;
            if let Panel::Pending(p) = panel {
                if state.checked {
                    self.set_ready(&mut state, p);
                }
            }
        } else if selector == sel.login_button {
            let ok = state.fields.get(&sel.login_username).map(String::as_str) == Some(EMAIL)
                && state.fields.get(&sel.login_password).map(String::as_str) == Some(PASSWORD);
            if ok {
                self.market.logins.fetch_add(1, Ordering::SeqCst);
                state.logged_in = true;
                state.url = LISTING_URL.to_string();
            }
        } else {
            return Err(Self::not_found(selector));
        }
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        let sel = self.sel();
        match key {
            "Enter" if selector == sel.max_price_input || selector == sel.query_input => {
                if self.cfg().submit == SubmitMode::Keyboard {
                    self.render(&mut state);
                }
            }
            "Escape" => self.close_panel(&mut state),
            _ => {}
        }
        Ok(())
    }

    async fn is_checked(&self, _selector: &str) -> Result<bool, DriverError> {
        Ok(self.lock().checked)
    }

    async fn set_checked(&self, _selector: &str, checked: bool) -> Result<(), DriverError> {
        self.lock().checked = checked;
        Ok(())
    }

    async fn input_value(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let state = self.lock();
        if self.sel().link_fields.iter().any(|f| f == selector) {
            return Ok(Some(state.links.get(selector).cloned().unwrap_or_default()));
        }
        Ok(state.fields.get(selector).cloned())
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let state = self.lock();
        if selector != self.sel().grid || !Self::on_listing(&state) {
            return Ok(None);
        }
        let html = state
            .rows
            .iter()
            .map(|&i| format!("<div class=\"col\">{}</div>", self.cfg().products[i].title))
            .collect::<String>();
        Ok(Some(html))
    }

    async fn submit_form(&self, field_selector: &str) -> Result<bool, DriverError> {
        let mut state = self.lock();
        if field_selector != self.sel().query_input || !Self::on_listing(&state) {
            return Ok(false);
        }
        if self.cfg().submit == SubmitMode::Form {
            self.render(&mut state);
        }
        Ok(true)
    }

    async fn read_rows(
        &self,
        rows: &str,
        fields: &[FieldSpec],
    ) -> Result<Vec<Vec<Option<String>>>, DriverError> {
        let state = self.lock();
        let sel = self.sel();
        if rows != sel.rows {
            return Ok(Vec::new());
        }
        let read = |p: &Product, field: &FieldSpec| -> Option<String> {
            match (field.selector.as_deref(), field.attribute.as_deref()) {
                (Some(s), None) if s == sel.row_title => Some(p.title.clone()),
                (Some(s), None) if s == sel.row_shop => Some(p.shop.clone()),
                (Some(s), None) if s == sel.row_price => Some(rupiah(p.price)),
                (Some(s), None) if s == sel.row_sold => Some(format!("{} terjual", p.sold)),
                (Some(s), None) if s == sel.row_commission => {
                    Some(format!("Earn : Rp {}", p.commission))
                }
                (Some(s), Some("src")) if s == sel.row_image => {
                    Some(format!("https://img.test/{}.jpg", p.title.len()))
                }
                (None, Some(attr)) if attr == sel.row_identity_attr => p.id.clone(),
                _ => None,
            }
        };
        Ok(state
            .rows
            .iter()
            .map(|&i| {
                let p = &self.cfg().products[i];
                fields.iter().map(|f| read(p, f)).collect()
            })
            .collect())
    }

    async fn click_in_row(
        &self,
        rows: &str,
        nth: usize,
        inner: &str,
        label: Option<&str>,
    ) -> Result<(), DriverError> {
        let mut state = self.lock();
        let sel = self.sel();
        if rows != sel.rows || inner != sel.row_get_link {
            return Err(Self::not_found(inner));
        }
        let Some(button) = ROW_BUTTONS
            .iter()
            .find(|text| label.is_none_or(|wanted| label_matches(text, wanted)))
        else {
            return Err(Self::not_found(inner));
        };
        if *button != GET_LINK_LABEL {
            // Some other card control; the panel stays hidden.
            return Ok(());
        }
        if state.panel != Panel::Hidden {
            return Err(DriverError::Backend("panel covers the grid".into()));
        }
        let Some(&product) = state.rows.get(nth) else {
            return Err(Self::not_found(rows));
        };
        self.market.clicks.lock().unwrap().push(ClickRecord {
            page: self.id,
            nth,
            title: self.cfg().products[product].title.clone(),
        });
        if self.cfg().needs_generate {
            state.panel = Panel::Pending(product);
            state.checked = false;
        } else {
            self.set_ready(&mut state, product);
        }
        Ok(())
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), DriverError> {
        self.market.blocked.lock().unwrap().extend_from_slice(kinds);
        Ok(())
    }

    async fn export_session(&self) -> Result<SessionBlob, DriverError> {
        let state = self.lock();
        if state.logged_in {
            Ok(self.market.valid_blob())
        } else {
            Ok(SessionBlob(serde_json::json!([])))
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.market.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub blob: Mutex<Option<SessionBlob>>,
    pub saves: AtomicUsize,
}

impl MemoryStore {
    pub fn holding(blob: SessionBlob) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Option<SessionBlob>, ScraperError> {
        Ok(self.blob.lock().unwrap().clone())
    }

    async fn save(&self, blob: &SessionBlob) -> Result<(), ScraperError> {
        *self.blob.lock().unwrap() = Some(blob.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A belt-heavy catalogue with distinct sold counts.
pub fn belt_catalogue() -> Vec<Product> {
    vec![
        Product::new("Sabuk Kulit Pria Otomatis", "Toko Sabuk", 85_000, 120).with_id("p-1"),
        Product::new("Ikat Pinggang Pria Otomatis Anti Ribet", "Belt House", 99_000, 340),
        Product::new("Sabuk Pria Tanpa Lubang Premium", "Gesper Jaya", 75_000, 80).with_id("p-3"),
        Product::new("Gesper Kulit Asli Coklat", "Toko Kulit", 60_000, 500),
        Product::new("Sabuk Pria Kanvas Army", "Outdoor ID", 45_000, 45),
        Product::new("Dompet Wanita Mini", "Tas Cantik", 30_000, 999),
        Product::new("Sabuk Pria Ratchet Otomatis Hitam", "Belt House", 110_000, 210),
        Product::new("Tas Selempang Pria", "Tas Cantik", 70_000, 700),
    ]
}
