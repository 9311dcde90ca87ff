//! CSS selectors for the publisher listing, link panel and login form.
//!
//! Row-relative selectors (`row_*`) are resolved inside one element matched
//! by [`Selectors::rows`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    // search form
    pub query_input: String,
    pub min_price_input: String,
    pub max_price_input: String,
    pub rating_filter: String,
    /// Rating filter value used on the first attempt.
    pub rating_quality: String,
    /// Rating filter value used by the relaxed retry (any rating).
    pub rating_relaxed: String,
    pub submit_button: String,

    // listing
    pub grid: String,
    pub rows: String,
    pub row_title: String,
    pub row_shop: String,
    pub row_price: String,
    pub row_sold: String,
    pub row_commission: String,
    pub row_image: String,
    pub row_identity: String,
    pub row_identity_attr: String,
    /// Candidate elements for the row's "get link" control.
    pub row_get_link: String,
    /// Visible label the control must contain (case-insensitive). `None`
    /// takes the first element matching [`Selectors::row_get_link`].
    pub row_get_link_text: Option<String>,

    // link panel
    pub panel_pending: String,
    pub panel_ready: String,
    pub without_sub_id: String,
    pub generate_button: String,
    /// Checked in order; the first one holding a URL wins.
    pub link_fields: Vec<String>,
    pub panel_close: String,

    // login
    pub login_username: String,
    pub login_password: String,
    pub login_button: String,
    /// URL fragment that means the browser was bounced to the login page.
    pub login_marker: String,
}

impl Default for Selectors {
    fn default() -> Self {
        let grid = ".gridCampaigns.campaign-list.tiktok-product".to_string();
        Self {
            query_input: "#src".into(),
            min_price_input: "#min_price".into(),
            max_price_input: "#max_price".into(),
            rating_filter: "#t_store_rating".into(),
            rating_quality: "2".into(),
            rating_relaxed: String::new(),
            submit_button: "form button[type=\"submit\"]".into(),

            rows: format!("{grid} .col"),
            grid,
            row_title: ".card-title".into(),
            row_shop: ".shop-name".into(),
            row_price: ".newPrice".into(),
            row_sold: ".sold".into(),
            row_commission: ".commission".into(),
            row_image: "img.card-img".into(),
            row_identity: "[data-product-id]".into(),
            row_identity_attr: "data-product-id".into(),
            row_get_link: "button".into(),
            row_get_link_text: Some("GET LINK".into()),

            panel_pending: "#generate_link_at:not(.d-none)".into(),
            panel_ready: "#show_link_at:not(.d-none)".into(),
            without_sub_id: "#withoutSubId".into(),
            generate_button: "#generate_link_now".into(),
            link_fields: vec!["#getAffiliateSosmed".into(), "#getAffiliateLink".into()],
            panel_close: "button.btn-close.backToModal".into(),

            login_username: "input#username".into(),
            login_password: "input#password".into(),
            login_button: "button.btn.btn-at.rounded-lg.shadow-lg.py-2.px-5".into(),
            login_marker: "/publisher/login".into(),
        }
    }
}
