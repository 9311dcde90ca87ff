//! Marketplace search and affiliate-link extraction.
//!
//! [`Scout`] is the entry point. Underneath it, the pure pieces
//! ([`matcher`], [`classify`], [`rank`], [`parse`]) decide which listing rows
//! qualify and in what order, while [`listing`] and [`extract`] drive a
//! [`driver::Page`] to read rows and pull one link per ranked item.

pub mod classify;
pub mod driver;
pub mod error;
pub mod extract;
pub mod listing;
pub mod matcher;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod poll;
pub mod rank;
pub mod selectors;
pub mod session;
pub mod types;

pub use classify::{MatchParams, TieredCandidates};
pub use driver::{Browser, Page, SessionBlob};
pub use error::{DriverError, ExtractFailure, ScraperError};
pub use matcher::Lexicon;
pub use pipeline::{Scout, ScoutSettings};
pub use rank::RankParams;
pub use selectors::Selectors;
pub use session::{FileSessionStore, SessionManager, SessionStore};
pub use types::{Candidate, OutputRecord, RankedItem, SearchEnvelope, Tier};
