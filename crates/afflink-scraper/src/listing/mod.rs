//! Listing page: getting it into a settled state and reading its rows.

pub mod bootstrap;
pub mod scan;

pub use bootstrap::{bootstrap, BootstrapTimings, Bootstrapped, SubmitState, SubmitStep, Submission};
pub use scan::scan_rows;
