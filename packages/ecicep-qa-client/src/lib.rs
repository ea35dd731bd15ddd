//! HTTP access to the ECICEP registry application.
//!
//! Wraps a cookie-carrying session that logs in once, posts registration
//! forms, checks whether a RUN is registered and fetches REM P report
//! sections.

pub mod report;
pub mod session;

pub use report::{ReportTotal, Section};
pub use session::{AppSession, CATEGORY_PATH_PREFIX, LOGIN_PATH, SUBMIT_PATH};
