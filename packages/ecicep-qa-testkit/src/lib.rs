//! Test support for the ECICEP QA crates.
//!
//! [`MockApp`] is a small hyper server that mimics the registry
//! application's login, registration form, category lookup and REM P
//! report endpoints, and records what it was sent.

pub mod mock_app;

pub use mock_app::{normalize_run, MockApp, Submission};
