//! Shared building blocks for the ECICEP QA tooling.
//!
//! Provides RUN generation, process configuration, the error taxonomy,
//! ordered form payloads and the named-field row type used by the
//! database verifier.

pub mod config;
pub mod error;
pub mod form;
pub mod row;
pub mod run;

pub use config::{DbConfig, HarnessConfig};
pub use error::{QaError, Result};
pub use form::{FormMode, FormPayload};
pub use row::DictRow;
pub use run::Run;
