//! Database seam of the runner.

use async_trait::async_trait;

use ecicep_qa_core::form::FullRecord;
use ecicep_qa_core::{Result, Run};
use ecicep_qa_store::PgStore;

/// Confirms a full-form save reached the database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn verify_full_record(&self, scenario: &str, run: &Run, record: &FullRecord)
        -> Result<()>;
}

#[async_trait]
impl RecordStore for PgStore {
    async fn verify_full_record(
        &self,
        scenario: &str,
        run: &Run,
        record: &FullRecord,
    ) -> Result<()> {
        PgStore::verify_full_record(self, scenario, run, record).await
    }
}
