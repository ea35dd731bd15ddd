//! Scenario sequencing.

use chrono::NaiveDate;
use tracing::{error, info};

use ecicep_qa_client::AppSession;
use ecicep_qa_core::form::FullRecord;
use ecicep_qa_core::{FormPayload, QaError, Result, Run};

use crate::report::{Identities, RunReport};
use crate::state::RunState;
use crate::store::RecordStore;

pub const SCENARIO_AGREEMENT: &str = "Escenario 1: guardar solo acuerdos";
pub const SCENARIO_CONTROL: &str = "Escenario 2: guardar solo control";
pub const SCENARIO_FULL: &str = "Escenario 3: formulario completo";

/// Drives one regression run over a logged-in session.
///
/// A runner is single use: once it reaches `Reported` or `Failed` it
/// refuses to run again.
pub struct ScenarioRunner<'a, S: RecordStore + ?Sized> {
    session: &'a AppSession,
    store: &'a S,
    today: NaiveDate,
    state: RunState,
}

impl<'a, S: RecordStore + ?Sized> ScenarioRunner<'a, S> {
    pub fn new(session: &'a AppSession, store: &'a S, today: NaiveDate) -> Self {
        Self {
            session,
            store,
            today,
            state: RunState::NotLoggedIn,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Logs in and runs the three scenarios in order.
    ///
    /// # Arguments
    /// * `username` - Login name
    /// * `password` - Login password
    /// * `identities` - One fresh RUN per scenario
    /// * `sector_id` - Sector assigned by the full form
    ///
    /// # Returns
    /// The confirmation report, or the first error. Errors raised inside a
    /// scenario carry its name; the runner is left `Failed`.
    pub async fn run(
        &mut self,
        username: &str,
        password: &str,
        identities: &Identities,
        sector_id: &str,
    ) -> Result<RunReport> {
        if self.state != RunState::NotLoggedIn {
            return Err(QaError::InvalidState(format!(
                "runner already used (state {})",
                self.state
            )));
        }
        match self.run_steps(username, password, identities, sector_id).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Run failed in state {}: {}", self.state, e);
                self.state = self.state.fail()?;
                Err(e)
            }
        }
    }

    async fn run_steps(
        &mut self,
        username: &str,
        password: &str,
        identities: &Identities,
        sector_id: &str,
    ) -> Result<RunReport> {
        self.session.login(username, password).await?;
        self.advance(RunState::LoggedIn)?;

        let payload = FormPayload::agreement_only(&identities.agreement, self.today);
        self.partial_save(SCENARIO_AGREEMENT, &identities.agreement, &payload)
            .await
            .map_err(|e| e.in_scenario(SCENARIO_AGREEMENT))?;
        self.advance(RunState::Scenario1Done)?;

        let payload = FormPayload::control_only(&identities.control, self.today);
        self.partial_save(SCENARIO_CONTROL, &identities.control, &payload)
            .await
            .map_err(|e| e.in_scenario(SCENARIO_CONTROL))?;
        self.advance(RunState::Scenario2Done)?;

        self.full_save(&identities.full, sector_id)
            .await
            .map_err(|e| e.in_scenario(SCENARIO_FULL))?;
        self.advance(RunState::Scenario3Verified)?;

        let report = RunReport {
            identities: identities.clone(),
        };
        self.advance(RunState::Reported)?;
        Ok(report)
    }

    fn advance(&mut self, to: RunState) -> Result<()> {
        self.state = self.state.advance(to)?;
        Ok(())
    }

    async fn partial_save(&self, scenario: &str, run: &Run, payload: &FormPayload) -> Result<()> {
        info!("{} with RUN {}", scenario, run);
        self.session.submit_form(payload).await?;
        self.require_registered(scenario, run).await
    }

    async fn full_save(&self, run: &Run, sector_id: &str) -> Result<()> {
        info!("{} with RUN {} in sector {}", SCENARIO_FULL, run, sector_id);
        let record = FullRecord::fixture(run);
        let payload = FormPayload::full(run, &record, sector_id, self.today);
        self.session.submit_form(&payload).await?;
        self.require_registered(SCENARIO_FULL, run).await?;
        self.store
            .verify_full_record(SCENARIO_FULL, run, &record)
            .await
    }

    async fn require_registered(&self, scenario: &str, run: &Run) -> Result<()> {
        if self.session.record_exists(run).await? {
            Ok(())
        } else {
            Err(QaError::verification(
                scenario,
                format!("user {} was not created by the save", run),
            ))
        }
    }
}
