//! Run identities and the success report.

use std::fmt;

use ecicep_qa_core::run::generate_valid_id;
use ecicep_qa_core::{Result, Run};

/// One RUN per scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identities {
    pub agreement: Run,
    pub control: Run,
    pub full: Run,
}

impl Identities {
    /// Builds the three identities from seeds produced by
    /// [`ecicep_qa_core::run::scenario_seeds`].
    pub fn from_seeds(seeds: [u64; 3]) -> Result<Self> {
        let [agreement, control, full] = seeds;
        Ok(Self {
            agreement: generate_valid_id(agreement)?,
            control: generate_valid_id(control)?,
            full: generate_valid_id(full)?,
        })
    }
}

/// Confirmation printed after every scenario passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub identities: Identities,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✔ Guardados independientes verificados con éxito")?;
        writeln!(f, "  RUN acuerdos: {}", self.identities.agreement)?;
        writeln!(f, "  RUN control:  {}", self.identities.control)?;
        writeln!(f, "✔ Formulario completo verificado contra la base de datos")?;
        write!(f, "  RUN completo: {}", self.identities.full)
    }
}
