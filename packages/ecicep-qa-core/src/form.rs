//! Ordered form payloads for `POST /usuario/nuevo`.
//!
//! The registration endpoint accepts three modes selected by the
//! `guardar_solo_*` flags. Field order is preserved on the wire because
//! `patologias` is repeated once per selected code.

use chrono::NaiveDate;

use crate::run::Run;

/// Selector flag for the agreement-only save.
pub const FLAG_AGREEMENT_ONLY: &str = "guardar_solo_acuerdos";
/// Selector flag for the control-only save.
pub const FLAG_CONTROL_ONLY: &str = "guardar_solo_control";
/// Selector flag for the pathology-only save.
pub const FLAG_PATHOLOGY_ONLY: &str = "guardar_solo_patologias";

/// Form date format expected by the application.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Save mode of a registration post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    AgreementOnly,
    ControlOnly,
    Full,
}

/// Values submitted by the full-form scenario and later read back from the
/// database.
#[derive(Debug, Clone, PartialEq)]
pub struct FullRecord {
    pub nombre: String,
    pub telefono: String,
    pub nivel_educacional: String,
    pub origen_etnico: String,
    pub estado_civil: String,
    pub profesional: String,
    pub acuerdo: String,
    pub cumplimiento: String,
    /// ICD-10 codes, submitted in this order
    pub patologias: Vec<String>,
}

impl FullRecord {
    /// Fixture used by the regression run; the name embeds the RUN suffix
    /// so rows are easy to find by hand.
    pub fn fixture(run: &Run) -> Self {
        Self {
            nombre: format!("Usuario QA {}", run.suffix(4)),
            telefono: "998877665".to_string(),
            nivel_educacional: "Universitaria completa".to_string(),
            origen_etnico: "Pueblo Mapuche".to_string(),
            estado_civil: "Casado(a)".to_string(),
            profesional: "Tester Automatizado".to_string(),
            acuerdo: "Control anual programado".to_string(),
            cumplimiento: "cumple".to_string(),
            patologias: vec!["E11".to_string(), "I10".to_string()],
        }
    }
}

/// Ordered list of `(name, value)` pairs; names may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPayload {
    mode: FormMode,
    fields: Vec<(String, String)>,
}

impl FormPayload {
    fn new(mode: FormMode) -> Self {
        Self {
            mode,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    /// Agreement-only save: RUN, selector flag and agreement fields.
    pub fn agreement_only(run: &Run, date: NaiveDate) -> Self {
        let mut payload = Self::new(FormMode::AgreementOnly);
        payload
            .push("run", run.dotted())
            .push(FLAG_AGREEMENT_ONLY, "1")
            .push("nuevo_acuerdo", "Llamada de seguimiento automatizada")
            .push("cumplimiento", "cumple")
            .push("observaciones", "Prueba automatizada guardado acuerdos")
            .push("fecha_acuerdo", format_date(date));
        payload
    }

    /// Control-only save: RUN, selector flag and vital signs.
    pub fn control_only(run: &Run, date: NaiveDate) -> Self {
        let mut payload = Self::new(FormMode::ControlOnly);
        payload
            .push("run", run.dotted())
            .push(FLAG_CONTROL_ONLY, "1")
            .push("fecha", format_date(date))
            .push("profesional", "Tester Automatizado")
            .push("peso", "72")
            .push("talla", "1.70")
            .push("presion_sistolica", "120")
            .push("presion_diastolica", "80")
            .push("observaciones", "Control generado por script de prueba");
        payload
    }

    /// Full registration: demographics, control, agreement and one
    /// `patologias` entry per code, with every selector flag cleared.
    pub fn full(run: &Run, record: &FullRecord, sector_id: &str, date: NaiveDate) -> Self {
        let today = format_date(date);
        let mut payload = Self::new(FormMode::Full);
        payload
            .push("run", run.dotted())
            .push("nombre", record.nombre.as_str())
            .push("fecha_nacimiento", "1985-03-15")
            .push("direccion", "Calle Falsa 123")
            .push("telefono", record.telefono.as_str())
            .push("sexo", "femenino")
            .push("sector_id", sector_id)
            .push("fecha_ingreso", today.as_str())
            .push("ingreso_ecicep", "1")
            .push("en_programa_cv", "0")
            .push("nivel_educacional", record.nivel_educacional.as_str())
            .push("origen_etnico", record.origen_etnico.as_str())
            .push("estado_civil", record.estado_civil.as_str())
            .push(FLAG_PATHOLOGY_ONLY, "0")
            .push(FLAG_AGREEMENT_ONLY, "0")
            .push(FLAG_CONTROL_ONLY, "0")
            .push("fecha", today.as_str())
            .push("profesional", record.profesional.as_str())
            .push("peso", "70")
            .push("talla", "1.70")
            .push("presion_sistolica", "120")
            .push("presion_diastolica", "80")
            .push("cc", "90")
            .push("hgt", "95")
            .push("hba1c", "6.2")
            .push("nuevo_acuerdo", record.acuerdo.as_str())
            .push("cumplimiento", record.cumplimiento.as_str())
            .push("observaciones", "Caso generado por prueba automatizada")
            .push("fecha_acuerdo", today.as_str());
        for code in &record.patologias {
            payload.push("patologias", code.as_str());
        }
        payload
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// First value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value submitted under `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Selector flags set to `"1"`.
    pub fn active_selectors(&self) -> Vec<&str> {
        [FLAG_AGREEMENT_ONLY, FLAG_CONTROL_ONLY, FLAG_PATHOLOGY_ONLY]
            .into_iter()
            .filter(|flag| self.get(flag) == Some("1"))
            .collect()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
