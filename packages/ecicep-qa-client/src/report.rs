//! REM P 2025 report sections.

use std::fmt;

use serde_json::{Number, Value};

use ecicep_qa_core::{QaError, Result};

use crate::session::AppSession;

/// Characters of the pretty-printed section A body shown in the preview.
const SECTION_A_PREVIEW_CHARS: usize = 500;

/// A report section served under `/api/rem-p-2025/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    A,
    B,
}

impl Section {
    pub fn path(self) -> &'static str {
        match self {
            Section::A => "/api/rem-p-2025/seccion-a",
            Section::B => "/api/rem-p-2025/seccion-b",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::A => "Sección A",
            Section::B => "Sección B",
        }
    }

    /// `(label, JSON pointer)` of every numeric field the section must carry.
    pub fn required_totals(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Section::A => &[
                ("Total PSCV", "/datos/total_pscv/totales/total"),
                ("Total HTA", "/datos/hipertension/totales/total"),
                ("Total DM2", "/datos/diabetes_tipo2/totales/total"),
            ],
            Section::B => &[
                ("HTA Total", "/datos/hta/total"),
                ("HTA Controlados", "/datos/hta/controlados"),
            ],
        }
    }

    /// Pretty-printed body; section A is cut after 500 characters.
    pub fn preview(self, body: &Value) -> String {
        let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
        match self {
            Section::A if pretty.chars().count() > SECTION_A_PREVIEW_CHARS => {
                let mut cut: String = pretty.chars().take(SECTION_A_PREVIEW_CHARS).collect();
                cut.push_str("...");
                cut
            }
            _ => pretty,
        }
    }
}

/// One headline number from a report section.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTotal {
    pub label: &'static str,
    pub value: Number,
}

impl fmt::Display for ReportTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Pulls the section's required totals out of `body`.
///
/// A missing or non-numeric field is [`QaError::Report`] naming its pointer.
pub fn extract_totals(section: Section, body: &Value) -> Result<Vec<ReportTotal>> {
    section
        .required_totals()
        .iter()
        .map(|&(label, pointer)| match body.pointer(pointer) {
            Some(Value::Number(n)) => Ok(ReportTotal {
                label,
                value: n.clone(),
            }),
            Some(other) => Err(QaError::Report(format!(
                "{}: {} is not numeric ({})",
                section.name(),
                pointer,
                other
            ))),
            None => Err(QaError::Report(format!(
                "{}: {} is missing",
                section.name(),
                pointer
            ))),
        })
        .collect()
}

impl AppSession {
    /// Fetches a section and checks its required totals.
    pub async fn fetch_report(&self, section: Section) -> Result<(Value, Vec<ReportTotal>)> {
        let body = self.get_json(section.path()).await?;
        let totals = extract_totals(section, &body)?;
        Ok((body, totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_a_totals() {
        let body = json!({
            "datos": {
                "total_pscv": {"totales": {"total": 120}},
                "hipertension": {"totales": {"total": 95}},
                "diabetes_tipo2": {"totales": {"total": 40}}
            }
        });
        let totals = extract_totals(Section::A, &body).unwrap();
        let rendered: Vec<String> = totals.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["Total PSCV: 120", "Total HTA: 95", "Total DM2: 40"]
        );
    }

    #[test]
    fn test_section_b_missing_field_names_pointer() {
        let body = json!({"datos": {"hta": {"total": 10}}});
        let err = extract_totals(Section::B, &body).unwrap_err();
        assert_eq!(
            err,
            QaError::Report("Sección B: /datos/hta/controlados is missing".to_string())
        );
    }

    #[test]
    fn test_non_numeric_total_is_rejected() {
        let body = json!({"datos": {"hta": {"total": "10", "controlados": 4}}});
        assert!(matches!(
            extract_totals(Section::B, &body),
            Err(QaError::Report(msg)) if msg.contains("not numeric")
        ));
    }

    #[test]
    fn test_section_a_preview_is_truncated() {
        let body = json!({"datos": {"relleno": "x".repeat(2_000)}});
        let preview = Section::A.preview(&body);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), SECTION_A_PREVIEW_CHARS + 3);
        assert!(!Section::B.preview(&body).ends_with("..."));
    }
}
