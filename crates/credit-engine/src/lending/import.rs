//! CSV score-history import used to seed in-memory score sources.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Number, Value};

use super::domain::ApplicantId;

const APPLICANT_COLUMNS: &[&str] = &["applicant_id", "applicantId", "user_id"];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read score history export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid score history CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("score history export has no applicant column (expected one of {expected})")]
    MissingApplicantColumn { expected: String },
}

pub struct ScoreHistoryImporter;

impl ScoreHistoryImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<BTreeMap<ApplicantId, Vec<Value>>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Groups rows by applicant, preserving file order. Every other column is carried as
    /// a loosely-shaped record; numeric cells become JSON numbers and blank cells are
    /// skipped so the trend normalizer can apply its field fallbacks.
    pub fn from_reader<R: Read>(
        reader: R,
    ) -> Result<BTreeMap<ApplicantId, Vec<Value>>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let applicant_column = headers
            .iter()
            .position(|header| APPLICANT_COLUMNS.contains(&header))
            .ok_or_else(|| ImportError::MissingApplicantColumn {
                expected: APPLICANT_COLUMNS.join(", "),
            })?;

        let mut grouped: BTreeMap<ApplicantId, Vec<Value>> = BTreeMap::new();
        for row in csv_reader.records() {
            let row = row?;
            let Some(raw_applicant) = row.get(applicant_column).filter(|cell| !cell.is_empty())
            else {
                continue;
            };

            let mut record = Map::new();
            for (index, (header, cell)) in headers.iter().zip(row.iter()).enumerate() {
                if index == applicant_column || cell.is_empty() {
                    continue;
                }
                record.insert(header.to_string(), cell_value(cell));
            }

            grouped
                .entry(ApplicantId::canonical(raw_applicant))
                .or_default()
                .push(Value::Object(record));
        }

        Ok(grouped)
    }
}

fn cell_value(cell: &str) -> Value {
    cell.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}
