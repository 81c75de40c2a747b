use chrono::NaiveDate;
use credit_engine::config::AuthConfig;
use credit_engine::lending::{
    ApplicantId, ApplicantProfile, Identity, IdentityResolver, ImportError, ScoreAssessment,
    ScoreHistoryImporter, ScoreSource, SourceError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local stand-in for the scoring service.
#[derive(Default, Clone)]
pub(crate) struct InMemoryScoreSource {
    profiles: Arc<Mutex<HashMap<ApplicantId, ApplicantProfile>>>,
    assessments: Arc<Mutex<HashMap<ApplicantId, ScoreAssessment>>>,
    history: Arc<Mutex<HashMap<ApplicantId, Vec<Value>>>>,
}

impl InMemoryScoreSource {
    /// Seeds history from a CSV export; every applicant in the file gets a bare profile.
    pub(crate) fn from_csv(path: &Path) -> Result<Self, ImportError> {
        let source = Self::default();
        for (applicant, records) in ScoreHistoryImporter::from_path(path)? {
            source.insert_profile(ApplicantProfile::bare(applicant.clone()));
            source.insert_history(&applicant, records);
        }
        Ok(source)
    }

    pub(crate) fn insert_profile(&self, profile: ApplicantProfile) {
        let mut guard = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(profile.id.clone(), profile);
    }

    /// Registers a profile unless the applicant is already known.
    pub(crate) fn ensure_profile(&self, id: &ApplicantId) {
        let mut guard = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(id.clone())
            .or_insert_with(|| ApplicantProfile::bare(id.clone()));
    }

    pub(crate) fn insert_assessment(&self, id: &ApplicantId, assessment: ScoreAssessment) {
        let mut guard = self.assessments.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(id.clone(), assessment);
    }

    pub(crate) fn insert_history(&self, id: &ApplicantId, records: Vec<Value>) {
        let mut guard = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(id.clone(), records);
    }

    pub(crate) fn applicant_count(&self) -> usize {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ScoreSource for InMemoryScoreSource {
    fn applicant(&self, id: &ApplicantId) -> Result<Option<ApplicantProfile>, SourceError> {
        let guard = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }

    fn assessment(&self, id: &ApplicantId) -> Result<Option<ScoreAssessment>, SourceError> {
        let guard = self.assessments.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }

    fn history(&self, id: &ApplicantId) -> Result<Vec<Value>, SourceError> {
        let guard = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned().unwrap_or_default())
    }
}

/// Resolves the two configured bearer tokens.
pub(crate) struct StaticTokenResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenResolver {
    pub(crate) fn from_config(auth: &AuthConfig) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            auth.admin_token.clone(),
            Identity {
                applicant_id: ApplicantId("admin".to_string()),
                is_admin: true,
            },
        );
        tokens.insert(
            auth.borrower_token.clone(),
            Identity {
                applicant_id: auth.borrower_id.clone(),
                is_admin: false,
            },
        );
        Self { tokens }
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).cloned()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
