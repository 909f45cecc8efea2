use crate::core::binder::{self, PlaceholderPolicy, QueryTemplate};
use crate::core::limiter::{self, Batch, DEFAULT_BATCH_CAP};
use crate::core::parser;
use crate::core::serializer;
use crate::core::store::ResultStore;
use crate::domain::model::{Dataset, DatasetId, ExtractionResult};
use crate::domain::ports::{ConfigProvider, ExtractionService};
use crate::utils::error::{ClientError, ConfigError, ExportError, ParseError, Result};
use std::sync::Arc;

/// Everything needed to send one batch, bound to the dataset it came from.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub dataset_id: DatasetId,
    pub dataset: Arc<Dataset>,
    pub template: QueryTemplate,
    pub column: String,
    pub batch: Batch,
}

/// Handle for a submission in flight. Completing it clears the busy flag.
#[derive(Debug)]
pub struct SubmitTicket {
    id: u64,
    prepared: PreparedBatch,
}

impl SubmitTicket {
    pub fn prepared(&self) -> &PreparedBatch {
        &self.prepared
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Results stored, replacing anything before.
    Applied { count: usize },
    /// The dataset changed while the request was out; the response was dropped.
    Discarded,
}

/// One user's workflow: uploaded dataset, selections, and the latest results.
#[derive(Debug)]
pub struct Session {
    dataset: Option<Arc<Dataset>>,
    dataset_id: DatasetId,
    column: Option<String>,
    template: String,
    policy: PlaceholderPolicy,
    batch_cap: usize,
    store: ResultStore,
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_CAP, PlaceholderPolicy::default())
    }
}

impl Session {
    pub fn new(batch_cap: usize, policy: PlaceholderPolicy) -> Self {
        Self {
            dataset: None,
            dataset_id: DatasetId(0),
            column: None,
            template: String::new(),
            policy,
            batch_cap,
            store: ResultStore::new(),
            in_flight: None,
            next_ticket: 0,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(
            config.batch_cap(),
            PlaceholderPolicy::from_strict(config.strict_placeholders()),
        )
    }

    /// Replaces the dataset. On failure the previous dataset stays loaded.
    /// A submission still out for the old dataset no longer keeps the session busy.
    pub fn load_dataset(&mut self, raw_text: &str) -> std::result::Result<DatasetId, ParseError> {
        let dataset = parser::parse(raw_text)?;
        Ok(self.install(dataset))
    }

    pub fn load_bytes(&mut self, raw: &[u8]) -> std::result::Result<DatasetId, ParseError> {
        let dataset = parser::parse_bytes(raw)?;
        Ok(self.install(dataset))
    }

    fn install(&mut self, dataset: Dataset) -> DatasetId {
        if let Some(column) = &self.column {
            if !dataset.schema().contains(column) {
                tracing::info!("Column '{}' is not in the new file; selection cleared", column);
                self.column = None;
            }
        }
        if let Some(ticket) = self.in_flight.take() {
            tracing::info!("Submission #{} now belongs to a replaced dataset", ticket);
        }
        self.dataset_id = DatasetId(self.dataset_id.0 + 1);
        tracing::info!(
            "Loaded dataset #{} with {} rows and columns {:?}",
            self.dataset_id.0,
            dataset.len(),
            dataset.schema().columns()
        );
        self.dataset = Some(Arc::new(dataset));
        self.dataset_id
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    pub fn select_column(&mut self, column: &str) -> std::result::Result<(), ConfigError> {
        let dataset = self.dataset.as_ref().ok_or(ConfigError::MissingDataset)?;
        if !dataset.schema().contains(column) {
            return Err(ConfigError::UnknownColumn {
                column: column.to_string(),
            });
        }
        self.column = Some(column.to_string());
        Ok(())
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn set_template(&mut self, template: &str) {
        self.template = template.to_string();
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Binds and limits the current selection without sending anything.
    /// `batch.truncated` must be shown to the user before submitting.
    pub fn prepare(&self) -> std::result::Result<PreparedBatch, ConfigError> {
        let dataset = self.dataset.clone().ok_or(ConfigError::MissingDataset)?;
        if self.template.trim().is_empty() {
            return Err(ConfigError::MissingTemplate);
        }
        let column = self.column.clone().ok_or(ConfigError::MissingColumn)?;
        if dataset.is_empty() {
            return Err(ConfigError::NoRows);
        }

        let template = QueryTemplate::parse(&self.template, self.policy)?;
        let queries = binder::bind(&template, &column, &dataset)?;
        let batch = limiter::limit(queries, self.batch_cap);

        Ok(PreparedBatch {
            dataset_id: self.dataset_id,
            dataset,
            template,
            column,
            batch,
        })
    }

    /// Prepares a batch and marks the session busy until [`Session::complete_submit`].
    pub fn begin_submit(&mut self) -> std::result::Result<SubmitTicket, ConfigError> {
        if self.in_flight.is_some() {
            return Err(ConfigError::SubmitInFlight);
        }
        let prepared = self.prepare()?;
        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        Ok(SubmitTicket {
            id: self.next_ticket,
            prepared,
        })
    }

    /// Applies a finished submission. Responses bound to a replaced dataset are
    /// dropped, and a failed submission leaves the stored results untouched.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: std::result::Result<Vec<ExtractionResult>, ClientError>,
    ) -> std::result::Result<SubmitOutcome, ClientError> {
        if self.in_flight == Some(ticket.id) {
            self.in_flight = None;
        }

        if ticket.prepared.dataset_id != self.dataset_id {
            tracing::warn!(
                "Discarding response for dataset #{}; current dataset is #{}",
                ticket.prepared.dataset_id.0,
                self.dataset_id.0
            );
            return Ok(SubmitOutcome::Discarded);
        }

        let results = outcome?;
        let count = results.len();
        self.store.replace(results);
        Ok(SubmitOutcome::Applied { count })
    }

    /// Runs one full submission against `service`. Dropping the returned
    /// future before it finishes releases the busy flag.
    pub async fn submit<S>(&mut self, service: &S) -> Result<SubmitOutcome>
    where
        S: ExtractionService + ?Sized,
    {
        let ticket = self.begin_submit()?;
        let prepared = ticket.prepared().clone();
        let guard = InFlightGuard {
            session: self,
            ticket: Some(ticket),
        };
        let outcome = service
            .submit(
                &prepared.batch.selected,
                &prepared.dataset,
                prepared.template.as_str(),
                &prepared.column,
            )
            .await;
        Ok(guard.finish(outcome)?)
    }

    pub fn results(&self) -> &[ExtractionResult] {
        self.store.current()
    }

    /// Results as CSV text ready for download.
    pub fn export(&self) -> std::result::Result<String, ExportError> {
        if self.store.is_empty() {
            return Err(ExportError::NoResults);
        }
        Ok(serializer::serialize(self.store.current()))
    }
}

/// Releases the busy flag if a submission is abandoned mid-request.
struct InFlightGuard<'a> {
    session: &'a mut Session,
    ticket: Option<SubmitTicket>,
}

impl InFlightGuard<'_> {
    fn finish(
        mut self,
        outcome: std::result::Result<Vec<ExtractionResult>, ClientError>,
    ) -> std::result::Result<SubmitOutcome, ClientError> {
        match self.ticket.take() {
            Some(ticket) => self.session.complete_submit(ticket, outcome),
            None => Ok(SubmitOutcome::Discarded),
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.session.in_flight == Some(ticket.id) {
                tracing::warn!("Submission #{} was cancelled before a response arrived", ticket.id);
                self.session.in_flight = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BoundQuery;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every query with its own text, or a canned failure.
    struct EchoService {
        fail_with: Option<ClientError>,
        short_by: usize,
        seen: Mutex<Vec<Vec<BoundQuery>>>,
    }

    impl EchoService {
        fn new() -> Self {
            Self {
                fail_with: None,
                short_by: 0,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExtractionService for EchoService {
        async fn submit(
            &self,
            selected: &[BoundQuery],
            context: &Dataset,
            _template: &str,
            column: &str,
        ) -> std::result::Result<Vec<ExtractionResult>, ClientError> {
            self.seen.lock().unwrap().push(selected.to_vec());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let keep = selected.len().saturating_sub(self.short_by);
            if keep != selected.len() {
                return Err(ClientError::ResponseShapeMismatch {
                    expected: selected.len(),
                    actual: keep,
                });
            }
            Ok(selected
                .iter()
                .map(|q| ExtractionResult {
                    index: q.index,
                    raw_column_value: context.value(q.index, column).unwrap_or_default().into(),
                    entity: None,
                    extracted_text: q.text.clone(),
                    structured_fields: None,
                })
                .collect())
        }
    }

    fn ready_session(csv: &str) -> Session {
        let mut session = Session::default();
        session.load_dataset(csv).unwrap();
        session.select_column("company").unwrap();
        session.set_template("Get the email of {company}");
        session
    }

    #[test]
    fn test_prepare_requires_dataset_template_and_column() {
        let mut session = Session::default();
        assert_eq!(session.prepare().unwrap_err(), ConfigError::MissingDataset);

        session.load_dataset("company\nAcme\n").unwrap();
        assert_eq!(session.prepare().unwrap_err(), ConfigError::MissingTemplate);

        session.set_template("Email of {company}");
        assert_eq!(session.prepare().unwrap_err(), ConfigError::MissingColumn);

        session.select_column("company").unwrap();
        assert!(session.prepare().is_ok());
    }

    #[test]
    fn test_from_config_uses_cap_and_policy() {
        let settings = crate::config::ClientSettings {
            batch_cap: 1,
            strict_placeholders: true,
            ..Default::default()
        };
        let mut session = Session::from_config(&settings);
        session.load_dataset("company\nAcme\nGlobex\n").unwrap();
        session.select_column("company").unwrap();

        session.set_template("no token");
        assert_eq!(session.prepare().unwrap_err(), ConfigError::MissingPlaceholder);

        session.set_template("{company}");
        let prepared = session.prepare().unwrap();
        assert!(prepared.batch.truncated);
        assert_eq!(prepared.batch.selected.len(), 1);
    }

    #[test]
    fn test_select_unknown_column() {
        let mut session = Session::default();
        session.load_dataset("company\nAcme\n").unwrap();
        assert_eq!(
            session.select_column("city").unwrap_err(),
            ConfigError::UnknownColumn {
                column: "city".to_string()
            }
        );
    }

    #[test]
    fn test_prepare_reports_truncation_before_submit() {
        let mut csv = String::from("company\n");
        for i in 0..30 {
            csv.push_str(&format!("Company {}\n", i));
        }
        let session = ready_session(&csv);
        let prepared = session.prepare().unwrap();

        assert!(prepared.batch.truncated);
        assert_eq!(prepared.batch.selected.len(), 25);
        assert_eq!(prepared.batch.selected[24].text, "Get the email of Company 24");
    }

    #[tokio::test]
    async fn test_submit_stores_results() {
        let mut session = ready_session("company\n\"Acme, Inc.\"\nGlobex\n");
        let service = EchoService::new();

        let outcome = session.submit(&service).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Applied { count: 2 });
        assert_eq!(session.results()[0].extracted_text, "Get the email of Acme, Inc.");
        assert_eq!(session.results()[1].raw_column_value, "Globex");
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_previous_results() {
        let mut session = ready_session("company\nAcme\nGlobex\n");
        session.submit(&EchoService::new()).await.unwrap();
        assert_eq!(session.results().len(), 2);

        let mut short = EchoService::new();
        short.short_by = 1;
        let err = session.submit(&short).await.unwrap_err();

        assert!(matches!(
            err,
            crate::utils::error::AppError::Client(ClientError::ResponseShapeMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(session.results().len(), 2);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_second_begin_while_busy_is_rejected() {
        let mut session = ready_session("company\nAcme\n");
        let _ticket = session.begin_submit().unwrap();

        assert!(session.is_busy());
        assert_eq!(
            session.begin_submit().unwrap_err(),
            ConfigError::SubmitInFlight
        );
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut session = ready_session("company\nAcme\n");
        let ticket = session.begin_submit().unwrap();

        session.load_dataset("company\nInitech\n").unwrap();
        let stale = vec![ExtractionResult {
            index: 0,
            raw_column_value: "Acme".into(),
            entity: None,
            extracted_text: "old".into(),
            structured_fields: None,
        }];
        let outcome = session.complete_submit(ticket, Ok(stale)).unwrap();

        assert_eq!(outcome, SubmitOutcome::Discarded);
        assert!(session.results().is_empty());
        assert!(!session.is_busy());
    }

    struct NeverAnswers;

    #[async_trait]
    impl ExtractionService for NeverAnswers {
        async fn submit(
            &self,
            _selected: &[BoundQuery],
            _context: &Dataset,
            _template: &str,
            _column: &str,
        ) -> std::result::Result<Vec<ExtractionResult>, ClientError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_submit_releases_busy_flag() {
        let mut session = ready_session("company\nAcme\n");

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            session.submit(&NeverAnswers),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(!session.is_busy());

        let outcome = session.submit(&EchoService::new()).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Applied { count: 1 });
    }

    #[test]
    fn test_reupload_releases_abandoned_ticket() {
        let mut session = ready_session("company\nAcme\n");
        let abandoned = session.begin_submit().unwrap();
        drop(abandoned);
        assert!(session.is_busy());

        session.load_dataset("company\nGlobex\n").unwrap();
        assert!(!session.is_busy());
        let ticket = session.begin_submit().unwrap();
        assert_eq!(ticket.prepared().batch.selected[0].text, "Get the email of Globex");
    }

    #[test]
    fn test_reupload_clears_missing_column_selection() {
        let mut session = ready_session("company\nAcme\n");
        session.load_dataset("name\nAda\n").unwrap();
        assert_eq!(session.column(), None);

        session.load_dataset("company,name\nAcme,Ada\n").unwrap();
        session.select_column("company").unwrap();
        session.load_dataset("name,company\nBob,Globex\n").unwrap();
        assert_eq!(session.column(), Some("company"));
    }

    #[test]
    fn test_failed_upload_keeps_previous_dataset() {
        let mut session = ready_session("company\nAcme\n");
        let id = session.dataset_id();

        assert!(session.load_dataset("a,a\n1,2\n").is_err());
        assert_eq!(session.dataset_id(), id);
        assert_eq!(session.dataset().unwrap().len(), 1);
    }

    #[test]
    fn test_export_without_results() {
        let session = Session::default();
        assert_eq!(session.export().unwrap_err(), ExportError::NoResults);
    }

    #[tokio::test]
    async fn test_export_after_submit() {
        let mut session = ready_session("company\nAcme\n");
        session.submit(&EchoService::new()).await.unwrap();

        let csv = session.export().unwrap();
        assert_eq!(
            csv,
            "index,raw_column_value,entity,extracted_text\n\"0\",\"Acme\",\"\",\"Get the email of Acme\""
        );
    }

    #[test]
    fn test_empty_dataset_cannot_be_submitted() {
        let mut session = Session::default();
        session.load_dataset("company\n").unwrap();
        session.select_column("company").unwrap();
        session.set_template("{company}");
        assert_eq!(session.prepare().unwrap_err(), ConfigError::NoRows);
    }
}
