use crate::domain::model::ExtractionResult;

/// Results of the latest successful submission. Each replace is a fresh analysis.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    results: Vec<ExtractionResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, results: Vec<ExtractionResult>) {
        tracing::debug!(
            "Replacing {} stored results with {}",
            self.results.len(),
            results.len()
        );
        self.results = results;
    }

    pub fn current(&self) -> &[ExtractionResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
