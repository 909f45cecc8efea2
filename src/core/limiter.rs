use crate::domain::model::BoundQuery;

/// Ceiling imposed by the extraction service per request.
pub const DEFAULT_BATCH_CAP: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub selected: Vec<BoundQuery>,
    /// True when some queries were left out. Must be shown before submitting.
    pub truncated: bool,
    pub total: usize,
}

/// Keeps the first `cap` queries in their original order.
pub fn limit(mut queries: Vec<BoundQuery>, cap: usize) -> Batch {
    let total = queries.len();
    let truncated = total > cap;
    if truncated {
        queries.truncate(cap);
        tracing::warn!(
            "Only the first {} of {} rows will be submitted",
            cap,
            total
        );
    }
    Batch {
        selected: queries,
        truncated,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(n: usize) -> Vec<BoundQuery> {
        (0..n)
            .map(|index| BoundQuery {
                index,
                text: format!("query {}", index),
            })
            .collect()
    }

    #[test]
    fn test_limit_truncates_to_prefix() {
        let batch = limit(queries(30), DEFAULT_BATCH_CAP);

        assert!(batch.truncated);
        assert_eq!(batch.total, 30);
        assert_eq!(batch.selected, queries(25));
    }

    #[test]
    fn test_limit_under_cap_is_unchanged() {
        let batch = limit(queries(10), DEFAULT_BATCH_CAP);

        assert!(!batch.truncated);
        assert_eq!(batch.selected, queries(10));
    }

    #[test]
    fn test_limit_exactly_cap_is_not_truncated() {
        let batch = limit(queries(25), 25);
        assert!(!batch.truncated);
        assert_eq!(batch.selected.len(), 25);
    }

    #[test]
    fn test_limit_empty() {
        let batch = limit(Vec::new(), 25);
        assert!(!batch.truncated);
        assert!(batch.selected.is_empty());
    }
}
