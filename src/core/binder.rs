use crate::domain::model::{BoundQuery, Dataset};
use crate::utils::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"));

/// What to do with a template that contains no `{placeholder}` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderPolicy {
    /// Send the literal template for every row.
    #[default]
    AllowLiteral,
    /// Refuse the template with [`ConfigError::MissingPlaceholder`].
    Reject,
}

impl PlaceholderPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            PlaceholderPolicy::Reject
        } else {
            PlaceholderPolicy::AllowLiteral
        }
    }
}

/// A query template checked for its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    text: String,
    token: Option<String>,
}

impl QueryTemplate {
    /// Accepts at most one distinct `{name}` token, which may repeat.
    pub fn parse(text: &str, policy: PlaceholderPolicy) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::MissingTemplate);
        }

        let mut tokens: Vec<String> = Vec::new();
        for found in PLACEHOLDER.find_iter(text) {
            if !tokens.iter().any(|t| t == found.as_str()) {
                tokens.push(found.as_str().to_string());
            }
        }

        match tokens.len() {
            0 if policy == PlaceholderPolicy::Reject => Err(ConfigError::MissingPlaceholder),
            0 => {
                tracing::warn!("Template has no placeholder; the same query is sent for every row");
                Ok(Self {
                    text: text.to_string(),
                    token: None,
                })
            }
            1 => Ok(Self {
                text: text.to_string(),
                token: tokens.pop(),
            }),
            _ => Err(ConfigError::MultiplePlaceholders { tokens }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The placeholder token including its braces, e.g. `{company}`.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Replaces every occurrence of the placeholder with `value`, verbatim.
    pub fn render(&self, value: &str) -> String {
        match &self.token {
            Some(token) => self.text.replace(token.as_str(), value),
            None => self.text.clone(),
        }
    }
}

/// Produces one query per record, in dataset order.
pub fn bind(
    template: &QueryTemplate,
    column: &str,
    dataset: &Dataset,
) -> Result<Vec<BoundQuery>, ConfigError> {
    if !dataset.schema().contains(column) {
        return Err(ConfigError::UnknownColumn {
            column: column.to_string(),
        });
    }

    let queries: Vec<BoundQuery> = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(index, record)| BoundQuery {
            index,
            text: template.render(record.get(column).unwrap_or_default()),
        })
        .collect();

    tracing::debug!(
        "Bound {} queries on column '{}'",
        queries.len(),
        column
    );
    Ok(queries)
}
