use crate::domain::model::ExtractionResult;

const DELIMITER: char = ',';
const SEPARATOR: &str = ",";

/// Renders results as one CSV line per result.
///
/// Columns come from the first result. Carriage returns, line feeds and
/// delimiters inside values become single spaces, and every value is quoted.
/// An empty slice renders as an empty string.
pub fn serialize(results: &[ExtractionResult]) -> String {
    let Some(first) = results.first() else {
        return String::new();
    };

    let columns: Vec<&'static str> = first.to_row().into_iter().map(|(k, _)| k).collect();

    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(columns.join(SEPARATOR));

    for result in results {
        let row = result.to_row();
        let fields: Vec<String> = columns
            .iter()
            .map(|column| {
                let value = row
                    .iter()
                    .find(|(k, _)| k == column)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_default();
                quote(value)
            })
            .collect();
        lines.push(fields.join(SEPARATOR));
    }

    lines.join("\n")
}

fn quote(value: &str) -> String {
    let flattened: String = value
        .chars()
        .map(|c| match c {
            '\r' | '\n' | DELIMITER => ' ',
            other => other,
        })
        .collect();
    format!("\"{}\"", flattened.replace('"', "\"\""))
}
