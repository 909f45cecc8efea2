use thiserror::Error;

/// Failures while turning raw text into a [`Dataset`](crate::domain::model::Dataset).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Input contains no header row")]
    EmptyInput,

    #[error("Duplicate column '{name}' in header")]
    DuplicateColumn { name: String },

    #[error("Row on line {line} has {found} fields, header has {expected}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Input is not valid UTF-8: {message}")]
    Encoding { message: String },

    #[error("CSV syntax error: {message}")]
    Syntax { message: String },
}

/// Missing or inconsistent user selections. These block submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No dataset has been loaded")]
    MissingDataset,

    #[error("No query template has been entered")]
    MissingTemplate,

    #[error("No column has been selected")]
    MissingColumn,

    #[error("Column '{column}' is not part of the dataset")]
    UnknownColumn { column: String },

    #[error("Template has no {{placeholder}} token")]
    MissingPlaceholder,

    #[error("Template uses more than one placeholder: {tokens:?}")]
    MultiplePlaceholders { tokens: Vec<String> },

    #[error("The dataset has no rows to query")]
    NoRows,

    #[error("A submission is already in flight")]
    SubmitInFlight,

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },
}

/// Failures at the extraction service boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Transport failure{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("Service returned {actual} results for {expected} queries")]
    ResponseShapeMismatch { expected: usize, actual: usize },

    #[error("Service response could not be decoded: {message}")]
    InvalidResponse { message: String },

    #[error("Request could not be built: {message}")]
    RequestEncoding { message: String },
}

impl ClientError {
    /// Connection problems, timeouts, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport { status: None, .. } => true,
            ClientError::Transport {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("There are no results to export")]
    NoResults,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Network,
    Export,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Parse(_) => ErrorCategory::Input,
            AppError::Config(_) => ErrorCategory::Configuration,
            AppError::Client(_) => ErrorCategory::Network,
            AppError::Export(_) => ErrorCategory::Export,
            AppError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Export(_) => ErrorSeverity::Low,
            AppError::Client(e) if e.is_transient() => ErrorSeverity::Medium,
            AppError::Parse(_) | AppError::Config(_) | AppError::Client(_) => ErrorSeverity::High,
            AppError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::Parse(e) => format!("The uploaded file could not be read: {}", e),
            AppError::Config(e) => format!("Cannot submit yet: {}", e),
            AppError::Client(e) => format!("Error calling the extraction service: {}", e),
            AppError::Export(e) => e.to_string(),
            AppError::IoError(e) => format!("File system error: {}", e),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AppError::Parse(ParseError::DuplicateColumn { .. }) => {
                "Rename the duplicated header so every column name is unique, then upload again"
            }
            AppError::Parse(ParseError::MalformedRow { .. }) => {
                "Check the reported line for unquoted commas or extra fields"
            }
            AppError::Parse(_) => "Upload a UTF-8 comma separated file with a header row",
            AppError::Config(ConfigError::UnknownColumn { .. }) => {
                "Pick one of the columns listed in the file header"
            }
            AppError::Config(ConfigError::MultiplePlaceholders { .. }) => {
                "Use a single {placeholder} token in the template"
            }
            AppError::Config(_) => "Provide a file, a query template and a column, then submit",
            AppError::Client(ClientError::ResponseShapeMismatch { .. }) => {
                "The service answered with an unexpected number of results; submit again"
            }
            AppError::Client(_) => "Check that the extraction service is reachable and submit again",
            AppError::Export(_) => "Run a query first, then export",
            AppError::IoError(_) => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
