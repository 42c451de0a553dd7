//! Rule store codecs and file persistence.
//!
//! # Responsibility
//! - Decode a store text into rules plus per-entry warnings.
//! - Encode rules back to text and rewrite a store after removals.
//! - Persist store files atomically.
//!
//! # Invariants
//! - A malformed entry never aborts a parse; it becomes a `StoreWarning`
//!   and its original text is preserved by every rewrite.
//! - `Now` rules are never persisted.
//! - Write paths call `Rule::validate()` before producing text.

use crate::model::rule::{Rule, RuleKey, RuleValidationError, SourcePosition};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub mod file;
pub mod markdown;
pub mod records;

pub use file::{FileRuleStore, RuleStore, StoreSnapshot};
pub use markdown::MarkdownCodec;
pub use records::RecordsCodec;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure that prevents reading or writing a store as a whole.
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
    InvalidRule(RuleValidationError),
    NotPersistable(RuleKey),
    /// The store changed on disk between load and rewrite.
    Conflict { path: PathBuf },
    InvalidDocument(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Yaml(err) => write!(f, "invalid YAML store: {err}"),
            Self::InvalidRule(err) => write!(f, "refusing to persist invalid rule: {err}"),
            Self::NotPersistable(key) => write!(f, "{} rules are never persisted", key.label()),
            Self::Conflict { path } => write!(
                f,
                "{} changed on disk since it was loaded; nothing was written",
                path.display()
            ),
            Self::InvalidDocument(message) => write!(f, "invalid store document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Yaml(err) => Some(err),
            Self::InvalidRule(err) => Some(err),
            Self::NotPersistable(_) | Self::Conflict { .. } | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<RuleValidationError> for StoreError {
    fn from(value: RuleValidationError) -> Self {
        Self::InvalidRule(value)
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

/// Why a single store entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEntryError {
    /// The entry does not follow the store grammar.
    Parse { reason: String },
    /// The entry parsed, but its fields do not fit its key.
    Validation(RuleValidationError),
}

impl StoreEntryError {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}

impl Display for StoreEntryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "parse error: {reason}"),
            Self::Validation(err) => write!(f, "validation error: {err}"),
        }
    }
}

impl Error for StoreEntryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse { .. } => None,
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<RuleValidationError> for StoreEntryError {
    fn from(value: RuleValidationError) -> Self {
        Self::Validation(value)
    }
}

/// A skipped entry: where it is, what it said and why it was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWarning {
    pub position: SourcePosition,
    pub text: String,
    pub error: StoreEntryError,
}

impl Display for StoreWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (`{}`)", self.position, self.error, self.text)
    }
}

/// Result of decoding a whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStore {
    /// Valid rules in source order, each with `source` set.
    pub rules: Vec<Rule>,
    pub warnings: Vec<StoreWarning>,
}

/// Text encoding of a rule store.
pub trait StoreCodec {
    /// Decodes `source`; only a document-level failure is an error.
    fn parse(&self, source: &str) -> StoreResult<ParsedStore>;
    /// Encodes `rules` as a fresh store document.
    fn serialize(&self, rules: &[Rule]) -> StoreResult<String>;
    /// Returns `source` with `removed` rules taken out and everything else kept.
    fn rewrite(&self, source: &str, removed: &[Rule]) -> StoreResult<String>;
    /// Returns `source` with `rule` added at the end.
    fn append(&self, source: &str, rule: &Rule) -> StoreResult<String>;
}

/// Store encodings understood by `FileRuleStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFormat {
    /// Bracketed-line text (`[d,3,1] title`).
    #[default]
    Markdown,
    /// YAML document with a `reminders:` list.
    Yaml,
}

impl StoreFormat {
    /// Guesses a format from a file extension; unknown extensions are markdown.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Markdown,
        }
    }

    pub fn codec(self) -> &'static dyn StoreCodec {
        match self {
            Self::Markdown => &MarkdownCodec,
            Self::Yaml => &RecordsCodec,
        }
    }
}

impl FromStr for StoreFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" | "text" => Ok(Self::Markdown),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!(
                "unsupported store format `{other}`; expected markdown|yaml"
            )),
        }
    }
}
