use thiserror::Error;

/// Failure to read an input forest at all.
///
/// Problems inside an otherwise readable forest are reported as
/// [`crate::BuildDiagnostic`]s instead.
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("invalid forest JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected an array of node records or a single record, found {found}")]
    NotAForest { found: &'static str },
}
