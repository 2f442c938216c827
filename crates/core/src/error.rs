#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A stored snapshot is missing fields or holds values of the wrong shape.
    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
