//! Errors raised while reading a source PDF and interpreting its pages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Malformed file structure, missing or mistyped objects.
    #[error("PDF parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encrypted documents are refused rather than read as garbage.
    #[error("encrypted PDFs are not supported")]
    Encrypted,

    #[error("page index {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// Nested Form XObjects went deeper than the interpreter allows.
    #[error("Form XObject recursion depth {depth} exceeds maximum {max}")]
    FormRecursion { depth: usize, max: usize },

    /// A content stream could not be decoded into operations.
    #[error("interpreter error: {0}")]
    Interpreter(String),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            BackendError::PageOutOfRange { index: 4, count: 3 }.to_string(),
            "page index 4 out of range (document has 3 pages)"
        );
        assert_eq!(
            BackendError::FormRecursion { depth: 17, max: 16 }.to_string(),
            "Form XObject recursion depth 17 exceeds maximum 16"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: BackendError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, BackendError::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
