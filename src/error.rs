//! Error types for seisqc-rs.

use thiserror::Error;

/// All errors that can occur while evaluating quality metrics.
#[derive(Debug, Error)]
pub enum QcError {
    /// A reference noise-model file contains a line that is not exactly
    /// `(period, power_dB)`
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// A channel-id string does not split into `"LOC,CODE"`
    #[error("bad channel id: '{0}'")]
    BadChannelId(String),

    /// `set` was called for an argument the metric never declared
    #[error("unknown argument: '{0}'")]
    UnknownArgument(String),

    /// A declared argument the metric requires was never populated
    #[error("missing argument: '{0}'")]
    MissingArgument(String),

    /// An argument value could not be interpreted
    #[error("invalid argument {name}: '{value}'")]
    InvalidArgument { name: String, value: String },

    /// The two channels of a cross-power pair are sampled at different rates
    #[error("sample rate mismatch: {a} Hz vs {b} Hz")]
    SampleRateMismatch { a: f64, b: f64 },

    /// The channel's response does not satisfy the three-stage rule
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A frequency response was requested for a polynomial channel
    #[error("frequency response is unsupported for a polynomial stage")]
    UnsupportedForPolynomial,

    /// A pole-zero stage carries a transfer-function tag other than 'A' or 'B'
    #[error("unknown stage transfer type: '{0}'")]
    UnknownStageType(char),

    /// A response bin with zero magnitude blocked deconvolution
    #[error("zero response magnitude at {frequency} Hz")]
    ZeroResponse { frequency: f64 },

    /// The configured period band contains no usable period
    #[error("empty band: no period in [{low}, {high}] s")]
    EmptyBand { low: f64, high: f64 },

    /// No sample data overlaps for the requested channels
    #[error("missing data: {0}")]
    MissingData(String),

    /// The persistence layer rejected an operation
    #[error("storage error: {0}")]
    Storage(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_sample_rate() {
        let err = QcError::SampleRateMismatch { a: 20.0, b: 40.0 };
        assert!(err.to_string().contains("20"));
        assert!(err.to_string().contains("40"));
    }

    #[test]
    fn error_display_empty_band() {
        let err = QcError::EmptyBand {
            low: 20.0,
            high: 50.0,
        };
        assert!(err.to_string().contains("empty band"));
    }

    #[test]
    fn error_display_unknown_argument() {
        let err = QcError::UnknownArgument("no-such-arg".into());
        assert!(err.to_string().contains("no-such-arg"));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QcError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }
}
