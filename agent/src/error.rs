//! Agent error types with reason codes.

use thiserror::Error;

/// Reason codes for agent errors, providing machine-readable context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// No assessment rule is registered for the evidence source.
    UnknownSource = 100,
    /// Serialization or deserialization failed.
    SerializationFailed = 200,
    /// The durable sink rejected or failed to store a blob.
    ExportFailed = 300,
    /// Claim attestation or signing failed.
    AttestationFailed = 400,
    /// Telemetry backend could not be set up.
    TelemetryFailed = 500,
    /// An agent lifecycle transition was not allowed.
    InvalidLifecycle = 600,
    /// File I/O failed.
    IoFailed = 700,
}

/// Errors that can occur while turning evidence into claims.
#[derive(Error, Debug)]
pub enum ComplianceError {
    /// The evidence names a source with no registered assessment rule.
    #[error("Unknown evidence source (reason {reason}): {message}")]
    UnknownSource { reason: u32, message: String },

    /// Serialization or deserialization failed.
    #[error("Serialization error (reason {reason}): {message}")]
    SerializationError { reason: u32, message: String },

    /// Exporting a blob to the durable sink failed.
    #[error("Export error (reason {reason}): {message}")]
    ExportError { reason: u32, message: String },

    /// Attesting a claim failed.
    #[error("Attestation error (reason {reason}): {message}")]
    AttestationError { reason: u32, message: String },

    /// Telemetry setup or shutdown failed.
    #[error("Telemetry error (reason {reason}): {message}")]
    TelemetryError { reason: u32, message: String },

    /// The requested lifecycle transition is not valid in the current state.
    #[error("Lifecycle error (reason {reason}): {message}")]
    LifecycleError { reason: u32, message: String },

    /// File I/O error.
    #[error("I/O error (reason {reason}): {message}")]
    IoError { reason: u32, message: String },
}

impl ComplianceError {
    pub fn unknown_source(message: impl Into<String>) -> Self {
        Self::UnknownSource {
            reason: ReasonCode::UnknownSource as u32,
            message: message.into(),
        }
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            reason: ReasonCode::SerializationFailed as u32,
            message: message.into(),
        }
    }

    pub fn export_error(message: impl Into<String>) -> Self {
        Self::ExportError {
            reason: ReasonCode::ExportFailed as u32,
            message: message.into(),
        }
    }

    pub fn attestation_error(message: impl Into<String>) -> Self {
        Self::AttestationError {
            reason: ReasonCode::AttestationFailed as u32,
            message: message.into(),
        }
    }

    pub fn telemetry_error(message: impl Into<String>) -> Self {
        Self::TelemetryError {
            reason: ReasonCode::TelemetryFailed as u32,
            message: message.into(),
        }
    }

    pub fn lifecycle_error(message: impl Into<String>) -> Self {
        Self::LifecycleError {
            reason: ReasonCode::InvalidLifecycle as u32,
            message: message.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::IoError {
            reason: ReasonCode::IoFailed as u32,
            message: message.into(),
        }
    }

    /// The numeric reason code carried by this error.
    pub fn reason(&self) -> u32 {
        match self {
            Self::UnknownSource { reason, .. }
            | Self::SerializationError { reason, .. }
            | Self::ExportError { reason, .. }
            | Self::AttestationError { reason, .. }
            | Self::TelemetryError { reason, .. }
            | Self::LifecycleError { reason, .. }
            | Self::IoError { reason, .. } => *reason,
        }
    }
}

impl From<std::io::Error> for ComplianceError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for ComplianceError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}

/// Result type for agent operations.
pub type ComplianceResult<T> = std::result::Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_attached() {
        assert_eq!(ComplianceError::unknown_source("x").reason(), 100);
        assert_eq!(ComplianceError::attestation_error("x").reason(), 400);
        assert_eq!(ComplianceError::lifecycle_error("x").reason(), 600);
    }

    #[test]
    fn test_io_error_converts() {
        let err: ComplianceError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ComplianceError::IoError { .. }));
        assert!(err.to_string().contains("gone"));
    }
}
