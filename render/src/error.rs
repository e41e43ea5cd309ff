//! Error taxonomy of the rendering pipeline
//!
//! Each stage has its own error type; [`Error`] wraps them and maps each
//! kind onto the HTTP status the web server answers with.

use hyper::StatusCode;
use sightline_shared::ProfileError;
use thiserror::Error;

/// Request query or saved configuration could not be turned into a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid regexp for {key}: {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("must have base profile to normalize by")]
    NormalizeWithoutBase,

    #[error("base profile is incompatible: {0}")]
    IncompatibleBase(#[from] ProfileError),

    #[error("invalid server settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// The aggregation engine rejected the command or the config.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} requires a regexp argument")]
    MissingArgument(&'static str),

    #[error("invalid regexp {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("sample index {0} is not valid for this profile")]
    SampleIndex(String),

    #[error("no matches found for regexp: {0}")]
    NoMatches(String),

    #[error("report for {command} has no {missing}")]
    MissingOutput {
        command: &'static str,
        missing: &'static str,
    },
}

/// A view could not be produced from a valid report.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Could not execute dot; may need to install graphviz.")]
    DiagramToolMissing,

    #[error("Failed to execute dot. Is Graphviz installed? {0}")]
    Diagram(String),

    #[error("failed to serialize view: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A profile could not be loaded.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: hyper::Error,
    },

    #[error("fetching {url}: server returned {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode profile: {0}")]
    Decode(String),

    #[error("profile is not valid: {0}")]
    Invalid(#[from] ProfileError),
}

/// Any failure while answering a render request.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl Error {
    /// HTTP status the web server reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_) | Error::Report(_) => StatusCode::BAD_REQUEST,
            Error::Render(RenderError::DiagramToolMissing) => StatusCode::NOT_IMPLEMENTED,
            Error::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Source(SourceError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                StatusCode::NOT_FOUND
            }
            Error::Source(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for the `status` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Report(_) => "report_error",
            Error::Render(_) => "render_error",
            Error::Source(_) => "source_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let e: Error = ConfigError::NormalizeWithoutBase.into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "must have base profile to normalize by");

        let e: Error = ReportError::NoMatches("zzz".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);

        let e: Error = RenderError::DiagramToolMissing.into();
        assert_eq!(e.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            e.to_string(),
            "Could not execute dot; may need to install graphviz."
        );

        let e: Error = RenderError::Diagram("exit status 1".into()).into();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let e: Error = SourceError::Io {
            path: "/tmp/none.pb.gz".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);

        let e: Error = SourceError::Io {
            path: "/root/cpu.pb.gz".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);

        let e: Error = SourceError::Decode("bad magic".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_kind_labels() {
        let e: Error = ReportError::UnknownCommand("list".into()).into();
        assert_eq!(e.kind(), "report_error");
    }
}
