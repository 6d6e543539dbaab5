//! Error handling

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::pipeline::Stage;

/// Failures retrieving the avatar.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The avatar URL could not be parsed or is not http(s).
    #[error("invalid avatar url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as supplied
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// The server answered with a non-success status, after any retries.
    #[error("GET {url} returned {status}")]
    Status {
        /// The requested URL
        url: String,
        /// The last status seen
        status: reqwest::StatusCode,
    },
    /// The body is larger than the fetcher will buffer.
    #[error("GET {url} body exceeds {limit} bytes")]
    TooLarge {
        /// The requested URL
        url: String,
        /// The configured limit
        limit: usize,
    },
    /// The request never produced a response, after any retries.
    #[error("GET {url} failed: {source}")]
    Transport {
        /// The requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// A bad URL, an oversized avatar or a 4xx from the avatar host is the
    /// caller's problem. Rate limits, 5xx and transport failures are not.
    pub fn severity(&self) -> Severity {
        match self {
            FetchError::InvalidUrl { .. } | FetchError::TooLarge { .. } => Severity::Client,
            FetchError::Status { status, .. }
                if status.is_client_error() && *status != reqwest::StatusCode::TOO_MANY_REQUESTS =>
            {
                Severity::Client
            }
            FetchError::Status { .. } | FetchError::Transport { .. } => Severity::Server,
        }
    }
}

/// Malformed image bytes, from the avatar or a template.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not an image we can decode.
    #[error("failed to decode {what}: {source}")]
    Image {
        /// What was being decoded
        what: String,
        /// Underlying codec error
        #[source]
        source: image::ImageError,
    },
    /// A template exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Template path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Failures invoking the image model.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// An input image could not be encoded for submission.
    #[error("failed to encode input image: {0}")]
    Encode(#[source] image::ImageError),
    /// The model endpoint could not be reached or its body could not be read.
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The model endpoint rejected the request.
    #[error("model returned {status}: {body}")]
    Status {
        /// HTTP status returned
        status: reqwest::StatusCode,
        /// Response body, for diagnosis
        body: String,
    },
    /// The response body was not the expected JSON.
    #[error("unreadable model response: {0}")]
    Response(#[from] serde_json::Error),
    /// Inline image data was present but none of it decoded.
    #[error("model returned undecodable image data: {0}")]
    Payload(String),
    /// No part of the response carried image data.
    #[error("no image in response")]
    NoImage,
}

/// Failures persisting the generated image.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The image could not be encoded as PNG.
    #[error("failed to encode png: {0}")]
    Encode(#[source] image::ImageError),
    /// The upload target could not be reached.
    #[error("upload failed: {0}")]
    Upload(#[from] reqwest::Error),
    /// The upload target answered with a non-2xx status.
    #[error("upload target returned {status}: {body}")]
    Rejected {
        /// HTTP status returned
        status: reqwest::StatusCode,
        /// Response body, for diagnosis
        body: String,
    },
    /// The local fallback write failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Who is to blame for a failed run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// The request itself was bad (eg, an invalid or missing avatar URL)
    Client,
    /// The deployment or an upstream service failed
    Server,
}

/// What went wrong in a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineErrorKind {
    /// The request was rejected before any work was done
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Avatar retrieval failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Avatar or template bytes were malformed
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The template directory holds no templates
    #[error("no templates found")]
    NoTemplates,
    /// The model call failed
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// The artifact could not be persisted
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// A pipeline failure tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage} failed: {kind}")]
pub struct PipelineError {
    /// Stage of origin
    pub stage: Stage,
    /// The underlying failure
    #[source]
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    /// Tag an error with the stage it came from.
    pub fn new(stage: Stage, kind: impl Into<PipelineErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// Whether the caller or the service caused this failure.
    pub fn severity(&self) -> Severity {
        match &self.kind {
            PipelineErrorKind::InvalidRequest(_) => Severity::Client,
            PipelineErrorKind::Fetch(err) => err.severity(),
            PipelineErrorKind::Decode(_)
            | PipelineErrorKind::NoTemplates
            | PipelineErrorKind::Generation(_)
            | PipelineErrorKind::Publish(_) => Severity::Server,
        }
    }

    /// The HTTP status a transport should answer with.
    pub fn status_code(&self) -> StatusCode {
        match (&self.kind, self.severity()) {
            (_, Severity::Client) => StatusCode::BAD_REQUEST,
            (PipelineErrorKind::Generation(_), _) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    /// No model credential was configured at startup
    GenerationDisabled,
    /// A pipeline run failed
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::GenerationDisabled => {
                info!("Generation requested while disabled");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "error": "Image generation is not configured",
                    })),
                )
                    .into_response()
            }
            ApiError::Pipeline(err) => {
                let status = err.status_code();
                match err.severity() {
                    Severity::Client => info!("Rejected generation: {}", err),
                    Severity::Server => error!("Generation failed: {}", err),
                }
                (
                    status,
                    Json(json!({
                        "success": false,
                        "stage": err.stage.to_string(),
                        "error": err.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}
