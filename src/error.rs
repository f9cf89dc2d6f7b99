//! Error handling.

use crate::engine::EngineError;

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{event, Level};

/// Expression query server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum ExpressionQueryError {
    /// Error loading a dataset into the cache
    #[error("failed to load dataset from {}", path.display())]
    DatasetLoad {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Error raised by the analysis engine during a query
    #[error("analysis engine query failed")]
    Engine(#[from] EngineError),

    /// Error deserialising the request body
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// The engine's plotting call did not produce the expected file
    #[error("plot file {} was not produced", path.display())]
    PlotFileMissing { path: PathBuf },

    /// Error relocating a rendered plot into the published image directory
    #[error("failed to publish plot file {}", path.display())]
    PlotRelocate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reading the project index document
    #[error("failed to read project index {}", path.display())]
    ProjectIndexRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing the project index document
    #[error("failed to parse project index {}", path.display())]
    ProjectIndexParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Error listing the bioproject directories
    #[error("failed to list projects in {}", path.display())]
    ProjectList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntoResponse for ExpressionQueryError {
    /// Convert from an `ExpressionQueryError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<ExpressionQueryError> for ErrorResponse {
    /// Convert from an `ExpressionQueryError` into an `ErrorResponse`.
    fn from(error: ExpressionQueryError) -> Self {
        let response = match &error {
            // Bad request
            ExpressionQueryError::RequestDataJsonRejection(_)
            | ExpressionQueryError::RequestDataValidationSingle(_)
            | ExpressionQueryError::RequestDataValidation(_) => Self::bad_request(&error),

            // Internal server error
            ExpressionQueryError::PlotFileMissing { path: _ }
            | ExpressionQueryError::PlotRelocate { path: _, source: _ }
            | ExpressionQueryError::ProjectIndexParse { path: _, source: _ } => {
                Self::internal_server_error(&error)
            }

            ExpressionQueryError::DatasetLoad { path: _, source } => {
                // A missing dataset file means the bioproject does not exist;
                // anything else is a server-side fault.
                match source {
                    EngineError::DatasetRead { path: _, source }
                        if source.kind() == std::io::ErrorKind::NotFound =>
                    {
                        Self::not_found(&error)
                    }
                    _ => Self::internal_server_error(&error),
                }
            }

            ExpressionQueryError::Engine(engine_error) => match engine_error {
                EngineError::BadExpression { expression: _ } => Self::bad_request(&error),
                EngineError::UnknownCovariate { name: _ } => Self::not_found(&error),
                EngineError::DatasetRead { path: _, source: _ }
                | EngineError::DatasetParse { path: _, source: _ }
                | EngineError::Plot { gene: _, source: _ } => Self::internal_server_error(&error),
            },

            ExpressionQueryError::ProjectIndexRead { path: _, source }
            | ExpressionQueryError::ProjectList { path: _, source } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    Self::not_found(&error)
                } else {
                    Self::internal_server_error(&error)
                }
            }
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_expression_query_error(
        error: ExpressionQueryError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn dataset_missing_is_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = ExpressionQueryError::DatasetLoad {
            path: PathBuf::from("/data/PRJNA1/dataset.json"),
            source: EngineError::DatasetRead {
                path: PathBuf::from("/data/PRJNA1/dataset.json"),
                source: io_error,
            },
        };
        let message = "failed to load dataset from /data/PRJNA1/dataset.json";
        let caused_by = Some(vec![
            "failed to read dataset file /data/PRJNA1/dataset.json",
            "no such file",
        ]);
        test_expression_query_error(error, StatusCode::NOT_FOUND, message, caused_by).await;
    }

    #[tokio::test]
    async fn dataset_unreadable_is_server_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ExpressionQueryError::DatasetLoad {
            path: PathBuf::from("/data/PRJNA1/dataset.json"),
            source: EngineError::DatasetRead {
                path: PathBuf::from("/data/PRJNA1/dataset.json"),
                source: io_error,
            },
        };
        let message = "failed to load dataset from /data/PRJNA1/dataset.json";
        let caused_by = Some(vec![
            "failed to read dataset file /data/PRJNA1/dataset.json",
            "denied",
        ]);
        test_expression_query_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by)
            .await;
    }

    #[tokio::test]
    async fn bad_expression_is_bad_request() {
        let error = ExpressionQueryError::Engine(EngineError::BadExpression {
            expression: "tissue='liver'".to_string(),
        });
        let message = "analysis engine query failed";
        let caused_by = Some(vec!["malformed condition expression \"tissue='liver'\""]);
        test_expression_query_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn unknown_covariate_is_not_found() {
        let error = ExpressionQueryError::Engine(EngineError::UnknownCovariate {
            name: "dose".to_string(),
        });
        let message = "analysis engine query failed";
        let caused_by = Some(vec!["no covariate \"dose\" in dataset"]);
        test_expression_query_error(error, StatusCode::NOT_FOUND, message, caused_by).await;
    }

    #[tokio::test]
    async fn validation_error() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = ExpressionQueryError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_expression_query_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn plot_file_missing() {
        let error = ExpressionQueryError::PlotFileMissing {
            path: PathBuf::from("/tmp/DUSP6_x.svg"),
        };
        let message = "plot file /tmp/DUSP6_x.svg was not produced";
        test_expression_query_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }
}
