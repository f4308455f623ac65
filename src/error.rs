use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{AdmissionError, LookupError};
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a request handler can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Store(_) => Status::InternalServerError,
            Self::Admission(e) => match e {
                AdmissionError::ElectionNotFound(_) => Status::NotFound,
                AdmissionError::ElectionNotActive { .. }
                | AdmissionError::CandidateNotEligible(_) => Status::BadRequest,
                AdmissionError::VoterNotActive(_) => Status::Forbidden,
                AdmissionError::DuplicateVote { .. } => Status::Conflict,
                AdmissionError::Store(_) => Status::InternalServerError,
            },
            Self::Jwt(e) => match e.kind() {
                JwtErrorKind::ExpiredSignature
                | JwtErrorKind::ImmatureSignature
                | JwtErrorKind::InvalidSignature => Status::Unauthorized,
                _ => Status::BadRequest,
            },
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Status(status, _) => *status,
        }
    }

    /// A short machine-readable name for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Admission(e) => e.kind(),
            Self::Store(_) => "storage_unavailable",
            Self::Jwt(_) | Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Status(status, _) if status.code >= 500 => "internal_error",
            Self::Status(..) => "request_failed",
        }
    }

    /// The message shown to the end user. Infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Admission(e) => e.public_message().to_string(),
            Self::Store(_) => "Something went wrong, please try again".to_string(),
            other if other.status().code >= 500 => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::ElectionNotFound(_) => Self::not_found("Election"),
            LookupError::Store(e) => Self::Store(e),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.public_message(),
        };
        (status, Json(body)).respond_to(req)
    }
}
