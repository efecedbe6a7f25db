// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Response envelope
//!
//! Every route answers `{code, msg, data}`. Expected failures (a resource
//! left unconfigured, an unknown provider, a provider answering garbage) are
//! HTTP 200 with a non-zero `code`; anything unexpected is HTTP 500 with a
//! generic message and the detail kept in the log.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::domain::llm::LlmError;
use crate::domain::resource::ResourceError;
use crate::domain::tunnel::TunnelError;
use crate::infrastructure::http_client::TransportError;

pub const SUCCESS: i32 = 0;
pub const BUSINESS_ERROR: i32 = 10000;
pub const VALIDATION_ERROR: i32 = 10001;
pub const NOT_FOUND: i32 = 10004;
pub const INTERNAL_ERROR: i32 = 50000;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS,
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<Value> {
    pub fn fail(code: i32, msg: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Expected failure reported to the caller as-is
    #[error("{msg}")]
    Business { code: i32, msg: String },

    #[error("Validation failed: {msg}")]
    Validation { msg: String, details: Value },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Logged in full, reported generically
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn business(msg: impl Into<String>) -> Self {
        Self::Business {
            code: BUSINESS_ERROR,
            msg: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self::Validation {
            details: Value::String(msg.clone()),
            msg,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Business { .. } => StatusCode::OK,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Business { code, msg } => {
                warn!(code, msg = %msg, "Business error");
                ApiResponse::fail(code, msg, None)
            }
            Self::Validation { msg, details } => {
                warn!(msg = %msg, "Request validation failed");
                ApiResponse::fail(VALIDATION_ERROR, "Request validation failed", Some(details))
            }
            Self::NotFound(path) => ApiResponse::fail(NOT_FOUND, format!("Not found: {}", path), None),
            Self::Internal(reason) => {
                error!(reason = %reason, "Unhandled error");
                ApiResponse::fail(INTERNAL_ERROR, INTERNAL_MESSAGE, None)
            }
        };
        (status, body).into_response()
    }
}

impl From<ResourceError> for ApiError {
    fn from(e: ResourceError) -> Self {
        match e {
            ResourceError::NotConfigured { .. } => Self::business(e.to_string()),
            // Fail closed: a half-filled tunnel policy is the operator's to fix
            ResourceError::Tunnel(TunnelError::PolicyMisconfigured(_)) => Self::business(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RequestFailed { .. } => Self::Internal(e.to_string()),
            other => Self::business(other.to_string()),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}
