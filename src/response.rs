use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;

/// Success envelope shared by every endpoint: `{"success": true, "data": ...}`
/// with an optional human-readable message.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    data: T,
    status: StatusCode,
    message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            status: StatusCode::OK,
            message: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            data,
            status: StatusCode::CREATED,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": true,
            "data": self.data,
        });
        if let Some(message) = self.message {
            body["message"] = json!(message);
        }
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_data_and_message() {
        let resp = ApiResponse::success(vec![1, 2, 3]).with_message("listed");
        let body = json!({
            "success": true,
            "data": resp.data.clone(),
            "message": "listed",
        });
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][1], 2);
        assert_eq!(resp.status, StatusCode::OK);
    }

    #[test]
    fn created_uses_201() {
        let resp = ApiResponse::created(());
        assert_eq!(resp.status, StatusCode::CREATED);
    }
}
