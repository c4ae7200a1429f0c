use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::state::AppState;

// Request DTOs
#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, max = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

// Response DTO
#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub success: bool,
    pub message: String,
}

// 1. Request an OTP
pub async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<OtpResponse>> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    state.otp_service.send_otp(&req.email).await?;

    Ok(Json(OtpResponse {
        success: true,
        message: "OTP sent to your email".to_string(),
    }))
}

// 2. Verify a submitted OTP
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<OtpResponse>> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    state.otp_service.verify_otp(&req.email, &req.otp).await?;

    Ok(Json(OtpResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_rejects_malformed_email() {
        let req = SendOtpRequest {
            email: "not-an-email".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn verify_request_requires_six_digit_otp() {
        let short = VerifyOtpRequest {
            email: "user@example.com".to_string(),
            otp: "12345".to_string(),
        };
        assert!(short.validate().is_err());

        let ok = VerifyOtpRequest {
            email: "user@example.com".to_string(),
            otp: "123456".to_string(),
        };
        assert!(ok.validate().is_ok());
    }
}
