use axum::{
    routing::post,
    Router,
};

use crate::{
    handlers::auth_otp,
    state::AppState,
};

pub fn auth_otp_routes() -> Router<AppState> {
    Router::new()
        // Request an OTP by email
        .route("/auth/send-otp", post(auth_otp::send_otp))

        // Verify a submitted OTP
        .route("/auth/verify-otp", post(auth_otp::verify_otp))
}
