pub mod auth_otp_routes;
