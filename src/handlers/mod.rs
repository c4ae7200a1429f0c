pub(crate) mod auth_otp;
