use std::sync::Arc;

use mongodb::Database;

use crate::database::otp_store::MongoOtpStore;
use crate::services::email_service::Mailer;
use crate::services::otp_service::OtpService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub otp_service: Arc<OtpService>,
    /// Whether a real SMTP transport backs the mailer (health reporting).
    pub smtp_enabled: bool,
}

impl AppState {
    pub fn new(db: Database, mailer: Arc<dyn Mailer>, smtp_enabled: bool) -> Self {
        let store = Arc::new(MongoOtpStore::new(&db));
        let otp_service = Arc::new(OtpService::new(store, mailer));

        AppState {
            db,
            otp_service,
            smtp_enabled,
        }
    }
}
