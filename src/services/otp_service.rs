use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;

use crate::database::otp_store::OtpStore;
use crate::errors::{AppError, Result};
use crate::models::otp::OtpRecord;
use crate::services::email_service::Mailer;

const BCRYPT_COST: u32 = 10;
const OTP_TTL_MINUTES: i64 = 5;

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    // Generate 6-digit OTP
    fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        rng.gen_range(100_000..1_000_000).to_string()
    }

    /// Generates, persists, and dispatches a fresh OTP for `to`.
    ///
    /// Delivery is best-effort: once the hashed record is persisted this
    /// returns `Ok(())` even when the mailer fails, so the login flow keeps
    /// working off the logged code while outbound email is broken.
    pub async fn send_otp(&self, to: &str) -> Result<()> {
        let code = Self::generate_otp();
        // Always log the code so development setups without SMTP can see it
        tracing::info!(email = to, otp = %code, "generated OTP");

        let hashed = bcrypt::hash(&code, BCRYPT_COST)?;
        let now = Utc::now();
        let record = OtpRecord {
            id: None,
            email: to.to_string(),
            otp: hashed,
            expire_at: now + Duration::minutes(OTP_TTL_MINUTES),
            created_at: now,
        };
        self.store.insert(record).await?;

        if let Err(e) = self.mailer.send_otp(to, &code).await {
            tracing::error!(email = to, error = %e, "failed to send OTP email");
        }

        Ok(())
    }

    /// Checks `submitted` against the most recent record for `email`.
    ///
    /// On success every record for the email is removed, so a code verifies
    /// at most once.
    pub async fn verify_otp(&self, email: &str, submitted: &str) -> Result<bool> {
        let record = self
            .store
            .find_latest(email)
            .await?
            .ok_or(AppError::OtpNotFound)?;

        if record.is_expired(Utc::now()) {
            return Err(AppError::OtpExpired);
        }

        if !bcrypt::verify(submitted, &record.otp)? {
            return Err(AppError::InvalidOtp);
        }

        let id = record
            .id
            .ok_or_else(|| AppError::service("stored OTP record has no id"))?;
        // Claim the matched record first; a racing verification that got
        // here before us already consumed it.
        if !self.store.remove(email, &id).await? {
            return Err(AppError::OtpNotFound);
        }
        self.store.purge(email).await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use mongodb::bson::oid::ObjectId;

    #[derive(Default)]
    struct InMemoryOtpStore {
        records: Mutex<Vec<OtpRecord>>,
    }

    impl InMemoryOtpStore {
        fn records(&self) -> Vec<OtpRecord> {
            self.records.lock().unwrap().clone()
        }

        fn push(&self, record: OtpRecord) {
            self.records.lock().unwrap().push(record);
        }

        fn expire_all(&self) {
            let mut records = self.records.lock().unwrap();
            for record in records.iter_mut() {
                record.expire_at = Utc::now() - Duration::minutes(1);
            }
        }
    }

    #[async_trait]
    impl OtpStore for InMemoryOtpStore {
        async fn insert(&self, mut record: OtpRecord) -> Result<()> {
            record.id = Some(ObjectId::new());
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn find_latest(&self, email: &str) -> Result<Option<OtpRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| r.email == email)
                .max_by_key(|r| r.created_at)
                .cloned())
        }

        async fn remove(&self, email: &str, id: &ObjectId) -> Result<bool> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(r.email == email && r.id.as_ref() == Some(id)));
            Ok(records.len() < before)
        }

        async fn purge(&self, email: &str) -> Result<u64> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.email != email);
            Ok((before - records.len()) as u64)
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn last_code(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let (_, code) = sent.last().expect("no email was sent");
            code.clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_otp(&self, to: &str, code: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_otp(&self, _to: &str, _code: &str) -> Result<()> {
            Err(AppError::mail("smtp connection refused"))
        }
    }

    const EMAIL: &str = "user@example.com";

    fn record_with_code(email: &str, code: &str, created_at: chrono::DateTime<Utc>) -> OtpRecord {
        OtpRecord {
            id: Some(ObjectId::new()),
            email: email.to_string(),
            // minimum cost keeps the test fast
            otp: bcrypt::hash(code, 4).unwrap(),
            expire_at: created_at + Duration::minutes(OTP_TTL_MINUTES),
            created_at,
        }
    }

    #[tokio::test]
    async fn send_otp_persists_one_hashed_record() {
        let store = Arc::new(InMemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(store.clone(), mailer.clone());

        service.send_otp(EMAIL).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        let code = mailer.last_code();
        assert_eq!(record.email, EMAIL);
        assert_ne!(record.otp, code);
        assert!(record.otp.starts_with("$2"));
        assert!(bcrypt::verify(&code, &record.otp).unwrap());

        assert_eq!(record.expire_at - record.created_at, Duration::minutes(5));
        assert!(Utc::now() - record.created_at < Duration::seconds(5));
    }

    #[tokio::test]
    async fn send_otp_swallows_mailer_failure() {
        let store = Arc::new(InMemoryOtpStore::default());
        let service = OtpService::new(store.clone(), Arc::new(FailingMailer));

        service.send_otp(EMAIL).await.unwrap();

        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn verify_consumes_matching_code() {
        let store = Arc::new(InMemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(store.clone(), mailer.clone());

        service.send_otp(EMAIL).await.unwrap();
        let code = mailer.last_code();

        assert!(service.verify_otp(EMAIL, &code).await.unwrap());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn verify_rejects_wrong_code_and_keeps_records() {
        let store = Arc::new(InMemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(store.clone(), mailer.clone());

        service.send_otp(EMAIL).await.unwrap();
        let code = mailer.last_code();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = service.verify_otp(EMAIL, wrong).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn verify_rejects_expired_code() {
        let store = Arc::new(InMemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(store.clone(), mailer.clone());

        service.send_otp(EMAIL).await.unwrap();
        store.expire_all();

        let err = service.verify_otp(EMAIL, &mailer.last_code()).await.unwrap_err();
        assert!(matches!(err, AppError::OtpExpired));
    }

    #[tokio::test]
    async fn verify_fails_for_unknown_email() {
        let store = Arc::new(InMemoryOtpStore::default());
        let service = OtpService::new(store, Arc::new(RecordingMailer::default()));

        let err = service.verify_otp(EMAIL, "123456").await.unwrap_err();
        assert!(matches!(err, AppError::OtpNotFound));
    }

    #[tokio::test]
    async fn verify_is_single_use() {
        let store = Arc::new(InMemoryOtpStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let service = OtpService::new(store.clone(), mailer.clone());

        service.send_otp(EMAIL).await.unwrap();
        let code = mailer.last_code();

        assert!(service.verify_otp(EMAIL, &code).await.unwrap());

        let err = service.verify_otp(EMAIL, &code).await.unwrap_err();
        assert!(matches!(err, AppError::OtpNotFound));
    }

    #[tokio::test]
    async fn only_the_latest_record_is_checked() {
        let store = Arc::new(InMemoryOtpStore::default());
        let now = Utc::now();
        store.push(record_with_code(EMAIL, "111111", now - Duration::seconds(30)));
        store.push(record_with_code(EMAIL, "222222", now));

        let service = OtpService::new(store.clone(), Arc::new(RecordingMailer::default()));

        let err = service.verify_otp(EMAIL, "111111").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOtp));

        assert!(service.verify_otp(EMAIL, "222222").await.unwrap());
        // the stale record is purged together with the matched one
        assert!(store.records().is_empty());
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..256 {
            let code = OtpService::generate_otp();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }
}
