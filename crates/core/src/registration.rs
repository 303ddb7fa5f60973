//! Phone-number registration with one-time passwords.
//!
//! Storage and delivery are behind the [`UserStore`] and [`OtpSender`]
//! traits so the HTTP layer can be exercised without a database or an SMS
//! provider.

use crate::voices::Gender;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::{ops::RangeInclusive, sync::Arc};
use tracing::{info, warn};

pub const OTP_RANGE: RangeInclusive<u32> = 100_000..=999_999;

/// A registration that has not been verified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUser {
    pub name: String,
    pub phone: String,
    pub gender: Gender,
    pub otp: u32,
}

/// Persistent user records keyed by phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the record, or resets name, gender, OTP and verification if
    /// the phone number registered before.
    async fn upsert_pending(&self, user: &PendingUser) -> Result<()>;

    async fn find_otp(&self, phone: &str) -> Result<Option<u32>>;

    async fn mark_verified(&self, phone: &str) -> Result<()>;
}

/// Delivers a one-time password to a phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send_otp(&self, phone: &str, otp: u32) -> Result<()>;
}

pub struct RegistrationService {
    store: Arc<dyn UserStore>,
    sender: Arc<dyn OtpSender>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn UserStore>, sender: Arc<dyn OtpSender>) -> Self {
        Self { store, sender }
    }

    /// Stores a fresh OTP for the phone number and sends it out.
    pub async fn register(&self, name: &str, phone: &str, gender: Gender) -> Result<()> {
        let user = PendingUser {
            name: name.to_string(),
            phone: phone.to_string(),
            gender,
            otp: generate_otp(),
        };
        self.store
            .upsert_pending(&user)
            .await
            .context("Failed to store registration")?;
        self.sender
            .send_otp(phone, user.otp)
            .await
            .context("Failed to deliver OTP")?;
        info!(phone = %mask_phone(phone), "Registration OTP dispatched.");
        Ok(())
    }

    /// Returns `true` and marks the user verified when the OTP matches.
    pub async fn verify(&self, phone: &str, otp: u32) -> Result<bool> {
        match self.store.find_otp(phone).await? {
            Some(expected) if expected == otp => {
                self.store.mark_verified(phone).await?;
                info!(phone = %mask_phone(phone), "Phone number verified.");
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                warn!(phone = %mask_phone(phone), "Verification attempted for unknown phone number.");
                Ok(false)
            }
        }
    }
}

pub fn generate_otp() -> u32 {
    rand::rng().random_range(OTP_RANGE)
}

/// Keeps only the last four digits for logging.
pub fn mask_phone(phone: &str) -> String {
    let hidden = phone.chars().count().saturating_sub(4);
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| if i < hidden { '*' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_generated_otp_has_six_digits() {
        for _ in 0..1000 {
            let otp = generate_otp();
            assert!(OTP_RANGE.contains(&otp));
            assert_eq!(otp.to_string().len(), 6);
        }
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("9876543210"), "******3210");
        assert_eq!(mask_phone("12"), "12");
    }

    #[test]
    fn test_mask_phone_counts_characters() {
        assert_eq!(mask_phone("९८७६५४३२१०"), "******३२१०");
        assert_eq!(mask_phone("+९१ 98765"), "*****8765");
    }

    #[tokio::test]
    async fn test_register_stores_and_sends_the_same_otp() {
        let stored = Arc::new(Mutex::new(None));
        let mut store = MockUserStore::new();
        let stored_in_store = stored.clone();
        store
            .expect_upsert_pending()
            .times(1)
            .returning(move |user| {
                assert_eq!(user.name, "Asha");
                assert_eq!(user.phone, "9876543210");
                assert_eq!(user.gender, Gender::Female);
                *stored_in_store.lock().unwrap() = Some(user.otp);
                Ok(())
            });

        let mut sender = MockOtpSender::new();
        let stored_in_sender = stored.clone();
        sender
            .expect_send_otp()
            .times(1)
            .returning(move |phone, otp| {
                assert_eq!(phone, "9876543210");
                assert_eq!(Some(otp), *stored_in_sender.lock().unwrap());
                Ok(())
            });

        let service = RegistrationService::new(Arc::new(store), Arc::new(sender));
        service
            .register("Asha", "9876543210", Gender::Female)
            .await
            .unwrap();
        assert!(stored.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_does_not_send_when_store_fails() {
        let mut store = MockUserStore::new();
        store
            .expect_upsert_pending()
            .returning(|_| Err(anyhow::anyhow!("db down")));
        let mut sender = MockOtpSender::new();
        sender.expect_send_otp().times(0);

        let service = RegistrationService::new(Arc::new(store), Arc::new(sender));
        let err = service
            .register("Ravi", "9000000000", Gender::Male)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to store registration"));
    }

    #[tokio::test]
    async fn test_verify_matching_otp_marks_verified() {
        let mut store = MockUserStore::new();
        store.expect_find_otp().returning(|_| Ok(Some(123_456)));
        store
            .expect_mark_verified()
            .times(1)
            .returning(|phone| {
                assert_eq!(phone, "9876543210");
                Ok(())
            });

        let service = RegistrationService::new(Arc::new(store), Arc::new(MockOtpSender::new()));
        assert!(service.verify("9876543210", 123_456).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_wrong_or_unknown() {
        let mut store = MockUserStore::new();
        store
            .expect_find_otp()
            .returning(|phone| Ok((phone == "9876543210").then_some(123_456)));
        store.expect_mark_verified().times(0);

        let service = RegistrationService::new(Arc::new(store), Arc::new(MockOtpSender::new()));
        assert!(!service.verify("9876543210", 111_111).await.unwrap());
        assert!(!service.verify("9000000000", 123_456).await.unwrap());
    }
}
