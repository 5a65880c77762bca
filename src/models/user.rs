use chrono::NaiveDate;
use serde::Serialize;

use super::{Payment, PaymentView};

/// Days an annual membership fee stays valid.
const FEE_VALID_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub address: String,
    pub last_fee_paid: NaiveDate,
    pub card: Option<Payment>,
}

impl RegisteredUser {
    // Malformed hashes count as a failed login, not an error
    pub fn verify_password(&self, password: &str) -> bool {
        match bcrypt::verify(password, &self.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("password hash for user {} is unusable: {}", self.id, e);
                false
            }
        }
    }

    pub fn fee_is_current(&self, today: NaiveDate) -> bool {
        let elapsed = today.signed_duration_since(self.last_fee_paid).num_days();
        (0..=FEE_VALID_DAYS).contains(&elapsed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub address: String,
    pub last_fee_paid: NaiveDate,
    pub fee_is_current: bool,
    pub card: Option<PaymentView>,
    /// True when the card on file has passed its expiry date.
    pub card_expired: bool,
}

impl RegisteredUser {
    pub fn profile(&self, today: NaiveDate) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            address: self.address.clone(),
            last_fee_paid: self.last_fee_paid,
            fee_is_current: self.fee_is_current(today),
            card: self.card.as_ref().map(PaymentView::from),
            card_expired: self.card.as_ref().is_some_and(|c| c.is_expired(today)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(password_hash: String) -> RegisteredUser {
        RegisteredUser {
            id: 4,
            email: "caitlyn.bean@example.com".to_string(),
            password_hash,
            address: "12 Elm St".to_string(),
            last_fee_paid: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            card: None,
        }
    }

    #[test]
    fn verifies_bcrypt_hashes() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let u = user(hash);
        assert!(u.verify_password("hunter2"));
        assert!(!u.verify_password("hunter3"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!user("not-a-hash".to_string()).verify_password("anything"));
    }

    #[test]
    fn fee_lapses_after_a_year() {
        let u = user(String::new());
        assert!(u.fee_is_current(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()));
        assert!(!u.fee_is_current(NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()));
    }

    #[test]
    fn profile_flags_an_expired_card() {
        let mut u = user(String::new());
        assert!(!u.profile(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).card_expired);

        u.card = Some(Payment {
            id: 9,
            holder_name: "Caitlyn Bean".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        });
        let profile = u.profile(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(profile.card_expired);
        assert_eq!(profile.card.map(|c| c.card_number), Some("************1111".to_string()));
        assert!(!u.profile(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()).card_expired);
    }
}
