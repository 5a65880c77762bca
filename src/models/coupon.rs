use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Store credit handed out when a ticket is cancelled.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i32,
    pub code: String,
    pub amount: f64,
    pub expiry: NaiveDate,
}

impl Coupon {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry < today
    }

    /// Amount left to pay once the coupon is applied. Never negative.
    pub fn apply(&self, total: f64) -> f64 {
        (total - self.amount).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(amount: f64) -> Coupon {
        Coupon {
            id: 1,
            code: "SPRING".to_string(),
            amount,
            expiry: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        }
    }

    #[test]
    fn apply_floors_at_zero() {
        assert_eq!(coupon(5.0).apply(12.5), 7.5);
        assert_eq!(coupon(20.0).apply(12.5), 0.0);
    }

    #[test]
    fn usable_through_expiry_day() {
        let c = coupon(5.0);
        assert!(!c.is_expired(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
        assert!(c.is_expired(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    }
}
