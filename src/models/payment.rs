use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Payment {
    pub id: i32,
    pub holder_name: String,
    pub card_number: String,
    pub expiry: NaiveDate,
}

impl Payment {
    /// Card number with everything but the last four digits hidden.
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(|c| c.is_ascii_digit()).collect();
        let visible = digits.len().saturating_sub(4);
        digits
            .iter()
            .enumerate()
            .map(|(i, c)| if i < visible { '*' } else { *c })
            .collect()
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry < today
    }
}

// Card data never leaves the service unmasked
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub id: i32,
    pub holder_name: String,
    pub card_number: String,
    pub expiry: NaiveDate,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        PaymentView {
            id: payment.id,
            holder_name: payment.holder_name.clone(),
            card_number: payment.masked_number(),
            expiry: payment.expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str) -> Payment {
        Payment {
            id: 1,
            holder_name: "Caitlyn Bean".to_string(),
            card_number: number.to_string(),
            expiry: NaiveDate::from_ymd_opt(2027, 1, 31).unwrap(),
        }
    }

    #[test]
    fn masks_all_but_last_four_digits() {
        assert_eq!(card("4111 1111 1111 1234").masked_number(), "************1234");
        assert_eq!(card("123").masked_number(), "123");
    }

    #[test]
    fn expires_after_expiry_date() {
        let payment = card("4111111111111111");
        assert!(!payment.is_expired(NaiveDate::from_ymd_opt(2027, 1, 31).unwrap()));
        assert!(payment.is_expired(NaiveDate::from_ymd_opt(2027, 2, 1).unwrap()));
    }
}
