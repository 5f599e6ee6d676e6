use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

pub const STATUS_PENDING: &str = "pending";
pub const ORDER_STATUSES: [&str; 3] = [STATUS_PENDING, "paid", "cancelled"];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "ORD-7-1760000000-3F9A")]
    pub order_number: String,
    pub total_amount: i32,
    #[schema(example = "pending")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[schema(example = 500)]
    pub total_amount: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub total_amount: Option<i32>,
    pub status: Option<String>,
}

/// Order fields supplied on insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub order_number: String,
    pub total_amount: i32,
    pub status: String,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_amount(self.total_amount)
    }
}

impl UpdateOrderRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(amount) = self.total_amount {
            validate_amount(amount)?;
        }
        if let Some(status) = &self.status {
            if !ORDER_STATUSES.contains(&status.as_str()) {
                return Err(AppError::invalid_field(
                    "status",
                    format!("Status must be one of: {}.", ORDER_STATUSES.join(", ")),
                ));
            }
        }
        Ok(())
    }
}

fn validate_amount(amount: i32) -> Result<(), AppError> {
    if amount < 0 {
        return Err(AppError::invalid_field(
            "total_amount",
            "Total amount cannot be negative.",
        ));
    }
    Ok(())
}

/// `ORD-<user>-<unix seconds>-<4 hex>`
pub fn generate_order_number(user_id: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    format!(
        "ORD-{}-{}-{}",
        user_id,
        Utc::now().timestamp(),
        &suffix[..4]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number(7);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], "7");
        assert!(parts[2].parse::<i64>().is_ok());
        assert_eq!(parts[3].len(), 4);
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(CreateOrderRequest { total_amount: -1 }.validate().is_err());
        assert!(CreateOrderRequest { total_amount: 0 }.validate().is_ok());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let request = UpdateOrderRequest {
            total_amount: None,
            status: Some("shipped".to_string()),
        };
        assert!(matches!(
            request.validate(),
            Err(AppError::Validation { .. })
        ));
    }
}
