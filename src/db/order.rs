use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::order::model::{NewOrder, Order, UpdateOrderRequest};
use crate::order::OrderRepository;

const ORDER_COLUMNS: &str =
    "id, user_id, order_number, total_amount, status, created_at, updated_at";

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, AppError> {
        let sql = format!(
            "INSERT INTO orders (user_id, order_number, total_amount, status) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order.user_id)
            .bind(&order.order_number)
            .bind(order.total_amount)
            .bind(&order.status)
            .fetch_one(&self.pool)
            .await?;
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, AppError> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn update(&self, id: i64, changes: &UpdateOrderRequest) -> Result<Option<Order>, AppError> {
        let sql = format!(
            "UPDATE orders SET total_amount = COALESCE($2, total_amount), \
             status = COALESCE($3, status), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(changes.total_amount)
            .bind(&changes.status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
