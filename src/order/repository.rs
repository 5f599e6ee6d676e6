use async_trait::async_trait;

use super::model::{NewOrder, Order, UpdateOrderRequest};
use crate::error::AppError;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: NewOrder) -> Result<Order, AppError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Order>, AppError>;
    async fn update(&self, id: i64, changes: &UpdateOrderRequest) -> Result<Option<Order>, AppError>;
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}
