use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

// ============================================================================
// Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    pub request_id: Option<String>,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Structural well-formedness check. Runs before any storage or cache
    /// access; a failing order is never persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        required(&self.order_uid, "order_uid")?;
        required(&self.track_number, "track_number")?;
        required(&self.entry, "entry")?;
        required(&self.customer_id, "customer_id")?;
        required(&self.delivery_service, "delivery_service")?;

        self.delivery.validate()?;
        self.payment.validate()?;

        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }
        for item in &self.items {
            item.validate()?;
        }

        Ok(())
    }
}

impl Delivery {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.name, "delivery.name")?;
        required(&self.phone, "delivery.phone")?;
        required(&self.zip, "delivery.zip")?;
        required(&self.city, "delivery.city")?;
        required(&self.address, "delivery.address")?;
        required(&self.email, "delivery.email")?;
        Ok(())
    }
}

impl Payment {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.transaction, "payment.transaction")?;
        required(&self.currency, "payment.currency")?;
        required(&self.provider, "payment.provider")?;
        non_negative(self.amount, "payment.amount")?;
        non_negative(self.delivery_cost, "payment.delivery_cost")?;
        non_negative(self.goods_total, "payment.goods_total")?;
        Ok(())
    }
}

impl OrderItem {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.rid, "item.rid")?;
        required(&self.name, "item.name")?;
        non_negative(self.price, "item.price")?;
        non_negative(self.total_price, "item.total_price")?;
        Ok(())
    }
}

fn required(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

fn non_negative(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
