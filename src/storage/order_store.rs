use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{PgConnection, Row};

use crate::domain::order::{Delivery, Order, OrderItem, Payment};

use super::{OrderRepository, PgTransactor, StoreError};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Mechanical table mapping for the four-part aggregate. The insert path runs
// inside one unit of work; the read path assembles the aggregate from the
// four tables with unscoped pool queries.
//
// ============================================================================

pub struct PgOrderStore {
    pool: PgPool,
    transactor: PgTransactor,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            transactor: PgTransactor::new(pool.clone()),
            pool,
        }
    }

    async fn insert_all(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
        Self::insert_header(&mut *conn, order).await?;
        Self::insert_delivery(&mut *conn, order).await?;
        Self::insert_payment(&mut *conn, order).await?;
        Self::insert_items(&mut *conn, order).await?;
        Ok(())
    }

    async fn insert_header(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature, \
             customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_delivery(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&order.order_uid)
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_payment(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payments (transaction, order_uid, request_id, currency, provider, \
             amount, payment_dt, bank, delivery_cost, goods_total, custom_fee) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&order.payment.transaction)
        .bind(&order.order_uid)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_items(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
        for item in &order.items {
            sqlx::query(
                "INSERT INTO items (order_uid, chrt_id, track_number, price, \
                 rid, name, sale, size, total_price, nm_id, brand, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn fetch_delivery(&self, uid: &str) -> Result<Delivery, StoreError> {
        let row = sqlx::query(
            "SELECT name, phone, zip, city, address, region, email \
             FROM deliveries WHERE order_uid = $1",
        )
        .bind(uid)
        .fetch_one(&self.pool)
        .await?;

        Ok(Delivery {
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        })
    }

    async fn fetch_payment(&self, uid: &str) -> Result<Payment, StoreError> {
        let row = sqlx::query(
            "SELECT transaction, request_id, currency, provider, amount, payment_dt, \
             bank, delivery_cost, goods_total, custom_fee \
             FROM payments WHERE order_uid = $1",
        )
        .bind(uid)
        .fetch_one(&self.pool)
        .await?;

        Ok(Payment {
            transaction: row.try_get("transaction")?,
            request_id: row.try_get("request_id")?,
            currency: row.try_get("currency")?,
            provider: row.try_get("provider")?,
            amount: row.try_get("amount")?,
            payment_dt: row.try_get("payment_dt")?,
            bank: row.try_get("bank")?,
            delivery_cost: row.try_get("delivery_cost")?,
            goods_total: row.try_get("goods_total")?,
            custom_fee: row.try_get("custom_fee")?,
        })
    }

    async fn fetch_items(&self, uid: &str) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT chrt_id, track_number, price, rid, name, sale, size, \
             total_price, nm_id, brand, status \
             FROM items WHERE order_uid = $1 ORDER BY id",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(OrderItem {
                chrt_id: row.try_get("chrt_id")?,
                track_number: row.try_get("track_number")?,
                price: row.try_get("price")?,
                rid: row.try_get("rid")?,
                name: row.try_get("name")?,
                sale: row.try_get("sale")?,
                size: row.try_get("size")?,
                total_price: row.try_get("total_price")?,
                nm_id: row.try_get("nm_id")?,
                brand: row.try_get("brand")?,
                status: row.try_get("status")?,
            });
        }

        Ok(items)
    }
}

/// SQLSTATE 23505: the primary-key backstop fired because a concurrent writer
/// won the race for this identifier.
fn map_unique_violation(err: StoreError) -> StoreError {
    if let StoreError::Database(sqlx::Error::Database(db)) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate;
        }
    }
    err
}

#[async_trait]
impl OrderRepository for PgOrderStore {
    async fn insert_aggregate(&self, order: &Order) -> Result<(), StoreError> {
        let mut uow = self.transactor.begin().await?;

        match Self::insert_all(uow.conn(), order).await {
            Ok(()) => uow.commit().await,
            Err(err) => {
                uow.rollback().await;
                Err(map_unique_violation(err))
            }
        }
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<Order>, StoreError> {
        let header = sqlx::query(
            "SELECT track_number, entry, locale, internal_signature, customer_id, \
             delivery_service, shardkey, sm_id, date_created, oof_shard \
             FROM orders WHERE order_uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let delivery = self.fetch_delivery(uid).await?;
        let payment = self.fetch_payment(uid).await?;
        let items = self.fetch_items(uid).await?;

        Ok(Some(Order {
            order_uid: uid.to_string(),
            track_number: header.try_get("track_number")?,
            entry: header.try_get("entry")?,
            locale: header.try_get("locale")?,
            internal_signature: header.try_get("internal_signature")?,
            customer_id: header.try_get("customer_id")?,
            delivery_service: header.try_get("delivery_service")?,
            shardkey: header.try_get("shardkey")?,
            sm_id: header.try_get("sm_id")?,
            date_created: header.try_get("date_created")?,
            oof_shard: header.try_get("oof_shard")?,
            delivery,
            payment,
            items,
        }))
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT order_uid FROM orders")
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let uid: String = row.try_get("order_uid")?;
            if let Some(order) = self.find_by_uid(&uid).await? {
                orders.push(order);
            }
        }

        Ok(orders)
    }
}
