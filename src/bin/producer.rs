use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_service::config::Config;
use order_service::domain::order::{Delivery, Order, OrderItem, Payment};
use order_service::messaging::KafkaPublisher;

// Publishes a handful of randomized sample orders to the ingest topic.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let publisher = KafkaPublisher::new(&config.kafka.brokers)?;

    for _ in 0..5 {
        let order = sample_order();
        let payload = serde_json::to_string(&order)?;

        if let Err(err) = publisher
            .publish(&config.kafka.topic, &order.order_uid, &payload)
            .await
        {
            tracing::error!(error = %err, "send failed");
            continue;
        }

        tracing::info!(order_uid = %order.order_uid, "order sent");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Ok(())
}

fn sample_order() -> Order {
    let mut rng = rand::rng();
    let uid = Uuid::new_v4().to_string();

    Order {
        order_uid: uid.clone(),
        track_number: format!("TRACK{}", rng.random_range(0..10000)),
        entry: "WBIL".to_string(),
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "cust".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc::now(),
        oof_shard: "1".to_string(),
        delivery: Delivery {
            name: "Test User".to_string(),
            phone: "+1234567890".to_string(),
            zip: "12345".to_string(),
            city: "City".to_string(),
            address: "Address 1".to_string(),
            region: "Region".to_string(),
            email: "test@example.com".to_string(),
        },
        payment: Payment {
            transaction: uid,
            request_id: None,
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: rng.random_range(100..1100),
            payment_dt: Utc::now().timestamp(),
            bank: "alpha".to_string(),
            delivery_cost: 50,
            goods_total: 100,
            custom_fee: 0,
        },
        items: vec![OrderItem {
            chrt_id: rng.random_range(0..100_000),
            track_number: format!("ITEM{}", rng.random_range(0..10000)),
            price: rng.random_range(50..550),
            rid: Uuid::new_v4().to_string(),
            name: "Item Name".to_string(),
            sale: rng.random_range(0..50),
            size: "M".to_string(),
            total_price: 100,
            nm_id: rng.random_range(0..100_000),
            brand: "Brand".to_string(),
            status: 202,
        }],
    }
}
