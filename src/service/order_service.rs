use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::storage::{OrderRepository, StoreError};

use super::OrderServiceError;

// ============================================================================
// Order Cache Service
// ============================================================================
//
// The single read/write authority for order aggregates. The cache is a pure
// derived view of committed storage: an identifier appears in it only after
// its aggregate has been durably committed. The lock guards nothing but the
// map itself and is never held across a storage call.
//
// ============================================================================

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    metrics: Arc<Metrics>,
    cache: RwLock<HashMap<String, Order>>,
}

impl OrderService {
    /// Construct the service and warm the cache from storage. A failed
    /// warm-up leaves the cache empty and the service degraded but correct:
    /// reads fall through to storage and repopulate lazily.
    pub async fn new(repo: Arc<dyn OrderRepository>, metrics: Arc<Metrics>) -> Self {
        let service = Self {
            repo,
            metrics,
            cache: RwLock::new(HashMap::new()),
        };
        service.load_cache().await;
        service
    }

    async fn load_cache(&self) {
        let orders = match self.repo.load_all().await {
            Ok(orders) => orders,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "failed to warm order cache, continuing with lazy population"
                );
                return;
            }
        };

        let mut cache = self.cache.write().expect("order cache lock poisoned");
        *cache = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        self.metrics.cache_size.set(cache.len() as i64);
        tracing::info!(count = cache.len(), "order cache loaded");
    }

    /// Accept a new aggregate: validate, reject duplicates, persist
    /// atomically, and only then expose it to readers through the cache.
    pub async fn add_order(&self, order: &Order) -> Result<(), OrderServiceError> {
        order.validate()?;

        // The cache may be cold or behind a concurrent writer; the duplicate
        // check goes to storage.
        if self.repo.find_by_uid(&order.order_uid).await?.is_some() {
            return Err(OrderServiceError::AlreadyExists(order.order_uid.clone()));
        }

        match self.repo.insert_aggregate(order).await {
            Ok(()) => {}
            Err(StoreError::Duplicate) => {
                return Err(OrderServiceError::AlreadyExists(order.order_uid.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        // Committed; readers may see it now.
        {
            let mut cache = self.cache.write().expect("order cache lock poisoned");
            cache.insert(order.order_uid.clone(), order.clone());
            self.metrics.cache_size.set(cache.len() as i64);
        }

        tracing::info!(order_uid = %order.order_uid, "order stored");
        Ok(())
    }

    /// Cache-first read. A miss falls through to storage and, on a hit
    /// there, fills the cache so the next read for the same identifier is
    /// served from memory.
    pub async fn get_order(&self, uid: &str) -> Result<Order, OrderServiceError> {
        {
            let cache = self.cache.read().expect("order cache lock poisoned");
            if let Some(order) = cache.get(uid) {
                self.metrics.cache_hits.inc();
                return Ok(order.clone());
            }
        }
        self.metrics.cache_misses.inc();

        let order = self
            .repo
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| OrderServiceError::NotFound(uid.to_string()))?;

        let mut cache = self.cache.write().expect("order cache lock poisoned");
        cache.insert(uid.to_string(), order.clone());
        self.metrics.cache_size.set(cache.len() as i64);

        Ok(order)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::domain::order::{Delivery, OrderItem, Payment};

    use super::*;

    #[derive(Default)]
    struct MockRepo {
        orders: Mutex<HashMap<String, Order>>,
        find_calls: AtomicUsize,
        insert_calls: AtomicUsize,
        fail_inserts: AtomicBool,
        fail_finds: AtomicBool,
        fail_loads: AtomicBool,
        duplicate_on_insert: AtomicBool,
    }

    impl MockRepo {
        fn with_orders(orders: Vec<Order>) -> Self {
            let repo = Self::default();
            {
                let mut stored = repo.orders.lock().unwrap();
                for order in orders {
                    stored.insert(order.order_uid.clone(), order);
                }
            }
            repo
        }

        fn stored_count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OrderRepository for MockRepo {
        async fn insert_aggregate(&self, order: &Order) -> Result<(), StoreError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            if self.duplicate_on_insert.load(Ordering::SeqCst) {
                return Err(StoreError::Duplicate);
            }
            self.orders
                .lock()
                .unwrap()
                .insert(order.order_uid.clone(), order.clone());
            Ok(())
        }

        async fn find_by_uid(&self, uid: &str) -> Result<Option<Order>, StoreError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_finds.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.orders.lock().unwrap().get(uid).cloned())
        }

        async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.orders.lock().unwrap().values().cloned().collect())
        }
    }

    fn sample_order(uid: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: format!("TRACK-{uid}"),
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
                transaction: format!("tx-{uid}"),
                request_id: None,
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 100,
                payment_dt: 1_637_907_727,
                bank: "alpha".to_string(),
                delivery_cost: 10,
                goods_total: 90,
                custom_fee: 0,
            },
            items: vec![OrderItem {
                chrt_id: 1,
                track_number: "itemtrack".to_string(),
                price: 50,
                rid: "rid1".to_string(),
                name: "Mascara".to_string(),
                sale: 0,
                size: "M".to_string(),
                total_price: 50,
                nm_id: 2,
                brand: "Brand".to_string(),
                status: 202,
            }],
        }
    }

    async fn service_with(repo: Arc<MockRepo>) -> OrderService {
        let metrics = Arc::new(Metrics::new().unwrap());
        OrderService::new(repo, metrics).await
    }

    #[tokio::test]
    async fn test_add_then_get_is_a_cache_hit() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        let order = sample_order("uid1");

        service.add_order(&order).await.unwrap();

        let finds_before = repo.find_calls.load(Ordering::SeqCst);
        let fetched = service.get_order("uid1").await.unwrap();

        assert_eq!(fetched, order);
        // served from cache: no extra storage access
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), finds_before);
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected_once_stored() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        let order = sample_order("uid1");

        service.add_order(&order).await.unwrap();
        let second = service.add_order(&order).await;

        assert!(matches!(second, Err(OrderServiceError::AlreadyExists(_))));
        assert_eq!(repo.stored_count(), 1);
        assert_eq!(repo.insert_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_order_never_touches_storage() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        let mut order = sample_order("uid1");
        order.order_uid = String::new();

        let result = service.add_order(&order).await;

        assert!(matches!(result, Err(OrderServiceError::InvalidInput(_))));
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 0);
        assert_eq!(repo.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_check_error_propagates() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        repo.fail_finds.store(true, Ordering::SeqCst);

        let result = service.add_order(&sample_order("uid1")).await;

        assert!(matches!(result, Err(OrderServiceError::Storage(_))));
        assert_eq!(repo.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_no_cache_entry() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        repo.fail_inserts.store(true, Ordering::SeqCst);

        let result = service.add_order(&sample_order("uid1")).await;
        assert!(matches!(result, Err(OrderServiceError::Storage(_))));

        // nothing committed, so the cache must not serve the identifier
        let fetched = service.get_order("uid1").await;
        assert!(matches!(fetched, Err(OrderServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_race_maps_to_already_exists() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo.clone()).await;
        repo.duplicate_on_insert.store(true, Ordering::SeqCst);

        let result = service.add_order(&sample_order("uid1")).await;

        assert!(matches!(result, Err(OrderServiceError::AlreadyExists(_))));
        let fetched = service.get_order("uid1").await;
        assert!(matches!(fetched, Err(OrderServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cold_start_serves_all_aggregates_from_cache() {
        let repo = Arc::new(MockRepo::with_orders(vec![
            sample_order("a"),
            sample_order("b"),
            sample_order("c"),
        ]));
        let service = service_with(repo.clone()).await;

        for uid in ["a", "b", "c"] {
            let order = service.get_order(uid).await.unwrap();
            assert_eq!(order.order_uid, uid);
        }

        // the warm cache absorbed every read
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_warmup_degrades_to_lazy_population() {
        let repo = Arc::new(MockRepo::with_orders(vec![sample_order("a")]));
        repo.fail_loads.store(true, Ordering::SeqCst);
        let service = service_with(repo.clone()).await;

        // first read misses the cold cache and falls through to storage
        let order = service.get_order("a").await.unwrap();
        assert_eq!(order.order_uid, "a");
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 1);

        // the miss populated the cache
        service.get_order("a").await.unwrap();
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_is_not_found() {
        let repo = Arc::new(MockRepo::default());
        let service = service_with(repo).await;

        let result = service.get_order("missing").await;

        assert!(matches!(result, Err(OrderServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_reads_and_write() {
        let repo = Arc::new(MockRepo::default());
        let service = Arc::new(service_with(repo.clone()).await);
        service.add_order(&sample_order("a")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.get_order("a").await.unwrap();
            }));
        }
        {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.add_order(&sample_order("b")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // both identifiers are served from the cache afterwards
        let finds_before = repo.find_calls.load(Ordering::SeqCst);
        service.get_order("a").await.unwrap();
        service.get_order("b").await.unwrap();
        assert_eq!(repo.find_calls.load(Ordering::SeqCst), finds_before);
    }
}
