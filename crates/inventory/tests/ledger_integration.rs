//! Integration tests for the reservation ledger.

use std::sync::Arc;

use common::ProductId;
use inventory::{InventoryError, ReservationLedger};
use proptest::prelude::*;
use store::InMemoryStockStore;

async fn ledger_with(sku: &str, available: u32) -> ReservationLedger<InMemoryStockStore> {
    let ledger = ReservationLedger::new(InMemoryStockStore::new());
    ledger
        .provision(&ProductId::new(sku), available)
        .await
        .unwrap();
    ledger
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_reserve_within_stock() {
        let ledger = ledger_with("sku-1", 100).await;
        let sku = ProductId::new("sku-1");

        ledger.reserve(&sku, 10).await.unwrap();

        let item = ledger.get(&sku).await.unwrap();
        assert_eq!(item.available(), 90);
        assert_eq!(item.reserved(), 10);
    }

    #[tokio::test]
    async fn test_reserve_beyond_stock_fails_without_change() {
        let ledger = ledger_with("sku-1", 100).await;
        let sku = ProductId::new("sku-1");

        let err = ledger.reserve(&sku, 200).await.unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientQuantity {
                available: 100,
                requested: 200,
                ..
            }
        ));

        let item = ledger.get(&sku).await.unwrap();
        assert_eq!(item.available(), 100);
        assert_eq!(item.reserved(), 0);
    }

    #[tokio::test]
    async fn test_reserve_then_release_round_trips() {
        let ledger = ledger_with("sku-1", 100).await;
        let sku = ProductId::new("sku-1");

        ledger.reserve(&sku, 30).await.unwrap();
        ledger.release(&sku, 30).await.unwrap();

        let item = ledger.get(&sku).await.unwrap();
        assert_eq!(item.available(), 100);
        assert_eq!(item.reserved(), 0);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_oversell() {
        let ledger = Arc::new(ledger_with("sku-1", 50).await);
        let sku = ProductId::new("sku-1");

        let mut handles = Vec::new();
        for _ in 0..100 {
            let ledger = ledger.clone();
            let sku = sku.clone();
            handles.push(tokio::spawn(
                async move { ledger.reserve(&sku, 1).await.is_ok() },
            ));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 50);
        let item = ledger.get(&sku).await.unwrap();
        assert_eq!(item.available(), 0);
        assert_eq!(item.reserved(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_products_are_independent() {
        let ledger = Arc::new(ReservationLedger::new(InMemoryStockStore::new()));
        for i in 0..10 {
            ledger
                .provision(&ProductId::new(format!("sku-{i}")), 20)
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..10 {
            for _ in 0..20 {
                let ledger = ledger.clone();
                let sku = ProductId::new(format!("sku-{i}"));
                handles.push(tokio::spawn(async move {
                    ledger.reserve(&sku, 1).await.unwrap();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for item in ledger.list().await.unwrap() {
            assert_eq!(item.available(), 0);
            assert_eq!(item.reserved(), 20);
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Reserve(u32),
    Release(u32),
    Decrease(u32),
    Increase(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..200).prop_map(Op::Reserve),
        (0u32..200).prop_map(Op::Release),
        (0u32..200).prop_map(Op::Decrease),
        (0u32..200).prop_map(Op::Increase),
    ]
}

proptest! {
    #[test]
    fn test_stock_counters_stay_consistent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let ledger = ledger_with("sku-1", 100).await;
            let sku = ProductId::new("sku-1");

            // Starting stock counts as the first increase.
            let mut net: u64 = 100;

            for op in ops {
                let before = ledger.get(&sku).await.unwrap();
                let result = match &op {
                    Op::Reserve(q) => ledger.reserve(&sku, *q).await,
                    Op::Release(q) => ledger.release(&sku, *q).await,
                    Op::Decrease(q) => ledger.decrease(&sku, *q).await,
                    Op::Increase(q) => ledger.increase(&sku, *q).await,
                };
                let after = ledger.get(&sku).await.unwrap();

                match (&op, &result) {
                    (Op::Increase(q), Ok(_)) => net += u64::from(*q),
                    (Op::Decrease(q), Ok(_)) => net -= u64::from(*q),
                    (_, Err(_)) => {
                        prop_assert_eq!(after.available(), before.available());
                        prop_assert_eq!(after.reserved(), before.reserved());
                    }
                    _ => {}
                }

                prop_assert_eq!(after.total(), net);
            }

            let item = ledger.get(&sku).await.unwrap();
            if item.available() < 150 {
                let before = item.clone();
                prop_assert!(ledger.reserve(&sku, 150).await.is_err());
                let after = ledger.get(&sku).await.unwrap();
                prop_assert_eq!(after.available(), before.available());
                prop_assert_eq!(after.reserved(), before.reserved());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_reserve_150_of_100_is_rejected() {
    let ledger = ledger_with("sku-1", 100).await;
    let sku = ProductId::new("sku-1");

    assert!(ledger.reserve(&sku, 150).await.is_err());
    let item = ledger.get(&sku).await.unwrap();
    assert_eq!(item.available(), 100);
    assert_eq!(item.reserved(), 0);
}
