//! Reservation hot-path benchmarks on the in-memory backend.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use stockwell_core::InventoryId;
use stockwell_inventory::{InventoryRecord, Sku};
use stockwell_infra::store::{InMemoryStockStore, StockStore};

fn reserve_release_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime");

    let stock = Arc::new(InMemoryStockStore::new());
    let inventory_id = InventoryId::new();
    // Commit permanently drains on-hand stock, so seed enough for any
    // iteration count criterion picks.
    rt.block_on(async {
        stock
            .put(
                InventoryRecord::new(inventory_id, Sku::new("BENCH-1").unwrap(), i64::MAX / 2)
                    .unwrap(),
            )
            .await
            .unwrap();
    });

    c.bench_function("reserve_release_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                stock.reserve(inventory_id, 1).await.unwrap();
                stock.release(inventory_id, 1).await.unwrap();
            })
        })
    });

    c.bench_function("reserve_commit_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                stock.reserve(inventory_id, 1).await.unwrap();
                stock.commit(inventory_id, 1).await.unwrap();
            })
        })
    });
}

criterion_group!(benches, reserve_release_cycle);
criterion_main!(benches);
