use std::sync::{Arc, Barrier};
use std::time::Instant;

use srx_patch::{MemoryRegion, Protection, patch, patch_saved, restore};

use crate::test_ctx::{MappedPages, assert_protection, ensure_ok, env_usize};

pub unsafe fn scenario_concurrent_regions() {
    let worker_count = env_usize("PATCH_TEST_WORKERS", 8);
    let rounds = env_usize("PATCH_TEST_ROUNDS", 200);

    let barrier = Arc::new(Barrier::new(worker_count));
    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let barrier = Arc::clone(&barrier);
        workers.push(std::thread::spawn(move || {
            let pages = MappedPages::new(1);
            let region = pages.region(0x100, 32);
            barrier.wait();
            for round in 0..rounds {
                let byte = (worker_id * 31 + round) as u8;
                unsafe {
                    ensure_ok(
                        patch(region, &[byte; 32], Protection::READ_EXECUTE),
                        "concurrent patch",
                    );
                }
                assert_eq!(pages.read(0x100, 32), vec![byte; 32], "concurrent bytes mismatch");
            }
            assert_protection(region, Protection::READ_EXECUTE, "concurrent protection");
        }));
    }
    for worker in workers {
        worker.join().expect("concurrent worker panic");
    }
}

// 多线程 patch 同一页的不同区间，依赖边界层的全局锁避免互相撤销写权限
pub unsafe fn scenario_shared_page_churn() {
    let worker_count = env_usize("PATCH_TEST_SHARED_WORKERS", 4);
    let rounds = env_usize("PATCH_TEST_SHARED_ROUNDS", 200);
    let slot_len = 64;
    let pages = Arc::new(MappedPages::new(1));
    assert!(worker_count * slot_len <= pages.len, "too many shared workers");

    let barrier = Arc::new(Barrier::new(worker_count));
    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let barrier = Arc::clone(&barrier);
        let region = pages.region(worker_id * slot_len, slot_len);
        workers.push(std::thread::spawn(move || {
            barrier.wait();
            for round in 0..rounds {
                let byte = (worker_id + round) as u8;
                unsafe {
                    ensure_ok(
                        patch(region, &vec![byte; slot_len], Protection::READ_EXECUTE),
                        "shared page patch",
                    );
                }
            }
        }));
    }
    for worker in workers {
        worker.join().expect("shared page worker panic");
    }

    for worker_id in 0..worker_count {
        let expected = (worker_id + rounds - 1) as u8;
        assert_eq!(
            pages.read(worker_id * slot_len, slot_len),
            vec![expected; slot_len],
            "worker {worker_id} final bytes mismatch"
        );
    }
    assert_protection(
        MemoryRegion::new(pages.addr, pages.len),
        Protection::READ_EXECUTE,
        "shared page protection",
    );
}

pub unsafe fn scenario_soak() {
    let rounds = env_usize("PATCH_TEST_SOAK_ROUNDS", 100_000);
    let pages = MappedPages::new(4);
    let region = pages.region(pages.len / 2 - 8, 16);
    let original = pages.read(pages.len / 2 - 8, 16);

    let start = Instant::now();
    for round in 0..rounds {
        let saved = ensure_ok(
            patch_saved(region, &[round as u8; 16], Protection::READ_EXECUTE),
            "soak patch",
        );
        ensure_ok(restore(&saved), "soak restore");
    }
    assert_eq!(pages.read(pages.len / 2 - 8, 16), original, "soak lost original bytes");
    println!(
        "soak rounds={} elapsed_ms={}",
        rounds,
        start.elapsed().as_millis()
    );
}
