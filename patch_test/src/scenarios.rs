mod basic;
mod exec;
mod stress;

use crate::test_ctx::env_flag;

pub unsafe fn run_all() {
    run("round-trip", basic::scenario_round_trip);
    run("length-mismatch", basic::scenario_length_mismatch);
    run("zero-length", basic::scenario_zero_length);
    run("idempotent", basic::scenario_idempotent);
    run("cross-page-sentinel", basic::scenario_cross_page_sentinel);
    run("raw-entry", basic::scenario_raw_entry);
    run("saved-restore", basic::scenario_saved_restore);
    run("exec-nop-sled", exec::scenario_exec_nop_sled);
    run("exec-repatch-return", exec::scenario_exec_repatch_return);
    run("concurrent-regions", stress::scenario_concurrent_regions);
    run("shared-page-churn", stress::scenario_shared_page_churn);
    if env_flag("PATCH_TEST_SOAK") {
        run("soak", stress::scenario_soak);
    }
}

unsafe fn run(name: &str, scenario: unsafe fn()) {
    println!("scenario: {name}");
    scenario();
}
