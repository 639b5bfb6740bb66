#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(unix)]
mod scenarios;
#[cfg(unix)]
mod test_ctx;

use srx_patch::set_debug;

fn main() {
    env_logger::init();
    set_debug(true);
    log::info!(
        "{} code=0x{:06x}",
        srx_patch::get_version(),
        srx_patch::get_version_code()
    );
    run();
}

#[cfg(unix)]
fn run() {
    unsafe {
        scenarios::run_all();
    }
    println!("patch_test all scenarios passed");
}

#[cfg(not(unix))]
fn run() {
    println!("patch_test scenarios need anonymous mmap, skipped on this target");
}
