// 宿主边界层：原始 (地址, 长度) 参数的类型化入口，负责串行化、告警与可选校验
use crate::backup::SavedPatch;
use crate::config;
use crate::errno::PatchError;
use crate::log;
use crate::patcher::{PatchOutcome, Patcher};
use crate::platform::{CacheStatus, CodeMemory};
use crate::protection::Protection;
use crate::region::MemoryRegion;
use crate::sync::MutexPoisonRecover;
use once_cell::sync::Lazy;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

// 对外暴露的保护位常量，与平台编码无关
pub const PREAD: u32 = Protection::READ.bits();
pub const PWRITE: u32 = Protection::WRITE.bits();
pub const PEXEC: u32 = Protection::EXECUTE.bits();
pub const DEFAULT_PROTECTION: u32 = PREAD | PEXEC;

// 全局 patch 锁：重叠区间的并发 patch 在此串行
static PATCH_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static CACHE_WARNED: AtomicBool = AtomicBool::new(false);
static INIT: Lazy<()> = Lazy::new(|| {
    let config = config::get();
    log::set_debug_enabled(config.debug);
    log::info(format_args!(
        "{} debug={} verify={}",
        crate::version::version_str_full(),
        config.debug,
        config.verify_protection
    ));
});

fn ensure_init() {
    Lazy::force(&INIT);
}

pub fn get_version() -> String {
    crate::version::version_str_full()
}

// major << 16 | minor << 8 | patch
pub fn get_version_code() -> u32 {
    crate::version::version()
}

pub fn get_config() -> config::Config {
    config::get()
}

pub fn get_debug() -> bool {
    ensure_init();
    log::debug_enabled()
}

pub fn set_debug(debug: bool) {
    ensure_init();
    log::set_debug_enabled(debug);
}

/// 按原始地址写入可执行内存，`final_protection` 为 `None` 时使用 `PREAD | PEXEC`。
///
/// # Safety
///
/// `source_addr` 必须指向 `source_len` 字节的可读内存；`target_addr` 的要求同 [`patch`]。
pub unsafe fn write_executable_memory(
    target_addr: usize,
    target_len: usize,
    source_addr: usize,
    source_len: usize,
    final_protection: Option<u32>,
) -> Result<(), PatchError> {
    let final_protection = Protection::from_raw(final_protection.unwrap_or(DEFAULT_PROTECTION))?;
    if target_len != source_len {
        return Err(PatchError::LengthMismatch {
            target: target_len,
            source: source_len,
        });
    }
    let source: &[u8] = if source_len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(source_addr as *const u8, source_len)
    };
    patch(MemoryRegion::new(target_addr, target_len), source, final_protection).map(|_| ())
}

/// 将 `source` 写入 `target`，完成后页面保护为 `final_protection`。
///
/// # Safety
///
/// `target` 必须已映射，patch 期间不能有线程在目标页内执行。
pub unsafe fn patch(
    target: MemoryRegion,
    source: &[u8],
    final_protection: Protection,
) -> Result<PatchOutcome, PatchError> {
    ensure_init();
    let _guard = PATCH_LOCK.lock_or_poison();
    patch_with(
        &Patcher::native(),
        target,
        source,
        final_protection,
        config::get().verify_protection,
        &CACHE_WARNED,
    )
}

/// 同 [`patch`]，返回可用于 [`restore`] 的原始字节备份。
///
/// 写入后校验失败时会先写回原始字节再返回错误。
///
/// # Safety
///
/// 同 [`patch`]，且 `target` 在调用前必须可读。
pub unsafe fn patch_saved(
    target: MemoryRegion,
    source: &[u8],
    final_protection: Protection,
) -> Result<SavedPatch, PatchError> {
    ensure_init();
    let _guard = PATCH_LOCK.lock_or_poison();
    patch_saved_with(
        &Patcher::native(),
        target,
        source,
        final_protection,
        config::get().verify_protection,
        &CACHE_WARNED,
    )
}

/// 写回 [`patch_saved`] 保存的原始字节。
///
/// # Safety
///
/// 同 [`patch`]。
pub unsafe fn restore(saved: &SavedPatch) -> Result<PatchOutcome, PatchError> {
    ensure_init();
    let _guard = PATCH_LOCK.lock_or_poison();
    let result = saved.restore(&Patcher::native());
    finish(
        saved.region(),
        saved.final_protection(),
        result,
        config::get().verify_protection,
        &CACHE_WARNED,
    )
}

unsafe fn patch_with<M: CodeMemory>(
    patcher: &Patcher<M>,
    target: MemoryRegion,
    source: &[u8],
    final_protection: Protection,
    verify: bool,
    cache_warned: &AtomicBool,
) -> Result<PatchOutcome, PatchError> {
    warn_write_execute(final_protection);
    let result = patcher.patch(target, source, final_protection);
    finish(target, final_protection, result, verify, cache_warned)
}

unsafe fn patch_saved_with<M: CodeMemory>(
    patcher: &Patcher<M>,
    target: MemoryRegion,
    source: &[u8],
    final_protection: Protection,
    verify: bool,
    cache_warned: &AtomicBool,
) -> Result<SavedPatch, PatchError> {
    warn_write_execute(final_protection);
    let (saved, outcome) = patcher
        .patch_saved(target, source, final_protection)
        .map_err(|err| report_failure(target, err))?;
    if let Err(err) = finish(target, final_protection, Ok(outcome), verify, cache_warned) {
        // 新字节已写入，备份即将丢弃，先写回原始内容
        if let Err(restore_err) = saved.restore(patcher) {
            report_failure(target, restore_err);
        }
        return Err(err);
    }
    Ok(saved)
}

fn warn_write_execute(final_protection: Protection) {
    if final_protection.is_write_execute() {
        log::debug(format_args!(
            "final protection {final_protection:?} leaves memory writable and executable"
        ));
    }
}

fn report_failure(target: MemoryRegion, err: PatchError) -> PatchError {
    log::error(format_args!(
        "patch failed addr=0x{:x} len={} errno={} err={}",
        target.addr,
        target.len,
        err.errno().as_i32(),
        err
    ));
    err
}

// 每个 warned 标记只告警一次，返回本次是否输出
fn warn_cache_unsupported(cache: CacheStatus, warned: &AtomicBool) -> bool {
    if cache != CacheStatus::Unsupported || warned.swap(true, Ordering::AcqRel) {
        return false;
    }
    log::warn(format_args!(
        "instruction cache invalidation unsupported on this platform, patched code may run stale (errno={})",
        cache.errno().as_i32()
    ));
    true
}

fn finish(
    target: MemoryRegion,
    final_protection: Protection,
    result: Result<PatchOutcome, PatchError>,
    verify: bool,
    cache_warned: &AtomicBool,
) -> Result<PatchOutcome, PatchError> {
    let outcome = result.map_err(|err| report_failure(target, err))?;

    warn_cache_unsupported(outcome.cache, cache_warned);

    if verify {
        verify_protection(target, final_protection).map_err(|err| report_failure(target, err))?;
    }

    log::debug(format_args!(
        "patched addr=0x{:x} len={} span=0x{:x}+0x{:x} prot={:?} cache={:?}",
        target.addr, target.len, outcome.span.start, outcome.span.len, final_protection, outcome.cache
    ));
    Ok(outcome)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn verify_protection(target: MemoryRegion, expected: Protection) -> Result<(), PatchError> {
    let actual = crate::maps::query_protection(target)?;
    if actual != expected {
        return Err(PatchError::ProtectionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn verify_protection(_target: MemoryRegion, _expected: Protection) -> Result<(), PatchError> {
    Ok(())
}
