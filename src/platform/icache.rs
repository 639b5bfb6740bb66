// 指令缓存刷新，只覆盖实际写入的 [start, end)
use super::{CacheStatus, PlatformCode};
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use std::sync::atomic::{Ordering, fence};

#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
unsafe extern "C" {
    fn sys_icache_invalidate(start: *mut libc::c_void, len: libc::size_t);
}

// arm linux 私有系统调用 __ARM_NR_cacheflush
#[cfg(all(target_arch = "arm", any(target_os = "linux", target_os = "android")))]
const ARM_NR_CACHEFLUSH: libc::c_long = 0x0f0002;
// riscv linux: __NR_arch_specific_syscall + 15
#[cfg(all(
    any(target_arch = "riscv64", target_arch = "riscv32"),
    any(target_os = "linux", target_os = "android")
))]
const RISCV_NR_FLUSH_ICACHE: libc::c_long = 259;

// x86: 硬件保证取指一致，仅需内存屏障
// aarch64: 逐行清理 dcache 再逐行无效化 icache，最后 dsb+isb 同步
// arm/riscv linux: 交给内核系统调用，失败时返回 errno
// 其余架构没有已知手段，返回 Unsupported
pub(crate) fn flush_range(start: usize, end: usize) -> Result<CacheStatus, PlatformCode> {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        let _ = (start, end);
        fence(Ordering::SeqCst);
        Ok(CacheStatus::Coherent)
    }

    #[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
    {
        if start < end {
            unsafe { sys_icache_invalidate(start as *mut libc::c_void, end - start) };
        }
        Ok(CacheStatus::Flushed)
    }

    #[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
    {
        if start < end {
            flush_aarch64(start, end);
        }
        Ok(CacheStatus::Flushed)
    }

    #[cfg(all(target_arch = "arm", any(target_os = "linux", target_os = "android")))]
    {
        if start < end {
            syscall_result(unsafe { libc::syscall(ARM_NR_CACHEFLUSH, start, end, 0usize) })?;
        }
        Ok(CacheStatus::Flushed)
    }

    #[cfg(all(
        any(target_arch = "riscv64", target_arch = "riscv32"),
        any(target_os = "linux", target_os = "android")
    ))]
    {
        if start < end {
            // flags 为 0 时对所有 hart 生效
            syscall_result(unsafe { libc::syscall(RISCV_NR_FLUSH_ICACHE, start, end, 0usize) })?;
        }
        Ok(CacheStatus::Flushed)
    }

    #[cfg(not(any(
        target_arch = "x86",
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(
            any(target_arch = "arm", target_arch = "riscv64", target_arch = "riscv32"),
            any(target_os = "linux", target_os = "android")
        )
    )))]
    {
        let _ = (start, end);
        Ok(CacheStatus::Unsupported)
    }
}

#[cfg(all(
    any(target_arch = "arm", target_arch = "riscv64", target_arch = "riscv32"),
    any(target_os = "linux", target_os = "android")
))]
fn syscall_result(ret: libc::c_long) -> Result<(), PlatformCode> {
    if ret != 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(0));
    }
    Ok(())
}

#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
fn flush_aarch64(start: usize, end: usize) {
    let (dcache_line, icache_line) = cache_line_size();
    let mut dcache_addr = align_down(start, dcache_line);
    while dcache_addr < end {
        unsafe {
            core::arch::asm!("dc cvau, {}", in(reg) dcache_addr, options(nostack, preserves_flags));
        }
        dcache_addr = dcache_addr.saturating_add(dcache_line);
    }
    unsafe {
        core::arch::asm!("dsb ish", options(nostack, preserves_flags));
    }

    let mut icache_addr = align_down(start, icache_line);
    while icache_addr < end {
        unsafe {
            core::arch::asm!("ic ivau, {}", in(reg) icache_addr, options(nostack, preserves_flags));
        }
        icache_addr = icache_addr.saturating_add(icache_line);
    }
    unsafe {
        core::arch::asm!("dsb ish", options(nostack, preserves_flags));
        core::arch::asm!("isb", options(nostack, preserves_flags));
    }
}

// 读取 CTR_EL0 寄存器，返回 (dcache_line_size, icache_line_size)
#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
fn cache_line_size() -> (usize, usize) {
    let ctr_el0: usize;
    unsafe {
        core::arch::asm!("mrs {}, ctr_el0", out(reg) ctr_el0, options(nomem, nostack, preserves_flags));
    }

    let dcache_line = 4usize << ((ctr_el0 >> 16) & 0x0f);
    let icache_line = 4usize << (ctr_el0 & 0x0f);
    (dcache_line.max(4), icache_line.max(4))
}

#[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
fn align_down(addr: usize, align: usize) -> usize {
    crate::region::align_down(addr, align)
}
