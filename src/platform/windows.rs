// windows 实现：VirtualProtect 修改页面保护，FlushInstructionCache 刷新指令缓存
use super::{CacheStatus, CodeMemory, PlatformCode};
use crate::protection::Protection;
use crate::region::{MemoryRegion, PageSpan};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::System::Diagnostics::Debug::FlushInstructionCache;
use windows_sys::Win32::System::Memory::{
    PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_NOACCESS,
    PAGE_PROTECTION_FLAGS, PAGE_READONLY, PAGE_READWRITE, VirtualProtect,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
use windows_sys::Win32::System::Threading::GetCurrentProcess;

const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: OnceCell<usize> = OnceCell::new();

#[derive(Copy, Clone, Debug, Default)]
pub struct WindowsMemory;

impl CodeMemory for WindowsMemory {
    fn page_size(&self) -> usize {
        page_size()
    }

    unsafe fn protect(&self, span: PageSpan, protection: Protection) -> Result<(), PlatformCode> {
        let mut old: PAGE_PROTECTION_FLAGS = 0;
        let result = VirtualProtect(
            span.start as *const c_void,
            span.len,
            page_flags(protection),
            &mut old,
        );
        if result == 0 {
            return Err(GetLastError() as PlatformCode);
        }
        Ok(())
    }

    unsafe fn invalidate_icache(&self, region: MemoryRegion) -> Result<CacheStatus, PlatformCode> {
        let result = FlushInstructionCache(
            GetCurrentProcess(),
            region.addr as *const c_void,
            region.len,
        );
        if result == 0 {
            return Err(GetLastError() as PlatformCode);
        }
        Ok(CacheStatus::Flushed)
    }
}

pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
        unsafe { GetSystemInfo(&mut info) };
        let value = info.dwPageSize as usize;
        if value == 0 || !value.is_power_of_two() {
            return FALLBACK_PAGE_SIZE;
        }
        value
    })
}

// windows 无单独的只写页，带 WRITE 时一律映射为可读写
pub(crate) fn page_flags(protection: Protection) -> PAGE_PROTECTION_FLAGS {
    let write = protection.contains(Protection::WRITE);
    let exec = protection.contains(Protection::EXECUTE);
    let read = protection.contains(Protection::READ);
    match (read, write, exec) {
        (_, true, true) => PAGE_EXECUTE_READWRITE,
        (_, true, false) => PAGE_READWRITE,
        (true, false, true) => PAGE_EXECUTE_READ,
        (false, false, true) => PAGE_EXECUTE,
        (true, false, false) => PAGE_READONLY,
        (false, false, false) => PAGE_NOACCESS,
    }
}
