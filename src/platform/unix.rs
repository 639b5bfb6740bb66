// unix 实现：mprotect 修改页面保护，按架构刷新指令缓存
use super::icache;
use super::{CacheStatus, CodeMemory, PlatformCode};
use crate::protection::Protection;
use crate::region::{MemoryRegion, PageSpan};
use once_cell::sync::OnceCell;

// sysconf 失败时的回退页大小
const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: OnceCell<usize> = OnceCell::new();

#[derive(Copy, Clone, Debug, Default)]
pub struct UnixMemory;

impl CodeMemory for UnixMemory {
    fn page_size(&self) -> usize {
        page_size()
    }

    unsafe fn protect(&self, span: PageSpan, protection: Protection) -> Result<(), PlatformCode> {
        let result = libc::mprotect(
            span.start as *mut libc::c_void,
            span.len,
            protection.to_unix(),
        );
        if result != 0 {
            return Err(last_errno());
        }
        Ok(())
    }

    unsafe fn invalidate_icache(&self, region: MemoryRegion) -> Result<CacheStatus, PlatformCode> {
        icache::flush_range(region.addr, region.addr + region.len)
    }
}

pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        let value = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if value <= 0 || !(value as usize).is_power_of_two() {
            return FALLBACK_PAGE_SIZE;
        }
        value as usize
    })
}

fn last_errno() -> PlatformCode {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
