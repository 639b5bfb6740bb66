// 平台能力接口：页面保护修改与指令缓存刷新，按目标平台在编译期选择实现
use crate::errno::Errno;
use crate::protection::Protection;
use crate::region::{MemoryRegion, PageSpan};

// 指令缓存处理：按架构选择刷新方式
#[cfg(unix)]
pub mod icache;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub type NativeMemory = unix::UnixMemory;
#[cfg(windows)]
pub type NativeMemory = windows::WindowsMemory;

// 失败时携带的平台错误码：unix errno / windows GetLastError
pub type PlatformCode = i32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheStatus {
    // 已显式无效化指令缓存
    Flushed,
    // 架构保证取指一致，仅发出内存屏障
    Coherent,
    // 平台没有已知的刷新手段，调用方不能假设一致性
    Unsupported,
}

impl CacheStatus {
    // Unsupported 对应非致命错误码，其余视为成功
    pub const fn errno(self) -> Errno {
        match self {
            Self::Flushed | Self::Coherent => Errno::Ok,
            Self::Unsupported => Errno::CacheInvalidationUnsupported,
        }
    }
}

pub trait CodeMemory {
    fn page_size(&self) -> usize;

    // span 已按 page_size 对齐
    unsafe fn protect(&self, span: PageSpan, protection: Protection) -> Result<(), PlatformCode>;

    // region 为原始未对齐区间
    unsafe fn invalidate_icache(&self, region: MemoryRegion) -> Result<CacheStatus, PlatformCode>;
}
