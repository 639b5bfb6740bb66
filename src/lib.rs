#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)]

#[cfg(not(any(unix, windows)))]
compile_error!("srx_patch supports unix and windows targets only");

// 宿主边界层，提供原始地址入口与保护位常量
mod api;
// 可撤销 patch，保存原始字节
mod backup;
// 环境变量配置
mod config;
// 错误码与错误类型定义
mod errno;
// 日志输出，转发到 log facade
mod log;
// /proc/self/maps 保护属性查询
#[cfg(any(target_os = "linux", target_os = "android"))]
mod maps;
// patch 核心流程
mod patcher;
// 平台相关：页面保护与指令缓存刷新
mod platform;
// 保护属性集合
mod protection;
// 目标区间与页对齐
mod region;
mod sync;
#[cfg(all(test, unix))]
mod testing;
// 版本信息
mod version;

pub use api::{
    DEFAULT_PROTECTION, PEXEC, PREAD, PWRITE, get_config, get_debug, get_version, get_version_code,
    patch, patch_saved, restore, set_debug, write_executable_memory,
};
pub use backup::SavedPatch;
pub use config::{Config, ENV_DEBUG, ENV_VERIFY};
pub use errno::{Errno, PatchError, PatchStep};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use maps::query_protection;
pub use patcher::{PatchOutcome, Patcher};
pub use platform::{CacheStatus, CodeMemory, NativeMemory, PlatformCode};
pub use protection::Protection;
pub use region::{MemoryRegion, PageSpan};
