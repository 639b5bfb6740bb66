use crate::protection::Protection;
use std::fmt;

// patch 操作错误码，0 表示成功
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Errno {
    Ok = 0,                           // 成功
    LengthMismatch = 1,               // 源与目标长度不一致
    AddressOverflow = 2,              // 目标区间越过地址空间上界
    InvalidProtection = 3,            // 保护属性含未知位
    SetProtWritable = 4,              // 切换为可写失败
    SetProtFinal = 5,                 // 恢复最终保护属性失败
    CacheInvalidationFailed = 6,      // 指令缓存刷新调用失败
    CacheInvalidationUnsupported = 7, // 平台无指令缓存刷新手段（非致命）
    ProtectionMismatch = 8,           // patch 后保护属性校验不一致
    BadMaps = 9,                      // /proc/self/maps 读取或覆盖失败
}

impl Errno {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<Errno> for i32 {
    fn from(value: Errno) -> Self {
        value as i32
    }
}

// 保护属性切换失败时所处的步骤
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PatchStep {
    ToWritable,
    ToFinal,
}

impl PatchStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToWritable => "to_writable",
            Self::ToFinal => "to_final",
        }
    }
}

impl fmt::Display for PatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PatchError {
    // 在任何内存访问之前拒绝
    LengthMismatch { target: usize, source: usize },
    AddressOverflow { addr: usize, len: usize },
    InvalidProtection { bits: u32 },
    // platform_code: unix 为 errno，windows 为 GetLastError
    ProtectionChangeFailed { step: PatchStep, platform_code: i32 },
    CacheInvalidationFailed { platform_code: i32 },
    ProtectionMismatch { expected: Protection, actual: Protection },
    MapsUnavailable,
}

impl PatchError {
    pub const fn errno(&self) -> Errno {
        match self {
            Self::LengthMismatch { .. } => Errno::LengthMismatch,
            Self::AddressOverflow { .. } => Errno::AddressOverflow,
            Self::InvalidProtection { .. } => Errno::InvalidProtection,
            Self::ProtectionChangeFailed {
                step: PatchStep::ToWritable,
                ..
            } => Errno::SetProtWritable,
            Self::ProtectionChangeFailed {
                step: PatchStep::ToFinal,
                ..
            } => Errno::SetProtFinal,
            Self::CacheInvalidationFailed { .. } => Errno::CacheInvalidationFailed,
            Self::ProtectionMismatch { .. } => Errno::ProtectionMismatch,
            Self::MapsUnavailable => Errno::BadMaps,
        }
    }

    pub const fn step(&self) -> Option<PatchStep> {
        match self {
            Self::ProtectionChangeFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub const fn platform_code(&self) -> Option<i32> {
        match self {
            Self::ProtectionChangeFailed { platform_code, .. }
            | Self::CacheInvalidationFailed { platform_code } => Some(*platform_code),
            _ => None,
        }
    }
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { target, source } => write!(
                f,
                "target and source must be the same length (target={target} source={source})"
            ),
            Self::AddressOverflow { addr, len } => {
                write!(f, "region 0x{addr:x}+0x{len:x} wraps the address space")
            }
            Self::InvalidProtection { bits } => write!(f, "unknown protection bits 0x{bits:x}"),
            Self::ProtectionChangeFailed {
                step,
                platform_code,
            } => write!(
                f,
                "protection change failed at {step} (platform code {platform_code})"
            ),
            Self::CacheInvalidationFailed { platform_code } => write!(
                f,
                "instruction cache invalidation failed (platform code {platform_code})"
            ),
            Self::ProtectionMismatch { expected, actual } => write!(
                f,
                "protection mismatch after patch expected={expected:?} actual={actual:?}"
            ),
            Self::MapsUnavailable => f.write_str("memory maps unavailable for region"),
        }
    }
}

impl std::error::Error for PatchError {}
