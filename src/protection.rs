// 页面保护属性集合，位值固定，与平台编码无关
use crate::errno::PatchError;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl Protection {
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
    pub const READ_EXECUTE: Self = Self::READ.union(Self::EXECUTE);

    // 宿主层传入的原始位，含未知位时拒绝
    pub fn from_raw(bits: u32) -> Result<Self, PatchError> {
        Self::from_bits(bits).ok_or(PatchError::InvalidProtection { bits })
    }

    pub const fn is_write_execute(self) -> bool {
        self.contains(Self::WRITE.union(Self::EXECUTE))
    }

    #[cfg(unix)]
    pub(crate) fn to_unix(self) -> libc::c_int {
        let mut prot = libc::PROT_NONE;
        if self.contains(Self::READ) {
            prot |= libc::PROT_READ;
        }
        if self.contains(Self::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        if self.contains(Self::EXECUTE) {
            prot |= libc::PROT_EXEC;
        }
        prot
    }
}

impl Default for Protection {
    fn default() -> Self {
        Self::READ_EXECUTE
    }
}
