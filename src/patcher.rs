// 可执行内存 patch 核心：可写 -> 拷贝 -> 恢复最终保护 -> 刷新指令缓存
// 核心不加锁、不打日志，并发与告警由调用方处理
use crate::errno::{PatchError, PatchStep};
use crate::platform::{CacheStatus, CodeMemory, NativeMemory};
use crate::protection::Protection;
use crate::region::{MemoryRegion, PageSpan};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PatchOutcome {
    pub span: PageSpan,
    pub cache: CacheStatus,
}

#[derive(Clone, Debug, Default)]
pub struct Patcher<M: CodeMemory = NativeMemory> {
    memory: M,
}

impl Patcher<NativeMemory> {
    pub fn native() -> Self {
        Self {
            memory: NativeMemory::default(),
        }
    }
}

impl<M: CodeMemory> Patcher<M> {
    pub fn with_memory(memory: M) -> Self {
        Self { memory }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// 将 `source` 写入 `target` 并把覆盖的页面保护设为 `final_protection`。
    ///
    /// # Safety
    ///
    /// `target` 必须是调用方已映射的内存，patch 期间不能有其他线程在该区间内执行。
    /// 与 `target` 同页的其他代码在可写窗口内不可执行。
    pub unsafe fn patch(
        &self,
        target: MemoryRegion,
        source: &[u8],
        final_protection: Protection,
    ) -> Result<PatchOutcome, PatchError> {
        if target.len != source.len() {
            return Err(PatchError::LengthMismatch {
                target: target.len,
                source: source.len(),
            });
        }
        let span = target.page_span(self.memory.page_size())?;

        // 切换失败时尚未写入，无需回滚
        self.memory
            .protect(span, Protection::READ_WRITE)
            .map_err(|platform_code| PatchError::ProtectionChangeFailed {
                step: PatchStep::ToWritable,
                platform_code,
            })?;

        if !source.is_empty() {
            std::ptr::copy(source.as_ptr(), target.addr as *mut u8, source.len());
        }

        self.memory
            .protect(span, final_protection)
            .map_err(|platform_code| PatchError::ProtectionChangeFailed {
                step: PatchStep::ToFinal,
                platform_code,
            })?;

        let cache = self
            .memory
            .invalidate_icache(target)
            .map_err(|platform_code| PatchError::CacheInvalidationFailed { platform_code })?;

        Ok(PatchOutcome { span, cache })
    }
}

#[cfg(test)]
mod tests;
