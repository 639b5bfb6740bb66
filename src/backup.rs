// 可撤销 patch：写入前保存原始字节，restore 时按同一流程写回
use crate::errno::PatchError;
use crate::patcher::{PatchOutcome, Patcher};
use crate::platform::CodeMemory;
use crate::protection::Protection;
use crate::region::MemoryRegion;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavedPatch {
    region: MemoryRegion,
    original: Vec<u8>,
    final_protection: Protection,
}

impl SavedPatch {
    pub fn region(&self) -> MemoryRegion {
        self.region
    }

    pub fn original(&self) -> &[u8] {
        &self.original
    }

    pub fn final_protection(&self) -> Protection {
        self.final_protection
    }

    /// 写回原始字节。
    ///
    /// # Safety
    ///
    /// 与 [`Patcher::patch`] 相同。
    pub unsafe fn restore<M: CodeMemory>(
        &self,
        patcher: &Patcher<M>,
    ) -> Result<PatchOutcome, PatchError> {
        patcher.patch(self.region, &self.original, self.final_protection)
    }
}

impl<M: CodeMemory> Patcher<M> {
    /// 与 [`Patcher::patch`] 相同，但先保存 `target` 的原始内容。
    ///
    /// # Safety
    ///
    /// 除 [`Patcher::patch`] 的要求外，`target` 在调用前必须可读。
    pub unsafe fn patch_saved(
        &self,
        target: MemoryRegion,
        source: &[u8],
        final_protection: Protection,
    ) -> Result<(SavedPatch, PatchOutcome), PatchError> {
        if target.len != source.len() {
            return Err(PatchError::LengthMismatch {
                target: target.len,
                source: source.len(),
            });
        }
        target.end()?;

        let original = if target.is_empty() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(target.addr as *const u8, target.len).to_vec()
        };
        let outcome = self.patch(target, source, final_protection)?;
        Ok((
            SavedPatch {
                region: target,
                original,
                final_protection,
            },
            outcome,
        ))
    }
}
