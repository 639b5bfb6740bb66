// 目标内存区间与页对齐计算，区间内存归调用方所有
use crate::errno::PatchError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub addr: usize,
    pub len: usize,
}

// 覆盖某个区间的页对齐超集 [start, start + len)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageSpan {
    pub start: usize,
    pub len: usize,
}

impl MemoryRegion {
    pub const fn new(addr: usize, len: usize) -> Self {
        Self { addr, len }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.as_ptr() as usize, bytes.len())
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> Result<usize, PatchError> {
        self.addr
            .checked_add(self.len)
            .ok_or(PatchError::AddressOverflow {
                addr: self.addr,
                len: self.len,
            })
    }

    // 起始地址向下对齐、结束地址向上对齐到页边界
    // 空区间按起始字节所在的一页处理，保证保护属性仍被设置
    pub fn page_span(&self, page_size: usize) -> Result<PageSpan, PatchError> {
        debug_assert!(page_size.is_power_of_two());
        let overflow = PatchError::AddressOverflow {
            addr: self.addr,
            len: self.len,
        };
        let end = self.end()?;
        let start = align_down(self.addr, page_size);
        let end = if self.is_empty() {
            start.checked_add(page_size).ok_or(overflow)?
        } else {
            align_up(end, page_size).ok_or(overflow)?
        };
        Ok(PageSpan {
            start,
            len: end - start,
        })
    }
}

impl PageSpan {
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, region: &MemoryRegion) -> bool {
        region.addr >= self.start && region.end().is_ok_and(|end| end <= self.end())
    }
}

pub(crate) const fn align_down(addr: usize, align: usize) -> usize {
    addr & !(align - 1)
}

pub(crate) fn align_up(addr: usize, align: usize) -> Option<usize> {
    addr.checked_add(align - 1).map(|value| align_down(value, align))
}
