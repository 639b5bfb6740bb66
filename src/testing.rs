// 单元测试用的匿名映射页，drop 时 munmap
use crate::platform::unix::page_size;
use crate::region::MemoryRegion;
use std::ptr;

pub(crate) struct MappedPages {
    pub(crate) addr: usize,
    pub(crate) len: usize,
}

impl MappedPages {
    pub(crate) fn new(pages: usize) -> Self {
        let len = pages * page_size();
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(raw, libc::MAP_FAILED, "mmap failed");
        Self {
            addr: raw as usize,
            len,
        }
    }

    pub(crate) fn region(&self, offset: usize, len: usize) -> MemoryRegion {
        assert!(offset + len <= self.len);
        MemoryRegion::new(self.addr + offset, len)
    }

    // 区间所在页需可读
    pub(crate) fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= self.len);
        unsafe { std::slice::from_raw_parts((self.addr + offset) as *const u8, len) }.to_vec()
    }

    pub(crate) fn fill(&self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.len);
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), (self.addr + offset) as *mut u8, bytes.len());
        }
    }
}

impl Drop for MappedPages {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.addr as *mut libc::c_void, self.len);
        }
    }
}
