use std::ptr;

use srx_patch::{MemoryRegion, PatchError, Protection};

// 匿名映射页，drop 时 munmap
pub struct MappedPages {
    pub addr: usize,
    pub len: usize,
}

impl MappedPages {
    pub fn new(pages: usize) -> Self {
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

    pub fn region(&self, offset: usize, len: usize) -> MemoryRegion {
        assert!(offset + len <= self.len, "region out of mapping");
        MemoryRegion::new(self.addr + offset, len)
    }

    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= self.len, "read out of mapping");
        unsafe { std::slice::from_raw_parts((self.addr + offset) as *const u8, len) }.to_vec()
    }

    // 仅在页面可写时调用
    pub fn fill(&self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.len, "fill out of mapping");
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

pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

pub fn ensure_ok<T>(result: Result<T, PatchError>, op: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{op} failed: {err} ({:?})", err.errno()),
    }
}

// 读取 maps 中的实际保护属性，非 Linux/Android 平台跳过
pub fn assert_protection(region: MemoryRegion, expected: Protection, op: &str) {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        let actual = ensure_ok(srx_patch::query_protection(region), op);
        assert_eq!(actual, expected, "{op}: unexpected protection");
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        let _ = (region, expected, op);
    }
}

pub fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
