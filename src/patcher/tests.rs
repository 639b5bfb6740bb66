// patch 流程的单元测试：以记录型平台实现校验步骤顺序与失败语义
use super::Patcher;
use crate::errno::{PatchError, PatchStep};
use crate::platform::{CacheStatus, CodeMemory, PlatformCode};
use crate::protection::Protection;
use crate::region::{MemoryRegion, PageSpan};
use std::cell::RefCell;

const FAKE_PAGE: usize = 0x1000;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Call {
    Protect(PageSpan, Protection),
    Flush(MemoryRegion),
}

// 只记录调用，不真正修改页面保护；可在指定步骤注入失败
struct RecordingMemory {
    calls: RefCell<Vec<Call>>,
    fail_at: Option<(PatchStep, PlatformCode)>,
    fail_flush: Option<PlatformCode>,
    cache: CacheStatus,
}

impl RecordingMemory {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_at: None,
            fail_flush: None,
            cache: CacheStatus::Flushed,
        }
    }

    fn failing(step: PatchStep, code: PlatformCode) -> Self {
        Self {
            fail_at: Some((step, code)),
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl CodeMemory for RecordingMemory {
    fn page_size(&self) -> usize {
        FAKE_PAGE
    }

    unsafe fn protect(&self, span: PageSpan, protection: Protection) -> Result<(), PlatformCode> {
        let protect_count = self
            .calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Protect(..)))
            .count();
        self.calls.borrow_mut().push(Call::Protect(span, protection));
        let step = if protect_count == 0 {
            PatchStep::ToWritable
        } else {
            PatchStep::ToFinal
        };
        match self.fail_at {
            Some((fail_step, code)) if fail_step == step => Err(code),
            _ => Ok(()),
        }
    }

    unsafe fn invalidate_icache(&self, region: MemoryRegion) -> Result<CacheStatus, PlatformCode> {
        self.calls.borrow_mut().push(Call::Flush(region));
        match self.fail_flush {
            Some(code) => Err(code),
            None => Ok(self.cache),
        }
    }
}

fn span_of(region: MemoryRegion) -> PageSpan {
    PageSpan {
        start: region.addr & !(FAKE_PAGE - 1),
        len: ((region.addr + region.len + FAKE_PAGE - 1) & !(FAKE_PAGE - 1))
            - (region.addr & !(FAKE_PAGE - 1)),
    }
}

fn region_of(buffer: &mut [u8]) -> MemoryRegion {
    MemoryRegion::new(buffer.as_mut_ptr() as usize, buffer.len())
}

#[test]
fn steps_run_in_order() {
    let mut buffer = vec![0u8; 32];
    let region = region_of(&mut buffer[8..24]);
    let patcher = Patcher::with_memory(RecordingMemory::new());

    let outcome =
        unsafe { patcher.patch(region, &[0x90; 16], Protection::READ_EXECUTE) }.unwrap();

    let span = span_of(region);
    assert_eq!(outcome.span, span);
    assert_eq!(outcome.cache, CacheStatus::Flushed);
    assert_eq!(
        patcher.memory().calls(),
        vec![
            Call::Protect(span, Protection::READ_WRITE),
            Call::Protect(span, Protection::READ_EXECUTE),
            Call::Flush(region),
        ]
    );
    assert_eq!(&buffer[..8], &[0; 8]);
    assert_eq!(&buffer[8..24], &[0x90; 16]);
    assert_eq!(&buffer[24..], &[0; 8]);
}

#[test]
fn length_mismatch_touches_nothing() {
    let mut buffer = vec![0u8; 8];
    let region = region_of(&mut buffer);
    let patcher = Patcher::with_memory(RecordingMemory::new());

    let err = unsafe { patcher.patch(region, &[0xCC; 4], Protection::READ_EXECUTE) }.unwrap_err();

    assert_eq!(
        err,
        PatchError::LengthMismatch {
            target: 8,
            source: 4
        }
    );
    assert!(patcher.memory().calls().is_empty());
    assert_eq!(buffer, vec![0u8; 8]);
}

#[test]
fn overflowing_region_touches_nothing() {
    let region = MemoryRegion::new(usize::MAX - 2, 4);
    let patcher = Patcher::with_memory(RecordingMemory::new());

    let err = unsafe { patcher.patch(region, &[0; 4], Protection::READ_EXECUTE) }.unwrap_err();

    assert!(matches!(err, PatchError::AddressOverflow { .. }));
    assert!(patcher.memory().calls().is_empty());
}

#[test]
fn writable_failure_aborts_before_copy() {
    let mut buffer = vec![0u8; 16];
    let region = region_of(&mut buffer);
    let patcher = Patcher::with_memory(RecordingMemory::failing(
        PatchStep::ToWritable,
        libc::EACCES,
    ));

    let err = unsafe { patcher.patch(region, &[0x90; 16], Protection::READ_EXECUTE) }.unwrap_err();

    assert_eq!(
        err,
        PatchError::ProtectionChangeFailed {
            step: PatchStep::ToWritable,
            platform_code: libc::EACCES,
        }
    );
    assert_eq!(patcher.memory().calls().len(), 1);
    assert_eq!(buffer, vec![0u8; 16]);
}

#[test]
fn final_failure_keeps_copied_bytes() {
    let mut buffer = vec![0u8; 16];
    let region = region_of(&mut buffer);
    let patcher = Patcher::with_memory(RecordingMemory::failing(
        PatchStep::ToFinal,
        libc::ENOMEM,
    ));

    let err = unsafe { patcher.patch(region, &[0x90; 16], Protection::READ_EXECUTE) }.unwrap_err();

    assert_eq!(err.step(), Some(PatchStep::ToFinal));
    assert_eq!(err.platform_code(), Some(libc::ENOMEM));
    // 不刷新缓存，也不回滚
    assert_eq!(patcher.memory().calls().len(), 2);
    assert_eq!(buffer, vec![0x90u8; 16]);
}

#[test]
fn cache_failure_is_surfaced() {
    let mut buffer = vec![0u8; 4];
    let region = region_of(&mut buffer);
    let mut memory = RecordingMemory::new();
    memory.fail_flush = Some(87);
    let patcher = Patcher::with_memory(memory);

    let err = unsafe { patcher.patch(region, &[1, 2, 3, 4], Protection::READ_EXECUTE) }.unwrap_err();

    assert_eq!(err, PatchError::CacheInvalidationFailed { platform_code: 87 });
    assert_eq!(buffer, vec![1, 2, 3, 4]);
}

#[test]
fn unsupported_cache_is_not_an_error() {
    let mut buffer = vec![0u8; 4];
    let region = region_of(&mut buffer);
    let mut memory = RecordingMemory::new();
    memory.cache = CacheStatus::Unsupported;
    let patcher = Patcher::with_memory(memory);

    let outcome = unsafe { patcher.patch(region, &[9; 4], Protection::READ_EXECUTE) }.unwrap();

    assert_eq!(outcome.cache, CacheStatus::Unsupported);
    assert_eq!(buffer, vec![9; 4]);
}

#[test]
fn zero_length_still_round_trips_protection() {
    let region = MemoryRegion::new(0x4010, 0);
    let patcher = Patcher::with_memory(RecordingMemory::new());

    unsafe { patcher.patch(region, &[], Protection::READ) }.unwrap();

    let span = PageSpan {
        start: 0x4000,
        len: FAKE_PAGE,
    };
    assert_eq!(
        patcher.memory().calls(),
        vec![
            Call::Protect(span, Protection::READ_WRITE),
            Call::Protect(span, Protection::READ),
            Call::Flush(region),
        ]
    );
}

#[test]
fn zero_length_on_page_boundary_still_round_trips() {
    let region = MemoryRegion::new(0x4000, 0);
    let patcher = Patcher::with_memory(RecordingMemory::new());

    let outcome = unsafe { patcher.patch(region, &[], Protection::READ) }.unwrap();

    let span = PageSpan {
        start: 0x4000,
        len: FAKE_PAGE,
    };
    assert_eq!(outcome.span, span);
    assert_eq!(
        &patcher.memory().calls()[..2],
        &[
            Call::Protect(span, Protection::READ_WRITE),
            Call::Protect(span, Protection::READ),
        ]
    );
}

#[cfg(unix)]
mod native {
    use crate::patcher::Patcher;
    use crate::platform::unix::page_size;
    use crate::protection::Protection;
    use crate::testing::MappedPages;

    #[test]
    fn patch_mapped_page() {
        let pages = MappedPages::new(1);
        let patcher = Patcher::native();

        let outcome =
            unsafe { patcher.patch(pages.region(0, 16), &[0x90; 16], Protection::READ_EXECUTE) }
                .unwrap();

        assert_eq!(outcome.span.start, pages.addr);
        assert_eq!(outcome.span.len, page_size());
        assert_eq!(pages.read(0, 16), vec![0x90; 16]);
        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_eq!(
            crate::maps::query_protection(pages.region(0, 16)).unwrap(),
            Protection::READ_EXECUTE
        );
    }

    #[test]
    fn patch_is_idempotent() {
        let pages = MappedPages::new(1);
        let patcher = Patcher::native();
        let source = [0x0F, 0x1F, 0x44, 0x00, 0x00];

        for _ in 0..2 {
            unsafe { patcher.patch(pages.region(0x100, 5), &source, Protection::READ_EXECUTE) }
                .unwrap();
            assert_eq!(pages.read(0x100, 5), source.to_vec());
        }
        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_eq!(
            crate::maps::query_protection(pages.region(0x100, 5)).unwrap(),
            Protection::READ_EXECUTE
        );
    }

    #[test]
    fn cross_page_region_keeps_neighbours() {
        let page = page_size();
        let pages = MappedPages::new(2);
        pages.fill(page - 12, &[0x5A; 4]);
        pages.fill(page + 8, &[0xA5; 4]);
        let region = pages.region(page - 8, 16);
        let patcher = Patcher::native();

        let outcome =
            unsafe { patcher.patch(region, &[0xC3; 16], Protection::READ_EXECUTE) }.unwrap();

        assert_eq!(outcome.span.start, pages.addr);
        assert_eq!(outcome.span.len, 2 * page);
        assert_eq!(pages.read(page - 12, 4), vec![0x5A; 4]);
        assert_eq!(pages.read(page - 8, 16), vec![0xC3; 16]);
        assert_eq!(pages.read(page + 8, 4), vec![0xA5; 4]);
    }

    #[test]
    fn mismatch_leaves_mapped_bytes_unchanged() {
        let pages = MappedPages::new(1);
        let patcher = Patcher::native();

        let result =
            unsafe { patcher.patch(pages.region(0, 8), &[0xFF; 4], Protection::READ_EXECUTE) };

        assert!(result.is_err());
        assert_eq!(pages.read(0, 8), vec![0; 8]);
        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_eq!(
            crate::maps::query_protection(pages.region(0, 8)).unwrap(),
            Protection::READ_WRITE
        );
    }

    #[test]
    fn zero_length_sets_final_protection() {
        let pages = MappedPages::new(1);
        let patcher = Patcher::native();

        unsafe { patcher.patch(pages.region(0x10, 0), &[], Protection::READ) }.unwrap();

        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_eq!(
            crate::maps::query_protection(pages.region(0x10, 0)).unwrap(),
            Protection::READ
        );
        assert_eq!(pages.read(0x10, 1), vec![0]);
    }

    #[test]
    fn zero_length_at_page_start_sets_final_protection() {
        let pages = MappedPages::new(1);
        let patcher = Patcher::native();

        let outcome = unsafe { patcher.patch(pages.region(0, 0), &[], Protection::READ) }.unwrap();

        assert_eq!(outcome.span.start, pages.addr);
        assert_eq!(outcome.span.len, page_size());
        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_eq!(
            crate::maps::query_protection(pages.region(0, 0)).unwrap(),
            Protection::READ
        );
        assert_eq!(pages.read(0, 1), vec![0]);
    }
}
