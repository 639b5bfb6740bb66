use srx_patch::{
    PEXEC, PREAD, PatchError, Protection, patch, patch_saved, restore, write_executable_memory,
};

use crate::test_ctx::{MappedPages, assert_protection, ensure_ok, page_size};

pub unsafe fn scenario_round_trip() {
    let pages = MappedPages::new(1);
    let region = pages.region(0x20, 16);

    let outcome = ensure_ok(patch(region, &[0x90; 16], Protection::READ_EXECUTE), "patch rx");
    assert_eq!(outcome.span.start, pages.addr, "span should start at page");
    assert_eq!(pages.read(0x20, 16), vec![0x90; 16], "patched bytes mismatch");
    assert_protection(region, Protection::READ_EXECUTE, "round trip rx");

    ensure_ok(patch(region, &[0x11; 16], Protection::READ), "patch r");
    assert_eq!(pages.read(0x20, 16), vec![0x11; 16], "patched bytes mismatch");
    assert_protection(region, Protection::READ, "round trip r");
}

pub unsafe fn scenario_length_mismatch() {
    let pages = MappedPages::new(1);
    let region = pages.region(0, 8);

    let result = patch(region, &[0xCC; 4], Protection::READ_EXECUTE);
    assert_eq!(
        result,
        Err(PatchError::LengthMismatch {
            target: 8,
            source: 4
        }),
        "mismatch should fail fast"
    );
    assert_eq!(pages.read(0, 8), vec![0; 8], "mismatch must not write");
    assert_protection(region, Protection::READ_WRITE, "mismatch keeps protection");
}

pub unsafe fn scenario_zero_length() {
    // 页内偏移与页首两种起点
    for offset in [0x40, 0] {
        let pages = MappedPages::new(1);
        let region = pages.region(offset, 0);

        ensure_ok(patch(region, &[], Protection::READ), "patch zero length");
        assert_protection(region, Protection::READ, "zero length protection");
    }
}

pub unsafe fn scenario_idempotent() {
    let pages = MappedPages::new(1);
    let region = pages.region(0x80, 8);
    let source = [0x48, 0x31, 0xC0, 0x90, 0x90, 0x90, 0x90, 0xC3];

    for round in 0..2 {
        ensure_ok(patch(region, &source, Protection::READ_EXECUTE), "patch idempotent");
        assert_eq!(pages.read(0x80, 8), source.to_vec(), "round {round} bytes mismatch");
        assert_protection(region, Protection::READ_EXECUTE, "idempotent protection");
    }
}

// 目标跨页，同页的前后哨兵不能被改写
pub unsafe fn scenario_cross_page_sentinel() {
    let page = page_size();
    let pages = MappedPages::new(2);
    pages.fill(page - 8, &[0x5A; 4]);
    pages.fill(page + 4, &[0xA5; 4]);
    let region = pages.region(page - 4, 8);

    let outcome = ensure_ok(patch(region, &[0xEE; 8], Protection::READ_EXECUTE), "patch cross page");
    assert_eq!(outcome.span.len, 2 * page, "span should cover both pages");
    assert_eq!(pages.read(page - 8, 4), vec![0x5A; 4], "leading sentinel corrupted");
    assert_eq!(pages.read(page - 4, 8), vec![0xEE; 8], "patched bytes mismatch");
    assert_eq!(pages.read(page + 4, 4), vec![0xA5; 4], "trailing sentinel corrupted");
    assert_protection(pages.region(0, 2 * page), Protection::READ_EXECUTE, "cross page");
}

pub unsafe fn scenario_raw_entry() {
    let pages = MappedPages::new(1);
    let source = [0x90u8; 16];

    ensure_ok(
        write_executable_memory(pages.addr, 16, source.as_ptr() as usize, 16, None),
        "raw default",
    );
    assert_protection(pages.region(0, 16), Protection::READ_EXECUTE, "raw default");

    ensure_ok(
        write_executable_memory(
            pages.addr,
            16,
            source.as_ptr() as usize,
            16,
            Some(PREAD | PEXEC),
        ),
        "raw explicit",
    );

    let result = write_executable_memory(pages.addr, 16, source.as_ptr() as usize, 16, Some(0x80));
    assert_eq!(result, Err(PatchError::InvalidProtection { bits: 0x80 }));
}

pub unsafe fn scenario_saved_restore() {
    let pages = MappedPages::new(1);
    pages.fill(0x10, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let region = pages.region(0x10, 8);

    let saved = ensure_ok(
        patch_saved(region, &[0xCC; 8], Protection::READ_EXECUTE),
        "patch saved",
    );
    assert_eq!(saved.original(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(pages.read(0x10, 8), vec![0xCC; 8]);

    ensure_ok(restore(&saved), "restore");
    assert_eq!(pages.read(0x10, 8), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_protection(region, Protection::READ_EXECUTE, "restore protection");
}
