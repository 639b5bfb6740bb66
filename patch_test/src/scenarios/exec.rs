// 执行被 patch 的代码，验证可执行权限与指令缓存刷新
use srx_patch::{CacheStatus, Protection, patch};

use crate::test_ctx::{MappedPages, ensure_ok};

#[cfg(target_arch = "x86_64")]
mod isa {
    pub const NOP_SLED: [u8; 16] = [0x90; 16];
    pub const RET: [u8; 1] = [0xC3];

    // mov eax, imm32; ret
    pub fn return_imm(value: u16) -> Vec<u8> {
        let mut code = vec![0xB8];
        code.extend_from_slice(&(value as u32).to_le_bytes());
        code.push(0xC3);
        code
    }
}

#[cfg(target_arch = "aarch64")]
mod isa {
    const NOP: [u8; 4] = 0xd503_201fu32.to_le_bytes();
    pub const RET: [u8; 4] = 0xd65f_03c0u32.to_le_bytes();
    pub const NOP_SLED: [u8; 16] = [
        NOP[0], NOP[1], NOP[2], NOP[3], NOP[0], NOP[1], NOP[2], NOP[3], NOP[0], NOP[1], NOP[2],
        NOP[3], NOP[0], NOP[1], NOP[2], NOP[3],
    ];

    // movz w0, #imm16; ret
    pub fn return_imm(value: u16) -> Vec<u8> {
        let movz = 0x5280_0000u32 | ((value as u32) << 5);
        let mut code = movz.to_le_bytes().to_vec();
        code.extend_from_slice(&RET);
        code
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub unsafe fn scenario_exec_nop_sled() {
    let pages = MappedPages::new(1);
    // sled 之后的返回指令位于目标区间之外
    pages.fill(isa::NOP_SLED.len(), &isa::RET);
    let region = pages.region(0, isa::NOP_SLED.len());

    let outcome = ensure_ok(
        patch(region, &isa::NOP_SLED, Protection::READ_EXECUTE),
        "patch nop sled",
    );
    assert_ne!(outcome.cache, CacheStatus::Unsupported, "cache status unexpected");
    assert_eq!(pages.read(0, isa::NOP_SLED.len()), isa::NOP_SLED.to_vec());

    let entry: extern "C" fn() = std::mem::transmute(pages.addr);
    entry();
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub unsafe fn scenario_exec_repatch_return() {
    let pages = MappedPages::new(1);
    let first = isa::return_imm(0x1234);
    let second = isa::return_imm(0x4321);
    let region = pages.region(0, first.len());

    ensure_ok(patch(region, &first, Protection::READ_EXECUTE), "patch first");
    let entry: extern "C" fn() -> u32 = std::mem::transmute(pages.addr);
    assert_eq!(entry(), 0x1234, "first code returned wrong value");

    ensure_ok(patch(region, &second, Protection::READ_EXECUTE), "patch second");
    assert_eq!(entry(), 0x4321, "stale code executed after repatch");
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub unsafe fn scenario_exec_nop_sled() {
    println!("exec-nop-sled skipped on this architecture");
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub unsafe fn scenario_exec_repatch_return() {
    println!("exec-repatch-return skipped on this architecture");
}
