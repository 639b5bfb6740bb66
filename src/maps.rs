// 通过 /proc/self/maps 查询区间的实际页面保护属性
use crate::errno::PatchError;
use crate::protection::Protection;
use crate::region::MemoryRegion;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};

const MAPS_PATH: &str = "/proc/self/maps";

// start-end perms，其余字段不关心
static MAPS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-fA-F]+)-([0-9a-fA-F]+)\s+([r-])([w-])([x-])[psS-]")
        .unwrap_or_else(|err| panic!("invalid maps pattern: {err}"))
});

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct MapsEntry {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) protection: Protection,
}

pub(crate) fn parse_maps_line(line: &str) -> Option<MapsEntry> {
    let caps = MAPS_LINE.captures(line)?;
    let start = usize::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
    let end = usize::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
    if start >= end {
        return None;
    }
    let mut protection = Protection::empty();
    if caps.get(3)?.as_str() == "r" {
        protection |= Protection::READ;
    }
    if caps.get(4)?.as_str() == "w" {
        protection |= Protection::WRITE;
    }
    if caps.get(5)?.as_str() == "x" {
        protection |= Protection::EXECUTE;
    }
    Some(MapsEntry {
        start,
        end,
        protection,
    })
}

/// 查询 `region` 当前的保护属性。
///
/// 区间跨多个映射时取各段权限交集；区间未被连续覆盖时返回 `MapsUnavailable`。
pub fn query_protection(region: MemoryRegion) -> Result<Protection, PatchError> {
    let file = File::open(MAPS_PATH).map_err(|_| PatchError::MapsUnavailable)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        lines.push(line.map_err(|_| PatchError::MapsUnavailable)?);
    }
    protection_from_lines(lines.iter().map(String::as_str), region)
}

// 按地址升序逐段推进游标，要求 [addr, end) 无空洞
pub(crate) fn protection_from_lines<'a, I>(
    lines: I,
    region: MemoryRegion,
) -> Result<Protection, PatchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let region_end = region.end()?;
    // 零长度区间按其起始字节所在映射计算
    let end_addr = region_end.max(region.addr.saturating_add(1));
    let mut cursor = region.addr;
    let mut protection: Option<Protection> = None;

    for line in lines {
        let Some(entry) = parse_maps_line(line) else {
            continue;
        };
        if cursor < entry.start || cursor >= entry.end {
            continue;
        }

        protection = Some(match protection {
            None => entry.protection,
            Some(prev) => prev & entry.protection,
        });

        if end_addr <= entry.end {
            return protection.ok_or(PatchError::MapsUnavailable);
        }
        cursor = entry.end;
    }

    Err(PatchError::MapsUnavailable)
}
