// 日志输出，转发到 log facade，由宿主安装具体 logger
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

const LOG_TARGET: &str = "srx_patch";

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// 设置日志级别，启用时输出 DEBUG 及以上，禁用时仅输出 WARN 及以上
pub fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

fn enabled(level: ::log::Level) -> bool {
    let threshold = if debug_enabled() {
        ::log::Level::Debug
    } else {
        ::log::Level::Warn
    };
    level <= threshold
}

fn write_log(level: ::log::Level, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    ::log::log!(target: LOG_TARGET, level, "{args}");
}

pub(crate) fn info(args: fmt::Arguments) {
    write_log(::log::Level::Info, args);
}

pub(crate) fn debug(args: fmt::Arguments) {
    write_log(::log::Level::Debug, args);
}

pub(crate) fn warn(args: fmt::Arguments) {
    write_log(::log::Level::Warn, args);
}

pub(crate) fn error(args: fmt::Arguments) {
    write_log(::log::Level::Error, args);
}
