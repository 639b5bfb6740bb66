// 环境变量配置，进程内首次使用时读取一次
use once_cell::sync::Lazy;
use std::env;

// 打开 DEBUG 级别日志
pub const ENV_DEBUG: &str = "SRX_PATCH_DEBUG";
// patch 完成后通过 /proc/self/maps 校验最终保护属性
pub const ENV_VERIFY: &str = "SRX_PATCH_VERIFY";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    pub debug: bool,
    pub verify_protection: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            debug: env_flag(ENV_DEBUG).unwrap_or(false),
            verify_protection: env_flag(ENV_VERIFY).unwrap_or(false),
        }
    }
}

static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

pub fn get() -> Config {
    *CONFIG
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    parse_env_flag(&value)
}

// 支持 1/true/yes/on 与 0/false/no/off，大小写不敏感
pub(crate) fn parse_env_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("1")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
    {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("0")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("off")
    {
        return Some(false);
    }
    None
}
