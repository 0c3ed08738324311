//! 代理配置
//!
//! 可以在代码中构建，也可以从 `application.toml` 的 `[chimera.aop]` 表
//! 以及 `CHIMERA_AOP_*` 环境变量读取。

use crate::error::{AopError, AopResult};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// 配置属性前缀
pub const AOP_PROPERTY_PREFIX: &str = "chimera.aop";

/// 环境变量前缀
pub const AOP_ENV_PREFIX: &str = "CHIMERA_AOP_";

/// 代理配置标志
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// 直接代理目标类而不是其接口
    pub proxy_target_class: bool,

    /// 允许激进优化（使用子类代理）
    pub optimize: bool,

    /// 代理不暴露 Advised 接口
    pub opaque: bool,

    /// 通过 AopContext 暴露当前代理
    pub expose_proxy: bool,

    /// 配置冻结后不可修改
    pub frozen: bool,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    pub fn optimize(mut self, value: bool) -> Self {
        self.optimize = value;
        self
    }

    pub fn opaque(mut self, value: bool) -> Self {
        self.opaque = value;
        self
    }

    pub fn expose_proxy(mut self, value: bool) -> Self {
        self.expose_proxy = value;
        self
    }

    pub fn frozen(mut self, value: bool) -> Self {
        self.frozen = value;
        self
    }

    /// 从 TOML 字符串读取 `[chimera.aop]` 表，表不存在时使用默认值
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| AopError::Config(format!("Failed to parse TOML: {}", e)))?;

        let table = AOP_PROPERTY_PREFIX
            .split('.')
            .try_fold(&value, |current, key| current.get(key));

        match table {
            Some(table) => table
                .clone()
                .try_into()
                .map_err(|e| AopError::Config(format!("Invalid [{}] table: {}", AOP_PROPERTY_PREFIX, e))),
            None => Ok(Self::default()),
        }
    }

    /// 从 TOML 文件读取
    pub fn from_toml_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AopError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// 默认值叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 用 `CHIMERA_AOP_*` 环境变量覆盖当前值
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flags: [(&str, &mut bool); 5] = [
            ("PROXY_TARGET_CLASS", &mut self.proxy_target_class),
            ("OPTIMIZE", &mut self.optimize),
            ("OPAQUE", &mut self.opaque),
            ("EXPOSE_PROXY", &mut self.expose_proxy),
            ("FROZEN", &mut self.frozen),
        ];

        for (suffix, flag) in flags {
            let key = format!("{}{}", AOP_ENV_PREFIX, suffix);
            let Some(raw) = lookup(&key) else {
                continue;
            };
            match parse_bool(&raw) {
                Some(value) => *flag = value,
                None => tracing::warn!(key = %key, value = %raw, "Ignoring invalid boolean environment override"),
            }
        }
        self
    }
}

/// 布尔值解析：`true|yes|1` / `false|no|0`
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proxy_target_class={}; optimize={}; opaque={}; expose_proxy={}; frozen={}",
            self.proxy_target_class, self.optimize, self.opaque, self.expose_proxy, self.frozen
        )
    }
}
