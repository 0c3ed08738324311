use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式（带时间、级别、目标）
    Full,
    /// 美化格式（适合开发）
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// `[logging]` 配置表
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// 例如："chimera_aop=debug,proxy_demo=info"
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            show_target: false,
            show_thread_ids: false,
            filter: None,
        }
    }
}

impl LoggingSettings {
    /// 读取 `[logging]` 表，缺失时使用默认值
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize, Default)]
        struct Root {
            #[serde(default)]
            logging: LoggingSettings,
        }

        let root: Root = toml::from_str(content)?;
        Ok(root.logging)
    }

    /// 环境变量覆盖：RUST_LOG、LOG_LEVEL、LOG_FORMAT
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            self.filter = Some(rust_log);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format;
        }
        self
    }

    /// 初始化日志系统
    pub fn init(&self) -> Result<()> {
        let level: LogLevel = self.level.parse().map_err(|e: String| anyhow!(e))?;
        let format: LogFormat = self.format.parse().map_err(|e: String| anyhow!(e))?;

        let env_filter = match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(level.to_string())),
            None => EnvFilter::new(level.to_string()),
        };

        let builder = subscriber_fmt()
            .with_env_filter(env_filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);

        let result = match format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        result.map_err(|e| anyhow!("failed to initialize logging: {}", e))
    }
}
