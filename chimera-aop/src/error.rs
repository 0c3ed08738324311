//! 错误类型定义
//!
//! 引擎区分三类错误：
//! - [`AopError`]：配置错误、调用分派错误以及引擎内部不变量被破坏
//! - [`Throwable`]：目标方法或通知代码在运行时"抛出"的错误值，携带运行时类型
//! - [`InvocationError`]：每次代理调用返回的错误，二者之一

use crate::reflect::{TypeInfo, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// AOP 引擎错误
#[derive(Debug, Error)]
pub enum AopError {
    #[error("No advisors and no TargetSource specified")]
    NoTargetOrAdvisors,

    #[error("Cannot {0}: configuration is frozen")]
    Frozen(&'static str),

    #[error("Advice type [{0}] is not recognized by any registered adapter")]
    UnknownAdviceType(String),

    #[error("[{0}] is not an interface")]
    NotAnInterface(String),

    #[error("Advisor index {index} is out of bounds: only have {len} advisors")]
    AdvisorIndexOutOfBounds { index: usize, len: usize },

    #[error("TargetSource cannot determine target type: either an interface or a target is required for proxy creation")]
    UnresolvableTargetType,

    #[error("Null return value from advice does not match primitive return type for: {method} -> {return_type}")]
    NullReturnForPrimitive { method: String, return_type: String },

    #[error("Interceptor chain exhausted at index {index} without reaching the target (chain length {len})")]
    ChainExhausted { index: usize, len: usize },

    #[error("No target available to invoke {0}")]
    TargetUnavailable(String),

    #[error("Type [{type_name}] has no implementation for method {method}")]
    NoSuchMethod { type_name: String, method: String },

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Cannot find current proxy: set 'expose_proxy' to true to make it available, and ensure that AopContext::current_proxy() is invoked in the same thread as the intercepted call")]
    ProxyNotAvailable,

    #[error("Pointcut evaluation failed: {0}")]
    PointcutEvaluation(String),

    #[error("Target source failure: {0}")]
    TargetSource(String),

    #[error("Invalid AOP configuration: {0}")]
    Config(String),
}

/// 引擎结果类型
pub type AopResult<T> = Result<T, AopError>;

/// 运行时抛出的错误值
///
/// 与普通 Rust 错误不同，`Throwable` 带有一个 [`TypeInfo`]，
/// 异常通知可以按类型（包括子类型）进行过滤。
#[derive(Clone)]
pub struct Throwable {
    type_info: TypeInfo,
    message: String,
    cause: Option<Arc<anyhow::Error>>,
}

impl Throwable {
    /// 创建新的运行时错误
    pub fn new(type_info: &TypeInfo, message: impl Into<String>) -> Self {
        Self {
            type_info: type_info.clone(),
            message: message.into(),
            cause: None,
        }
    }

    /// 附加原因
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(Arc::new(cause.into()));
        self
    }

    /// 运行时类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 错误消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 是否为指定类型（或其子类型）的实例
    pub fn is_instance_of(&self, type_info: &TypeInfo) -> bool {
        type_info.is_assignable_from(&self.type_info)
    }

    /// 错误源链（cause chain）
    pub fn cause_chain(&self) -> Vec<String> {
        match &self.cause {
            Some(cause) => cause.chain().map(|e| e.to_string()).collect(),
            None => Vec::new(),
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        let chain = self.cause_chain();
        if chain.is_empty() {
            self.to_string()
        } else {
            format!("{}\nCaused by:\n  {}", self, chain.join("\n  "))
        }
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_info.name(), self.message)
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("type", &self.type_info.name())
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl std::error::Error for Throwable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause = self.cause.as_ref()?;
        let source: &(dyn std::error::Error + 'static) = (**cause).as_ref();
        Some(source)
    }
}

/// 代理调用错误
///
/// 目标与通知抛出的错误原样传播给调用方。
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Thrown(#[from] Throwable),

    #[error(transparent)]
    Aop(#[from] AopError),
}

impl InvocationError {
    /// 目标或通知抛出的错误值
    pub fn as_throwable(&self) -> Option<&Throwable> {
        match self {
            InvocationError::Thrown(t) => Some(t),
            InvocationError::Aop(_) => None,
        }
    }

    /// 引擎错误
    pub fn as_aop_error(&self) -> Option<&AopError> {
        match self {
            InvocationError::Aop(e) => Some(e),
            InvocationError::Thrown(_) => None,
        }
    }
}

/// 一次调用的结果
pub type InvocationResult = Result<Value, InvocationError>;
