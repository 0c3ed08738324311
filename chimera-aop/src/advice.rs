//! 通知（Advice）定义
//!
//! 定义了在连接点执行的各种动作。通知种类是封闭的标签联合，
//! 由 [`crate::adapter`] 中的适配器转换为统一的 [`MethodInterceptor`]。

use crate::error::{InvocationError, InvocationResult};
use crate::invocation::{MethodInterceptor, MethodInvocation};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::reflect::{TypeInfo, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 通知回调的结果
pub type AdviceResult = Result<(), InvocationError>;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 完整的方法拦截器
    Interceptor,
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    AfterThrowing,
    /// 环绕通知（可以控制方法执行）
    Around,
    /// 只能由自定义适配器识别的通知
    Custom,
}

impl fmt::Display for AdviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 前置通知 Trait
///
/// 在目标方法执行前调用
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, join_point: &JoinPoint<'_>) -> AdviceResult;
}

/// 后置通知 Trait
///
/// 在目标方法执行后调用（无论成功还是失败）
pub trait AfterAdvice: Send + Sync {
    fn after(&self, join_point: &JoinPoint<'_>) -> AdviceResult;
}

/// 返回后通知 Trait
///
/// 在目标方法成功返回后调用
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, join_point: &JoinPoint<'_>, result: &Value) -> AdviceResult;
}

/// 异常通知 Trait
///
/// 在目标方法抛出异常时调用
pub trait AfterThrowingAdvice: Send + Sync {
    fn after_throwing(&self, join_point: &JoinPoint<'_>, error: &InvocationError) -> AdviceResult;
}

/// 环绕通知 Trait
///
/// 可以完全控制目标方法的执行
pub trait AroundAdvice: Send + Sync {
    fn around(&self, pjp: &mut ProceedingJoinPoint<'_, '_>) -> InvocationResult;
}

impl<F> BeforeAdvice for F
where
    F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync,
{
    fn before(&self, join_point: &JoinPoint<'_>) -> AdviceResult {
        self(join_point)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync,
{
    fn after(&self, join_point: &JoinPoint<'_>) -> AdviceResult {
        self(join_point)
    }
}

impl<F> AfterReturningAdvice for F
where
    F: Fn(&JoinPoint<'_>, &Value) -> AdviceResult + Send + Sync,
{
    fn after_returning(&self, join_point: &JoinPoint<'_>, result: &Value) -> AdviceResult {
        self(join_point, result)
    }
}

impl<F> AfterThrowingAdvice for F
where
    F: Fn(&JoinPoint<'_>, &InvocationError) -> AdviceResult + Send + Sync,
{
    fn after_throwing(&self, join_point: &JoinPoint<'_>, error: &InvocationError) -> AdviceResult {
        self(join_point, error)
    }
}

impl<F> AroundAdvice for F
where
    F: Fn(&mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync,
{
    fn around(&self, pjp: &mut ProceedingJoinPoint<'_, '_>) -> InvocationResult {
        self(pjp)
    }
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    Interceptor(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning {
        advice: Arc<dyn AfterReturningAdvice>,
        /// 只有返回值可赋给该类型时才触发
        returning: Option<TypeInfo>,
    },
    AfterThrowing {
        advice: Arc<dyn AfterThrowingAdvice>,
        /// 只有抛出的错误是该类型（或子类型）时才触发
        throwing: Option<TypeInfo>,
    },
    After(Arc<dyn AfterAdvice>),
    Around(Arc<dyn AroundAdvice>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Advice {
    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Interceptor(_) => AdviceType::Interceptor,
            Advice::Before(_) => AdviceType::Before,
            Advice::AfterReturning { .. } => AdviceType::AfterReturning,
            Advice::AfterThrowing { .. } => AdviceType::AfterThrowing,
            Advice::After(_) => AdviceType::After,
            Advice::Around(_) => AdviceType::Around,
            Advice::Custom(_) => AdviceType::Custom,
        }
    }

    pub fn interceptor<F>(f: F) -> Self
    where
        F: Fn(&mut MethodInvocation<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        Advice::Interceptor(Arc::new(f))
    }

    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(f))
    }

    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &Value) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::AfterReturning {
            advice: Arc::new(f),
            returning: None,
        }
    }

    /// 带返回值类型过滤的返回后通知
    pub fn after_returning_typed<F>(returning: &TypeInfo, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &Value) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::AfterReturning {
            advice: Arc::new(f),
            returning: Some(returning.clone()),
        }
    }

    pub fn after_throwing<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &InvocationError) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::AfterThrowing {
            advice: Arc::new(f),
            throwing: None,
        }
    }

    /// 带异常类型过滤的异常通知
    pub fn after_throwing_typed<F>(throwing: &TypeInfo, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &InvocationError) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::AfterThrowing {
            advice: Arc::new(f),
            throwing: Some(throwing.clone()),
        }
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync + 'static,
    {
        Advice::After(Arc::new(f))
    }

    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(f))
    }

    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Advice::Custom(Arc::new(value))
    }

    /// 自定义通知的载荷
    pub fn custom_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Advice::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// 同一个通知实例
    pub fn ptr_eq(&self, other: &Advice) -> bool {
        self.advice_type() == other.advice_type() && self.data_ptr() == other.data_ptr()
    }

    fn data_ptr(&self) -> *const () {
        match self {
            Advice::Interceptor(a) => Arc::as_ptr(a) as *const (),
            Advice::Before(a) => Arc::as_ptr(a) as *const (),
            Advice::AfterReturning { advice, .. } => Arc::as_ptr(advice) as *const (),
            Advice::AfterThrowing { advice, .. } => Arc::as_ptr(advice) as *const (),
            Advice::After(a) => Arc::as_ptr(a) as *const (),
            Advice::Around(a) => Arc::as_ptr(a) as *const (),
            Advice::Custom(a) => Arc::as_ptr(a) as *const (),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::AfterReturning {
                returning: Some(ty), ..
            } => write!(f, "AfterReturning(returning = {})", ty.name()),
            Advice::AfterThrowing {
                throwing: Some(ty), ..
            } => write!(f, "AfterThrowing(throwing = {})", ty.name()),
            other => write!(f, "{}", other.advice_type()),
        }
    }
}

impl<T> From<Arc<T>> for Advice
where
    T: MethodInterceptor + 'static,
{
    fn from(interceptor: Arc<T>) -> Self {
        Advice::Interceptor(interceptor)
    }
}
