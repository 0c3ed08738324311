//! 通知适配器
//!
//! 把各种通知统一转换为 [`MethodInterceptor`]。适配器注册表是开放的扩展点：
//! 新的通知种类只需注册新的 [`AdvisorAdapter`]，无需修改已有适配器。

use crate::advice::{
    Advice, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, AroundAdvice, BeforeAdvice,
};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult, InvocationError, InvocationResult};
use crate::invocation::{MethodInterceptor, MethodInvocation};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::reflect::{Method, TypeInfo, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// 通知适配器
pub trait AdvisorAdapter: Send + Sync {
    /// 是否理解该通知
    fn supports_advice(&self, advice: &Advice) -> bool;

    /// 为通知器的通知创建拦截器
    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>>;
}

fn unsupported(advisor: &Advisor) -> AopError {
    AopError::UnknownAdviceType(advisor.advice().advice_type().to_string())
}

// ============================================================================
// 内置拦截器
// ============================================================================

/// 前置通知拦截器：先执行回调，再继续
pub struct MethodBeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl MethodInterceptor for MethodBeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        self.advice.before(&JoinPoint::of(invocation))?;
        invocation.proceed()
    }
}

/// 返回后通知拦截器
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
    returning: Option<TypeInfo>,
}

impl AfterReturningAdviceInterceptor {
    fn accepts(&self, method: &Method, value: &Value) -> bool {
        let Some(expected) = &self.returning else {
            return true;
        };
        match value {
            Some(object) => expected.is_assignable_from(object.type_info()),
            // 空值按声明的返回类型判断
            None => {
                let declared = method.return_type();
                (expected.is_root() && declared.is_void()) || expected.is_assignable_from(declared)
            }
        }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let value = invocation.proceed()?;
        if self.accepts(invocation.method(), &value) {
            self.advice.after_returning(&JoinPoint::of(invocation), &value)?;
        }
        Ok(value)
    }
}

/// 异常通知拦截器
///
/// 带类型过滤时只观察类型匹配的 [`Throwable`](crate::error::Throwable)；
/// 引擎错误只会触发不带过滤的通知。错误总是继续向外传播。
pub struct ThrowsAdviceInterceptor {
    advice: Arc<dyn AfterThrowingAdvice>,
    throwing: Option<TypeInfo>,
}

impl ThrowsAdviceInterceptor {
    fn accepts(&self, error: &InvocationError) -> bool {
        match &self.throwing {
            None => true,
            Some(expected) => error.as_throwable().is_some_and(|t| t.is_instance_of(expected)),
        }
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(error) => {
                if self.accepts(&error) {
                    self.advice.after_throwing(&JoinPoint::of(invocation), &error)?;
                }
                Err(error)
            }
        }
    }
}

/// 后置通知拦截器，相当于 finally
pub struct AfterAdviceInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl MethodInterceptor for AfterAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let result = invocation.proceed();
        self.advice.after(&JoinPoint::of(invocation))?;
        result
    }
}

/// 环绕通知拦截器
pub struct AroundAdviceInterceptor {
    advice: Arc<dyn AroundAdvice>,
}

impl MethodInterceptor for AroundAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let mut pjp = ProceedingJoinPoint::new(invocation);
        self.advice.around(&mut pjp)
    }
}

// ============================================================================
// 内置适配器
// ============================================================================

pub struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Before(advice) => Ok(Arc::new(MethodBeforeAdviceInterceptor {
                advice: Arc::clone(advice),
            })),
            _ => Err(unsupported(advisor)),
        }
    }
}

pub struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning { .. })
    }

    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterReturning { advice, returning } => Ok(Arc::new(AfterReturningAdviceInterceptor {
                advice: Arc::clone(advice),
                returning: returning.clone(),
            })),
            _ => Err(unsupported(advisor)),
        }
    }
}

pub struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterThrowing { .. })
    }

    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterThrowing { advice, throwing } => Ok(Arc::new(ThrowsAdviceInterceptor {
                advice: Arc::clone(advice),
                throwing: throwing.clone(),
            })),
            _ => Err(unsupported(advisor)),
        }
    }
}

pub struct AfterAdviceAdapter;

impl AdvisorAdapter for AfterAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::After(_))
    }

    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::After(advice) => Ok(Arc::new(AfterAdviceInterceptor {
                advice: Arc::clone(advice),
            })),
            _ => Err(unsupported(advisor)),
        }
    }
}

pub struct AroundAdviceAdapter;

impl AdvisorAdapter for AroundAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Around(_))
    }

    fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Around(advice) => Ok(Arc::new(AroundAdviceInterceptor {
                advice: Arc::clone(advice),
            })),
            _ => Err(unsupported(advisor)),
        }
    }
}

// ============================================================================
// 注册表
// ============================================================================

/// 全局适配器注册表
static GLOBAL_ADAPTER_REGISTRY: Lazy<Arc<AdvisorAdapterRegistry>> =
    Lazy::new(|| Arc::new(AdvisorAdapterRegistry::new()));

/// 获取全局适配器注册表
pub fn global_adapter_registry() -> Arc<AdvisorAdapterRegistry> {
    Arc::clone(&GLOBAL_ADAPTER_REGISTRY)
}

/// 适配器注册表
///
/// 按注册顺序询问每个适配器；一个通知可以被多个适配器识别。
pub struct AdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl AdvisorAdapterRegistry {
    /// 创建带内置适配器的注册表
    pub fn new() -> Self {
        let adapters: Vec<Arc<dyn AdvisorAdapter>> = vec![
            Arc::new(BeforeAdviceAdapter),
            Arc::new(AfterReturningAdviceAdapter),
            Arc::new(ThrowsAdviceAdapter),
            Arc::new(AfterAdviceAdapter),
            Arc::new(AroundAdviceAdapter),
        ];
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// 注册适配器
    pub fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>) {
        self.adapters.write().push(adapter);
        tracing::debug!("Registered advisor adapter");
    }

    /// 是否有适配器能处理该通知
    pub fn supports(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Interceptor(_))
            || self.adapters.read().iter().any(|a| a.supports_advice(advice))
    }

    /// 把通知包装为作用于所有方法的通知器
    pub fn wrap(&self, advice: Advice) -> AopResult<Advisor> {
        if self.supports(&advice) {
            Ok(Advisor::new(advice))
        } else {
            Err(AopError::UnknownAdviceType(advice.advice_type().to_string()))
        }
    }

    /// 通知器对应的拦截器
    pub fn get_interceptors(&self, advisor: &Advisor) -> AopResult<Vec<Arc<dyn MethodInterceptor>>> {
        let mut interceptors = Vec::new();
        if let Advice::Interceptor(interceptor) = advisor.advice() {
            interceptors.push(Arc::clone(interceptor));
        }

        // 不持锁调用适配器
        let adapters = self.adapters.read().clone();
        for adapter in adapters.iter().filter(|a| a.supports_advice(advisor.advice())) {
            interceptors.push(adapter.get_interceptor(advisor)?);
        }

        if interceptors.is_empty() {
            return Err(unsupported(advisor));
        }
        Ok(interceptors)
    }
}

impl Default for AdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RateLimit {
        permits: usize,
    }

    struct RateLimitAdapter;

    impl AdvisorAdapter for RateLimitAdapter {
        fn supports_advice(&self, advice: &Advice) -> bool {
            advice.custom_ref::<RateLimit>().is_some()
        }

        fn get_interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
            let permits = advisor
                .advice()
                .custom_ref::<RateLimit>()
                .map(|r| r.permits)
                .ok_or_else(|| unsupported(advisor))?;
            Ok(Arc::new(move |inv: &mut MethodInvocation<'_>| {
                tracing::trace!(permits, method = %inv.method().signature(), "Rate limited call");
                inv.proceed()
            }))
        }
    }

    #[test]
    fn test_builtin_advice_adapts_to_one_interceptor() {
        let registry = AdvisorAdapterRegistry::new();
        let advisor = registry.wrap(Advice::before(|_jp| Ok(()))).unwrap();
        assert_eq!(registry.get_interceptors(&advisor).unwrap().len(), 1);
    }

    #[test]
    fn test_interceptor_bypasses_adapters() {
        let registry = AdvisorAdapterRegistry::new();
        let advisor = Advisor::new(Advice::interceptor(|inv| inv.proceed()));
        assert_eq!(registry.get_interceptors(&advisor).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_custom_advice_rejected() {
        let registry = AdvisorAdapterRegistry::new();
        let err = registry.wrap(Advice::custom(RateLimit { permits: 3 })).unwrap_err();
        assert!(matches!(err, AopError::UnknownAdviceType(_)));

        let advisor = Advisor::new(Advice::custom(RateLimit { permits: 3 }));
        assert!(registry.get_interceptors(&advisor).is_err());
    }

    #[test]
    fn test_registered_adapter_extends_registry() {
        let registry = AdvisorAdapterRegistry::new();
        registry.register_adapter(Arc::new(RateLimitAdapter));
        let advisor = registry.wrap(Advice::custom(RateLimit { permits: 3 })).unwrap();
        assert_eq!(registry.get_interceptors(&advisor).unwrap().len(), 1);
    }

    #[test]
    fn test_multiple_adapters_for_one_advice() {
        struct Shadow;
        impl AdvisorAdapter for Shadow {
            fn supports_advice(&self, advice: &Advice) -> bool {
                matches!(advice, Advice::Before(_))
            }
            fn get_interceptor(&self, _advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
                Ok(Arc::new(|inv: &mut MethodInvocation<'_>| inv.proceed()))
            }
        }

        let registry = AdvisorAdapterRegistry::new();
        registry.register_adapter(Arc::new(Shadow));
        let advisor = Advisor::new(Advice::before(|_jp| Ok(())));
        assert_eq!(registry.get_interceptors(&advisor).unwrap().len(), 2);
    }
}
