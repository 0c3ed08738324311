//! Chimera AOP - 面向切面编程的代理拦截引擎
//!
//! 提供类似 Spring AOP 的运行时代理功能，支持：
//! - 接口代理与子类代理，目标由可插拔的目标源提供
//! - 多种通知类型（Before、After、Around、AfterReturning、AfterThrowing）及自定义适配器
//! - 三态切点匹配：静态确定的匹配在链上无条件执行，不确定的匹配每次调用时运行时检查
//! - 按方法缓存拦截器链，配置变化时整体失效
//! - 引入（Introduction）、暴露当前代理、opaque 与冻结配置
//! - 通过 inventory 注册通知器，并由 [`AutoProxyCreator`] 自动创建代理

pub mod adapter;
pub mod advice;
pub mod advisor;
pub mod aspect;
pub mod auto_proxy;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod introduction;
pub mod invocation;
pub mod joinpoint;
pub mod pointcut;
pub mod proxy;
pub mod proxy_factory;
pub mod reflect;
pub mod registry;
pub mod support;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出核心类型
pub use adapter::{global_adapter_registry, AdvisorAdapter, AdvisorAdapterRegistry};
pub use advice::{
    Advice, AdviceResult, AdviceType, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, AroundAdvice,
    BeforeAdvice,
};
pub use advisor::{sort_advisors, Advisor};
pub use aspect::{exception_logging_advice, AspectDefinition, PerformanceMonitorInterceptor, TraceInterceptor};
pub use auto_proxy::AutoProxyCreator;
pub use chain::{AdvisorChainFactory, DefaultAdvisorChainFactory};
pub use config::ProxyConfig;
pub use context::AopContext;
pub use error::{AopError, AopResult, InvocationError, InvocationResult, Throwable};
pub use introduction::DelegatingIntroductionInterceptor;
pub use invocation::{InterceptorUnit, MethodInterceptor, MethodInvocation};
pub use joinpoint::{JoinPoint, ProceedingJoinPoint};
pub use pointcut::{ExpressionPointcut, MatchResult, Pointcut, PointcutExpression, RuntimeResidue};
pub use proxy::{AopProxyFactory, DefaultAopProxyFactory, Proxy, ProxyStrategy};
pub use proxy_factory::ProxyFactory;
pub use reflect::{arg, Method, MethodKey, Object, TypeInfo, Value};
pub use registry::{get_global_registry, AdvisorRegistration, AdvisorRegistry};
pub use support::{Advised, AdvisedSupport, AdvisedSupportListener};
pub use target::{
    EmptyTargetSource, HotSwappableTargetSource, PooledTargetSource, PrototypeTargetSource, SingletonTargetSource,
    TargetSource,
};

// 导出 inventory 供注册通知器使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{Advice, AdviceResult, AdviceType};
    pub use crate::advisor::Advisor;
    pub use crate::aspect::AspectDefinition;
    pub use crate::auto_proxy::AutoProxyCreator;
    pub use crate::config::ProxyConfig;
    pub use crate::context::AopContext;
    pub use crate::error::{AopError, AopResult, InvocationError, InvocationResult, Throwable};
    pub use crate::invocation::{MethodInterceptor, MethodInvocation};
    pub use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
    pub use crate::pointcut::{Pointcut, PointcutExpression};
    pub use crate::proxy::Proxy;
    pub use crate::proxy_factory::ProxyFactory;
    pub use crate::reflect::{arg, Method, Object, TypeInfo, Value};
    pub use crate::registry::{get_global_registry, AdvisorRegistration};
    pub use crate::support::{Advised, AdvisedSupportListener};
    pub use crate::target::TargetSource;
}
