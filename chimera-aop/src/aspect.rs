//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化：一个具名的通知集合，每条通知按声明顺序编号，
//! 可带一个显式排序值。[`AspectDefinition::advisors`] 把切面展开为通知器。

use crate::advice::{Advice, AdviceResult};
use crate::advisor::Advisor;
use crate::error::{InvocationError, InvocationResult};
use crate::invocation::{MethodInterceptor, MethodInvocation};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::pointcut::PointcutExpression;
use crate::reflect::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 切面定义
pub struct AspectDefinition {
    name: String,
    order: Option<i32>,
    declared: Vec<(PointcutExpression, Advice)>,
}

impl AspectDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: None,
            declared: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 切面的显式排序值，作用于其全部通知
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// 声明一条通知
    pub fn advice(mut self, pointcut: PointcutExpression, advice: Advice) -> Self {
        self.declared.push((pointcut, advice));
        self
    }

    pub fn interceptor(self, pointcut: PointcutExpression, interceptor: Arc<dyn MethodInterceptor>) -> Self {
        self.advice(pointcut, Advice::Interceptor(interceptor))
    }

    pub fn before<F>(self, pointcut: PointcutExpression, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync + 'static,
    {
        self.advice(pointcut, Advice::before(f))
    }

    pub fn after_returning<F>(self, pointcut: PointcutExpression, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &Value) -> AdviceResult + Send + Sync + 'static,
    {
        self.advice(pointcut, Advice::after_returning(f))
    }

    pub fn after_throwing<F>(self, pointcut: PointcutExpression, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &InvocationError) -> AdviceResult + Send + Sync + 'static,
    {
        self.advice(pointcut, Advice::after_throwing(f))
    }

    pub fn after<F>(self, pointcut: PointcutExpression, f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> AdviceResult + Send + Sync + 'static,
    {
        self.advice(pointcut, Advice::after(f))
    }

    pub fn around<F>(self, pointcut: PointcutExpression, f: F) -> Self
    where
        F: Fn(&mut ProceedingJoinPoint<'_, '_>) -> InvocationResult + Send + Sync + 'static,
    {
        self.advice(pointcut, Advice::around(f))
    }

    /// 展开为通知器，声明顺序从 0 开始
    pub fn advisors(self) -> Vec<Advisor> {
        let name = self.name;
        let order = self.order;
        self.declared
            .into_iter()
            .enumerate()
            .map(|(index, (pointcut, advice))| {
                let advisor = Advisor::for_expression(pointcut, advice).with_aspect(name.clone(), index as u32);
                match order {
                    Some(order) => advisor.with_order(order),
                    None => advisor,
                }
            })
            .collect()
    }
}

// ============================================================================
// 预定义的常用切面
// ============================================================================

/// 日志切面 - 记录方法调用
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceInterceptor {
    log_args: bool,
}

impl TraceInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }
}

impl MethodInterceptor for TraceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let signature = invocation.method().signature();
        if self.log_args {
            tracing::info!("→ Entering: {} with {:?}", signature, invocation.arguments());
        } else {
            tracing::info!("→ Entering: {}", signature);
        }

        let started = Instant::now();
        let result = invocation.proceed();
        match &result {
            Ok(_) => tracing::info!("← Exiting: {} (took {:?})", signature, started.elapsed()),
            Err(err) => tracing::info!("← Exiting: {} with error {} (took {:?})", signature, err, started.elapsed()),
        }
        result
    }
}

/// 性能监控切面
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMonitorInterceptor {
    threshold: Duration,
}

impl PerformanceMonitorInterceptor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

impl MethodInterceptor for PerformanceMonitorInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        let started = Instant::now();
        let result = invocation.proceed();
        let elapsed = started.elapsed();
        if elapsed > self.threshold {
            tracing::warn!(
                "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                invocation.method().signature(),
                elapsed.as_millis(),
                self.threshold.as_millis()
            );
        }
        result
    }
}

/// 异常处理切面：记录所有抛出的错误，不改变传播
pub fn exception_logging_advice() -> Advice {
    Advice::after_throwing(|join_point, error| {
        tracing::error!("❌ Exception in {}: {}", join_point.signature(), error);
        Ok(())
    })
}
