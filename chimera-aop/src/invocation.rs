//! 方法调用与拦截器链
//!
//! [`MethodInvocation`] 是游标式的续体：每次 `proceed()` 前进到链上的下一个拦截器，
//! 链耗尽后执行目标方法的最终调用。游标在 `proceed()` 返回时恢复，
//! 因此环绕通知可以多次调用 `proceed()`，每次都会重新执行下游部分。

use crate::error::{AopError, InvocationResult};
use crate::pointcut::Pointcut;
use crate::proxy::Proxy;
use crate::reflect::{Method, Object, TypeInfo, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 方法拦截器
///
/// 拦截器链的统一形态，所有通知类型最终都被适配为拦截器。
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult;
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut MethodInvocation<'_>) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        self(invocation)
    }
}

/// 链上的单元
#[derive(Clone)]
pub enum InterceptorUnit {
    /// 静态匹配成功，无条件执行
    Static(Arc<dyn MethodInterceptor>),
    /// 静态匹配为 Maybe，每次调用前先执行运行时检查
    Dynamic {
        interceptor: Arc<dyn MethodInterceptor>,
        pointcut: Arc<dyn Pointcut>,
    },
}

impl InterceptorUnit {
    pub fn interceptor(&self) -> &Arc<dyn MethodInterceptor> {
        match self {
            InterceptorUnit::Static(interceptor) => interceptor,
            InterceptorUnit::Dynamic { interceptor, .. } => interceptor,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, InterceptorUnit::Dynamic { .. })
    }

    /// 同一拦截器实例、同一种类
    pub fn same_as(&self, other: &InterceptorUnit) -> bool {
        self.is_dynamic() == other.is_dynamic()
            && Arc::as_ptr(self.interceptor()) as *const () == Arc::as_ptr(other.interceptor()) as *const ()
    }
}

impl fmt::Debug for InterceptorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterceptorUnit::Static(_) => write!(f, "Static"),
            InterceptorUnit::Dynamic { pointcut, .. } => write!(f, "Dynamic({})", pointcut.describe()),
        }
    }
}

/// 一次被拦截的方法调用
pub struct MethodInvocation<'a> {
    proxy: &'a Object,
    target: Option<&'a Object>,
    method: &'a Method,
    arguments: Vec<Value>,
    target_type: Option<&'a TypeInfo>,
    chain: &'a [InterceptorUnit],
    cursor: usize,
    user_attributes: HashMap<String, Object>,
}

impl<'a> MethodInvocation<'a> {
    pub fn new(
        proxy: &'a Object,
        target: Option<&'a Object>,
        method: &'a Method,
        arguments: Vec<Value>,
        target_type: Option<&'a TypeInfo>,
        chain: &'a [InterceptorUnit],
    ) -> Self {
        Self {
            proxy,
            target,
            method,
            arguments,
            target_type,
            chain,
            cursor: 0,
            user_attributes: HashMap::new(),
        }
    }

    /// 继续执行链上的下一个单元，链耗尽时调用目标方法
    pub fn proceed(&mut self) -> InvocationResult {
        let saved = self.cursor;
        let result = self.advance();
        self.cursor = saved;
        result
    }

    fn advance(&mut self) -> InvocationResult {
        let chain = self.chain;
        loop {
            if self.cursor > chain.len() {
                return Err(AopError::ChainExhausted {
                    index: self.cursor,
                    len: chain.len(),
                }
                .into());
            }
            if self.cursor == chain.len() {
                return self.invoke_joinpoint();
            }

            let unit = &chain[self.cursor];
            self.cursor += 1;
            match unit {
                InterceptorUnit::Static(interceptor) => return interceptor.invoke(self),
                InterceptorUnit::Dynamic { interceptor, pointcut } => {
                    if pointcut.matches_runtime(self.method, self.target_type, &self.arguments) {
                        return interceptor.invoke(self);
                    }
                    tracing::trace!(
                        method = %self.method.signature(),
                        index = self.cursor - 1,
                        "Runtime match failed, skipping interceptor"
                    );
                }
            }
        }
    }

    fn invoke_joinpoint(&self) -> InvocationResult {
        invoke_joinpoint(self.target, self.method, &self.arguments)
    }

    /// 以相同链位置复制一个调用，可替换参数
    pub fn invocable_clone(&self, arguments: Option<Vec<Value>>) -> MethodInvocation<'a> {
        MethodInvocation {
            proxy: self.proxy,
            target: self.target,
            method: self.method,
            arguments: arguments.unwrap_or_else(|| self.arguments.clone()),
            target_type: self.target_type,
            chain: self.chain,
            cursor: self.cursor,
            user_attributes: self.user_attributes.clone(),
        }
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn set_arguments(&mut self, arguments: Vec<Value>) {
        self.arguments = arguments;
    }

    /// 对外的代理对象
    pub fn this(&self) -> &'a Object {
        self.proxy
    }

    pub fn target(&self) -> Option<&'a Object> {
        self.target
    }

    pub fn target_type(&self) -> Option<&'a TypeInfo> {
        self.target_type
    }

    pub fn set_user_attribute(&mut self, key: impl Into<String>, value: Object) {
        self.user_attributes.insert(key.into(), value);
    }

    pub fn user_attribute(&self, key: &str) -> Option<&Object> {
        self.user_attributes.get(key)
    }

    pub fn remove_user_attribute(&mut self, key: &str) -> Option<Object> {
        self.user_attributes.remove(key)
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method.signature())
            .field("target", &self.target)
            .field("arguments", &self.arguments.len())
            .field("cursor", &self.cursor)
            .field("chain", &self.chain.len())
            .finish()
    }
}

/// 最终调用：按方法键在目标的运行时类型上查找实现并调用
///
/// 目标本身是代理时转交给该代理。实现返回的错误原样传播。
pub fn invoke_joinpoint(target: Option<&Object>, method: &Method, args: &[Value]) -> InvocationResult {
    let target = target.ok_or_else(|| AopError::TargetUnavailable(method.signature()))?;

    if let Some(proxy) = Proxy::from_object(target) {
        return proxy.invoke(method, args.to_vec());
    }

    let invoker = target
        .type_info()
        .find_invoker(method.key())
        .ok_or_else(|| AopError::NoSuchMethod {
            type_name: target.type_info().name().to_string(),
            method: method.key().to_string(),
        })?;
    invoker(target, args)
}
