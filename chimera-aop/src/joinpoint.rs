//! 连接点（JoinPoint）定义
//!
//! 连接点表示程序执行的特定点，比如方法调用

use crate::error::{AopError, InvocationResult};
use crate::invocation::MethodInvocation;
use crate::reflect::{Method, Object, Value};
use std::any::Any;
use std::fmt;
use std::time::Instant;

/// 连接点信息
///
/// 包含方法调用时的上下文信息，借用自当前的 [`MethodInvocation`]
#[derive(Clone)]
pub struct JoinPoint<'a> {
    method: &'a Method,
    args: &'a [Value],
    target: Option<&'a Object>,
    this: &'a Object,
    timestamp: Instant,
}

impl<'a> JoinPoint<'a> {
    /// 从调用创建连接点
    pub fn of(invocation: &'a MethodInvocation<'_>) -> Self {
        Self {
            method: invocation.method(),
            args: invocation.arguments(),
            target: invocation.target(),
            this: invocation.this(),
            timestamp: Instant::now(),
        }
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        self.method.signature()
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// 获取方法名称
    pub fn method_name(&self) -> &'a str {
        self.method.name()
    }

    /// 获取目标类型名称（无目标时为声明类型）
    pub fn target_type_name(&self) -> &'a str {
        match self.target {
            Some(target) => target.type_info().name(),
            None => self.method.declaring_type().name(),
        }
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// 尝试获取第 `index` 个参数
    pub fn arg<T: Any>(&self, index: usize) -> Option<&'a T> {
        self.args.get(index)?.as_ref()?.downcast_ref::<T>()
    }

    pub fn target(&self) -> Option<&'a Object> {
        self.target
    }

    /// 代理对象
    pub fn this(&self) -> &'a Object {
        self.this
    }

    /// 获取调用时间戳
    pub fn timestamp(&self) -> &Instant {
        &self.timestamp
    }
}

impl fmt::Debug for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("signature", &self.signature())
            .field("target", &self.target)
            .field("args", &self.args.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// 环绕通知的执行链
///
/// 允许切面控制是否继续执行目标方法。`proceed` 可以调用零次、一次或多次。
pub struct ProceedingJoinPoint<'i, 'a> {
    invocation: &'i mut MethodInvocation<'a>,
}

impl<'i, 'a> ProceedingJoinPoint<'i, 'a> {
    pub fn new(invocation: &'i mut MethodInvocation<'a>) -> Self {
        Self { invocation }
    }

    /// 继续执行目标方法
    pub fn proceed(&mut self) -> InvocationResult {
        self.invocation.proceed()
    }

    /// 以替换后的参数继续执行
    pub fn proceed_with(&mut self, args: Vec<Value>) -> InvocationResult {
        let expected = self.invocation.method().parameter_types().len();
        if args.len() != expected {
            return Err(AopError::IllegalArgument(format!(
                "expecting {} arguments to proceed, but got {}",
                expected,
                args.len()
            ))
            .into());
        }
        self.invocation.invocable_clone(Some(args)).proceed()
    }

    /// 获取连接点信息
    pub fn join_point(&self) -> JoinPoint<'_> {
        JoinPoint::of(&*self.invocation)
    }

    pub fn method(&self) -> &'a Method {
        self.invocation.method()
    }

    pub fn args(&self) -> &[Value] {
        self.invocation.arguments()
    }

    pub fn this(&self) -> &'a Object {
        self.invocation.this()
    }

    pub fn target(&self) -> Option<&'a Object> {
        self.invocation.target()
    }

    pub fn signature(&self) -> String {
        self.invocation.method().signature()
    }
}

impl fmt::Debug for ProceedingJoinPoint<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("invocation", &self.invocation)
            .finish()
    }
}
