//! 引入（Introduction）
//!
//! 引入让代理额外实现新的接口，这些接口的方法由委托对象提供。

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::error::InvocationResult;
use crate::invocation::{invoke_joinpoint, MethodInterceptor, MethodInvocation};
use crate::reflect::{Method, Object, TypeInfo};
use std::sync::Arc;

/// 委托式引入拦截器
///
/// 引入接口上的方法交给委托对象执行，其余方法继续沿链调用。
pub struct DelegatingIntroductionInterceptor {
    delegate: Object,
    interfaces: Vec<TypeInfo>,
}

impl DelegatingIntroductionInterceptor {
    pub fn new(delegate: Object, interfaces: Vec<TypeInfo>) -> Self {
        Self { delegate, interfaces }
    }

    pub fn interfaces(&self) -> &[TypeInfo] {
        &self.interfaces
    }

    /// 方法是否声明在某个引入接口（或其父接口）上
    pub fn introduces(&self, method: &Method) -> bool {
        self.interfaces
            .iter()
            .any(|interface| method.declaring_type().is_assignable_from(interface))
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> InvocationResult {
        if !self.introduces(invocation.method()) {
            return invocation.proceed();
        }

        let value = invoke_joinpoint(Some(&self.delegate), invocation.method(), invocation.arguments())?;
        // 委托返回自身时换成代理
        match value {
            Some(object) if object.ptr_eq(&self.delegate) => Ok(Some(invocation.this().clone())),
            other => Ok(other),
        }
    }
}

impl Advisor {
    /// 引入通知器：代理额外实现 `interfaces`，由 `delegate` 提供实现
    pub fn introduction(interfaces: Vec<TypeInfo>, delegate: Object) -> Advisor {
        let interceptor = DelegatingIntroductionInterceptor::new(delegate, interfaces.clone());
        Advisor::new(Advice::Interceptor(Arc::new(interceptor))).with_introduced_interfaces(interfaces)
    }
}
