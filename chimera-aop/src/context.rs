//! 当前代理上下文
//!
//! 开启 `expose_proxy` 后，被代理调用的代码可以通过 [`AopContext::current_proxy`]
//! 拿到正在处理本次调用的代理，从而让自调用也经过通知。

use crate::error::{AopError, AopResult};
use crate::proxy::Proxy;
use std::cell::RefCell;

thread_local! {
    static CURRENT_PROXY: RefCell<Option<Proxy>> = const { RefCell::new(None) };
}

/// 当前线程的代理访问器
pub struct AopContext;

impl AopContext {
    /// 当前线程正在处理调用的代理
    pub fn current_proxy() -> AopResult<Proxy> {
        CURRENT_PROXY
            .with(|current| current.borrow().clone())
            .ok_or(AopError::ProxyNotAvailable)
    }

    /// 设置当前代理，返回之前的值
    pub(crate) fn set_current_proxy(proxy: Option<Proxy>) -> Option<Proxy> {
        CURRENT_PROXY.with(|current| current.replace(proxy))
    }
}

/// 发布当前代理，离开作用域时恢复之前的值
pub(crate) struct ExposedProxyGuard {
    previous: Option<Proxy>,
}

impl ExposedProxyGuard {
    pub(crate) fn expose(proxy: &Proxy) -> Self {
        Self {
            previous: AopContext::set_current_proxy(Some(proxy.clone())),
        }
    }
}

impl Drop for ExposedProxyGuard {
    fn drop(&mut self) {
        AopContext::set_current_proxy(self.previous.take());
    }
}
