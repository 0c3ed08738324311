//! 编程式代理工厂

use crate::config::ProxyConfig;
use crate::error::{AopError, AopResult};
use crate::proxy::{AopProxyFactory, DefaultAopProxyFactory, Proxy};
use crate::reflect::{Object, TypeInfo};
use crate::support::{AdvisedSupport, AdvisedSupportListener};
use crate::target::{SingletonTargetSource, TargetSource};
use std::ops::Deref;
use std::sync::Arc;

/// 代理工厂
///
/// 组装配置并创建代理。解引用为 [`AdvisedSupport`]，
/// 通知器与接口的增删通过 [`Advised`](crate::support::Advised) 完成。
///
/// ```ignore
/// let factory = ProxyFactory::for_target(target);
/// factory.add_advice(Advice::before(|jp| {
///     tracing::info!("→ {}", jp.signature());
///     Ok(())
/// }))?;
/// let proxy = factory.get_proxy()?;
/// ```
pub struct ProxyFactory {
    advised: Arc<AdvisedSupport>,
    aop_proxy_factory: Arc<dyn AopProxyFactory>,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self::from_support(AdvisedSupport::default())
    }

    pub fn from_support(advised: AdvisedSupport) -> Self {
        Self {
            advised: Arc::new(advised),
            aop_proxy_factory: Arc::new(DefaultAopProxyFactory),
        }
    }

    /// 代理目标实例，暴露其实现的全部接口
    pub fn for_target(target: Object) -> Self {
        let interfaces = target.type_info().all_interfaces();
        let source: Arc<dyn TargetSource> = Arc::new(SingletonTargetSource::new(target));
        Self::from_support(AdvisedSupport::default().with_target(source, interfaces))
    }

    /// 代理单个接口，目标由目标源提供
    pub fn for_interface(interface: &TypeInfo, target_source: Arc<dyn TargetSource>) -> AopResult<Self> {
        if !interface.is_interface() {
            return Err(AopError::NotAnInterface(interface.name().to_string()));
        }
        Ok(Self::from_support(
            AdvisedSupport::default().with_target(target_source, vec![interface.clone()]),
        ))
    }

    pub fn with_config(self, config: ProxyConfig) -> Self {
        self.advised.replace_config(config);
        self
    }

    pub fn with_aop_proxy_factory(mut self, factory: Arc<dyn AopProxyFactory>) -> Self {
        self.aop_proxy_factory = factory;
        self
    }

    pub fn advised(&self) -> &Arc<AdvisedSupport> {
        &self.advised
    }

    pub fn add_listener(&self, listener: Arc<dyn AdvisedSupportListener>) {
        self.advised.add_listener(listener);
    }

    /// 创建代理；第一次调用激活配置
    pub fn get_proxy(&self) -> AopResult<Proxy> {
        self.advised.activate();
        self.aop_proxy_factory.create_aop_proxy(&self.advised)
    }

    /// 创建代理并返回对外的代理对象
    pub fn get_proxy_object(&self) -> AopResult<Object> {
        self.get_proxy().map(|proxy| proxy.as_object())
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ProxyFactory {
    type Target = AdvisedSupport;

    fn deref(&self) -> &Self::Target {
        &self.advised
    }
}
