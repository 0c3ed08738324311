//! 自动代理创建器
//!
//! 在对象创建完成后，根据注册表中的通知器决定是否为其包装 AOP 代理

use crate::advisor::{sort_advisors, Advisor};
use crate::config::ProxyConfig;
use crate::error::AopResult;
use crate::proxy::Proxy;
use crate::proxy_factory::ProxyFactory;
use crate::reflect::Object;
use crate::registry::{get_global_registry, AdvisorRegistry};
use crate::support::Advised;
use std::sync::Arc;

/// 自动代理创建器
///
/// ## 工作原理
///
/// 1. 已经是代理的对象原样返回
/// 2. 从注册表中挑出可能作用于对象运行时类型的通知器
/// 3. 没有可用通知器时返回原对象；否则排序后创建代理
///
/// 通知器已按类型预先筛选，生成的代理配置标记为 pre-filtered，
/// 调用时不再重复类过滤。
///
/// ```ignore
/// let creator = AutoProxyCreator::new();
/// let service = creator.wrap_if_necessary(service, "accountService")?;
/// ```
pub struct AutoProxyCreator {
    /// 是否启用自动代理
    enabled: bool,
    registry: Arc<AdvisorRegistry>,
    config: ProxyConfig,
}

impl AutoProxyCreator {
    /// 使用全局注册表
    pub fn new() -> Self {
        Self::with_registry(Arc::clone(get_global_registry()))
    }

    pub fn with_registry(registry: Arc<AdvisorRegistry>) -> Self {
        Self {
            enabled: true,
            registry,
            config: ProxyConfig::default(),
        }
    }

    /// 创建禁用的自动代理创建器
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// 生成代理使用的配置
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 为对象挑选并排序可用的通知器
    pub fn advisors_for(&self, target: &Object) -> Vec<Arc<Advisor>> {
        let mut advisors = self.registry.find_eligible(target.type_info());
        sort_advisors(&mut advisors);
        advisors
    }

    /// 需要时为对象包装代理，否则原样返回
    pub fn wrap_if_necessary(&self, target: Object, name: &str) -> AopResult<Object> {
        if !self.enabled || Proxy::is_proxy(&target) {
            return Ok(target);
        }

        let advisors = self.advisors_for(&target);
        if advisors.is_empty() {
            tracing::trace!("Object '{}' does not match any advisor, skipping proxy creation", name);
            return Ok(target);
        }

        tracing::info!(
            "🔷 [AOP] Creating proxy for '{}' ({}) with {} advisor(s)",
            name,
            target.type_info().name(),
            advisors.len()
        );

        // 冻结要等通知器加完
        let freeze = self.config.frozen;
        let factory = ProxyFactory::for_target(target).with_config(self.config.clone().frozen(false));
        for advisor in advisors {
            factory.add_advisor(advisor)?;
        }
        factory.set_pre_filtered(true);
        if freeze {
            factory.freeze();
        }
        factory.get_proxy_object()
    }
}

impl Default for AutoProxyCreator {
    fn default() -> Self {
        Self::new()
    }
}
