//! 代理配置与生命周期通知
//!
//! [`AdvisedSupport`] 持有通知器列表、暴露的接口集合、目标源和冻结标志，
//! 并拥有按方法缓存的拦截器链。任何结构性修改都会整体清空缓存，
//! 若配置已激活（已创建过代理）还会同步通知所有监听器。

use crate::adapter::{global_adapter_registry, AdvisorAdapterRegistry};
use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::chain::{AdvisorChainFactory, DefaultAdvisorChainFactory};
use crate::config::ProxyConfig;
use crate::error::{AopError, AopResult};
use crate::invocation::InterceptorUnit;
use crate::reflect::{Method, MethodKey, TypeInfo};
use crate::target::{EmptyTargetSource, TargetSource};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// 配置生命周期监听器
pub trait AdvisedSupportListener: Send + Sync {
    /// 第一个代理创建时调用一次
    fn activated(&self, advised: &AdvisedSupport);

    /// 激活后配置发生变化时调用
    fn advice_changed(&self, advised: &AdvisedSupport);
}

/// 可被代理调用方查询和修改的配置
pub trait Advised: Send + Sync {
    fn is_frozen(&self) -> bool;
    fn is_proxy_target_class(&self) -> bool;
    fn is_expose_proxy(&self) -> bool;
    fn set_expose_proxy(&self, expose: bool);
    fn is_pre_filtered(&self) -> bool;
    fn set_pre_filtered(&self, pre_filtered: bool);

    fn proxied_interfaces(&self) -> Vec<TypeInfo>;
    fn is_interface_proxied(&self, interface: &TypeInfo) -> bool;
    fn add_interface(&self, interface: &TypeInfo) -> AopResult<()>;
    fn remove_interface(&self, interface: &TypeInfo) -> AopResult<bool>;

    fn target_source(&self) -> Arc<dyn TargetSource>;
    fn set_target_source(&self, target_source: Arc<dyn TargetSource>);
    fn target_type(&self) -> Option<TypeInfo>;

    fn advisors(&self) -> Vec<Arc<Advisor>>;
    fn advisor_count(&self) -> usize;
    fn add_advisor(&self, advisor: Arc<Advisor>) -> AopResult<()>;
    fn add_advisor_at(&self, position: usize, advisor: Arc<Advisor>) -> AopResult<()>;
    fn remove_advisor(&self, advisor: &Arc<Advisor>) -> AopResult<bool>;
    fn remove_advisor_at(&self, index: usize) -> AopResult<Arc<Advisor>>;
    fn replace_advisor(&self, old: &Arc<Advisor>, new: Arc<Advisor>) -> AopResult<bool>;
    fn index_of(&self, advisor: &Arc<Advisor>) -> Option<usize>;

    fn add_advice(&self, advice: Advice) -> AopResult<()>;
    fn add_advice_at(&self, position: usize, advice: Advice) -> AopResult<()>;
    fn remove_advice(&self, advice: &Advice) -> AopResult<bool>;
    fn index_of_advice(&self, advice: &Advice) -> Option<usize>;

    fn to_proxy_config_string(&self) -> String;
}

#[derive(Default)]
struct Structure {
    interfaces: Vec<TypeInfo>,
    advisors: Vec<Arc<Advisor>>,
}

#[derive(Default)]
struct Lifecycle {
    active: bool,
    listeners: Vec<Arc<dyn AdvisedSupportListener>>,
}

/// 缓存项：计算时的配置代数 + 拦截器链
type CachedChain = (u64, Arc<[InterceptorUnit]>);

/// 代理配置
pub struct AdvisedSupport {
    config: RwLock<ProxyConfig>,
    structure: RwLock<Structure>,
    pre_filtered: AtomicBool,
    target_source: RwLock<Arc<dyn TargetSource>>,
    method_cache: DashMap<MethodKey, CachedChain>,
    generation: AtomicU64,
    chain_factory: Arc<dyn AdvisorChainFactory>,
    adapter_registry: Arc<AdvisorAdapterRegistry>,
    lifecycle: Mutex<Lifecycle>,
}

impl AdvisedSupport {
    pub fn new(config: ProxyConfig) -> Self {
        let registry = global_adapter_registry();
        Self {
            config: RwLock::new(config),
            structure: RwLock::new(Structure::default()),
            pre_filtered: AtomicBool::new(false),
            target_source: RwLock::new(Arc::new(EmptyTargetSource::new())),
            method_cache: DashMap::new(),
            generation: AtomicU64::new(0),
            chain_factory: Arc::new(DefaultAdvisorChainFactory::new(Arc::clone(&registry))),
            adapter_registry: registry,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// 使用独立的适配器注册表
    pub fn with_adapter_registry(mut self, registry: Arc<AdvisorAdapterRegistry>) -> Self {
        self.chain_factory = Arc::new(DefaultAdvisorChainFactory::new(Arc::clone(&registry)));
        self.adapter_registry = registry;
        self
    }

    pub fn with_chain_factory(mut self, chain_factory: Arc<dyn AdvisorChainFactory>) -> Self {
        self.chain_factory = chain_factory;
        self
    }

    /// 构建期设置目标源与接口，不触发变更通知
    pub(crate) fn with_target(mut self, target_source: Arc<dyn TargetSource>, interfaces: Vec<TypeInfo>) -> Self {
        *self.target_source.get_mut() = target_source;
        let structure = self.structure.get_mut();
        for interface in interfaces.into_iter().filter(|i| i.is_interface()) {
            if !structure.interfaces.contains(&interface) {
                structure.interfaces.push(interface);
            }
        }
        self
    }

    pub fn adapter_registry(&self) -> &Arc<AdvisorAdapterRegistry> {
        &self.adapter_registry
    }

    /// 当前配置标志的副本
    pub fn config(&self) -> ProxyConfig {
        self.config.read().clone()
    }

    /// 替换配置标志；冻结后拒绝
    pub fn set_config(&self, config: ProxyConfig) -> AopResult<()> {
        let mut current = self.config.write();
        if current.frozen {
            return Err(AopError::Frozen("replace configuration"));
        }
        *current = config;
        Ok(())
    }

    /// 构建期替换配置，此时尚无代理共享该配置
    pub(crate) fn replace_config(&self, config: ProxyConfig) {
        *self.config.write() = config;
    }

    pub fn freeze(&self) {
        self.config.write().frozen = true;
        tracing::debug!("Proxy configuration frozen");
    }

    /// 冻结不可撤销：已冻结时 `set_frozen(false)` 失败
    pub fn set_frozen(&self, frozen: bool) -> AopResult<()> {
        let mut current = self.config.write();
        if current.frozen && !frozen {
            return Err(AopError::Frozen("unfreeze"));
        }
        current.frozen = frozen;
        Ok(())
    }

    pub fn is_opaque(&self) -> bool {
        self.config.read().opaque
    }

    pub fn is_optimize(&self) -> bool {
        self.config.read().optimize
    }

    // ------------------------------------------------------------------
    // 拦截器链
    // ------------------------------------------------------------------

    /// 方法的拦截器链，命中缓存时直接返回
    ///
    /// 计算不持有任何锁；计算期间配置发生变化时，旧代数的结果不会被再次返回。
    pub fn interceptors_for(
        &self,
        method: &Method,
        target_type: Option<&TypeInfo>,
    ) -> AopResult<Arc<[InterceptorUnit]>> {
        let current = self.generation.load(Ordering::Acquire);
        if let Some(entry) = self.method_cache.get(method.key()) {
            let (generation, chain) = entry.value();
            if *generation == current {
                tracing::trace!(method = %method.signature(), "Interceptor chain cache hit");
                return Ok(Arc::clone(chain));
            }
        }

        let (generation, advisors) = {
            let structure = self.structure.read();
            (self.generation.load(Ordering::Acquire), structure.advisors.clone())
        };
        let pre_filtered = self.pre_filtered.load(Ordering::Acquire);

        let chain: Arc<[InterceptorUnit]> = self
            .chain_factory
            .interceptors(&advisors, pre_filtered, method, target_type)?
            .into();

        self.method_cache
            .insert(method.key().clone(), (generation, Arc::clone(&chain)));
        Ok(chain)
    }

    /// 已缓存的方法数
    pub fn cached_chains(&self) -> usize {
        self.method_cache.len()
    }

    // ------------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn AdvisedSupportListener>) {
        self.lifecycle.lock().listeners.push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn AdvisedSupportListener>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        let before = lifecycle.listeners.len();
        lifecycle.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        lifecycle.listeners.len() != before
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().active
    }

    /// 第一次创建代理时激活，只通知一次
    pub(crate) fn activate(&self) {
        let listeners = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.active {
                return;
            }
            lifecycle.active = true;
            lifecycle.listeners.clone()
        };
        tracing::debug!(listeners = listeners.len(), "Proxy configuration activated");
        for listener in listeners {
            listener.activated(self);
        }
    }

    fn advice_changed(&self) {
        self.method_cache.clear();
        let listeners = {
            let lifecycle = self.lifecycle.lock();
            if !lifecycle.active {
                return;
            }
            lifecycle.listeners.clone()
        };
        for listener in listeners {
            listener.advice_changed(self);
        }
    }

    /// 在写锁内执行结构修改；`f` 返回是否真的发生了变化
    fn mutate<R>(
        &self,
        action: &'static str,
        f: impl FnOnce(&mut Structure) -> AopResult<(R, bool)>,
    ) -> AopResult<R> {
        let (result, changed) = {
            let mut structure = self.structure.write();
            if self.is_frozen() {
                return Err(AopError::Frozen(action));
            }
            let (result, changed) = f(&mut structure)?;
            if changed {
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
            (result, changed)
        };
        if changed {
            tracing::debug!(action, "Proxy configuration changed");
            self.advice_changed();
        }
        Ok(result)
    }

    fn validate_advisor(&self, advisor: &Advisor) -> AopResult<()> {
        if !self.adapter_registry.supports(advisor.advice()) {
            return Err(AopError::UnknownAdviceType(advisor.advice().advice_type().to_string()));
        }
        for interface in advisor.introduced_interfaces() {
            if !interface.is_interface() {
                return Err(AopError::NotAnInterface(interface.name().to_string()));
            }
        }
        Ok(())
    }

    fn insert_advisor(&self, position: Option<usize>, advisor: Arc<Advisor>) -> AopResult<()> {
        self.validate_advisor(&advisor)?;
        self.mutate("add advisor", |structure| {
            let position = position.unwrap_or(structure.advisors.len());
            if position > structure.advisors.len() {
                return Err(AopError::AdvisorIndexOutOfBounds {
                    index: position,
                    len: structure.advisors.len(),
                });
            }
            for interface in advisor.introduced_interfaces() {
                if !structure.interfaces.contains(interface) {
                    structure.interfaces.push(interface.clone());
                }
            }
            structure.advisors.insert(position, advisor);
            Ok(((), true))
        })
    }
}

impl Default for AdvisedSupport {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

fn remove_introduced(structure: &mut Structure, advisor: &Advisor) {
    for interface in advisor.introduced_interfaces() {
        structure.interfaces.retain(|i| i != interface);
    }
}

impl Advised for AdvisedSupport {
    fn is_frozen(&self) -> bool {
        self.config.read().frozen
    }

    fn is_proxy_target_class(&self) -> bool {
        self.config.read().proxy_target_class
    }

    fn is_expose_proxy(&self) -> bool {
        self.config.read().expose_proxy
    }

    fn set_expose_proxy(&self, expose: bool) {
        self.config.write().expose_proxy = expose;
    }

    fn is_pre_filtered(&self) -> bool {
        self.pre_filtered.load(Ordering::Acquire)
    }

    fn set_pre_filtered(&self, pre_filtered: bool) {
        self.pre_filtered.store(pre_filtered, Ordering::Release);
    }

    fn proxied_interfaces(&self) -> Vec<TypeInfo> {
        self.structure.read().interfaces.clone()
    }

    fn is_interface_proxied(&self, interface: &TypeInfo) -> bool {
        self.structure
            .read()
            .interfaces
            .iter()
            .any(|i| interface.is_assignable_from(i))
    }

    fn add_interface(&self, interface: &TypeInfo) -> AopResult<()> {
        if !interface.is_interface() {
            return Err(AopError::NotAnInterface(interface.name().to_string()));
        }
        self.mutate("add interface", |structure| {
            if structure.interfaces.contains(interface) {
                return Ok(((), false));
            }
            structure.interfaces.push(interface.clone());
            Ok(((), true))
        })
    }

    fn remove_interface(&self, interface: &TypeInfo) -> AopResult<bool> {
        self.mutate("remove interface", |structure| {
            let before = structure.interfaces.len();
            structure.interfaces.retain(|i| i != interface);
            let removed = structure.interfaces.len() != before;
            Ok((removed, removed))
        })
    }

    fn target_source(&self) -> Arc<dyn TargetSource> {
        Arc::clone(&self.target_source.read())
    }

    fn set_target_source(&self, target_source: Arc<dyn TargetSource>) {
        *self.target_source.write() = target_source;
        // 目标类型可能改变，类过滤结果随之失效
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.method_cache.clear();
    }

    fn target_type(&self) -> Option<TypeInfo> {
        self.target_source.read().target_type()
    }

    fn advisors(&self) -> Vec<Arc<Advisor>> {
        self.structure.read().advisors.clone()
    }

    fn advisor_count(&self) -> usize {
        self.structure.read().advisors.len()
    }

    fn add_advisor(&self, advisor: Arc<Advisor>) -> AopResult<()> {
        self.insert_advisor(None, advisor)
    }

    fn add_advisor_at(&self, position: usize, advisor: Arc<Advisor>) -> AopResult<()> {
        self.insert_advisor(Some(position), advisor)
    }

    fn remove_advisor(&self, advisor: &Arc<Advisor>) -> AopResult<bool> {
        self.mutate("remove advisor", |structure| {
            match structure.advisors.iter().position(|a| Arc::ptr_eq(a, advisor)) {
                Some(index) => {
                    let removed = structure.advisors.remove(index);
                    remove_introduced(structure, &removed);
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    fn remove_advisor_at(&self, index: usize) -> AopResult<Arc<Advisor>> {
        self.mutate("remove advisor", |structure| {
            if index >= structure.advisors.len() {
                return Err(AopError::AdvisorIndexOutOfBounds {
                    index,
                    len: structure.advisors.len(),
                });
            }
            let removed = structure.advisors.remove(index);
            remove_introduced(structure, &removed);
            Ok((removed, true))
        })
    }

    fn replace_advisor(&self, old: &Arc<Advisor>, new: Arc<Advisor>) -> AopResult<bool> {
        self.validate_advisor(&new)?;
        self.mutate("replace advisor", |structure| {
            let Some(index) = structure.advisors.iter().position(|a| Arc::ptr_eq(a, old)) else {
                return Ok((false, false));
            };
            remove_introduced(structure, old);
            for interface in new.introduced_interfaces() {
                if !structure.interfaces.contains(interface) {
                    structure.interfaces.push(interface.clone());
                }
            }
            structure.advisors[index] = new;
            Ok((true, true))
        })
    }

    fn index_of(&self, advisor: &Arc<Advisor>) -> Option<usize> {
        self.structure
            .read()
            .advisors
            .iter()
            .position(|a| Arc::ptr_eq(a, advisor))
    }

    fn add_advice(&self, advice: Advice) -> AopResult<()> {
        let advisor = self.adapter_registry.wrap(advice)?;
        self.add_advisor(Arc::new(advisor))
    }

    fn add_advice_at(&self, position: usize, advice: Advice) -> AopResult<()> {
        let advisor = self.adapter_registry.wrap(advice)?;
        self.add_advisor_at(position, Arc::new(advisor))
    }

    fn remove_advice(&self, advice: &Advice) -> AopResult<bool> {
        self.mutate("remove advice", |structure| {
            match structure.advisors.iter().position(|a| a.advice().ptr_eq(advice)) {
                Some(index) => {
                    let removed = structure.advisors.remove(index);
                    remove_introduced(structure, &removed);
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    fn index_of_advice(&self, advice: &Advice) -> Option<usize> {
        self.structure
            .read()
            .advisors
            .iter()
            .position(|a| a.advice().ptr_eq(advice))
    }

    fn to_proxy_config_string(&self) -> String {
        let (interfaces, advisors) = {
            let structure = self.structure.read();
            (
                structure.interfaces.iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
                structure.advisors.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            )
        };
        format!(
            "AdvisedSupport: {} interfaces [{}]; {} advisors [{}]; targetSource [{:?}]; {}",
            interfaces.len(),
            interfaces.join(", "),
            advisors.len(),
            advisors.join(", "),
            self.target_source(),
            self.config()
        )
    }
}

impl fmt::Debug for AdvisedSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_proxy_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::PointcutExpression;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingListener {
        activated: AtomicUsize,
        changed: AtomicUsize,
    }

    impl AdvisedSupportListener for CountingListener {
        fn activated(&self, _advised: &AdvisedSupport) {
            self.activated.fetch_add(1, Ordering::SeqCst);
        }

        fn advice_changed(&self, _advised: &AdvisedSupport) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn noop() -> Advice {
        Advice::before(|_jp| Ok(()))
    }

    fn greeter() -> (TypeInfo, Method) {
        let ty = TypeInfo::interface("Greeter")
            .declare("greet", Vec::new(), TypeInfo::void())
            .build();
        let greet = ty.method("greet").unwrap();
        (ty, greet)
    }

    #[test]
    fn test_listener_sees_changes_only_after_activation() {
        let support = AdvisedSupport::default();
        let listener = Arc::new(CountingListener::default());
        support.add_listener(listener.clone());

        support.add_advice(noop()).unwrap();
        assert_eq!(listener.changed.load(Ordering::SeqCst), 0);

        support.activate();
        support.activate();
        assert_eq!(listener.activated.load(Ordering::SeqCst), 1);

        support.add_advice(noop()).unwrap();
        support.remove_advisor_at(0).unwrap();
        assert_eq!(listener.changed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let support = AdvisedSupport::default();
        support.add_advice(noop()).unwrap();
        support.freeze();

        let err = support.add_advice(noop()).unwrap_err();
        assert!(matches!(err, AopError::Frozen(_)));
        assert_eq!(support.advisor_count(), 1);
        assert!(support.remove_advisor_at(0).is_err());
    }

    #[test]
    fn test_frozen_cannot_be_lifted() {
        let support = AdvisedSupport::default();
        support.add_advice(noop()).unwrap();
        support.freeze();

        assert!(matches!(support.set_frozen(false), Err(AopError::Frozen(_))));
        assert!(matches!(
            support.set_config(ProxyConfig::new()),
            Err(AopError::Frozen(_))
        ));
        assert!(support.set_frozen(true).is_ok());
        assert!(support.is_frozen());

        assert!(support.add_advice(noop()).is_err());
        assert_eq!(support.advisor_count(), 1);
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let support = AdvisedSupport::default();
        let (ty, greet) = greeter();
        support.add_advice(noop()).unwrap();

        let first = support.interceptors_for(&greet, Some(&ty)).unwrap();
        let second = support.interceptors_for(&greet, Some(&ty)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(support.cached_chains(), 1);

        support.add_advice(noop()).unwrap();
        assert_eq!(support.cached_chains(), 0);
        let third = support.interceptors_for(&greet, Some(&ty)).unwrap();
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_index_errors() {
        let support = AdvisedSupport::default();
        let err = support.add_advisor_at(3, Arc::new(Advisor::new(noop()))).unwrap_err();
        assert!(matches!(err, AopError::AdvisorIndexOutOfBounds { index: 3, len: 0 }));
        assert!(matches!(
            support.remove_advisor_at(0),
            Err(AopError::AdvisorIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_replace_and_remove_by_identity() {
        let support = AdvisorSupportFixture::new();
        let replacement = Arc::new(Advisor::for_expression(PointcutExpression::All, noop()));

        assert!(support.advised.replace_advisor(&support.first, replacement.clone()).unwrap());
        assert_eq!(support.advised.index_of(&replacement), Some(0));
        assert_eq!(support.advised.index_of(&support.first), None);
        assert!(!support.advised.remove_advisor(&support.first).unwrap());
        assert!(support.advised.remove_advisor(&replacement).unwrap());
        assert_eq!(support.advised.advisor_count(), 0);
    }

    struct AdvisorSupportFixture {
        advised: AdvisedSupport,
        first: Arc<Advisor>,
    }

    impl AdvisorSupportFixture {
        fn new() -> Self {
            let advised = AdvisedSupport::default();
            let first = Arc::new(Advisor::new(noop()));
            advised.add_advisor(first.clone()).unwrap();
            Self { advised, first }
        }
    }

    #[test]
    fn test_interfaces_must_be_interfaces() {
        let support = AdvisedSupport::default();
        let class = TypeInfo::class("Concrete").build();
        assert!(matches!(
            support.add_interface(&class),
            Err(AopError::NotAnInterface(_))
        ));

        let (iface, _) = greeter();
        support.add_interface(&iface).unwrap();
        support.add_interface(&iface).unwrap();
        assert_eq!(support.proxied_interfaces(), vec![iface.clone()]);
        assert!(support.remove_interface(&iface).unwrap());
    }

    #[test]
    fn test_unknown_advice_rejected_on_add() {
        let support = AdvisedSupport::default();
        let err = support
            .add_advisor(Arc::new(Advisor::new(Advice::custom(42u32))))
            .unwrap_err();
        assert!(matches!(err, AopError::UnknownAdviceType(_)));
        assert_eq!(support.advisor_count(), 0);
    }

    #[test]
    fn test_remove_advice_by_instance() {
        let support = AdvisedSupport::default();
        let advice = noop();
        support.add_advice(advice.clone()).unwrap();
        support.add_advice(noop()).unwrap();

        assert_eq!(support.index_of_advice(&advice), Some(0));
        assert!(support.remove_advice(&advice).unwrap());
        assert_eq!(support.advisor_count(), 1);
    }
}
