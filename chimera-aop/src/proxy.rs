//! 代理对象与代理工厂
//!
//! 代理是一个普通的 [`Object`]，其运行时类型实现了配置的接口（接口代理）
//! 或继承了目标类（子类代理）。对代理的调用经过 [`Proxy::invoke`]：
//! 发布当前代理、获取目标、解析拦截器链、执行并归还目标。

use crate::context::ExposedProxyGuard;
use crate::error::{AopError, AopResult, InvocationResult};
use crate::invocation::{invoke_joinpoint, MethodInvocation};
use crate::reflect::{Method, Object, TypeInfo, Value};
use crate::support::{Advised, AdvisedSupport};
use crate::target::TargetSource;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static AOP_PROXY_MARKER: Lazy<TypeInfo> = Lazy::new(|| TypeInfo::interface("AopProxy").build());
static ADVISED_MARKER: Lazy<TypeInfo> = Lazy::new(|| TypeInfo::interface("Advised").build());
static PROXY_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// 所有代理类型都实现的标记接口
pub fn aop_proxy_marker() -> TypeInfo {
    AOP_PROXY_MARKER.clone()
}

/// 非 opaque 代理实现的标记接口
pub fn advised_marker() -> TypeInfo {
    ADVISED_MARKER.clone()
}

/// 代理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStrategy {
    /// 代理类型实现配置的接口
    Interface,
    /// 代理类型继承目标类
    Subclass,
}

struct ProxyInner {
    advised: Arc<AdvisedSupport>,
    proxy_type: TypeInfo,
    strategy: ProxyStrategy,
    opaque: bool,
}

/// 代理句柄
#[derive(Clone)]
pub struct Proxy(Arc<ProxyInner>);

impl Proxy {
    /// 对外的代理对象，多次调用返回同一身份
    pub fn as_object(&self) -> Object {
        let inner: Arc<dyn Any + Send + Sync> = self.0.clone();
        Object::from_arc(&self.0.proxy_type, inner)
    }

    /// 对象是代理时取回代理句柄
    pub fn from_object(object: &Object) -> Option<Proxy> {
        Arc::clone(object.inner()).downcast::<ProxyInner>().ok().map(Proxy)
    }

    pub fn is_proxy(object: &Object) -> bool {
        object.inner().is::<ProxyInner>()
    }

    pub fn proxy_type(&self) -> &TypeInfo {
        &self.0.proxy_type
    }

    pub fn strategy(&self) -> ProxyStrategy {
        self.0.strategy
    }

    /// 代理配置；opaque 代理返回 `None`
    pub fn advised(&self) -> Option<&Arc<AdvisedSupport>> {
        if self.0.opaque {
            None
        } else {
            Some(&self.0.advised)
        }
    }

    pub fn target_type(&self) -> Option<TypeInfo> {
        self.0.advised.target_type()
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// 按名称调用代理上的方法（第一个同名重载）
    pub fn invoke_named(&self, name: &str, args: Vec<Value>) -> InvocationResult {
        let method = self.0.proxy_type.method(name).ok_or_else(|| AopError::NoSuchMethod {
            type_name: self.0.proxy_type.name().to_string(),
            method: name.to_string(),
        })?;
        self.invoke(&method, args)
    }

    /// 通过拦截器链调用方法
    pub fn invoke(&self, method: &Method, args: Vec<Value>) -> InvocationResult {
        let advised = &self.0.advised;

        let _exposed = if advised.is_expose_proxy() {
            Some(ExposedProxyGuard::expose(self))
        } else {
            None
        };

        // 不持有配置锁获取目标，目标源可能阻塞
        let target_source = advised.target_source();
        let target = target_source.get_target()?;
        let _release = TargetReleaseGuard {
            source: target_source.as_ref(),
            target: if target_source.is_static() { None } else { target.clone() },
        };

        let target_type = target
            .as_ref()
            .map(|t| t.type_info().clone())
            .or_else(|| target_source.target_type());

        let chain = advised.interceptors_for(method, target_type.as_ref())?;
        let proxy_object = self.as_object();

        let value = if chain.is_empty() {
            invoke_joinpoint(target.as_ref(), method, &args)?
        } else {
            let mut invocation =
                MethodInvocation::new(&proxy_object, target.as_ref(), method, args, target_type.as_ref(), &chain);
            invocation.proceed()?
        };

        self.process_return(method, target.as_ref(), &proxy_object, value)
    }

    fn process_return(
        &self,
        method: &Method,
        target: Option<&Object>,
        proxy_object: &Object,
        value: Value,
    ) -> InvocationResult {
        let return_type = method.return_type();
        match value {
            // 返回目标自身时换成代理，链式调用不会绕过拦截
            Some(object)
                if target.is_some_and(|t| object.ptr_eq(t))
                    && !return_type.is_void()
                    && return_type.is_assignable_from(&self.0.proxy_type) =>
            {
                Ok(Some(proxy_object.clone()))
            }
            None if return_type.is_primitive() => Err(AopError::NullReturnForPrimitive {
                method: method.to_string(),
                return_type: return_type.name().to_string(),
            }
            .into()),
            other => Ok(other),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.0.proxy_type.name())
            .field("strategy", &self.0.strategy)
            .field("opaque", &self.0.opaque)
            .finish()
    }
}

/// 非静态目标源的目标在调用结束时归还，无论成功、失败还是未到达目标
struct TargetReleaseGuard<'a> {
    source: &'a dyn TargetSource,
    target: Option<Object>,
}

impl Drop for TargetReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            if let Err(err) = self.source.release_target(target) {
                tracing::warn!(source = ?self.source, error = %err, "Failed to release target");
            }
        }
    }
}

/// 代理工厂
pub trait AopProxyFactory: Send + Sync {
    fn create_aop_proxy(&self, advised: &Arc<AdvisedSupport>) -> AopResult<Proxy>;
}

/// 默认代理工厂
///
/// 设置了 `optimize` 或 `proxy_target_class`，或没有配置任何接口时使用子类代理；
/// 目标类型本身是接口时仍使用接口代理。
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAopProxyFactory;

impl AopProxyFactory for DefaultAopProxyFactory {
    fn create_aop_proxy(&self, advised: &Arc<AdvisedSupport>) -> AopResult<Proxy> {
        let target_source = advised.target_source();
        if advised.advisor_count() == 0 && target_source.is_empty() {
            return Err(AopError::NoTargetOrAdvisors);
        }

        let config = advised.config();
        let interfaces = advised.proxied_interfaces();
        let target_type = advised.target_type();

        let strategy = if config.optimize || config.proxy_target_class || interfaces.is_empty() {
            match &target_type {
                Some(ty) if ty.is_interface() => ProxyStrategy::Interface,
                Some(_) => ProxyStrategy::Subclass,
                None => return Err(AopError::UnresolvableTargetType),
            }
        } else {
            ProxyStrategy::Interface
        };

        let id = PROXY_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut builder = match (strategy, &target_type) {
            (ProxyStrategy::Subclass, Some(ty)) => {
                TypeInfo::class(format!("{}$$ChimeraProxy${}", ty.name(), id)).extends(ty)
            }
            _ => {
                let builder = TypeInfo::class(format!("$Proxy{}", id));
                match &target_type {
                    Some(ty) if ty.is_interface() && !interfaces.contains(ty) => builder.implements(ty),
                    _ => builder,
                }
            }
        };
        for interface in &interfaces {
            builder = builder.implements(interface);
        }
        builder = builder.implements(&AOP_PROXY_MARKER);
        if !config.opaque {
            builder = builder.implements(&ADVISED_MARKER);
        }
        let proxy_type = builder.build();

        tracing::debug!(
            proxy_type = %proxy_type.name(),
            strategy = ?strategy,
            interfaces = interfaces.len(),
            advisors = advised.advisor_count(),
            "Created AOP proxy"
        );

        Ok(Proxy(Arc::new(ProxyInner {
            advised: Arc::clone(advised),
            proxy_type,
            strategy,
            opaque: config.opaque,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;
    use crate::advisor::{sort_advisors, Advisor};
    use crate::aspect::AspectDefinition;
    use crate::config::ProxyConfig;
    use crate::context::AopContext;
    use crate::error::{InvocationError, Throwable};
    use crate::pointcut::PointcutExpression;
    use crate::proxy_factory::ProxyFactory;
    use crate::support::AdvisedSupportListener;
    use crate::target::{HotSwappableTargetSource, PooledTargetSource};
    use crate::test_support::{account, account_types, balance_of, init_logging, Account, AccountTypes};
    use parking_lot::Mutex;
    use std::thread;

    fn deposit(proxy: &Proxy, amount: i64) -> InvocationResult {
        proxy.invoke_named("deposit", vec![Some(Object::primitive(amount))])
    }

    fn withdraw(proxy: &Proxy, amount: i64) -> InvocationResult {
        proxy.invoke_named("withdraw", vec![Some(Object::primitive(amount))])
    }

    fn counting_before(counter: &Arc<AtomicUsize>) -> Advice {
        let counter = Arc::clone(counter);
        Advice::before(move |_jp| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    /// 每次调用创建新账户，并记录获取与归还次数
    #[derive(Debug)]
    struct CountingSource {
        class: TypeInfo,
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingSource {
        fn new(types: &AccountTypes) -> Self {
            Self {
                class: types.class.clone(),
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }
        }
    }

    impl TargetSource for CountingSource {
        fn target_type(&self) -> Option<TypeInfo> {
            Some(self.class.clone())
        }

        fn is_static(&self) -> bool {
            false
        }

        fn get_target(&self) -> Result<Option<Object>, InvocationError> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Object::new(&self.class, Account::new(10))))
        }

        fn release_target(&self, _target: Object) -> Result<(), InvocationError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_advice_kinds_run_in_chain_order() {
        init_logging();
        let types = account_types();
        let events = Arc::new(Mutex::new(Vec::new()));
        let factory = ProxyFactory::for_target(account(&types, 10));

        let log = Arc::clone(&events);
        factory
            .add_advice(Advice::before(move |jp| {
                log.lock().push(format!("before {}", jp.method_name()));
                Ok(())
            }))
            .unwrap();
        let log = Arc::clone(&events);
        factory
            .add_advice(Advice::around(move |pjp| {
                log.lock().push("around-in".to_string());
                let result = pjp.proceed();
                log.lock().push("around-out".to_string());
                result
            }))
            .unwrap();
        let log = Arc::clone(&events);
        factory
            .add_advice(Advice::after_returning(move |_jp, value| {
                log.lock().push(format!("returned {}", balance_of(value)));
                Ok(())
            }))
            .unwrap();
        let log = Arc::clone(&events);
        factory
            .add_advice(Advice::after(move |_jp| {
                log.lock().push("after".to_string());
                Ok(())
            }))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        let result = deposit(&proxy, 5).unwrap();

        assert_eq!(balance_of(&result), 15);
        assert_eq!(
            *events.lock(),
            vec!["before deposit", "around-in", "after", "returned 15", "around-out"]
        );
    }

    #[test]
    fn test_empty_chain_invokes_target_directly() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let proxy = factory.get_proxy().unwrap();

        assert_eq!(balance_of(&deposit(&proxy, 5).unwrap()), 15);
        assert_eq!(factory.cached_chains(), 1);
        let method = types.api.method("deposit").unwrap();
        assert!(factory.interceptors_for(&method, Some(&types.class)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_chain_propagates_target_error_unchanged() {
        let types = account_types();
        let target = account(&types, 10);
        let method = types.api.method("withdraw").unwrap();
        let direct = target
            .invoke(&method, vec![Some(Object::primitive(50i64))])
            .unwrap_err();

        let proxy = ProxyFactory::for_target(target.clone()).get_proxy().unwrap();
        let proxied = withdraw(&proxy, 50).unwrap_err();

        let direct = direct.as_throwable().unwrap();
        let proxied = proxied.as_throwable().unwrap();
        assert_eq!(proxied.type_info(), &types.insufficient_funds);
        assert_eq!(proxied.type_info(), direct.type_info());
        assert_eq!(proxied.message(), direct.message());
    }

    #[test]
    fn test_precedence_order_stable_across_calls() {
        let types = account_types();
        let events = Arc::new(Mutex::new(Vec::<String>::new()));

        let log = Arc::clone(&events);
        let audit = AspectDefinition::new("audit")
            .order(1)
            .around(PointcutExpression::All, move |pjp| {
                log.lock().push("audit-around".to_string());
                pjp.proceed()
            });
        let log = Arc::clone(&events);
        let audit = audit.before(PointcutExpression::All, move |_jp| {
            log.lock().push("audit-before".to_string());
            Ok(())
        });
        let log = Arc::clone(&events);
        let metrics = AspectDefinition::new("metrics")
            .order(0)
            .before(PointcutExpression::All, move |_jp| {
                log.lock().push("metrics-before".to_string());
                Ok(())
            });

        let mut advisors: Vec<Arc<Advisor>> = audit
            .advisors()
            .into_iter()
            .chain(metrics.advisors())
            .map(Arc::new)
            .collect();
        sort_advisors(&mut advisors);

        let factory = ProxyFactory::for_target(account(&types, 0));
        for advisor in advisors {
            factory.add_advisor(advisor).unwrap();
        }
        let proxy = factory.get_proxy().unwrap();

        for amount in 1..=5 {
            events.lock().clear();
            deposit(&proxy, amount).unwrap();
            assert_eq!(*events.lock(), vec!["metrics-before", "audit-before", "audit-around"]);
        }
    }

    #[test]
    fn test_around_may_skip_or_repeat_proceed() {
        let types = account_types();
        let target = account(&types, 10);

        let skipping = ProxyFactory::for_target(target.clone());
        skipping
            .add_advice(Advice::around(|_pjp| Ok(Some(Object::primitive(-1i64)))))
            .unwrap();
        let proxy = skipping.get_proxy().unwrap();
        assert_eq!(balance_of(&deposit(&proxy, 5).unwrap()), -1);
        assert_eq!(*target.downcast_ref::<Account>().unwrap().balance.lock(), 10);

        let repeating = ProxyFactory::for_target(target.clone());
        repeating
            .add_advice(Advice::around(|pjp| {
                pjp.proceed()?;
                pjp.proceed()
            }))
            .unwrap();
        let proxy = repeating.get_proxy().unwrap();
        assert_eq!(balance_of(&deposit(&proxy, 5).unwrap()), 20);
    }

    #[test]
    fn test_after_throwing_filters_by_error_type() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let matched = Arc::new(AtomicUsize::new(0));
        let unrelated = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&matched);
        factory
            .add_advice(Advice::after_throwing_typed(&types.account_error, move |_jp, _err| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        let counter = Arc::clone(&unrelated);
        let io_error = TypeInfo::class("IoError").build();
        factory
            .add_advice(Advice::after_throwing_typed(&io_error, move |_jp, _err| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        let err = withdraw(&proxy, 100).unwrap_err();
        let thrown = err.as_throwable().unwrap();
        assert_eq!(thrown.type_info(), &types.insufficient_funds);
        assert_eq!(thrown.message(), "cannot withdraw 100 from 10");
        assert_eq!(matched.load(Ordering::SeqCst), 1);
        assert_eq!(unrelated.load(Ordering::SeqCst), 0);

        assert_eq!(balance_of(&withdraw(&proxy, 4).unwrap()), 6);
        assert_eq!(matched.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runtime_match_checked_per_call() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let large = Arc::new(AtomicUsize::new(0));
        let pointcut = PointcutExpression::args_matching(|args| {
            args.first()
                .and_then(|v| v.as_ref())
                .and_then(|o| o.downcast_ref::<i64>())
                .is_some_and(|amount| *amount > 100)
        });
        factory
            .add_advisor(Arc::new(Advisor::for_expression(pointcut, counting_before(&large))))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        deposit(&proxy, 5).unwrap();
        deposit(&proxy, 500).unwrap();
        proxy.invoke_named("balance", Vec::new()).unwrap();
        assert_eq!(large.load(Ordering::SeqCst), 1);

        let method = types.api.method("deposit").unwrap();
        let chain = factory.interceptors_for(&method, Some(&types.class)).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain[0].is_dynamic());
    }

    #[test]
    fn test_runtime_match_resolves_static_part_once() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let hits = Arc::new(AtomicUsize::new(0));
        let evaluations = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&evaluations);
        // 只有实现类上的方法形态满足该条件
        let pointcut = PointcutExpression::custom(move |method, _target| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(method.declaring_type().name() == "BasicAccount")
        })
        .and(PointcutExpression::args_matching(|args| !args.is_empty()));
        factory
            .add_advisor(Arc::new(Advisor::for_expression(pointcut, counting_before(&hits))))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        for _ in 0..3 {
            deposit(&proxy, 1).unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);

        let method = types.api.method("deposit").unwrap();
        let chain = factory.interceptors_for(&method, Some(&types.class)).unwrap();
        assert!(chain[0].is_dynamic());
    }

    #[test]
    fn test_dynamic_target_released_after_every_call() {
        init_logging();
        let types = account_types();
        let source = Arc::new(CountingSource::new(&types));
        let factory = ProxyFactory::for_interface(&types.api, source.clone()).unwrap();
        let veto = TypeInfo::class("Veto").build();
        let veto_pointcut = PointcutExpression::MethodPattern("balance".to_string());
        factory
            .add_advisor(Arc::new(Advisor::for_expression(
                veto_pointcut,
                Advice::before(move |_jp| Err(Throwable::new(&veto, "denied").into())),
            )))
            .unwrap();
        let proxy = factory.get_proxy().unwrap();

        assert_eq!(balance_of(&deposit(&proxy, 5).unwrap()), 15);
        assert!(withdraw(&proxy, 100).is_err());
        assert!(proxy.invoke_named("balance", Vec::new()).is_err());

        assert_eq!(source.acquired.load(Ordering::SeqCst), 3);
        assert_eq!(source.released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_pooled_target_returned_to_pool() {
        let types = account_types();
        let class = types.class.clone();
        let pool = Arc::new(PooledTargetSource::new(&types.class, 2, move || {
            Ok(Object::new(&class, Account::new(0)))
        }));
        let factory = ProxyFactory::for_interface(&types.api, pool.clone()).unwrap();
        let proxy = factory.get_proxy().unwrap();

        assert_eq!(balance_of(&deposit(&proxy, 3).unwrap()), 3);
        assert_eq!(balance_of(&deposit(&proxy, 3).unwrap()), 6);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_hot_swap_redirects_calls() {
        let types = account_types();
        let swapper = Arc::new(HotSwappableTargetSource::new(account(&types, 10)));
        let factory = ProxyFactory::for_interface(&types.api, swapper.clone()).unwrap();
        let proxy = factory.get_proxy().unwrap();

        assert_eq!(balance_of(&deposit(&proxy, 1).unwrap()), 11);
        let old = swapper.swap(account(&types, 100)).unwrap();
        assert_eq!(*old.downcast_ref::<Account>().unwrap().balance.lock(), 11);
        assert_eq!(balance_of(&deposit(&proxy, 1).unwrap()), 101);
    }

    #[test]
    fn test_frozen_configuration_rejects_changes() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let counter = Arc::new(AtomicUsize::new(0));
        factory.add_advice(counting_before(&counter)).unwrap();
        factory.freeze();

        let err = factory.add_advice(counting_before(&counter)).unwrap_err();
        assert!(matches!(err, AopError::Frozen(_)));
        assert!(matches!(factory.remove_advisor_at(0), Err(AopError::Frozen(_))));
        assert!(matches!(factory.add_interface(&types.api), Err(AopError::Frozen(_))));
        assert_eq!(factory.advisor_count(), 1);

        let proxy = factory.get_proxy().unwrap();
        deposit(&proxy, 1).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_returned_target_replaced_by_proxy() {
        let types = account_types();
        for config in [ProxyConfig::new(), ProxyConfig::new().proxy_target_class(true)] {
            let factory = ProxyFactory::for_target(account(&types, 10)).with_config(config);
            let proxy = factory.get_proxy().unwrap();
            let proxy_object = proxy.as_object();

            let returned = proxy.invoke_named("me", Vec::new()).unwrap().unwrap();
            assert!(returned.ptr_eq(&proxy_object));
        }
    }

    #[test]
    fn test_null_for_primitive_return_is_error() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let proxy = factory.get_proxy().unwrap();

        let err = proxy.invoke_named("lost", Vec::new()).unwrap_err();
        assert!(matches!(
            err.as_aop_error(),
            Some(AopError::NullReturnForPrimitive { return_type, .. }) if return_type == "i64"
        ));
    }

    #[test]
    fn test_exposed_proxy_allows_advised_self_invocation() {
        init_logging();
        let types = account_types();
        let counter = Arc::new(AtomicUsize::new(0));
        let factory =
            ProxyFactory::for_target(account(&types, 10)).with_config(ProxyConfig::new().expose_proxy(true));
        factory.add_advice(counting_before(&counter)).unwrap();
        let proxy = factory.get_proxy().unwrap();

        let result = proxy
            .invoke_named("deposit_twice", vec![Some(Object::primitive(5i64))])
            .unwrap();
        assert_eq!(balance_of(&result), 20);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(matches!(AopContext::current_proxy(), Err(AopError::ProxyNotAvailable)));
    }

    #[test]
    fn test_nested_exposure_restores_outer_proxy() {
        let types = account_types();
        let seen = Arc::new(Mutex::new(Vec::<Proxy>::new()));

        let inner_factory =
            ProxyFactory::for_target(account(&types, 100)).with_config(ProxyConfig::new().expose_proxy(true));
        let log = Arc::clone(&seen);
        inner_factory
            .add_advice(Advice::before(move |_jp| {
                let current = AopContext::current_proxy()?;
                log.lock().push(current);
                Ok(())
            }))
            .unwrap();
        let inner = inner_factory.get_proxy().unwrap();

        let outer_factory =
            ProxyFactory::for_target(account(&types, 10)).with_config(ProxyConfig::new().expose_proxy(true));
        let log = Arc::clone(&seen);
        let nested = inner.clone();
        outer_factory
            .add_advice(Advice::around(move |pjp| {
                let before = AopContext::current_proxy()?;
                log.lock().push(before);
                nested.invoke_named("balance", Vec::new())?;
                let after = AopContext::current_proxy()?;
                log.lock().push(after);
                pjp.proceed()
            }))
            .unwrap();
        let outer = outer_factory.get_proxy().unwrap();

        assert_eq!(balance_of(&deposit(&outer, 5).unwrap()), 15);
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].ptr_eq(&outer));
        assert!(seen[1].ptr_eq(&inner));
        assert!(seen[2].ptr_eq(&outer));
        assert!(matches!(AopContext::current_proxy(), Err(AopError::ProxyNotAvailable)));
    }

    #[test]
    fn test_current_proxy_unavailable_without_expose() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let proxy = factory.get_proxy().unwrap();

        let err = proxy
            .invoke_named("deposit_twice", vec![Some(Object::primitive(5i64))])
            .unwrap_err();
        assert!(matches!(err.as_aop_error(), Some(AopError::ProxyNotAvailable)));
    }

    #[test]
    fn test_chain_cache_invalidated_on_change() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10));
        let counter = Arc::new(AtomicUsize::new(0));
        let proxy = factory.get_proxy().unwrap();

        deposit(&proxy, 1).unwrap();
        assert_eq!(factory.cached_chains(), 1);

        factory.add_advice(counting_before(&counter)).unwrap();
        assert_eq!(factory.cached_chains(), 0);
        deposit(&proxy, 1).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        factory.remove_advisor_at(0).unwrap();
        deposit(&proxy, 1).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_calls_see_configuration_change() {
        init_logging();
        let types = account_types();
        let target = account(&types, 0);
        let factory = ProxyFactory::for_target(target.clone());
        let counter = Arc::new(AtomicUsize::new(0));
        let proxy = factory.get_proxy().unwrap();

        thread::scope(|scope| {
            for _ in 0..8 {
                let proxy = proxy.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        deposit(&proxy, 1).unwrap();
                    }
                });
            }
            scope.spawn(|| factory.add_advice(counting_before(&counter)).unwrap());
        });

        assert_eq!(*target.downcast_ref::<Account>().unwrap().balance.lock(), 800);
        let before = counter.load(Ordering::SeqCst);
        deposit(&proxy, 1).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_introduced_interface_dispatches_to_delegate() {
        struct Lock {
            locked: AtomicUsize,
        }

        let types = account_types();
        let lockable = TypeInfo::interface("Lockable")
            .declare("lock", Vec::new(), TypeInfo::void())
            .declare("lock_count", Vec::new(), TypeInfo::primitive_of::<usize>())
            .build();
        let mixin = TypeInfo::class("LockMixin")
            .implements(&lockable)
            .method(&lockable.method("lock").unwrap(), |l: &Lock, _args| {
                l.locked.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .method(&lockable.method("lock_count").unwrap(), |l: &Lock, _args| {
                Ok(Some(Object::primitive(l.locked.load(Ordering::SeqCst))))
            })
            .build();
        let delegate = Object::new(&mixin, Lock { locked: AtomicUsize::new(0) });

        let factory = ProxyFactory::for_target(account(&types, 10));
        factory
            .add_advisor(Arc::new(Advisor::introduction(vec![lockable.clone()], delegate)))
            .unwrap();
        assert!(factory.is_interface_proxied(&lockable));

        let proxy = factory.get_proxy().unwrap();
        assert!(lockable.is_assignable_from(proxy.proxy_type()));
        proxy.invoke_named("lock", Vec::new()).unwrap();
        let count = proxy.invoke_named("lock_count", Vec::new()).unwrap().unwrap();
        assert_eq!(count.downcast_ref::<usize>(), Some(&1));
        assert_eq!(balance_of(&deposit(&proxy, 5).unwrap()), 15);
    }

    #[test]
    fn test_opaque_proxy_hides_configuration() {
        let types = account_types();
        let factory = ProxyFactory::for_target(account(&types, 10)).with_config(ProxyConfig::new().opaque(true));
        let proxy = factory.get_proxy().unwrap();

        assert!(proxy.advised().is_none());
        assert!(aop_proxy_marker().is_assignable_from(proxy.proxy_type()));
        assert!(!advised_marker().is_assignable_from(proxy.proxy_type()));
        assert_eq!(balance_of(&deposit(&proxy, 1).unwrap()), 11);
    }

    #[test]
    fn test_proxy_strategy_selection() {
        let types = account_types();

        let proxy = ProxyFactory::for_target(account(&types, 10)).get_proxy().unwrap();
        assert_eq!(proxy.strategy(), ProxyStrategy::Interface);
        assert!(types.api.is_assignable_from(proxy.proxy_type()));
        assert!(!types.class.is_assignable_from(proxy.proxy_type()));

        let proxy = ProxyFactory::for_target(account(&types, 10))
            .with_config(ProxyConfig::new().proxy_target_class(true))
            .get_proxy()
            .unwrap();
        assert_eq!(proxy.strategy(), ProxyStrategy::Subclass);
        assert!(types.class.is_assignable_from(proxy.proxy_type()));

        let err = ProxyFactory::new().get_proxy().unwrap_err();
        assert!(matches!(err, AopError::NoTargetOrAdvisors));
    }

    #[test]
    fn test_listener_notified_after_activation() {
        #[derive(Default)]
        struct Events {
            activated: AtomicUsize,
            changed: AtomicUsize,
        }

        impl AdvisedSupportListener for Events {
            fn activated(&self, _advised: &AdvisedSupport) {
                self.activated.fetch_add(1, Ordering::SeqCst);
            }

            fn advice_changed(&self, _advised: &AdvisedSupport) {
                self.changed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let types = account_types();
        let counter = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(Events::default());
        let factory = ProxyFactory::for_target(account(&types, 10));
        factory.add_listener(events.clone());

        factory.add_advice(counting_before(&counter)).unwrap();
        assert_eq!(events.changed.load(Ordering::SeqCst), 0);

        factory.get_proxy().unwrap();
        factory.get_proxy().unwrap();
        assert_eq!(events.activated.load(Ordering::SeqCst), 1);

        factory.add_advice(counting_before(&counter)).unwrap();
        assert_eq!(events.changed.load(Ordering::SeqCst), 1);
    }
}
