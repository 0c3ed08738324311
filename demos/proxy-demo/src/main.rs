mod logging;

use anyhow::{anyhow, Result};
use chimera_aop::prelude::*;
use chimera_aop::{
    exception_logging_advice, HotSwappableTargetSource, PerformanceMonitorInterceptor, TraceInterceptor,
};
use logging::LoggingSettings;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CONFIG_FILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/application.toml");

// ==================== 类型模型 ====================

static BANK_ERROR: Lazy<TypeInfo> = Lazy::new(|| TypeInfo::class("BankError").build());
static INSUFFICIENT_FUNDS: Lazy<TypeInfo> =
    Lazy::new(|| TypeInfo::class("InsufficientFunds").extends(&BANK_ERROR).build());
static ACCOUNT_NOT_FOUND: Lazy<TypeInfo> =
    Lazy::new(|| TypeInfo::class("AccountNotFound").extends(&BANK_ERROR).build());

static BANK_SERVICE: Lazy<TypeInfo> = Lazy::new(|| {
    let text = TypeInfo::primitive_of::<String>();
    let amount = TypeInfo::primitive_of::<i64>();
    TypeInfo::interface("BankService")
        .declare("open", vec![text.clone()], TypeInfo::void())
        .declare("deposit", vec![text.clone(), amount.clone()], amount.clone())
        .declare("withdraw", vec![text, amount.clone()], amount.clone())
        .declare("total", Vec::new(), amount.clone())
        .declare("audit", Vec::new(), amount)
        .build()
});

/// 内存银行
struct InMemoryBank {
    accounts: Mutex<HashMap<String, i64>>,
}

impl InMemoryBank {
    fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn update(&self, owner: &str, delta: i64) -> std::result::Result<i64, InvocationError> {
        let mut accounts = self.accounts.lock();
        let balance = accounts
            .get_mut(owner)
            .ok_or_else(|| Throwable::new(&ACCOUNT_NOT_FOUND, format!("no account for {}", owner)))?;
        if *balance + delta < 0 {
            return Err(Throwable::new(
                &INSUFFICIENT_FUNDS,
                format!("{} has {}, cannot withdraw {}", owner, balance, -delta),
            )
            .into());
        }
        *balance += delta;
        Ok(*balance)
    }
}

fn bank_class(name: &str) -> Result<TypeInfo> {
    let method = |method_name: &str| {
        BANK_SERVICE
            .method(method_name)
            .ok_or_else(|| anyhow!("missing method {}", method_name))
    };
    Ok(TypeInfo::class(name)
        .implements(&BANK_SERVICE)
        .method(&method("open")?, |bank: &InMemoryBank, args| {
            let owner = arg::<String>(args, 0)?;
            bank.accounts.lock().entry(owner.clone()).or_insert(0);
            Ok(None)
        })
        .method(&method("deposit")?, |bank: &InMemoryBank, args| {
            let balance = bank.update(arg::<String>(args, 0)?, *arg::<i64>(args, 1)?)?;
            Ok(Some(Object::primitive(balance)))
        })
        .method(&method("withdraw")?, |bank: &InMemoryBank, args| {
            let balance = bank.update(arg::<String>(args, 0)?, -*arg::<i64>(args, 1)?)?;
            Ok(Some(Object::primitive(balance)))
        })
        .method(&method("total")?, |bank: &InMemoryBank, _args| {
            let total: i64 = bank.accounts.lock().values().sum();
            Ok(Some(Object::primitive(total)))
        })
        .method(&method("audit")?, |_bank: &InMemoryBank, _args| {
            // 经由当前代理调用 total，自调用同样经过通知
            let proxy = AopContext::current_proxy()?;
            proxy.invoke_named("total", Vec::new())
        })
        .build())
}

fn text(value: &str) -> Value {
    Some(Object::primitive(value.to_string()))
}

fn amount(value: i64) -> Value {
    Some(Object::primitive(value))
}

fn show(value: &Value) -> String {
    match value.as_ref().and_then(|o| o.downcast_ref::<i64>()) {
        Some(v) => v.to_string(),
        None => "()".to_string(),
    }
}

// ==================== 切面注册 ====================

fn metrics_advisors() -> Vec<Advisor> {
    AspectDefinition::new("metrics")
        .order(0)
        .interceptor(PointcutExpression::All, Arc::new(TraceInterceptor::new().with_args()))
        .interceptor(
            PointcutExpression::All,
            Arc::new(PerformanceMonitorInterceptor::new(Duration::from_millis(5))),
        )
        .advisors()
}

fn audit_advisors() -> Vec<Advisor> {
    AspectDefinition::new("audit")
        .order(1)
        .before(PointcutExpression::execution("* BankService.withdraw(..)"), |jp| {
            tracing::info!("🔍 [Audit] {} requested by {:?}", jp.signature(), jp.arg::<String>(0));
            Ok(())
        })
        .advice(
            PointcutExpression::execution("* BankService.*(..)"),
            Advice::after_throwing_typed(&BANK_ERROR, |jp, err| {
                tracing::warn!("🔍 [Audit] {} rejected: {}", jp.method_name(), err);
                Ok(())
            }),
        )
        .advice(PointcutExpression::All, exception_logging_advice())
        .advisors()
}

chimera_aop::inventory::submit! {
    AdvisorRegistration::new("metrics", metrics_advisors)
}

chimera_aop::inventory::submit! {
    AdvisorRegistration::new("audit", audit_advisors)
}

// ==================== 主程序 ====================

fn main() -> Result<()> {
    let content = std::fs::read_to_string(CONFIG_FILE).unwrap_or_default();
    LoggingSettings::from_toml_str(&content)?.with_env_overrides().init()?;
    let config = ProxyConfig::from_toml_str(&content)?.with_env_overrides();
    tracing::info!("🚀 Proxy demo starting ({})", config);

    // 自动代理：注册表中的切面按顺序作用于 bankService
    let bank = Object::new(&bank_class("InMemoryBank")?, InMemoryBank::new());
    let service = AutoProxyCreator::new()
        .with_config(config)
        .wrap_if_necessary(bank, "bankService")?;
    let proxy = Proxy::from_object(&service).ok_or_else(|| anyhow!("bankService was not proxied"))?;

    if let Some(advised) = proxy.advised() {
        tracing::info!("Advisors: {}", advised.advisor_count());
        tracing::info!("Config: {}", advised.to_proxy_config_string());
    }

    proxy.invoke_named("open", vec![text("alice")])?;
    proxy.invoke_named("deposit", vec![text("alice"), amount(100)])?;
    let balance = proxy.invoke_named("withdraw", vec![text("alice"), amount(30)])?;
    tracing::info!("alice balance: {}", show(&balance));

    match proxy.invoke_named("withdraw", vec![text("alice"), amount(1_000)]) {
        Ok(value) => tracing::info!("unexpected success: {}", show(&value)),
        Err(err) => tracing::info!("withdraw failed as expected: {}", err),
    }

    match proxy.invoke_named("audit", Vec::new()) {
        Ok(total) => tracing::info!("audited total: {}", show(&total)),
        Err(err) => tracing::info!("audit unavailable: {}", err),
    }

    // 编程式代理 + 热替换目标
    let swapper = Arc::new(HotSwappableTargetSource::new(Object::new(
        &bank_class("InMemoryBank")?,
        InMemoryBank::new(),
    )));
    let factory = ProxyFactory::for_interface(&BANK_SERVICE, swapper.clone())?;
    factory.add_advice(Advice::after_returning(|jp, value| {
        tracing::info!("✅ {} returned {}", jp.method_name(), show(value));
        Ok(())
    }))?;
    let swappable = factory.get_proxy()?;

    swappable.invoke_named("open", vec![text("bob")])?;
    swappable.invoke_named("deposit", vec![text("bob"), amount(10)])?;

    let replacement = InMemoryBank::new();
    replacement.accounts.lock().insert("bob".to_string(), 500);
    swapper.swap(Object::new(&bank_class("InMemoryBank")?, replacement))?;
    swappable.invoke_named("deposit", vec![text("bob"), amount(10)])?;

    tracing::info!("✅ Proxy demo finished");
    Ok(())
}
