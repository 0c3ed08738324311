//! 单元测试共用的账户服务模型

use crate::context::AopContext;
use crate::error::{InvocationError, Throwable};
use crate::reflect::{arg, Object, TypeInfo};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// 测试日志输出，由 RUST_LOG 控制
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) struct Account {
    pub balance: Mutex<i64>,
}

impl Account {
    pub fn new(balance: i64) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }
}

pub(crate) struct AccountTypes {
    /// 接口 AccountService
    pub api: TypeInfo,
    /// 实现类 BasicAccount
    pub class: TypeInfo,
    pub account_error: TypeInfo,
    /// InsufficientFunds extends AccountError
    pub insufficient_funds: TypeInfo,
}

/// AccountService 的方法：
/// - `balance() -> i64`
/// - `deposit(i64) -> i64`：返回新余额
/// - `withdraw(i64) -> i64`：余额不足时抛出 InsufficientFunds
/// - `me() -> AccountService`：返回目标自身
/// - `lost() -> i64`：返回空值
/// - `deposit_twice(i64) -> i64`：经当前代理调用两次 deposit
pub(crate) fn account_types() -> AccountTypes {
    let i64_type = TypeInfo::primitive_of::<i64>();
    let account_error = TypeInfo::class("AccountError").build();
    let insufficient_funds = TypeInfo::class("InsufficientFunds").extends(&account_error).build();

    // 类型相等按名称判断，占位接口即可表示 me() 的返回类型
    let self_type = TypeInfo::interface("AccountService").build();
    let api = TypeInfo::interface("AccountService")
        .declare("balance", Vec::new(), i64_type.clone())
        .declare("deposit", vec![i64_type.clone()], i64_type.clone())
        .declare("withdraw", vec![i64_type.clone()], i64_type.clone())
        .declare("me", Vec::new(), self_type)
        .declare("lost", Vec::new(), i64_type.clone())
        .declare("deposit_twice", vec![i64_type.clone()], i64_type)
        .build();

    let method = |name: &str| api.method(name).unwrap();
    let funds_error = insufficient_funds.clone();

    let class = TypeInfo::class("BasicAccount")
        .implements(&api)
        .method(&method("balance"), |a: &Account, _args| {
            Ok(Some(Object::primitive(*a.balance.lock())))
        })
        .method(&method("deposit"), |a: &Account, args| {
            let amount = *arg::<i64>(args, 0)?;
            let mut balance = a.balance.lock();
            *balance += amount;
            Ok(Some(Object::primitive(*balance)))
        })
        .method(&method("withdraw"), move |a: &Account, args| {
            let amount = *arg::<i64>(args, 0)?;
            let mut balance = a.balance.lock();
            if *balance < amount {
                return Err(Throwable::new(&funds_error, format!("cannot withdraw {} from {}", amount, *balance)).into());
            }
            *balance -= amount;
            Ok(Some(Object::primitive(*balance)))
        })
        .method_raw(&method("me"), |target, _args| Ok(Some(target.clone())))
        .method(&method("lost"), |_a: &Account, _args| Ok(None))
        .method(&method("deposit_twice"), |_a: &Account, args| {
            let proxy = AopContext::current_proxy().map_err(InvocationError::from)?;
            proxy.invoke_named("deposit", args.to_vec())?;
            proxy.invoke_named("deposit", args.to_vec())
        })
        .build();

    AccountTypes {
        api,
        class,
        account_error,
        insufficient_funds,
    }
}

pub(crate) fn account(types: &AccountTypes, balance: i64) -> Object {
    Object::new(&types.class, Account::new(balance))
}

pub(crate) fn balance_of(value: &crate::reflect::Value) -> i64 {
    *value.as_ref().and_then(|o| o.downcast_ref::<i64>()).unwrap()
}
