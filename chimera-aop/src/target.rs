//! 目标源（TargetSource）
//!
//! 决定每次调用如何获得真实的目标实例，以及调用结束后如何归还。
//! 静态目标源每次返回同一个实例，不需要归还；动态目标源（原型、池化、热替换）
//! 在每次成功获取之后都会被归还一次。

use crate::error::{AopError, AopResult, InvocationError};
use crate::reflect::{Object, TypeInfo};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 目标实例工厂
pub type TargetFactory = Arc<dyn Fn() -> Result<Object, InvocationError> + Send + Sync>;

/// 目标源
pub trait TargetSource: Send + Sync + fmt::Debug {
    /// 目标类型；未知时为 `None`
    fn target_type(&self) -> Option<TypeInfo>;

    /// 是否每次都返回同一个实例
    fn is_static(&self) -> bool;

    /// 获取目标，可能阻塞
    fn get_target(&self) -> Result<Option<Object>, InvocationError>;

    /// 归还目标
    fn release_target(&self, target: Object) -> Result<(), InvocationError> {
        let _ = target;
        Ok(())
    }

    /// 没有任何目标的占位目标源
    fn is_empty(&self) -> bool {
        false
    }
}

/// 空目标源
#[derive(Debug, Clone, Default)]
pub struct EmptyTargetSource {
    target_type: Option<TypeInfo>,
}

impl EmptyTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只有类型、没有实例
    pub fn for_type(target_type: &TypeInfo) -> Self {
        Self {
            target_type: Some(target_type.clone()),
        }
    }
}

impl TargetSource for EmptyTargetSource {
    fn target_type(&self) -> Option<TypeInfo> {
        self.target_type.clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<Object>, InvocationError> {
        Ok(None)
    }

    fn is_empty(&self) -> bool {
        true
    }
}

/// 单例目标源
#[derive(Debug, Clone)]
pub struct SingletonTargetSource {
    target: Object,
}

impl SingletonTargetSource {
    pub fn new(target: Object) -> Self {
        Self { target }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_type(&self) -> Option<TypeInfo> {
        Some(self.target.type_info().clone())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<Object>, InvocationError> {
        Ok(Some(self.target.clone()))
    }
}

/// 原型目标源：每次调用创建新实例
pub struct PrototypeTargetSource {
    target_type: TypeInfo,
    factory: TargetFactory,
}

impl PrototypeTargetSource {
    pub fn new<F>(target_type: &TypeInfo, factory: F) -> Self
    where
        F: Fn() -> Result<Object, InvocationError> + Send + Sync + 'static,
    {
        Self {
            target_type: target_type.clone(),
            factory: Arc::new(factory),
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_type(&self) -> Option<TypeInfo> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<Object>, InvocationError> {
        (self.factory)().map(Some)
    }

    fn release_target(&self, target: Object) -> Result<(), InvocationError> {
        tracing::trace!(target = ?target, "Discarding prototype target");
        Ok(())
    }
}

impl fmt::Debug for PrototypeTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypeTargetSource")
            .field("target_type", &self.target_type.name())
            .finish()
    }
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Object>,
    active: usize,
}

/// 池化目标源
///
/// 池满时 `get_target` 阻塞，直到有实例被归还或等待超时。
pub struct PooledTargetSource {
    target_type: TypeInfo,
    factory: TargetFactory,
    max_size: usize,
    max_wait: Option<Duration>,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PooledTargetSource {
    pub fn new<F>(target_type: &TypeInfo, max_size: usize, factory: F) -> Self
    where
        F: Fn() -> Result<Object, InvocationError> + Send + Sync + 'static,
    {
        Self {
            target_type: target_type.clone(),
            factory: Arc::new(factory),
            max_size: max_size.max(1),
            max_wait: None,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
        }
    }

    /// 最长等待时间，超时后获取失败
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 已借出的实例数
    pub fn active_count(&self) -> usize {
        self.state.lock().active
    }

    /// 空闲的实例数
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    fn create(&self) -> Result<Object, InvocationError> {
        match (self.factory)() {
            Ok(target) => Ok(target),
            Err(err) => {
                let mut state = self.state.lock();
                state.active = state.active.saturating_sub(1);
                drop(state);
                self.available.notify_one();
                Err(err)
            }
        }
    }
}

impl TargetSource for PooledTargetSource {
    fn target_type(&self) -> Option<TypeInfo> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<Object>, InvocationError> {
        let deadline = self.max_wait.map(|wait| Instant::now() + wait);
        let mut state = self.state.lock();
        loop {
            if let Some(target) = state.idle.pop() {
                state.active += 1;
                return Ok(Some(target));
            }
            if state.active < self.max_size {
                state.active += 1;
                drop(state);
                // 不持锁创建实例
                return self.create().map(Some);
            }
            match deadline {
                Some(deadline) => {
                    // 超时后仍可能有空闲实例或空出的容量
                    if self.available.wait_until(&mut state, deadline).timed_out()
                        && state.idle.is_empty()
                        && state.active >= self.max_size
                    {
                        return Err(AopError::TargetSource(format!(
                            "timed out waiting for a pooled {} (max size {})",
                            self.target_type.name(),
                            self.max_size
                        ))
                        .into());
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    fn release_target(&self, target: Object) -> Result<(), InvocationError> {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        state.idle.push(target);
        drop(state);
        self.available.notify_one();
        Ok(())
    }
}

impl fmt::Debug for PooledTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PooledTargetSource")
            .field("target_type", &self.target_type.name())
            .field("max_size", &self.max_size)
            .field("active", &state.active)
            .field("idle", &state.idle.len())
            .finish()
    }
}

/// 可热替换的目标源
#[derive(Debug)]
pub struct HotSwappableTargetSource {
    target: RwLock<Object>,
}

impl HotSwappableTargetSource {
    pub fn new(initial: Object) -> Self {
        Self {
            target: RwLock::new(initial),
        }
    }

    /// 替换目标，返回旧目标；新目标必须与原目标类型兼容
    pub fn swap(&self, new_target: Object) -> AopResult<Object> {
        let mut target = self.target.write();
        let current_type = target.type_info().clone();
        let interfaces = current_type.all_interfaces();
        let compatible = current_type.is_assignable_from(new_target.type_info())
            || (!interfaces.is_empty() && interfaces.iter().all(|iface| new_target.is_instance_of(iface)));
        if !compatible {
            return Err(AopError::IllegalArgument(format!(
                "cannot swap target of type {} with incompatible {}",
                current_type.name(),
                new_target.type_info().name()
            )));
        }
        let old = std::mem::replace(&mut *target, new_target);
        tracing::debug!(old = ?old, new = ?*target, "Swapped target");
        Ok(old)
    }
}

impl TargetSource for HotSwappableTargetSource {
    fn target_type(&self) -> Option<TypeInfo> {
        Some(self.target.read().type_info().clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<Object>, InvocationError> {
        Ok(Some(self.target.read().clone()))
    }
}
