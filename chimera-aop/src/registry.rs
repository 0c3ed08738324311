//! 通知器注册表
//!
//! 负责收集通过 inventory 注册的通知器，并为目标类型挑选可能适用的通知器

use crate::advisor::Advisor;
use crate::aspect::AspectDefinition;
use crate::pointcut::MatchResult;
use crate::reflect::TypeInfo;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// 通知器注册器
///
/// 用于 inventory 自动收集和注册通知器
///
/// ```ignore
/// fn audit_advisors() -> Vec<Advisor> {
///     AspectDefinition::new("audit")
///         .before(PointcutExpression::execution("* AccountService.*(..)"), |jp| Ok(()))
///         .advisors()
/// }
///
/// chimera_aop::inventory::submit! {
///     AdvisorRegistration::new("audit", audit_advisors)
/// }
/// ```
pub struct AdvisorRegistration {
    /// 注册名称
    pub name: &'static str,

    /// 创建通知器的函数
    pub creator: fn() -> Vec<Advisor>,
}

impl AdvisorRegistration {
    pub const fn new(name: &'static str, creator: fn() -> Vec<Advisor>) -> Self {
        Self { name, creator }
    }

    /// 创建通知器
    pub fn create_advisors(&self) -> Vec<Advisor> {
        (self.creator)()
    }
}

// 使用 inventory 收集所有通知器注册器
inventory::collect!(AdvisorRegistration);

/// 获取所有注册的通知器注册器
pub fn get_all_advisor_registrations() -> impl Iterator<Item = &'static AdvisorRegistration> {
    inventory::iter::<AdvisorRegistration>()
}

/// 全局通知器注册表
///
/// 第一次访问时初始化，加载所有通过 inventory 注册的通知器
static GLOBAL_ADVISOR_REGISTRY: Lazy<Arc<AdvisorRegistry>> = Lazy::new(|| {
    let registry = AdvisorRegistry::new();
    registry.auto_load_advisors();
    Arc::new(registry)
});

/// 获取全局通知器注册表
pub fn get_global_registry() -> &'static Arc<AdvisorRegistry> {
    &GLOBAL_ADVISOR_REGISTRY
}

/// 通知器注册表
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<Arc<Advisor>>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self {
            advisors: RwLock::new(Vec::new()),
        }
    }

    /// 注册通知器
    pub fn register(&self, advisor: Advisor) {
        tracing::debug!("Registering advisor: {}", advisor);
        self.advisors.write().push(Arc::new(advisor));
    }

    /// 批量注册通知器
    pub fn register_all(&self, advisors: impl IntoIterator<Item = Advisor>) {
        for advisor in advisors {
            self.register(advisor);
        }
    }

    /// 注册切面的全部通知
    pub fn register_aspect(&self, aspect: AspectDefinition) {
        tracing::debug!("Registering aspect: {}", aspect.name());
        self.register_all(aspect.advisors());
    }

    /// 所有已注册的通知器（注册顺序）
    pub fn advisors(&self) -> Vec<Arc<Advisor>> {
        self.advisors.read().clone()
    }

    /// 可能作用于目标类型的通知器
    pub fn find_eligible(&self, target_type: &TypeInfo) -> Vec<Arc<Advisor>> {
        find_advisors_that_can_apply(&self.advisors.read(), target_type)
    }

    /// 获取注册的通知器数量
    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    /// 检查是否没有注册任何通知器
    pub fn is_empty(&self) -> bool {
        self.advisors.read().is_empty()
    }

    /// 清除所有通知器
    pub fn clear(&self) {
        self.advisors.write().clear();
    }

    /// 从 inventory 自动加载所有注册的通知器
    pub fn auto_load_advisors(&self) {
        let registrations: Vec<_> = get_all_advisor_registrations().collect();
        tracing::info!("Auto-loading advisors from {} registration(s)", registrations.len());

        for registration in registrations {
            let advisors = registration.create_advisors();
            tracing::debug!("  ├─ Loading {}: {} advisor(s)", registration.name, advisors.len());
            self.register_all(advisors);
        }

        tracing::info!("Auto-loaded {} advisor(s)", self.len());
    }
}

impl Default for AdvisorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 通知器能否作用于目标类型
///
/// 引入只看类过滤；其他通知器还需要目标类型上至少有一个方法不是"确定不匹配"。
pub fn can_apply(advisor: &Advisor, target_type: &TypeInfo) -> bool {
    let pointcut = advisor.pointcut();
    if !pointcut.matches_class(target_type) {
        return false;
    }
    if advisor.is_introduction() {
        return true;
    }
    target_type.all_methods().iter().any(|method| {
        matches!(
            pointcut.matches_method(method, Some(target_type)),
            Ok(MatchResult::Always | MatchResult::Maybe)
        )
    })
}

/// 从候选中挑出可能作用于目标类型的通知器，引入排在前面
pub fn find_advisors_that_can_apply(candidates: &[Arc<Advisor>], target_type: &TypeInfo) -> Vec<Arc<Advisor>> {
    let (introductions, others): (Vec<&Arc<Advisor>>, Vec<&Arc<Advisor>>) =
        candidates.iter().partition(|a| a.is_introduction());

    introductions
        .into_iter()
        .chain(others)
        .filter(|advisor| can_apply(advisor, target_type))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;
    use crate::pointcut::PointcutExpression;
    use crate::reflect::Object;

    fn ledger_advisors() -> Vec<Advisor> {
        AspectDefinition::new("ledger-audit")
            .before(PointcutExpression::MethodPattern("post".to_string()), |_jp| Ok(()))
            .advisors()
    }

    inventory::submit! {
        AdvisorRegistration::new("ledger-audit", ledger_advisors)
    }

    fn ledger_type() -> TypeInfo {
        let ledger = TypeInfo::interface("Ledger")
            .declare("post", vec![TypeInfo::primitive_of::<i64>()], TypeInfo::void())
            .build();
        TypeInfo::class("MemoryLedger").implements(&ledger).build()
    }

    #[test]
    fn test_auto_load_from_inventory() {
        let registry = AdvisorRegistry::new();
        registry.auto_load_advisors();
        assert!(registry
            .advisors()
            .iter()
            .any(|a| a.aspect_name() == Some("ledger-audit")));
    }

    #[test]
    fn test_find_eligible_by_method_match() {
        let registry = AdvisorRegistry::new();
        registry.register_all(ledger_advisors());
        registry.register(Advisor::for_expression(
            PointcutExpression::MethodPattern("refund".to_string()),
            Advice::before(|_jp| Ok(())),
        ));

        let eligible = registry.find_eligible(&ledger_type());
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].aspect_name(), Some("ledger-audit"));
    }

    #[test]
    fn test_introductions_sorted_first() {
        let mixin = TypeInfo::interface("Auditable").build();
        let delegate = Object::new(&TypeInfo::class("AuditMixin").implements(&mixin).build(), ());
        let candidates = vec![
            Arc::new(ledger_advisors().remove(0)),
            Arc::new(Advisor::introduction(vec![mixin], delegate)),
        ];

        let eligible = find_advisors_that_can_apply(&candidates, &ledger_type());
        assert_eq!(eligible.len(), 2);
        assert!(eligible[0].is_introduction());
    }
}
