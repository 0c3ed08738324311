//! 通知器（Advisor）
//!
//! 通知器把切点与通知绑定在一起，并携带用于排序的声明元数据。

use crate::advice::{Advice, AdviceType};
use crate::pointcut::{match_all, ExpressionPointcut, Pointcut, PointcutExpression};
use crate::reflect::TypeInfo;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 通知器
#[derive(Clone)]
pub struct Advisor {
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
    aspect_name: Option<String>,
    declaration_order: u32,
    order: Option<i32>,
    introduced_interfaces: Vec<TypeInfo>,
}

impl Advisor {
    /// 作用于所有方法的通知器
    pub fn new(advice: Advice) -> Self {
        Self::with_pointcut(match_all(), advice)
    }

    pub fn with_pointcut(pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            pointcut,
            advice,
            aspect_name: None,
            declaration_order: 0,
            order: None,
            introduced_interfaces: Vec::new(),
        }
    }

    /// 以切点表达式创建（带静态匹配缓存）
    pub fn for_expression(expression: PointcutExpression, advice: Advice) -> Self {
        Self::with_pointcut(Arc::new(ExpressionPointcut::new(expression)), advice)
    }

    /// 显式排序值，越小优先级越高
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// 所属切面及其在切面中的声明顺序
    pub fn with_aspect(mut self, aspect_name: impl Into<String>, declaration_order: u32) -> Self {
        self.aspect_name = Some(aspect_name.into());
        self.declaration_order = declaration_order;
        self
    }

    pub(crate) fn with_introduced_interfaces(mut self, interfaces: Vec<TypeInfo>) -> Self {
        self.introduced_interfaces = interfaces;
        self
    }

    pub fn pointcut(&self) -> &Arc<dyn Pointcut> {
        &self.pointcut
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn aspect_name(&self) -> Option<&str> {
        self.aspect_name.as_deref()
    }

    pub fn declaration_order(&self) -> u32 {
        self.declaration_order
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// 引入的接口
    pub fn introduced_interfaces(&self) -> &[TypeInfo] {
        &self.introduced_interfaces
    }

    pub fn is_introduction(&self) -> bool {
        !self.introduced_interfaces.is_empty()
    }

    pub fn is_before_advice(&self) -> bool {
        self.advice.advice_type() == AdviceType::Before
    }

    pub fn is_after_advice(&self) -> bool {
        matches!(
            self.advice.advice_type(),
            AdviceType::After | AdviceType::AfterReturning | AdviceType::AfterThrowing
        )
    }
}

impl From<Advice> for Advisor {
    fn from(advice: Advice) -> Self {
        Advisor::new(advice)
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("pointcut", &self.pointcut.describe())
            .field("advice", &self.advice)
            .field("aspect", &self.aspect_name)
            .field("declaration_order", &self.declaration_order)
            .field("order", &self.order)
            .finish()
    }
}

impl fmt::Display for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advisor[{:?}", self.advice)?;
        if let Some(aspect) = &self.aspect_name {
            write!(f, ", aspect={}#{}", aspect, self.declaration_order)?;
        }
        if let Some(order) = self.order {
            write!(f, ", order={}", order)?;
        }
        write!(f, ", pointcut={}]", self.pointcut.describe())
    }
}

/// 按优先级排序通知器（稳定排序）
///
/// 排序键依次为：显式顺序（缺省为最低优先级）、切面首次出现的位置、
/// 同一切面内前置通知优先、声明顺序。
pub fn sort_advisors(advisors: &mut [Arc<Advisor>]) {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut keyed: Vec<((i32, usize, bool, u32), Arc<Advisor>)> = advisors
        .iter()
        .enumerate()
        .map(|(index, advisor)| {
            let group = match advisor.aspect_name() {
                Some(name) => *first_seen.entry(name.to_string()).or_insert(index),
                None => index,
            };
            let key = (
                advisor.order().unwrap_or(i32::MAX),
                group,
                !advisor.is_before_advice(),
                advisor.declaration_order(),
            );
            (key, Arc::clone(advisor))
        })
        .collect();

    keyed.sort_by_key(|(key, _)| *key);

    for (slot, (_, advisor)) in advisors.iter_mut().zip(keyed) {
        *slot = advisor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joinpoint::ProceedingJoinPoint;

    fn before() -> Advice {
        Advice::before(|_jp| Ok(()))
    }

    fn around() -> Advice {
        Advice::around(|pjp: &mut ProceedingJoinPoint<'_, '_>| pjp.proceed())
    }

    fn labels(advisors: &[Arc<Advisor>]) -> Vec<String> {
        advisors
            .iter()
            .map(|a| format!("{}#{}", a.aspect_name().unwrap_or("-"), a.declaration_order()))
            .collect()
    }

    #[test]
    fn test_before_advice_precedes_around_in_same_aspect() {
        let mut advisors = vec![
            Arc::new(Advisor::new(around()).with_aspect("tx", 0)),
            Arc::new(Advisor::new(before()).with_aspect("tx", 1)),
        ];
        sort_advisors(&mut advisors);
        assert_eq!(labels(&advisors), vec!["tx#1", "tx#0"]);
    }

    #[test]
    fn test_explicit_order_wins_over_position() {
        let mut advisors = vec![
            Arc::new(Advisor::new(before()).with_aspect("audit", 0)),
            Arc::new(Advisor::new(before()).with_aspect("security", 0).with_order(1)),
        ];
        sort_advisors(&mut advisors);
        assert_eq!(labels(&advisors), vec!["security#0", "audit#0"]);
    }

    #[test]
    fn test_aspects_grouped_by_first_appearance() {
        let mut advisors = vec![
            Arc::new(Advisor::new(before()).with_aspect("a", 0)),
            Arc::new(Advisor::new(before()).with_aspect("b", 0)),
            Arc::new(Advisor::new(before()).with_aspect("a", 1)),
        ];
        sort_advisors(&mut advisors);
        assert_eq!(labels(&advisors), vec!["a#0", "a#1", "b#0"]);
    }

    #[test]
    fn test_sort_is_stable_for_unnamed_advisors() {
        let first = Arc::new(Advisor::new(around()));
        let second = Arc::new(Advisor::new(around()));
        let mut advisors = vec![Arc::clone(&first), Arc::clone(&second)];
        sort_advisors(&mut advisors);
        assert!(Arc::ptr_eq(&advisors[0], &first));
        assert!(Arc::ptr_eq(&advisors[1], &second));
    }

    #[test]
    fn test_classification() {
        assert!(Advisor::new(before()).is_before_advice());
        assert!(Advisor::new(Advice::after(|_jp| Ok(()))).is_after_advice());
        assert!(!Advisor::new(around()).is_after_advice());
    }
}
