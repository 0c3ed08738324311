//! 切点（Pointcut）表达式系统
//!
//! 定义了如何匹配连接点的规则。方法匹配是三态的：
//! - [`MatchResult::Always`]：静态即可确定匹配
//! - [`MatchResult::Never`]：静态即可确定不匹配
//! - [`MatchResult::Maybe`]：取决于实际参数，需要在每次调用时执行运行时检查

use crate::error::{AopError, AopResult};
use crate::reflect::{Method, MethodKey, TypeInfo, Value};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// 三态匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchResult {
    Always,
    Never,
    Maybe,
}

impl MatchResult {
    pub fn from_bool(matched: bool) -> Self {
        if matched {
            MatchResult::Always
        } else {
            MatchResult::Never
        }
    }

    pub fn and(self, other: MatchResult) -> Self {
        match (self, other) {
            (MatchResult::Never, _) | (_, MatchResult::Never) => MatchResult::Never,
            (MatchResult::Always, MatchResult::Always) => MatchResult::Always,
            _ => MatchResult::Maybe,
        }
    }

    pub fn or(self, other: MatchResult) -> Self {
        match (self, other) {
            (MatchResult::Always, _) | (_, MatchResult::Always) => MatchResult::Always,
            (MatchResult::Never, MatchResult::Never) => MatchResult::Never,
            _ => MatchResult::Maybe,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            MatchResult::Always => MatchResult::Never,
            MatchResult::Never => MatchResult::Always,
            MatchResult::Maybe => MatchResult::Maybe,
        }
    }

    pub fn is_never(self) -> bool {
        self == MatchResult::Never
    }
}

/// 切点 Trait
///
/// 由类过滤、静态方法匹配和运行时匹配三部分组成。
/// 只有静态匹配返回 `Maybe` 时，`matches_runtime` 才会在每次调用时被求值。
pub trait Pointcut: Send + Sync {
    /// 类过滤：不匹配的类不会再尝试方法匹配
    fn matches_class(&self, target_type: &TypeInfo) -> bool {
        let _ = target_type;
        true
    }

    /// 静态方法匹配；`target_type` 未知时为 `None`
    fn matches_method(&self, method: &Method, target_type: Option<&TypeInfo>) -> AopResult<MatchResult>;

    /// 运行时匹配
    fn matches_runtime(&self, method: &Method, target_type: Option<&TypeInfo>, args: &[Value]) -> bool {
        let _ = (method, target_type, args);
        true
    }

    /// 静态部分已解析、只剩参数检查的运行时切点
    ///
    /// 静态匹配为 `Maybe` 时，链上的动态单元使用它；返回 `None` 时使用切点本身。
    fn runtime_residue(&self, method: &Method, target_type: Option<&TypeInfo>) -> Option<Arc<dyn Pointcut>> {
        let _ = (method, target_type);
        None
    }

    /// 用于日志与诊断的描述
    fn describe(&self) -> String {
        "Pointcut".to_string()
    }
}

/// 匹配一切的切点
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchAllPointcut;

impl Pointcut for MatchAllPointcut {
    fn matches_method(&self, _method: &Method, _target_type: Option<&TypeInfo>) -> AopResult<MatchResult> {
        Ok(MatchResult::Always)
    }

    fn describe(&self) -> String {
        "MatchAll".to_string()
    }
}

static MATCH_ALL: Lazy<Arc<dyn Pointcut>> = Lazy::new(|| Arc::new(MatchAllPointcut));

/// 共享的"匹配一切"切点
pub fn match_all() -> Arc<dyn Pointcut> {
    Arc::clone(&MATCH_ALL)
}

/// 已编译的通配符模式
static WILDCARD_PATTERNS: Lazy<DashMap<String, Option<Regex>>> = Lazy::new(DashMap::new);

/// 自定义静态匹配函数，可能失败
pub type CustomMatcher = Arc<dyn Fn(&Method, &TypeInfo) -> Result<bool, String> + Send + Sync>;

/// 参数谓词
pub type ArgsPredicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// 切点表达式
///
/// 用于匹配连接点
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 匹配特定类型（或其任一超类型）的所有方法
    /// 例如：TypePattern("UserService")
    TypePattern(String),

    /// 匹配特定方法名
    /// 例如：MethodPattern("get_user")
    MethodPattern(String),

    /// 匹配特定类型的特定方法
    /// 例如：execution(* UserService.get_user(..))
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    /// 使用正则表达式匹配类型
    TypeRegex(Regex),

    /// 使用正则表达式匹配方法
    MethodRegex(Regex),

    /// 目标对象必须是该类型（或子类型）的实例；静态求值
    Target(TypeInfo),

    /// 实际参数类型；声明类型不足以判断时推迟到运行时
    Args(Vec<TypeInfo>),

    /// 实际参数谓词；总是推迟到运行时
    ArgsMatching(ArgsPredicate),

    /// 自定义静态匹配函数
    Custom(CustomMatcher),

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    /// 静态求值
    ///
    /// `target_type` 为有效目标类型：已知的目标类，否则为方法的声明类型。
    pub fn evaluate(&self, method: &Method, target_type: &TypeInfo) -> AopResult<MatchResult> {
        Ok(self.resolve(method, target_type)?.match_result())
    }

    /// 静态解析，得到运行时剩余的检查
    ///
    /// 类型、方法名、目标类型与自定义匹配在此化为常量，只有参数相关的部分保留下来。
    pub fn resolve(&self, method: &Method, target_type: &TypeInfo) -> AopResult<RuntimeResidue> {
        let residue = match self {
            PointcutExpression::All => RuntimeResidue::Const(true),

            PointcutExpression::TypePattern(pattern) => {
                RuntimeResidue::Const(Self::type_matches(pattern, target_type))
            }

            PointcutExpression::MethodPattern(pattern) => {
                RuntimeResidue::Const(Self::pattern_matches(pattern, method.name()))
            }

            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => RuntimeResidue::Const(
                Self::type_matches(type_pattern, target_type)
                    && Self::pattern_matches(method_pattern, method.name()),
            ),

            PointcutExpression::TypeRegex(regex) => {
                RuntimeResidue::Const(target_type.hierarchy().iter().any(|t| regex.is_match(t.name())))
            }

            PointcutExpression::MethodRegex(regex) => RuntimeResidue::Const(regex.is_match(method.name())),

            // 代理的接收者类型总是声明的目标类，子类型检查只需静态求值一次
            PointcutExpression::Target(required) => {
                RuntimeResidue::Const(required.is_assignable_from(target_type))
            }

            PointcutExpression::Args(expected) => match Self::static_args_match(method, expected) {
                MatchResult::Always => RuntimeResidue::Const(true),
                MatchResult::Never => RuntimeResidue::Const(false),
                MatchResult::Maybe => RuntimeResidue::Args(expected.clone()),
            },

            PointcutExpression::ArgsMatching(predicate) => RuntimeResidue::ArgsMatching(Arc::clone(predicate)),

            PointcutExpression::Custom(func) => {
                RuntimeResidue::Const(func(method, target_type).map_err(AopError::PointcutEvaluation)?)
            }

            PointcutExpression::And(left, right) => {
                let left = left.resolve(method, target_type)?;
                if left.is_const(false) {
                    return Ok(left);
                }
                left.and(right.resolve(method, target_type)?)
            }

            PointcutExpression::Or(left, right) => {
                let left = left.resolve(method, target_type)?;
                if left.is_const(true) {
                    return Ok(left);
                }
                left.or(right.resolve(method, target_type)?)
            }

            PointcutExpression::Not(expr) => expr.resolve(method, target_type)?.negate(),
        };
        Ok(residue)
    }

    /// 运行时求值，针对实际参数
    ///
    /// 每次都会重新解析静态部分；链上的动态单元使用 [`Pointcut::runtime_residue`] 避免这一开销。
    pub fn evaluate_runtime(&self, method: &Method, target_type: &TypeInfo, args: &[Value]) -> bool {
        match self.resolve(method, target_type) {
            Ok(residue) => residue.matches(method, args),
            Err(err) => {
                tracing::warn!(
                    pointcut = ?self,
                    method = %method,
                    error = %err,
                    "Runtime pointcut evaluation failed, treating call as non-matching"
                );
                false
            }
        }
    }

    /// 类级过滤
    pub fn matches_type(&self, target_type: &TypeInfo) -> bool {
        match self {
            PointcutExpression::TypePattern(pattern) => Self::type_matches(pattern, target_type),
            PointcutExpression::Execution { type_pattern, .. } => Self::type_matches(type_pattern, target_type),
            PointcutExpression::TypeRegex(regex) => {
                target_type.hierarchy().iter().any(|t| regex.is_match(t.name()))
            }
            PointcutExpression::Target(required) => required.is_assignable_from(target_type),
            PointcutExpression::And(left, right) => {
                left.matches_type(target_type) && right.matches_type(target_type)
            }
            PointcutExpression::Or(left, right) => {
                left.matches_type(target_type) || right.matches_type(target_type)
            }
            // 只有纯类型表达式的否定才能在类级别排除
            PointcutExpression::Not(expr) => {
                if expr.is_type_only() {
                    !expr.matches_type(target_type)
                } else {
                    true
                }
            }
            _ => true,
        }
    }

    fn is_type_only(&self) -> bool {
        match self {
            PointcutExpression::TypePattern(_)
            | PointcutExpression::TypeRegex(_)
            | PointcutExpression::Target(_) => true,
            PointcutExpression::And(left, right) | PointcutExpression::Or(left, right) => {
                left.is_type_only() && right.is_type_only()
            }
            PointcutExpression::Not(expr) => expr.is_type_only(),
            _ => false,
        }
    }

    fn static_args_match(method: &Method, expected: &[TypeInfo]) -> MatchResult {
        let declared = method.parameter_types();
        if declared.len() != expected.len() {
            return MatchResult::Never;
        }
        let mut result = MatchResult::Always;
        for (param, wanted) in declared.iter().zip(expected) {
            if wanted.is_assignable_from(param) {
                continue;
            }
            // 声明类型是期望类型的超类型时，实际参数才可能匹配
            if param.is_assignable_from(wanted) {
                result = MatchResult::Maybe;
            } else {
                return MatchResult::Never;
            }
        }
        result
    }

    fn type_matches(pattern: &str, target_type: &TypeInfo) -> bool {
        target_type
            .hierarchy()
            .iter()
            .any(|t| Self::pattern_matches(pattern, t.name()))
    }

    /// 简单的模式匹配（支持 * 通配符）
    ///
    /// 支持的模式：
    /// - `*` - 匹配任意字符串
    /// - `User*` - 以 User 开头
    /// - `*Service` - 以 Service 结尾
    /// - `*Service*` - 包含 Service
    fn pattern_matches(pattern: &str, target: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        if !pattern.contains('*') {
            return pattern == target;
        }

        if let Some(compiled) = WILDCARD_PATTERNS.get(pattern) {
            return compiled.as_ref().is_some_and(|regex| regex.is_match(target));
        }

        let regex_pattern = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
        let compiled = Regex::new(&regex_pattern).ok();
        let matched = compiled.as_ref().is_some_and(|regex| regex.is_match(target));
        WILDCARD_PATTERNS.insert(pattern.to_string(), compiled);
        matched
    }

    /// 创建 execution 表达式
    ///
    /// 例如：`execution(* UserService.get_user(..))` 或 `* UserService.get_user(..)`
    /// 格式：返回类型 类型名.方法名(参数)
    ///
    /// 简化版本，只支持类型和方法名匹配
    pub fn execution(expression: &str) -> Self {
        let expression = expression.trim();
        let expression = expression
            .strip_prefix("execution(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(expression);

        let parts: Vec<&str> = expression.split_whitespace().collect();

        if parts.len() < 2 {
            return PointcutExpression::All;
        }

        let method_part = parts[1];
        let method_part = method_part
            .find('(')
            .map(|idx| &method_part[..idx])
            .unwrap_or(method_part);

        if let Some((type_pattern, method_pattern)) = method_part.rsplit_once('.') {
            PointcutExpression::Execution {
                type_pattern: type_pattern.to_string(),
                method_pattern: method_pattern.to_string(),
            }
        } else {
            PointcutExpression::MethodPattern(method_part.to_string())
        }
    }

    /// 目标类型约束
    pub fn target(type_info: &TypeInfo) -> Self {
        PointcutExpression::Target(type_info.clone())
    }

    /// 参数类型约束
    pub fn args(types: impl IntoIterator<Item = TypeInfo>) -> Self {
        PointcutExpression::Args(types.into_iter().collect())
    }

    /// 参数谓词
    pub fn args_matching<F>(predicate: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        PointcutExpression::ArgsMatching(Arc::new(predicate))
    }

    /// 自定义静态匹配
    pub fn custom<F>(matcher: F) -> Self
    where
        F: Fn(&Method, &TypeInfo) -> Result<bool, String> + Send + Sync + 'static,
    {
        PointcutExpression::Custom(Arc::new(matcher))
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpression::All => write!(f, "All"),
            PointcutExpression::TypePattern(p) => write!(f, "TypePattern({})", p),
            PointcutExpression::MethodPattern(p) => write!(f, "MethodPattern({})", p),
            PointcutExpression::Execution { type_pattern, method_pattern } => {
                write!(f, "Execution({}.{})", type_pattern, method_pattern)
            }
            PointcutExpression::TypeRegex(r) => write!(f, "TypeRegex({})", r.as_str()),
            PointcutExpression::MethodRegex(r) => write!(f, "MethodRegex({})", r.as_str()),
            PointcutExpression::Target(t) => write!(f, "Target({})", t.name()),
            PointcutExpression::Args(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
                write!(f, "Args({})", names.join(", "))
            }
            PointcutExpression::ArgsMatching(_) => write!(f, "ArgsMatching(...)"),
            PointcutExpression::Custom(_) => write!(f, "Custom(...)"),
            PointcutExpression::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            PointcutExpression::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

impl Pointcut for PointcutExpression {
    fn matches_class(&self, target_type: &TypeInfo) -> bool {
        self.matches_type(target_type)
    }

    fn matches_method(&self, method: &Method, target_type: Option<&TypeInfo>) -> AopResult<MatchResult> {
        self.evaluate(method, target_type.unwrap_or(method.declaring_type()))
    }

    fn matches_runtime(&self, method: &Method, target_type: Option<&TypeInfo>, args: &[Value]) -> bool {
        self.evaluate_runtime(method, target_type.unwrap_or(method.declaring_type()), args)
    }

    fn runtime_residue(&self, method: &Method, target_type: Option<&TypeInfo>) -> Option<Arc<dyn Pointcut>> {
        let residue = self.resolve(method, target_type.unwrap_or(method.declaring_type())).ok()?;
        Some(Arc::new(residue))
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

/// 静态解析后剩余的运行时检查
///
/// 只含参数相关的叶子；其余部分已化为常量。
#[derive(Clone)]
pub enum RuntimeResidue {
    Const(bool),
    Args(Vec<TypeInfo>),
    ArgsMatching(ArgsPredicate),
    And(Box<RuntimeResidue>, Box<RuntimeResidue>),
    Or(Box<RuntimeResidue>, Box<RuntimeResidue>),
    Not(Box<RuntimeResidue>),
}

impl RuntimeResidue {
    pub fn match_result(&self) -> MatchResult {
        match self {
            RuntimeResidue::Const(true) => MatchResult::Always,
            RuntimeResidue::Const(false) => MatchResult::Never,
            _ => MatchResult::Maybe,
        }
    }

    fn is_const(&self, value: bool) -> bool {
        matches!(self, RuntimeResidue::Const(v) if *v == value)
    }

    fn and(self, other: RuntimeResidue) -> Self {
        match (self, other) {
            (RuntimeResidue::Const(false), _) | (_, RuntimeResidue::Const(false)) => RuntimeResidue::Const(false),
            (RuntimeResidue::Const(true), rest) | (rest, RuntimeResidue::Const(true)) => rest,
            (left, right) => RuntimeResidue::And(Box::new(left), Box::new(right)),
        }
    }

    fn or(self, other: RuntimeResidue) -> Self {
        match (self, other) {
            (RuntimeResidue::Const(true), _) | (_, RuntimeResidue::Const(true)) => RuntimeResidue::Const(true),
            (RuntimeResidue::Const(false), rest) | (rest, RuntimeResidue::Const(false)) => rest,
            (left, right) => RuntimeResidue::Or(Box::new(left), Box::new(right)),
        }
    }

    fn negate(self) -> Self {
        match self {
            RuntimeResidue::Const(value) => RuntimeResidue::Const(!value),
            other => RuntimeResidue::Not(Box::new(other)),
        }
    }

    /// 针对实际参数求值
    pub fn matches(&self, method: &Method, args: &[Value]) -> bool {
        match self {
            RuntimeResidue::Const(value) => *value,

            RuntimeResidue::Args(expected) => {
                args.len() == expected.len()
                    && method.parameter_types().len() == expected.len()
                    && expected
                        .iter()
                        .zip(method.parameter_types())
                        .zip(args)
                        .all(|((wanted, declared), actual)| {
                            wanted.is_assignable_from(declared)
                                || actual
                                    .as_ref()
                                    .is_some_and(|value| wanted.is_assignable_from(value.type_info()))
                        })
            }

            RuntimeResidue::ArgsMatching(predicate) => predicate(args),

            RuntimeResidue::And(left, right) => left.matches(method, args) && right.matches(method, args),

            RuntimeResidue::Or(left, right) => left.matches(method, args) || right.matches(method, args),

            RuntimeResidue::Not(inner) => !inner.matches(method, args),
        }
    }
}

impl fmt::Debug for RuntimeResidue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeResidue::Const(value) => write!(f, "{}", value),
            RuntimeResidue::Args(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
                write!(f, "Args({})", names.join(", "))
            }
            RuntimeResidue::ArgsMatching(_) => write!(f, "ArgsMatching(...)"),
            RuntimeResidue::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            RuntimeResidue::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            RuntimeResidue::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

impl Pointcut for RuntimeResidue {
    fn matches_method(&self, _method: &Method, _target_type: Option<&TypeInfo>) -> AopResult<MatchResult> {
        Ok(self.match_result())
    }

    fn matches_runtime(&self, method: &Method, _target_type: Option<&TypeInfo>, args: &[Value]) -> bool {
        self.matches(method, args)
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

type ShadowKey = (MethodKey, TypeInfo, Option<TypeInfo>);

/// 带静态匹配缓存的表达式切点
///
/// 静态匹配先针对目标类上最具体的方法形态求值；失败时退回原始方法形态再求值一次，
/// 两次都失败则记录日志并视为不匹配。解析结果连同运行时剩余检查一起缓存，
/// 调用时不会再次求值静态部分。
pub struct ExpressionPointcut {
    expression: PointcutExpression,
    source: Option<String>,
    shadow_matches: DashMap<ShadowKey, Arc<RuntimeResidue>>,
}

impl ExpressionPointcut {
    pub fn new(expression: PointcutExpression) -> Self {
        Self {
            expression,
            source: None,
            shadow_matches: DashMap::new(),
        }
    }

    /// 从 execution 文本创建
    pub fn parse(text: &str) -> Self {
        Self {
            expression: PointcutExpression::execution(text),
            source: Some(text.to_string()),
            shadow_matches: DashMap::new(),
        }
    }

    pub fn expression(&self) -> &PointcutExpression {
        &self.expression
    }

    /// 已缓存的静态匹配数量
    pub fn cached_matches(&self) -> usize {
        self.shadow_matches.len()
    }

    fn shadow_match(&self, method: &Method, target_type: Option<&TypeInfo>) -> Arc<RuntimeResidue> {
        let key = (
            method.key().clone(),
            method.declaring_type().clone(),
            target_type.cloned(),
        );
        if let Some(hit) = self.shadow_matches.get(&key) {
            return Arc::clone(hit.value());
        }

        let effective = target_type.unwrap_or(method.declaring_type());
        let target_method = target_type
            .map(|t| t.most_specific_method(method))
            .unwrap_or_else(|| method.clone());

        let residue = match self.expression.resolve(&target_method, effective) {
            Ok(residue) => residue,
            Err(first) if target_method != *method => {
                tracing::debug!(
                    pointcut = %self.describe(),
                    method = %target_method,
                    error = %first,
                    "Pointcut evaluation failed for target method shape, retrying with original method"
                );
                self.fallback_match(method, effective)
            }
            Err(err) => {
                tracing::warn!(
                    pointcut = %self.describe(),
                    method = %method,
                    error = %err,
                    "Pointcut evaluation failed, treating method as non-matching"
                );
                RuntimeResidue::Const(false)
            }
        };

        let residue = Arc::new(residue);
        self.shadow_matches.insert(key, Arc::clone(&residue));
        residue
    }

    fn fallback_match(&self, method: &Method, effective: &TypeInfo) -> RuntimeResidue {
        match self.expression.resolve(method, effective) {
            Ok(residue) => residue,
            Err(err) => {
                tracing::warn!(
                    pointcut = %self.describe(),
                    method = %method,
                    error = %err,
                    "Pointcut evaluation failed for original method as well, treating as non-matching"
                );
                RuntimeResidue::Const(false)
            }
        }
    }
}

impl Pointcut for ExpressionPointcut {
    fn matches_class(&self, target_type: &TypeInfo) -> bool {
        self.expression.matches_type(target_type)
    }

    fn matches_method(&self, method: &Method, target_type: Option<&TypeInfo>) -> AopResult<MatchResult> {
        Ok(self.shadow_match(method, target_type).match_result())
    }

    fn matches_runtime(&self, method: &Method, target_type: Option<&TypeInfo>, args: &[Value]) -> bool {
        self.shadow_match(method, target_type).matches(method, args)
    }

    fn runtime_residue(&self, method: &Method, target_type: Option<&TypeInfo>) -> Option<Arc<dyn Pointcut>> {
        Some(self.shadow_match(method, target_type))
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(text) => text.clone(),
            None => format!("{:?}", self.expression),
        }
    }
}

impl fmt::Debug for ExpressionPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionPointcut")
            .field("expression", &self.expression)
            .field("source", &self.source)
            .finish()
    }
}
