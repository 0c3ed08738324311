//! 运行时类型模型
//!
//! Rust 没有运行时反射，代理引擎需要的"类型"、"方法"与"对象"信息由本模块显式描述：
//! - [`TypeInfo`]：类型描述符（类/接口/原始类型/void），持有按 [`MethodKey`] 索引的调用表
//! - [`Method`]：方法签名，缓存键与声明类型无关
//! - [`Object`]：携带运行时类型的共享对象句柄，身份即指针身份
//!
//! 目标方法的最终调用通过实现类型上注册的 [`Invoker`] 完成。

use crate::error::{AopError, InvocationError, InvocationResult};
use once_cell::sync::Lazy;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 方法调用器：以接收者对象和参数列表调用具体实现
pub type Invoker = Arc<dyn Fn(&Object, &[Value]) -> InvocationResult + Send + Sync>;

/// 调用参数与返回值，`None` 表示空值
pub type Value = Option<Object>;

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Primitive,
    Void,
}

static VOID: Lazy<TypeInfo> = Lazy::new(|| TypeInfo::simple("void", TypeKind::Void));
static OBJECT: Lazy<TypeInfo> = Lazy::new(|| TypeInfo::simple("Object", TypeKind::Class));

/// 已声明的方法（签名 + 可选调用器）
struct DeclaredMethod {
    name: String,
    parameter_types: Vec<TypeInfo>,
    return_type: TypeInfo,
    invoker: Option<Invoker>,
}

struct TypeInfoInner {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeInfo>,
    interfaces: Vec<TypeInfo>,
    methods: Vec<DeclaredMethod>,
    index: HashMap<MethodKey, usize>,
}

/// 类型描述符
///
/// 构建后不可变，克隆开销为一次引用计数。
/// 相等性按名称与种类判断。
#[derive(Clone)]
pub struct TypeInfo(Arc<TypeInfoInner>);

impl TypeInfo {
    fn simple(name: &str, kind: TypeKind) -> Self {
        TypeInfo(Arc::new(TypeInfoInner {
            name: name.to_string(),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            index: HashMap::new(),
        }))
    }

    /// 开始构建一个类
    pub fn class(name: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into(), TypeKind::Class)
    }

    /// 开始构建一个接口
    pub fn interface(name: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into(), TypeKind::Interface)
    }

    /// 原始类型
    pub fn primitive(name: &str) -> TypeInfo {
        Self::simple(name, TypeKind::Primitive)
    }

    /// 以 Rust 类型名作为名称的原始类型，例如 `primitive_of::<i64>()` 即 `i64`
    pub fn primitive_of<T: ?Sized>() -> TypeInfo {
        Self::primitive(type_name::<T>())
    }

    pub fn void() -> TypeInfo {
        VOID.clone()
    }

    /// 所有非原始类型的根类型
    pub fn object() -> TypeInfo {
        OBJECT.clone()
    }

    /// 是否为根类型本身；按实例身份判断，同名的用户类型不算
    pub fn is_root(&self) -> bool {
        Arc::ptr_eq(&self.0, &OBJECT.0)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    pub fn is_interface(&self) -> bool {
        self.0.kind == TypeKind::Interface
    }

    pub fn is_primitive(&self) -> bool {
        self.0.kind == TypeKind::Primitive
    }

    pub fn is_void(&self) -> bool {
        self.0.kind == TypeKind::Void
    }

    pub fn superclass(&self) -> Option<&TypeInfo> {
        self.0.superclass.as_ref()
    }

    /// 直接实现（或对接口而言，直接继承）的接口
    pub fn interfaces(&self) -> &[TypeInfo] {
        &self.0.interfaces
    }

    /// `other` 类型的值能否赋给本类型
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        if self == other {
            return true;
        }
        match self.kind() {
            TypeKind::Primitive | TypeKind::Void => false,
            _ if self.is_root() => matches!(other.kind(), TypeKind::Class | TypeKind::Interface),
            _ => {
                other
                    .superclass()
                    .is_some_and(|parent| self.is_assignable_from(parent))
                    || other.interfaces().iter().any(|i| self.is_assignable_from(i))
            }
        }
    }

    /// 本类型及其全部超类型（广度优先，去重）
    pub fn hierarchy(&self) -> Vec<TypeInfo> {
        let mut result = vec![self.clone()];
        let mut cursor = 0;
        while cursor < result.len() {
            let current = result[cursor].clone();
            let parents = current
                .superclass()
                .into_iter()
                .chain(current.interfaces().iter());
            for parent in parents {
                if !result.contains(parent) {
                    result.push(parent.clone());
                }
            }
            cursor += 1;
        }
        result
    }

    /// 本类型及超类链上直接实现的所有接口；接口类型返回自身
    pub fn all_interfaces(&self) -> Vec<TypeInfo> {
        if self.is_interface() {
            return vec![self.clone()];
        }
        let mut result: Vec<TypeInfo> = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            for iface in ty.interfaces() {
                if !result.contains(iface) {
                    result.push(iface.clone());
                }
            }
            current = ty.superclass();
        }
        result
    }

    /// 本类型自身声明的方法
    pub fn declared_methods(&self) -> Vec<Method> {
        self.0
            .methods
            .iter()
            .map(|m| Method::new(self, m.name.clone(), m.parameter_types.clone(), m.return_type.clone()))
            .collect()
    }

    /// 整个类型层次上可见的方法（同一方法键只保留最具体的声明）
    pub fn all_methods(&self) -> Vec<Method> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for ty in self.hierarchy() {
            for method in ty.declared_methods() {
                if seen.insert(method.key().clone()) {
                    result.push(method);
                }
            }
        }
        result
    }

    /// 按名称查找方法（第一个匹配的重载）
    pub fn method(&self, name: &str) -> Option<Method> {
        self.hierarchy().into_iter().find_map(|ty| {
            ty.0.methods
                .iter()
                .find(|m| m.name == name)
                .map(|m| Method::new(&ty, m.name.clone(), m.parameter_types.clone(), m.return_type.clone()))
        })
    }

    /// 按方法键查找声明
    pub fn find_method(&self, key: &MethodKey) -> Option<Method> {
        self.hierarchy().into_iter().find_map(|ty| {
            ty.0.index.get(key).map(|&i| {
                let m = &ty.0.methods[i];
                Method::new(&ty, m.name.clone(), m.parameter_types.clone(), m.return_type.clone())
            })
        })
    }

    /// 查找实现：先自身，再超类链，最后接口（接口上的默认实现）
    pub fn find_invoker(&self, key: &MethodKey) -> Option<Invoker> {
        if let Some(invoker) = self.own_invoker(key) {
            return Some(invoker);
        }
        if let Some(invoker) = self.superclass().and_then(|s| s.find_invoker(key)) {
            return Some(invoker);
        }
        self.interfaces().iter().find_map(|i| i.find_invoker(key))
    }

    fn own_invoker(&self, key: &MethodKey) -> Option<Invoker> {
        self.0
            .index
            .get(key)
            .and_then(|&i| self.0.methods[i].invoker.clone())
    }

    /// 给定（通常是接口上的）方法，返回本类型上最具体的实现方法形态；
    /// 没有实现时返回原方法
    pub fn most_specific_method(&self, method: &Method) -> Method {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.own_invoker(method.key()).is_some() {
                return method.with_declaring_type(ty);
            }
            current = ty.superclass();
        }
        method.clone()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        // 根类型只与自身相等
        !self.is_root() && !other.is_root() && self.0.kind == other.0.kind && self.0.name == other.0.name
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
        self.0.kind.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeInfo({:?} {})", self.0.kind, self.0.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// [`TypeInfo`] 构建器
pub struct TypeInfoBuilder {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeInfo>,
    interfaces: Vec<TypeInfo>,
    methods: Vec<DeclaredMethod>,
}

impl TypeInfoBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// 类：设置超类；接口：追加父接口
    pub fn extends(mut self, parent: &TypeInfo) -> Self {
        match self.kind {
            TypeKind::Interface => self.interfaces.push(parent.clone()),
            _ => self.superclass = Some(parent.clone()),
        }
        self
    }

    pub fn implements(mut self, interface: &TypeInfo) -> Self {
        if !self.interfaces.contains(interface) {
            self.interfaces.push(interface.clone());
        }
        self
    }

    /// 声明一个没有实现的方法签名
    pub fn declare(
        self,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = TypeInfo>,
        return_type: TypeInfo,
    ) -> Self {
        self.push(DeclaredMethod {
            name: name.into(),
            parameter_types: parameter_types.into_iter().collect(),
            return_type,
            invoker: None,
        })
    }

    /// 注册方法实现，接收者按 `T` 向下转型
    pub fn method<T, F>(self, method: &Method, f: F) -> Self
    where
        T: Any,
        F: Fn(&T, &[Value]) -> InvocationResult + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        self.method_raw(method, move |target: &Object, args: &[Value]| {
            let receiver = target.downcast_ref::<T>().ok_or_else(|| {
                AopError::IllegalArgument(format!(
                    "object of type {} is not an instance of {}",
                    target.type_info().name(),
                    type_name
                ))
            })?;
            f(receiver, args)
        })
    }

    /// 注册方法实现，直接访问接收者对象（例如需要返回自身引用时）
    pub fn method_raw<F>(self, method: &Method, f: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> InvocationResult + Send + Sync + 'static,
    {
        self.push(DeclaredMethod {
            name: method.name().to_string(),
            parameter_types: method.parameter_types().to_vec(),
            return_type: method.return_type().clone(),
            invoker: Some(Arc::new(f)),
        })
    }

    fn push(mut self, declared: DeclaredMethod) -> Self {
        let key = MethodKey::new(&declared.name, &declared.parameter_types);
        match self
            .methods
            .iter()
            .position(|m| MethodKey::new(&m.name, &m.parameter_types) == key)
        {
            Some(i) => self.methods[i] = declared,
            None => self.methods.push(declared),
        }
        self
    }

    pub fn build(self) -> TypeInfo {
        let index = self
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodKey::new(&m.name, &m.parameter_types), i))
            .collect();
        TypeInfo(Arc::new(TypeInfoInner {
            name: self.name,
            kind: self.kind,
            superclass: self.superclass,
            interfaces: self.interfaces,
            methods: self.methods,
            index,
        }))
    }
}

/// 方法身份键
///
/// 只由方法名与参数类型组成，接口上的方法与实现类上的同一方法得到相同的键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    name: String,
    parameter_types: Vec<String>,
}

impl MethodKey {
    fn new(name: &str, parameter_types: &[TypeInfo]) -> Self {
        Self {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.name().to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))
    }
}

struct MethodInner {
    declaring_type: TypeInfo,
    name: String,
    parameter_types: Vec<TypeInfo>,
    return_type: TypeInfo,
    key: MethodKey,
}

/// 方法签名
#[derive(Clone)]
pub struct Method(Arc<MethodInner>);

impl Method {
    pub fn new(
        declaring_type: &TypeInfo,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = TypeInfo>,
        return_type: TypeInfo,
    ) -> Self {
        let name = name.into();
        let parameter_types: Vec<TypeInfo> = parameter_types.into_iter().collect();
        let key = MethodKey::new(&name, &parameter_types);
        Method(Arc::new(MethodInner {
            declaring_type: declaring_type.clone(),
            name,
            parameter_types,
            return_type,
            key,
        }))
    }

    pub fn declaring_type(&self) -> &TypeInfo {
        &self.0.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parameter_types(&self) -> &[TypeInfo] {
        &self.0.parameter_types
    }

    pub fn return_type(&self) -> &TypeInfo {
        &self.0.return_type
    }

    pub fn key(&self) -> &MethodKey {
        &self.0.key
    }

    /// 形如 `AccountService::balance` 的签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.0.declaring_type.name(), self.0.name)
    }

    /// 同一方法在另一个声明类型上的形态
    pub fn with_declaring_type(&self, declaring_type: &TypeInfo) -> Method {
        if self.0.declaring_type == *declaring_type {
            return self.clone();
        }
        Method::new(
            declaring_type,
            self.0.name.clone(),
            self.0.parameter_types.clone(),
            self.0.return_type.clone(),
        )
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key && self.0.declaring_type == other.0.declaring_type
    }
}

impl Eq for Method {}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} -> {}",
            self.0.declaring_type.name(),
            self.0.key,
            self.0.return_type.name()
        )
    }
}

/// 运行时对象句柄
#[derive(Clone)]
pub struct Object {
    type_info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(type_info: &TypeInfo, value: T) -> Self {
        Self {
            type_info: type_info.clone(),
            value: Arc::new(value),
        }
    }

    /// 包装已共享的值，对象身份与该 `Arc` 绑定
    pub fn from_arc(type_info: &TypeInfo, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            type_info: type_info.clone(),
            value,
        }
    }

    /// 以 Rust 类型名为类型的原始值
    pub fn primitive<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(&TypeInfo::primitive_of::<T>(), value)
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub(crate) fn inner(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    /// 引用身份比较
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::as_ptr(&self.value) as *const () == Arc::as_ptr(&other.value) as *const ()
    }

    pub fn is_instance_of(&self, type_info: &TypeInfo) -> bool {
        type_info.is_assignable_from(&self.type_info)
    }

    /// 动态调用：对代理对象走拦截链，否则直接调用实现
    pub fn invoke(&self, method: &Method, args: Vec<Value>) -> InvocationResult {
        match crate::proxy::Proxy::from_object(self) {
            Some(proxy) => proxy.invoke(method, args),
            None => crate::invocation::invoke_joinpoint(Some(self), method, &args),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Object({}@{:p})",
            self.type_info.name(),
            Arc::as_ptr(&self.value) as *const ()
        )
    }
}

/// 取出第 `index` 个参数并按 `T` 向下转型
pub fn arg<T: Any>(args: &[Value], index: usize) -> Result<&T, InvocationError> {
    args.get(index)
        .and_then(|v| v.as_ref())
        .and_then(|o| o.downcast_ref::<T>())
        .ok_or_else(|| {
            AopError::IllegalArgument(format!(
                "argument {} is missing or not of type {}",
                index,
                type_name::<T>()
            ))
            .into()
        })
}
