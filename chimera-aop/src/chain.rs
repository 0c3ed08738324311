//! 拦截器链解析
//!
//! 按配置顺序遍历通知器，为给定方法计算适用的拦截器单元。

use crate::adapter::{global_adapter_registry, AdvisorAdapterRegistry};
use crate::advisor::Advisor;
use crate::error::AopResult;
use crate::invocation::InterceptorUnit;
use crate::pointcut::MatchResult;
use crate::reflect::{Method, TypeInfo};
use std::sync::Arc;

/// 拦截器链工厂
pub trait AdvisorChainFactory: Send + Sync {
    /// 计算方法的拦截器链；没有适用的通知器时返回空链
    fn interceptors(
        &self,
        advisors: &[Arc<Advisor>],
        pre_filtered: bool,
        method: &Method,
        target_type: Option<&TypeInfo>,
    ) -> AopResult<Vec<InterceptorUnit>>;
}

/// 默认的拦截器链工厂
pub struct DefaultAdvisorChainFactory {
    registry: Arc<AdvisorAdapterRegistry>,
}

impl DefaultAdvisorChainFactory {
    pub fn new(registry: Arc<AdvisorAdapterRegistry>) -> Self {
        Self { registry }
    }
}

impl Default for DefaultAdvisorChainFactory {
    fn default() -> Self {
        Self::new(global_adapter_registry())
    }
}

impl AdvisorChainFactory for DefaultAdvisorChainFactory {
    fn interceptors(
        &self,
        advisors: &[Arc<Advisor>],
        pre_filtered: bool,
        method: &Method,
        target_type: Option<&TypeInfo>,
    ) -> AopResult<Vec<InterceptorUnit>> {
        let actual_type = target_type.unwrap_or(method.declaring_type());
        let mut chain = Vec::with_capacity(advisors.len());

        for advisor in advisors {
            let pointcut = advisor.pointcut();
            if !pre_filtered && !pointcut.matches_class(actual_type) {
                continue;
            }

            // 引入只按类过滤
            if advisor.is_introduction() {
                for interceptor in self.registry.get_interceptors(advisor)? {
                    chain.push(InterceptorUnit::Static(interceptor));
                }
                continue;
            }

            match pointcut.matches_method(method, target_type) {
                Ok(MatchResult::Always) => {
                    for interceptor in self.registry.get_interceptors(advisor)? {
                        chain.push(InterceptorUnit::Static(interceptor));
                    }
                }
                Ok(MatchResult::Maybe) => {
                    // 静态部分在此解析一次，调用时只检查参数
                    let runtime = pointcut
                        .runtime_residue(method, target_type)
                        .unwrap_or_else(|| Arc::clone(pointcut));
                    for interceptor in self.registry.get_interceptors(advisor)? {
                        chain.push(InterceptorUnit::Dynamic {
                            interceptor,
                            pointcut: Arc::clone(&runtime),
                        });
                    }
                }
                Ok(MatchResult::Never) => {}
                Err(err) => {
                    tracing::warn!(
                        advisor = %advisor,
                        method = %method,
                        error = %err,
                        "Skipping advisor whose pointcut could not be evaluated"
                    );
                }
            }
        }

        tracing::trace!(method = %method.signature(), units = chain.len(), "Resolved interceptor chain");
        Ok(chain)
    }
}
