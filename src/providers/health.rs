// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// 提供商健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// 健康
    Healthy,
    /// 降级：冷却窗口内被跳过，窗口结束后允许再次尝试
    Degraded,
    /// 不可用：直到操作员重置为止不再参与调度
    Unavailable,
}

/// 单个提供商的健康记录
#[derive(Debug, Clone)]
struct ProviderHealth {
    state: HealthState,
    /// 冷却截止时间；降级状态下始终有值（无永久锁定）
    cooldown_until: Option<DateTime<Utc>>,
    /// 连续可恢复失败次数，决定冷却时长的指数
    consecutive_failures: u32,
    total_requests: u64,
    total_failures: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Healthy,
            cooldown_until: None,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
        }
    }
}

/// 健康状态快照（状态视图用）
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub provider: String,
    pub state: HealthState,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
}

/// 提供商健康登记表
///
/// 瀑布调度器读取的共享状态表。读多写少，短暂的陈旧读取
/// 是可接受的；写入在独立的写锁下完成显式状态转换。
/// 降级冷却按连续失败次数指数增长并有上限。
pub struct HealthRegistry {
    states: RwLock<HashMap<String, ProviderHealth>>,
    base_cooldown: Duration,
    max_cooldown: Duration,
}

impl HealthRegistry {
    /// 创建新的健康登记表
    ///
    /// # 参数
    ///
    /// * `base_cooldown` - 首次降级的冷却时长
    /// * `max_cooldown` - 冷却时长上限
    pub fn new(base_cooldown: Duration, max_cooldown: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            base_cooldown,
            max_cooldown,
        }
    }

    /// 判断提供商当前是否可被调用
    ///
    /// 降级提供商在冷却窗口内被跳过，无需任何网络往返；
    /// 窗口结束后允许尝试（成功即恢复健康）。
    pub fn is_available(&self, name: &str) -> bool {
        let states = self.states.read();
        let Some(health) = states.get(name) else {
            return true;
        };
        match health.state {
            HealthState::Healthy => true,
            HealthState::Unavailable => {
                counter!("provider_skipped_total", "provider" => name.to_string()).increment(1);
                false
            }
            HealthState::Degraded => match health.cooldown_until {
                Some(until) if Utc::now() < until => {
                    counter!("provider_skipped_total", "provider" => name.to_string()).increment(1);
                    false
                }
                _ => true,
            },
        }
    }

    /// 记录成功调用，恢复健康状态
    pub fn record_success(&self, name: &str) {
        let mut states = self.states.write();
        let health = states.entry(name.to_string()).or_default();
        health.total_requests += 1;
        if health.state != HealthState::Healthy {
            tracing::info!("Provider {} recovered", name);
        }
        health.state = HealthState::Healthy;
        health.cooldown_until = None;
        health.consecutive_failures = 0;

        counter!("provider_requests_total", "provider" => name.to_string()).increment(1);
        self.update_metric(name, HealthState::Healthy);
    }

    /// 记录可恢复失败，进入降级并施加指数冷却
    pub fn record_recoverable_failure(&self, name: &str) {
        let mut states = self.states.write();
        let health = states.entry(name.to_string()).or_default();
        health.total_requests += 1;
        health.total_failures += 1;
        health.consecutive_failures += 1;

        let exponent = health.consecutive_failures.saturating_sub(1).min(16);
        let cooldown_secs = (self.base_cooldown.as_secs() << exponent)
            .min(self.max_cooldown.as_secs());
        health.state = HealthState::Degraded;
        health.cooldown_until =
            Some(Utc::now() + chrono::Duration::seconds(cooldown_secs as i64));

        tracing::warn!(
            "Provider {} degraded, cooldown {}s (failure streak {})",
            name,
            cooldown_secs,
            health.consecutive_failures
        );

        counter!("provider_requests_total", "provider" => name.to_string()).increment(1);
        counter!("provider_failures_total", "provider" => name.to_string()).increment(1);
        self.update_metric(name, HealthState::Degraded);
    }

    /// 记录不可恢复失败，置为不可用直到操作员重置
    pub fn record_non_recoverable_failure(&self, name: &str) {
        let mut states = self.states.write();
        let health = states.entry(name.to_string()).or_default();
        health.total_requests += 1;
        health.total_failures += 1;
        health.state = HealthState::Unavailable;
        health.cooldown_until = None;

        tracing::error!(
            "Provider {} marked unavailable until operator reset",
            name
        );

        counter!("provider_requests_total", "provider" => name.to_string()).increment(1);
        counter!("provider_failures_total", "provider" => name.to_string()).increment(1);
        self.update_metric(name, HealthState::Unavailable);
    }

    /// 操作员重置提供商状态
    pub fn reset(&self, name: &str) {
        let mut states = self.states.write();
        states.insert(name.to_string(), ProviderHealth::default());
        self.update_metric(name, HealthState::Healthy);
    }

    /// 导出全部提供商的健康快照
    pub fn snapshot(&self) -> Vec<HealthSnapshot> {
        let states = self.states.read();
        let mut out: Vec<HealthSnapshot> = states
            .iter()
            .map(|(name, h)| HealthSnapshot {
                provider: name.clone(),
                state: h.state,
                cooldown_until: h.cooldown_until,
                consecutive_failures: h.consecutive_failures,
                total_requests: h.total_requests,
                total_failures: h.total_failures,
            })
            .collect();
        out.sort_by(|a, b| a.provider.cmp(&b.provider));
        out
    }

    fn update_metric(&self, name: &str, state: HealthState) {
        let val = match state {
            HealthState::Healthy => 0.0,
            HealthState::Degraded => 1.0,
            HealthState::Unavailable => 2.0,
        };
        gauge!("provider_health_state", "provider" => name.to_string()).set(val);
    }
}
