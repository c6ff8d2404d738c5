// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::promotion::PromotionRecord;
use crate::domain::models::source::{Source, SourceStatus};
use crate::domain::models::task::Task;
use crate::domain::repositories::enrichment_repository::EnrichmentRepository;
use crate::domain::repositories::promotion_repository::PromotionRepository;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::queue::task_queue::TaskQueue;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info, warn};

/// 自适应调度器 / 进化循环
///
/// 心跳循环做三件事：
/// 1. 把到期的active/promoted来源派发为发现任务
/// 2. 进化评估：candidate → evaluating → promoted/discarded，
///    以及连续失败来源的暂停
/// 3. 队列维护：重置锁过期的卡死任务、取消超期任务
pub struct EvolutionScheduler {
    sources: Arc<dyn SourceRepository>,
    enrichments: Arc<dyn EnrichmentRepository>,
    promotions: Arc<dyn PromotionRepository>,
    tasks: Arc<dyn TaskRepository>,
    queue: Arc<dyn TaskQueue>,
    settings: SchedulerSettings,
}

impl EvolutionScheduler {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        enrichments: Arc<dyn EnrichmentRepository>,
        promotions: Arc<dyn PromotionRepository>,
        tasks: Arc<dyn TaskRepository>,
        queue: Arc<dyn TaskQueue>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            sources,
            enrichments,
            promotions,
            tasks,
            queue,
            settings,
        }
    }

    /// 启动调度器后台任务
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let beat = TokioDuration::from_secs(self.settings.beat_interval_secs);
        tokio::spawn(async move {
            let mut ticker = interval(beat);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    /// 执行一次完整的心跳：派发、进化、维护
    pub async fn tick(&self) {
        if let Err(e) = self.dispatch_due_sources().await {
            error!("Scheduler dispatch failed: {}", e);
        }
        if let Err(e) = self.evolve_sources().await {
            error!("Evolution pass failed: {}", e);
        }
        if let Err(e) = self.maintenance().await {
            error!("Queue maintenance failed: {}", e);
        }
    }

    /// 派发到期来源
    async fn dispatch_due_sources(&self) -> anyhow::Result<()> {
        let due = self.sources.find_due(Utc::now()).await?;
        let mut dispatched = 0usize;

        for mut source in due {
            let task = Task::discovery(source.id, source.root_url.clone(), json!({}));
            if let Err(e) = self.queue.enqueue(task).await {
                error!("Failed to enqueue discovery for {}: {}", source.root_url, e);
                continue;
            }
            // 派发即更新last_run，防止下一个心跳重复入队
            source.last_run_at = Some(Utc::now().into());
            source.updated_at = Utc::now().into();
            self.sources.update(&source).await?;
            dispatched += 1;
        }

        if dispatched > 0 {
            info!("Dispatched {} discovery runs", dispatched);
        }
        Ok(())
    }

    /// 进化评估
    async fn evolve_sources(&self) -> anyhow::Result<()> {
        let now = Utc::now();

        // candidate → evaluating：第一篇文档富化成功即开始计量
        for source in self.sources.list(Some(SourceStatus::Candidate)).await? {
            let enriched = self
                .enrichments
                .count_high_urgency_for_source(source.id, 0, now - chrono::Duration::days(3650))
                .await?;
            if enriched > 0 {
                match source.begin_evaluation() {
                    Ok(updated) => {
                        info!("Source {} entered evaluation", updated.root_url);
                        self.sources.update(&updated).await?;
                    }
                    Err(e) => warn!("Evaluation transition rejected: {}", e),
                }
            }
        }

        // evaluating → promoted / discarded
        let window = chrono::Duration::seconds(self.settings.evaluation_window_secs);
        for source in self.sources.list(Some(SourceStatus::Evaluating)).await? {
            let value_signal = self
                .enrichments
                .count_high_urgency_for_source(
                    source.id,
                    self.settings.promotion_urgency_floor,
                    now - window,
                )
                .await?;

            if value_signal >= self.settings.promotion_threshold {
                let query = source.originating_query.clone();
                let source_id = source.id;
                match source.promote(self.settings.promoted_interval_secs) {
                    Ok(promoted) => {
                        info!(
                            "Source {} promoted to recurring monitoring (value signal {})",
                            promoted.root_url, value_signal
                        );
                        self.sources.update(&promoted).await?;
                        let record = PromotionRecord::new(source_id, query, value_signal as i64);
                        self.promotions.create(&record).await?;
                    }
                    Err(e) => warn!("Promotion transition rejected: {}", e),
                }
            } else if let Some(started) = source.evaluation_started_at {
                if now - started.with_timezone(&Utc) > window {
                    match source.discard() {
                        Ok(discarded) => {
                            info!(
                                "Source {} discarded (window elapsed below threshold)",
                                discarded.root_url
                            );
                            self.sources.update(&discarded).await?;
                        }
                        Err(e) => warn!("Discard transition rejected: {}", e),
                    }
                }
            }
        }

        // 连续失败的调度中来源被暂停；这是promoted降级的唯一自动路径
        for status in [SourceStatus::Active, SourceStatus::Promoted] {
            for source in self.sources.list(Some(status)).await? {
                if source.consecutive_failures >= self.settings.failure_streak_limit {
                    let url = source.root_url.clone();
                    match source.pause() {
                        Ok(paused) => {
                            warn!(
                                "Source {} paused after {} consecutive discovery failures",
                                url, self.settings.failure_streak_limit
                            );
                            self.sources.update(&paused).await?;
                        }
                        Err(e) => warn!("Pause transition rejected: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    /// 队列维护
    async fn maintenance(&self) -> anyhow::Result<()> {
        let timeout = chrono::Duration::seconds(self.settings.stuck_task_timeout_secs);
        let reset = self.tasks.reset_stuck_tasks(timeout).await?;
        if reset > 0 {
            info!("Reset {} stuck tasks", reset);
        }

        let expired = self.tasks.expire_tasks().await?;
        if expired > 0 {
            info!("Expired {} tasks", expired);
        }
        Ok(())
    }
}

/// 按内容紧急度自适应调整来源的调度间隔
///
/// 有新内容且高紧急度时加速，无新内容时乘性退避并封顶。
/// 纯函数，由富化工作器在每次成功处理后调用。
pub fn adapted_interval(
    settings: &SchedulerSettings,
    current_interval: i64,
    urgency: Option<i32>,
    has_new_content: bool,
) -> i64 {
    if has_new_content {
        match urgency {
            Some(u) if u >= 8 => settings.fast_interval_secs,
            Some(u) if u >= 5 => settings.medium_interval_secs,
            _ => settings
                .default_interval_secs
                .max((current_interval as f64 * 0.95) as i64),
        }
    } else {
        settings
            .max_interval_secs
            .min((current_interval as f64 * 1.5) as i64)
    }
}

/// 应用自适应间隔到来源并持久化
pub async fn apply_adapted_interval(
    sources: &Arc<dyn SourceRepository>,
    settings: &SchedulerSettings,
    mut source: Source,
    urgency: Option<i32>,
    has_new_content: bool,
) -> anyhow::Result<()> {
    if !source.is_scheduled() {
        return Ok(());
    }
    let current = source
        .schedule_interval_secs
        .unwrap_or(settings.default_interval_secs);
    let adapted = adapted_interval(settings, current, urgency, has_new_content);
    if adapted != current {
        info!(
            "Adaptive scheduler: {} urgency={:?} interval {}s -> {}s",
            source.root_url, urgency, current, adapted
        );
        source.schedule_interval_secs = Some(adapted);
        source.updated_at = Utc::now().into();
        sources.update(&source).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            beat_interval_secs: 60,
            default_interval_secs: 3600,
            promoted_interval_secs: 1800,
            promotion_threshold: 3,
            promotion_urgency_floor: 7,
            evaluation_window_secs: 7 * 24 * 3600,
            failure_streak_limit: 5,
            fast_interval_secs: 300,
            medium_interval_secs: 1800,
            max_interval_secs: 86400,
            stuck_task_timeout_secs: 1800,
        }
    }

    #[test]
    fn test_breaking_news_speeds_up() {
        assert_eq!(adapted_interval(&settings(), 3600, Some(9), true), 300);
    }

    #[test]
    fn test_medium_urgency() {
        assert_eq!(adapted_interval(&settings(), 3600, Some(5), true), 1800);
    }

    #[test]
    fn test_low_urgency_drifts_toward_default() {
        let next = adapted_interval(&settings(), 7200, Some(2), true);
        assert_eq!(next, 6840); // 7200 * 0.95
        assert_eq!(adapted_interval(&settings(), 3600, Some(2), true), 3600);
    }

    #[test]
    fn test_no_content_backs_off_with_cap() {
        assert_eq!(adapted_interval(&settings(), 3600, None, false), 5400);
        assert_eq!(adapted_interval(&settings(), 80000, None, false), 86400);
    }
}
