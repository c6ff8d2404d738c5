// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、服务器、抓取、发现、AI提供商、调度器与编排器的全部配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 抓取器配置
    pub fetcher: FetcherSettings,
    /// 发现策略配置
    pub discovery: DiscoverySettings,
    /// AI提供商配置
    pub providers: ProviderSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 编排器配置
    pub orchestrator: OrchestratorSettings,
    /// 工作器配置
    pub workers: WorkerSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 抓取器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSettings {
    /// 请求使用的User-Agent
    pub user_agent: String,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
    /// 响应体大小上限（字节）
    pub max_body_bytes: usize,
    /// 未在robots.txt中声明时使用的默认爬取延迟（秒）
    pub default_crawl_delay_secs: u64,
}

/// 发现策略配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    /// Sitemap条目的新鲜度窗口（秒）
    pub sitemap_recency_secs: i64,
    /// 单次探测最多抓取的sitemap文件数
    pub sitemap_fetch_budget: usize,
    /// 递归爬取的默认深度上限
    pub default_depth_limit: u32,
    /// 递归爬取单次运行的页面预算
    pub page_budget: usize,
    /// 单次运行的墙钟截止时间（秒）
    pub deadline_secs: u64,
    /// 页面抓取并发度
    pub concurrency: usize,
    /// 单次发现运行最多物化的文档数
    pub max_documents_per_run: usize,
    /// 导航页判定的出链数阈值（链接密度启发）
    pub navigation_link_threshold: usize,
    /// 排除的URL片段（广告、标签、分页等）
    pub exclude_patterns: Vec<String>,
    /// Sitemap地址优先级关键词
    pub sitemap_priority_terms: Vec<String>,
    /// Sitemap地址跳过关键词
    pub sitemap_skip_terms: Vec<String>,
}

/// 单个AI提供商的接入配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderEndpointSettings {
    /// API密钥
    pub api_key: Option<String>,
    /// 服务基础URL
    pub base_url: Option<String>,
    /// 账户标识（Cloudflare风格的服务需要）
    pub account_id: Option<String>,
    /// 推理模型名称
    pub model: Option<String>,
    /// 向量模型名称
    pub embedding_model: Option<String>,
    /// 是否启用（无凭据的本地或免费服务用此开关）
    pub enabled: Option<bool>,
}

/// AI提供商配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// AvalAI接入配置
    #[serde(default)]
    pub avalai: ProviderEndpointSettings,
    /// Cloudflare Workers AI接入配置
    #[serde(default)]
    pub cloudflare: ProviderEndpointSettings,
    /// Cohere接入配置
    #[serde(default)]
    pub cohere: ProviderEndpointSettings,
    /// OpenRouter接入配置
    #[serde(default)]
    pub openrouter: ProviderEndpointSettings,
    /// 本地Ollama接入配置
    #[serde(default)]
    pub ollama: ProviderEndpointSettings,
    /// Tavily搜索接入配置
    #[serde(default)]
    pub tavily: ProviderEndpointSettings,
    /// DuckDuckGo搜索接入配置
    #[serde(default)]
    pub duckduckgo: ProviderEndpointSettings,
    /// 请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 降级冷却的初始时长（秒）
    pub cooldown_base_secs: u64,
    /// 降级冷却的时长上限（秒）
    pub cooldown_max_secs: u64,
    /// 摘要长度上限（字符）
    pub summary_max_chars: usize,
    /// 送入提供商的正文长度上限（字符）
    pub max_context_chars: usize,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 调度器心跳间隔（秒）
    pub beat_interval_secs: u64,
    /// 手动添加来源的默认调度间隔（秒）
    pub default_interval_secs: i64,
    /// 晋升来源获得的调度间隔（秒）
    pub promoted_interval_secs: i64,
    /// 晋升所需的高价值文档数量阈值
    pub promotion_threshold: u64,
    /// 计入价值信号的紧急度下限
    pub promotion_urgency_floor: i32,
    /// 候选来源的评估窗口（秒）
    pub evaluation_window_secs: i64,
    /// 连续发现失败多少次后暂停来源
    pub failure_streak_limit: i32,
    /// 高紧急度内容触发的快速间隔（秒）
    pub fast_interval_secs: i64,
    /// 中等紧急度内容触发的间隔（秒）
    pub medium_interval_secs: i64,
    /// 无新内容退避的间隔上限（秒）
    pub max_interval_secs: i64,
    /// 任务卡死判定超时（秒）
    pub stuck_task_timeout_secs: i64,
}

/// 编排器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    /// 审计阶段检索的文档数
    pub audit_limit: usize,
    /// 综合阶段检索的文档数
    pub synthesis_limit: usize,
    /// 覆盖充分所需的最少命中数
    pub min_coverage_hits: usize,
    /// 覆盖充分所需的最低相似度
    pub similarity_threshold: f32,
    /// 补缺阶段最多注册的新URL数
    pub gap_fill_limit: usize,
    /// 每条补缺查询请求的搜索结果数
    pub search_results_per_query: u32,
    /// 补缺等待的超时时间（秒）
    pub wait_timeout_secs: u64,
    /// 补缺等待的轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 有部分结果时允许提前结束等待的时间（秒）
    pub early_exit_after_secs: u64,
    /// 低信号域名列表，补缺时过滤
    pub low_signal_domains: Vec<String>,
}

/// 工作器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 发现阶段工作器数量
    pub discovery_workers: usize,
    /// 抓取阶段工作器数量
    pub fetch_workers: usize,
    /// 富化阶段工作器数量
    pub enrich_workers: usize,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件与环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Database pool defaults
            .set_default("database.max_connections", 50)?
            .set_default("database.min_connections", 5)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Fetcher defaults
            .set_default("fetcher.user_agent", "huntrs-bot/1.0 (+https://huntrs.dev)")?
            .set_default("fetcher.timeout_secs", 15)?
            .set_default("fetcher.max_body_bytes", 5 * 1024 * 1024)?
            .set_default("fetcher.default_crawl_delay_secs", 0)?
            // Discovery defaults
            .set_default("discovery.sitemap_recency_secs", 48 * 3600)?
            .set_default("discovery.sitemap_fetch_budget", 5)?
            .set_default("discovery.default_depth_limit", 2)?
            .set_default("discovery.page_budget", 30)?
            .set_default("discovery.deadline_secs", 120)?
            .set_default("discovery.concurrency", 4)?
            .set_default("discovery.max_documents_per_run", 50)?
            .set_default("discovery.navigation_link_threshold", 40)?
            .set_default(
                "discovery.exclude_patterns",
                vec![
                    "/ads/".to_string(),
                    "/ad/".to_string(),
                    "/tag/".to_string(),
                    "/redirect/".to_string(),
                    "/banner/".to_string(),
                    "/click/".to_string(),
                    "/page/".to_string(),
                    "login".to_string(),
                    "register".to_string(),
                    "signin".to_string(),
                    "signup".to_string(),
                    "checkout".to_string(),
                    "youtube.com".to_string(),
                    "youtu.be".to_string(),
                    "vimeo.com".to_string(),
                    "dailymotion.com".to_string(),
                ],
            )?
            .set_default(
                "discovery.sitemap_priority_terms",
                vec![
                    "news".to_string(),
                    "en-us".to_string(),
                    "world".to_string(),
                    "front-page".to_string(),
                    "top".to_string(),
                ],
            )?
            .set_default("discovery.sitemap_skip_terms", Vec::<String>::new())?
            // Provider defaults
            .set_default(
                "providers.avalai.base_url",
                "https://api.avalai.ir/v1/chat/completions",
            )?
            .set_default("providers.avalai.model", "gemma-3n-e2b-it")?
            .set_default("providers.cloudflare.model", "@cf/meta/llama-3-8b-instruct")?
            .set_default(
                "providers.cloudflare.embedding_model",
                "@cf/baai/bge-base-en-v1.5",
            )?
            .set_default("providers.cohere.model", "command-r")?
            .set_default("providers.cohere.embedding_model", "embed-english-v3.0")?
            .set_default(
                "providers.openrouter.model",
                "mistralai/mistral-small-3.1-24b-instruct:free",
            )?
            .set_default("providers.ollama.base_url", "http://127.0.0.1:11434")?
            .set_default("providers.ollama.model", "phi3.5")?
            .set_default("providers.ollama.embedding_model", "nomic-embed-text")?
            .set_default("providers.ollama.enabled", false)?
            .set_default("providers.duckduckgo.enabled", true)?
            .set_default("providers.request_timeout_secs", 60)?
            .set_default("providers.cooldown_base_secs", 30)?
            .set_default("providers.cooldown_max_secs", 900)?
            .set_default("providers.summary_max_chars", 600)?
            .set_default("providers.max_context_chars", 3000)?
            // Scheduler defaults
            .set_default("scheduler.beat_interval_secs", 60)?
            .set_default("scheduler.default_interval_secs", 3600)?
            .set_default("scheduler.promoted_interval_secs", 1800)?
            .set_default("scheduler.promotion_threshold", 3)?
            .set_default("scheduler.promotion_urgency_floor", 7)?
            .set_default("scheduler.evaluation_window_secs", 7 * 24 * 3600)?
            .set_default("scheduler.failure_streak_limit", 5)?
            .set_default("scheduler.fast_interval_secs", 300)?
            .set_default("scheduler.medium_interval_secs", 1800)?
            .set_default("scheduler.max_interval_secs", 86400)?
            .set_default("scheduler.stuck_task_timeout_secs", 1800)?
            // Orchestrator defaults
            .set_default("orchestrator.audit_limit", 5)?
            .set_default("orchestrator.synthesis_limit", 10)?
            .set_default("orchestrator.min_coverage_hits", 3)?
            .set_default("orchestrator.similarity_threshold", 0.35)?
            .set_default("orchestrator.gap_fill_limit", 5)?
            .set_default("orchestrator.search_results_per_query", 3)?
            .set_default("orchestrator.wait_timeout_secs", 120)?
            .set_default("orchestrator.poll_interval_secs", 3)?
            .set_default("orchestrator.early_exit_after_secs", 60)?
            .set_default("orchestrator.low_signal_domains", Vec::<String>::new())?
            // Worker pool defaults
            .set_default("workers.discovery_workers", 1)?
            .set_default("workers.fetch_workers", 4)?
            .set_default("workers.enrich_workers", 2)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("HUNTRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
