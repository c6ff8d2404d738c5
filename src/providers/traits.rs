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

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// 提供商能力枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// 推理（文本生成与结构化分析）
    Reasoning,
    /// 向量化
    Embedding,
    /// 网络搜索
    Search,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capability::Reasoning => write!(f, "reasoning"),
            Capability::Embedding => write!(f, "embedding"),
            Capability::Search => write!(f, "search"),
        }
    }
}

/// 提供商错误类型
///
/// 每个提供商必须把原生错误映射到这套可恢复/不可恢复分类上。
/// 可恢复错误触发瀑布降级到下一个提供商，不可恢复错误将
/// 提供商置为unavailable直到操作员干预。
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 限流（HTTP 429）
    #[error("Rate limited")]
    RateLimited,
    /// 服务端错误（5xx）
    #[error("Server error: {0}")]
    ServerError(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 连接失败
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 结构化输出不符合规范，按可恢复处理并触发降级
    #[error("Malformed output: {0}")]
    MalformedOutput(String),
    /// 认证失败
    #[error("Authentication failed")]
    AuthFailed,
    /// 非法请求（429以外的4xx）
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// 某一能力缺少任何可用凭据，启动即失败
    #[error("No provider configured for capability: {0}")]
    MissingCredentials(String),
    /// 瀑布耗尽：链上所有提供商都失败了
    #[error("All providers exhausted for capability: {0}")]
    Exhausted(Capability),
}

impl ProviderError {
    /// 判断错误是否可恢复（触发降级而非熔断）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::ServerError(_)
                | ProviderError::Timeout
                | ProviderError::ConnectionFailed(_)
                | ProviderError::MalformedOutput(_)
        )
    }

    /// 按HTTP状态码分类错误
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status.as_u16() == 429 {
            ProviderError::RateLimited
        } else if status.is_server_error() {
            ProviderError::ServerError(status.as_u16())
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            ProviderError::AuthFailed
        } else {
            ProviderError::BadRequest(format!("HTTP {}", status.as_u16()))
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::ConnectionFailed(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status)
        } else {
            ProviderError::ConnectionFailed(err.to_string())
        }
    }
}

/// 推理请求
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// 系统提示词
    pub system: Option<String>,
    /// 用户提示词
    pub prompt: String,
    /// 采样温度
    pub temperature: f32,
    /// 是否要求JSON输出
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.3,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// 搜索结果条目
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// 标题
    pub title: String,
    /// URL
    pub url: String,
    /// 摘要片段
    pub snippet: Option<String>,
}

/// 推理提供商特质
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// 执行一次文本补全
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    /// 提供商名称
    fn name(&self) -> &'static str;
}

/// 向量化提供商特质
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 将文本转换为向量
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// 提供商名称
    fn name(&self) -> &'static str;
}

/// 搜索提供商特质
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// 执行网络搜索
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ProviderError>;

    /// 提供商名称
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ProviderError::RateLimited.is_recoverable());
        assert!(ProviderError::ServerError(503).is_recoverable());
        assert!(ProviderError::Timeout.is_recoverable());
        assert!(ProviderError::MalformedOutput("x".into()).is_recoverable());
        assert!(!ProviderError::AuthFailed.is_recoverable());
        assert!(!ProviderError::BadRequest("x".into()).is_recoverable());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY),
            ProviderError::ServerError(502)
        ));
        assert!(matches!(
            ProviderError::from_status(reqwest::StatusCode::UNAUTHORIZED),
            ProviderError::AuthFailed
        ));
        assert!(matches!(
            ProviderError::from_status(reqwest::StatusCode::UNPROCESSABLE_ENTITY),
            ProviderError::BadRequest(_)
        ));
    }
}
