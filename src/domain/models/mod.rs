// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 文档实体模块
pub mod document;

/// 富化结果模块
pub mod enrichment;

/// 前沿条目模块
pub mod frontier;

/// 晋升记录模块
pub mod promotion;

/// 来源实体模块
pub mod source;

/// 任务实体模块
pub mod task;

/// 领域错误类型
///
/// 表示在领域层可能发生的各种错误情况
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当实体状态转换不符合业务规则时发生
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}
