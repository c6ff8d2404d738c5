// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use validator::Validate;

/// 提问请求
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequestDto {
    /// 问题文本
    #[validate(length(min = 3, max = 2000))]
    pub question: String,
}
