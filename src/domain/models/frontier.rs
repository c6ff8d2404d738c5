// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL分类
///
/// 导航页用于继续扩展前沿，内容页物化为文档桩，
/// 被排除的URL只计数不保留
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlClass {
    /// 导航页（列表、归档、栏目页）
    Navigation,
    /// 内容页（文章、报道）
    Content,
    /// 被排除（广告、标签页、站外等）
    Excluded,
}

impl fmt::Display for UrlClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UrlClass::Navigation => write!(f, "navigation"),
            UrlClass::Content => write!(f, "content"),
            UrlClass::Excluded => write!(f, "excluded"),
        }
    }
}

/// 前沿条目
///
/// 仅存在于单次发现运行内部，运行结束即丢弃；
/// 被接受的内容URL物化为文档桩
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    /// 规范化后的URL
    pub url: String,
    /// 父页面URL，根节点为None
    pub parent: Option<String>,
    /// 发现深度
    pub depth: u32,
    /// 分类
    pub classification: UrlClass,
}

impl FrontierEntry {
    pub fn new(url: String, parent: Option<String>, depth: u32, classification: UrlClass) -> Self {
        Self {
            url,
            parent,
            depth,
            classification,
        }
    }
}
