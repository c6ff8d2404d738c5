// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::providers::traits::ProviderError;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

/// 受控类别词表
pub static CATEGORIES: &[&str] = &[
    "Technology",
    "Politics",
    "Science",
    "Business",
    "Health",
    "Sports",
    "Culture",
    "World",
    "Other",
];

static CATEGORY_LOOKUP: Lazy<HashSet<String>> =
    Lazy::new(|| CATEGORIES.iter().map(|c| c.to_lowercase()).collect());

/// 规范化后的富化注解
///
/// 瀑布只接受符合此模式的提供商输出：紧急度限定在1-10，
/// 类别来自受控词表，摘要长度受限，标签去重。
#[derive(Debug, Clone, PartialEq)]
pub struct Annotations {
    /// 紧急度评分（1-10）
    pub urgency: i32,
    /// 类别
    pub category: String,
    /// 摘要
    pub summary: String,
    /// 标签
    pub tags: Vec<String>,
}

/// 解析并规范化提供商的结构化输出
///
/// 宽容解析：定位文本中的首个JSON对象（模型经常在JSON外
/// 包裹说明文字或代码块标记）。字段缺失或类型错误视为
/// 畸形输出，按可恢复错误触发降级。
///
/// # 参数
///
/// * `raw` - 提供商返回的原始文本
/// * `summary_limit` - 摘要字符数上限
pub fn parse_annotations(raw: &str, summary_limit: usize) -> Result<Annotations, ProviderError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| ProviderError::MalformedOutput("no JSON object in output".to_string()))?;

    let value: Value = serde_json::from_str(&json)
        .map_err(|e| ProviderError::MalformedOutput(format!("invalid JSON: {}", e)))?;

    let urgency_raw = value
        .get("urgency")
        .and_then(|u| u.as_i64())
        .ok_or_else(|| ProviderError::MalformedOutput("missing urgency".to_string()))?;
    let urgency = urgency_raw.clamp(1, 10) as i32;

    let category_raw = value
        .get("category")
        .and_then(|c| c.as_str())
        .ok_or_else(|| ProviderError::MalformedOutput("missing category".to_string()))?;
    let category = normalize_category(category_raw);

    let summary = normalize_summary(value.get("summary"))
        .ok_or_else(|| ProviderError::MalformedOutput("missing summary".to_string()))?;
    let summary = truncate_chars(&summary, summary_limit);

    let tags = normalize_tags(value.get("tags"));

    Ok(Annotations {
        urgency,
        category,
        summary,
        tags,
    })
}

/// 从自由文本中截取首个平衡的JSON对象
fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// 将类别映射到受控词表，未知值落到Other
fn normalize_category(raw: &str) -> String {
    let trimmed = raw.trim();
    if CATEGORY_LOOKUP.contains(&trimmed.to_lowercase()) {
        // 保持词表的规范大小写
        CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(trimmed))
            .unwrap_or(&"Other")
            .to_string()
    } else {
        "Other".to_string()
    }
}

/// 摘要可能是字符串、列表或对象，统一拼接为一个字符串
fn normalize_summary(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.trim().is_empty()).then(|| joined.trim().to_string())
        }
        Value::Object(map) => {
            let joined = map
                .values()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.trim().is_empty()).then(|| joined.trim().to_string())
        }
        _ => None,
    }
}

/// 标签大小写不敏感地去重，保留首次出现的写法
fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if let Some(tag) = item.as_str() {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            if seen.insert(tag.to_lowercase()) {
                out.push(tag.to_string());
            }
        }
    }
    out
}

/// 在字符边界上截断
fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_output() {
        let raw = r#"{"summary": "Something happened.", "tags": ["ai", "AI", "rust"], "category": "technology", "urgency": 7}"#;
        let ann = parse_annotations(raw, 600).unwrap();
        assert_eq!(ann.urgency, 7);
        assert_eq!(ann.category, "Technology");
        assert_eq!(ann.tags, vec!["ai", "rust"]);
    }

    #[test]
    fn test_parse_output_wrapped_in_prose() {
        let raw = "Sure! Here is the JSON:\n```json\n{\"summary\": \"S.\", \"tags\": [], \"category\": \"Politics\", \"urgency\": 3}\n```";
        let ann = parse_annotations(raw, 600).unwrap();
        assert_eq!(ann.category, "Politics");
    }

    #[test]
    fn test_urgency_is_clamped() {
        let raw = r#"{"summary": "S", "tags": [], "category": "Science", "urgency": 42}"#;
        assert_eq!(parse_annotations(raw, 600).unwrap().urgency, 10);

        let raw = r#"{"summary": "S", "tags": [], "category": "Science", "urgency": 0}"#;
        assert_eq!(parse_annotations(raw, 600).unwrap().urgency, 1);
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let raw = r#"{"summary": "S", "tags": [], "category": "Astrology", "urgency": 2}"#;
        assert_eq!(parse_annotations(raw, 600).unwrap().category, "Other");
    }

    #[test]
    fn test_summary_list_and_map_are_joined() {
        let raw = r#"{"summary": ["One.", "Two."], "tags": [], "category": "World", "urgency": 5}"#;
        assert_eq!(parse_annotations(raw, 600).unwrap().summary, "One. Two.");

        let raw = r#"{"summary": {"p1": "One.", "p2": "Two."}, "tags": [], "category": "World", "urgency": 5}"#;
        assert_eq!(parse_annotations(raw, 600).unwrap().summary, "One. Two.");
    }

    #[test]
    fn test_summary_is_length_bounded() {
        let long = "x".repeat(1000);
        let raw = format!(
            r#"{{"summary": "{}", "tags": [], "category": "World", "urgency": 5}}"#,
            long
        );
        assert_eq!(parse_annotations(&raw, 100).unwrap().summary.len(), 100);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let raw = r#"{"tags": [], "category": "World", "urgency": 5}"#;
        assert!(matches!(
            parse_annotations(raw, 600),
            Err(ProviderError::MalformedOutput(_))
        ));

        assert!(matches!(
            parse_annotations("no json here", 600),
            Err(ProviderError::MalformedOutput(_))
        ));
    }
}
