// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use thiserror::Error;

/// 提取错误类型
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// 输入为空
    #[error("Empty document")]
    EmptyDocument,
    /// 未能提取到正文
    #[error("No main content found")]
    MissingContent,
}

/// 提取结果
#[derive(Debug, Clone)]
pub struct Extracted {
    /// 标题
    pub title: String,
    /// 正文文本
    pub text: String,
    /// 发布时间（如果页面声明了）
    pub published_at: Option<DateTime<Utc>>,
}

/// 内容提取器接口
///
/// 对核心流程而言是黑盒：输入原始HTML，输出标题、正文与发布时间
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> Result<Extracted, ExtractionError>;
}

/// 基于HTML结构的提取器实现
///
/// 标题取og:title或title标签；正文收集article/main下的段落，
/// 缺失时回退到全文段落；发布时间读meta或time标签。
pub struct HtmlExtractor;

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_title(doc: &Html) -> Option<String> {
        let og_selector = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
        if let Some(el) = doc.select(&og_selector).next() {
            if let Some(content) = el.value().attr("content") {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }

        let title_selector = Selector::parse("title").ok()?;
        doc.select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn extract_text(doc: &Html) -> String {
        // 优先在article/main容器内收集段落
        for container in ["article p", "main p", "p"] {
            let Ok(selector) = Selector::parse(container) else {
                continue;
            };
            let paragraphs: Vec<String> = doc
                .select(&selector)
                .map(|p| p.text().collect::<String>().trim().to_string())
                .filter(|t| t.len() > 40)
                .collect();
            if !paragraphs.is_empty() {
                return paragraphs.join("\n\n");
            }
        }
        String::new()
    }

    fn extract_published(doc: &Html) -> Option<DateTime<Utc>> {
        let meta_selectors = [
            r#"meta[property="article:published_time"]"#,
            r#"meta[name="date"]"#,
            r#"meta[itemprop="datePublished"]"#,
        ];
        for sel in meta_selectors {
            let Ok(selector) = Selector::parse(sel) else {
                continue;
            };
            if let Some(el) = doc.select(&selector).next() {
                if let Some(raw) = el.value().attr("content") {
                    if let Some(ts) = parse_timestamp(raw) {
                        return Some(ts);
                    }
                }
            }
        }

        let time_selector = Selector::parse("time[datetime]").ok()?;
        doc.select(&time_selector)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(parse_timestamp)
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str, url: &str) -> Result<Extracted, ExtractionError> {
        if html.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let doc = Html::parse_document(html);

        let title = Self::extract_title(&doc).unwrap_or_else(|| url.to_string());
        let text = Self::extract_text(&doc);
        if text.is_empty() {
            return Err(ExtractionError::MissingContent);
        }

        Ok(Extracted {
            title,
            text,
            published_at: Self::extract_published(&doc),
        })
    }
}

/// 解析常见的时间戳格式（RFC 3339或纯日期）
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head>
        <title>Fallback Title</title>
        <meta property="og:title" content="Breaking: Example Event"/>
        <meta property="article:published_time" content="2026-01-10T08:30:00Z"/>
        </head><body>
        <article>
          <p>This is the first paragraph of the article body, long enough to be kept as content.</p>
          <p>And here is a second paragraph that also carries enough text to pass the length filter.</p>
          <p>short</p>
        </article>
        </body></html>"#;

    #[test]
    fn test_extracts_title_text_and_date() {
        let extractor = HtmlExtractor::new();
        let result = extractor
            .extract(ARTICLE, "https://example.com/post")
            .unwrap();

        assert_eq!(result.title, "Breaking: Example Event");
        assert!(result.text.contains("first paragraph"));
        assert!(result.text.contains("second paragraph"));
        assert!(!result.text.contains("short"));
        assert_eq!(
            result.published_at.unwrap().to_rfc3339(),
            "2026-01-10T08:30:00+00:00"
        );
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let extractor = HtmlExtractor::new();
        assert!(matches!(
            extractor.extract("  ", "https://example.com"),
            Err(ExtractionError::EmptyDocument)
        ));
    }

    #[test]
    fn test_no_paragraphs_is_missing_content() {
        let extractor = HtmlExtractor::new();
        let html = "<html><body><div>nav</div></body></html>";
        assert!(matches!(
            extractor.extract(html, "https://example.com"),
            Err(ExtractionError::MissingContent)
        ));
    }

    #[test]
    fn test_plain_date_meta() {
        assert!(parse_timestamp("2026-02-01").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
