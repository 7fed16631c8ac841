use crate::models::Diagnostic;
use crate::utils::normalize_text;
use regex::Regex;
use std::collections::BTreeSet;

/// 一次提取的产物：答案为空时必定带诊断信息
#[derive(Debug, Clone)]
pub struct Extraction {
    pub answer: String,
    pub diagnostic: Option<Diagnostic>,
}

/// 回答提取器
///
/// 上游页面结构不稳定且存在标签写法错误，这里刻意用字符串
/// 模式匹配而不是DOM解析。提取策略按顺序尝试，取第一个命中：
/// 1. class标记的回答容器
/// 2. id锚点元素后紧跟的文本
/// 3. 都没有时认为上游返回了表单页，转诊断模式
pub struct AnswerExtractor;

impl AnswerExtractor {
    pub fn extract(raw_html: &str) -> Extraction {
        if let Some(inner) = Self::response_content_block(raw_html) {
            let answer = normalize_text(&inner);
            if !answer.is_empty() {
                return Extraction {
                    answer,
                    diagnostic: None,
                };
            }
        }

        if let Some(tail) = Self::text_after_answer_anchor(raw_html) {
            let answer = normalize_text(&tail);
            if !answer.is_empty() {
                return Extraction {
                    answer,
                    diagnostic: None,
                };
            }
        }

        Extraction {
            answer: String::new(),
            diagnostic: Some(Self::inspect_form_page(raw_html)),
        }
    }

    /// 策略1：`class="response-content"`容器的内部内容
    fn response_content_block(html: &str) -> Option<String> {
        let block_regex =
            Regex::new(r#"(?is)<div[^>]*class="[^"]*response-content[^"]*"[^>]*>(.*?)</div>"#)
                .unwrap();
        block_regex.captures(html).map(|caps| caps[1].to_string())
    }

    /// 策略2：`id="answer"`元素之后紧跟的文本节点
    fn text_after_answer_anchor(html: &str) -> Option<String> {
        // 锚点元素可能本身为空，文本跟在闭合标签后面
        let anchor_regex =
            Regex::new(r#"(?is)\bid\s*=\s*"answer"[^>]*>(?:\s*</[a-z][a-z0-9]*>)?\s*([^<]+)"#)
                .unwrap();
        anchor_regex.captures(html).map(|caps| caps[1].to_string())
    }

    /// 诊断模式：收集可选模型、表单字段名和表单action
    fn inspect_form_page(html: &str) -> Diagnostic {
        let option_regex = Regex::new(r#"(?is)<option[^>]*\bvalue\s*=\s*"([^"]*)""#).unwrap();
        let mut available_models = Vec::new();
        for caps in option_regex.captures_iter(html) {
            let value = caps[1].trim().to_string();
            if !value.is_empty() && !available_models.contains(&value) {
                available_models.push(value);
            }
        }

        let field_regex =
            Regex::new(r#"(?is)<(?:input|textarea|select)[^>]*\bname\s*=\s*"([^"]*)""#).unwrap();
        let form_field_names: BTreeSet<String> = field_regex
            .captures_iter(html)
            .map(|caps| caps[1].trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let action_regex = Regex::new(r#"(?is)<form[^>]*\baction\s*=\s*"([^"]*)""#).unwrap();
        let form_action = action_regex
            .captures(html)
            .map(|caps| caps[1].trim().to_string())
            .filter(|action| !action.is_empty());

        let note = if available_models.is_empty() && form_field_names.is_empty() {
            "no answer container found in upstream response".to_string()
        } else {
            "upstream returned the form page instead of an answer".to_string()
        };

        Diagnostic {
            note,
            available_models,
            form_field_names,
            form_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_response_content_block() {
        let html = r#"<html><body><div class="response-content">A &amp; B<br>C</div></body></html>"#;
        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "A & B\nC");
        assert!(extraction.diagnostic.is_none());
    }

    #[test]
    fn test_extracts_simple_answer() {
        let html = r#"...<div class="response-content">4</div>..."#;
        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "4");
        assert!(extraction.diagnostic.is_none());
    }

    #[test]
    fn test_falls_back_to_answer_anchor() {
        let html = r#"<html><span id="answer"></span>the answer text<div>footer</div></html>"#;
        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "the answer text");
        assert!(extraction.diagnostic.is_none());

        let html = r#"<div id="answer">inline value</div>"#;
        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "inline value");
    }

    #[test]
    fn test_form_page_switches_to_diagnostic_mode() {
        let html = r#"<html><body>
            <form action="/deepseek.php?i=1" method="post">
              <select name="model">
                <option value="DeepSeek-V3">DeepSeek-V3</option>
                <option value="DeepSeek-R1">DeepSeek-R1</option>
                <option value="DeepSeek-V3">DeepSeek-V3</option>
              </select>
              <textarea name="question"></textarea>
              <input name="submit" type="submit">
            </form>
        </body></html>"#;

        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "");

        let diagnostic = extraction.diagnostic.unwrap();
        assert_eq!(
            diagnostic.available_models,
            vec!["DeepSeek-V3".to_string(), "DeepSeek-R1".to_string()]
        );
        assert!(diagnostic.form_field_names.contains("question"));
        assert!(diagnostic.form_field_names.contains("model"));
        assert!(diagnostic.form_field_names.contains("submit"));
        assert_eq!(diagnostic.form_action.as_deref(), Some("/deepseek.php?i=1"));
    }

    #[test]
    fn test_empty_container_still_yields_diagnostic() {
        let html = r#"<div class="response-content">   </div><input name="question">"#;
        let extraction = AnswerExtractor::extract(html);
        assert_eq!(extraction.answer, "");
        let diagnostic = extraction.diagnostic.unwrap();
        assert!(diagnostic.form_field_names.contains("question"));
    }

    #[test]
    fn test_unrecognized_page_yields_diagnostic_note() {
        let extraction = AnswerExtractor::extract("<html><body>nothing here</body></html>");
        assert_eq!(extraction.answer, "");
        let diagnostic = extraction.diagnostic.unwrap();
        assert!(diagnostic.available_models.is_empty());
        assert!(diagnostic.form_field_names.is_empty());
        assert!(diagnostic.note.contains("no answer container"));
    }
}
