use regex::Regex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Telegram消息长度上限（实际为4096，留出余量）
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// 生成Unix时间戳（秒）
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 把提取到的HTML答案归一化为纯文本
///
/// 解码实体、`<br>`变体转换行、去掉其余标签、折叠空行。
/// 对已归一化的文本再次调用是无操作。
pub fn normalize_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let decoded = html_escape::decode_html_entities(s).into_owned();

    // 上游的<br>写法不规范，闭合斜杠前后可能带空格
    let br_regex = Regex::new(r"(?i)<\s*br\s*/?\s*>").unwrap();
    let text = br_regex.replace_all(&decoded, "\n").into_owned();

    let tag_regex = Regex::new(r"</?[^>]+>").unwrap();
    let text = tag_regex.replace_all(&text, "").into_owned();

    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let blank_regex = Regex::new(r"\n{3,}").unwrap();
    let text = blank_regex.replace_all(&text, "\n\n").into_owned();

    text.trim().to_string()
}

/// 裁剪超长消息，结尾加截断标记
pub fn clamp_message(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let head: String = s.chars().take(limit.saturating_sub(30)).collect();
    format!("{}\n\n...(truncated)", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_decodes_entities_and_breaks() {
        assert_eq!(normalize_text("A &amp; B<br>C"), "A & B\nC");
        // 实体先解码再剥标签，编码过的标签同样会被剥掉
        assert_eq!(normalize_text("x &lt;b&gt;bold&lt;/b&gt; y"), "x bold y");
    }

    #[test]
    fn test_normalize_tolerates_malformed_br() {
        assert_eq!(normalize_text("a<br>b"), "a\nb");
        assert_eq!(normalize_text("a<br/>b"), "a\nb");
        assert_eq!(normalize_text("a<br />b"), "a\nb");
        assert_eq!(normalize_text("a< br / >b"), "a\nb");
        assert_eq!(normalize_text("a<BR>b"), "a\nb");
    }

    #[test]
    fn test_normalize_strips_tags_and_collapses_blank_lines() {
        let input = "<div><p>one</p><br><br><br><br><p>two</p></div>";
        assert_eq!(normalize_text(input), "one\n\ntwo");
        assert_eq!(normalize_text("  \r\nhello\rworld\r\n "), "hello\nworld");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "<div class=\"x\">A &amp; B<br>C</div>",
            "plain text",
            "line1<br /><br /><br />line2",
            "  padded  ",
            "",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_clamp_message() {
        assert_eq!(clamp_message("short", 100), "short");

        let long = "x".repeat(200);
        let clamped = clamp_message(&long, 100);
        assert!(clamped.chars().count() <= 100);
        assert!(clamped.ends_with("...(truncated)"));
    }
}
