// src/summarizer/prompt.rs
use super::ollama::GenerationRequest;
use once_cell::sync::Lazy;
use regex::Regex;

static BR_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("Failed to compile BR_TAG_RE"));

// A trailing notes block the model tends to append.
static TRAILER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:注記|備考|III\.|要点まとめ)").expect("Failed to compile TRAILER_RE")
});

static STAR_BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)\*\s+").expect("Failed to compile STAR_BULLET_RE"));

static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Failed to compile BLANK_RUN_RE"));

// Lines disclaiming machine generation.
const DISCLAIMER_MARKERS: [&str; 3] = ["AIによる", "自動生成", "有価証券報告書の原本"];

/// Instruction pair for summarizing the concatenated narrative sections.
pub fn build_request(sections_text: &str, max_chars: usize) -> GenerationRequest {
    let min_chars = max_chars * 4 / 5;
    let system = format!(
        "日本語のみで回答してください。英語などの外国語の固有名詞はカタカナまたは日本語に訳してください。\
         文字数は{min_chars}文字以上{max_chars}文字以内で記述してください。"
    );
    let prompt = format!(
        "以下は有価証券報告書の記述情報（事業の内容、経営方針、事業等のリスク、経営者による分析など）です。\
投資判断に役立つように、同社の事業と課題を要約してください。

【出力要件】
- 必ず日本語のみで出力してください（外国語の固有名詞も日本語で表記してください）
- 見出しは「## 」、箇条書きは「- 」、重要な語句は **太字** で示してください
- 全体で{min_chars}文字以上{max_chars}文字以内にまとめてください
- 会社を指す場合は「同社」と記述してください
- 具体的な数値（金額、比率、年度など）があれば含めてください
- 注記や免責事項は書かないでください

【テキスト】
{sections_text}

上記のテキストを要約してください。"
    );
    GenerationRequest { system, prompt }
}

/// Cleans model output: line-break tags, trailing notes, disclaimers,
/// bullet style, blank runs, then caps the length on a sentence boundary.
pub fn post_process(raw: &str, max_chars: usize) -> String {
    let text = BR_TAG_RE.replace_all(raw.trim(), "\n");

    let text = match TRAILER_RE.find(&text) {
        // Keep the body when the whole reply would be cut.
        Some(m) if m.start() > 0 => text[..m.start()].to_string(),
        _ => text.into_owned(),
    };

    let text: String = text
        .lines()
        .filter(|line| !DISCLAIMER_MARKERS.iter().any(|m| line.contains(m)))
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let text = STAR_BULLET_RE.replace_all(&text, "$1- ");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    cap_at_sentence(text.trim(), max_chars)
}

/// Cuts to at most `max_chars` characters, backing up to the last `。` or
/// line break when one exists in the kept part.
pub fn cap_at_sentence(text: &str, max_chars: usize) -> String {
    let Some((limit, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..limit];
    match head.rfind(['。', '\n']) {
        Some(idx) => {
            let end = idx + head[idx..].chars().next().map_or(0, char::len_utf8);
            head[..end].trim_end().to_string()
        }
        None => head.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_text_and_budget() {
        let request = build_request("【事業の内容】\n自動車", 1000);
        assert!(request.prompt.contains("【事業の内容】\n自動車"));
        assert!(request.prompt.contains("800文字以上1000文字以内"));
        assert!(request.system.starts_with("日本語のみ"));
    }

    #[test]
    fn cleans_model_output() {
        let raw = "## 事業概要<br>同社は**自動車**を製造。<br/>\n\n\n\n* 金融事業\n* 販売\n注: 本要約はAIによる自動生成です。\n\n要点まとめ\n- 重複";
        let cleaned = post_process(raw, 1000);
        assert_eq!(cleaned, "## 事業概要\n同社は**自動車**を製造。\n\n- 金融事業\n- 販売");
    }

    #[test]
    fn keeps_bold_at_line_start() {
        assert_eq!(post_process("**重要**な点", 100), "**重要**な点");
    }

    #[test]
    fn caps_on_sentence_boundary() {
        let text = "一文目です。二文目です。三文目です。";
        assert_eq!(cap_at_sentence(text, 8), "一文目です。");
        assert_eq!(cap_at_sentence(text, 100), text);
        assert_eq!(cap_at_sentence("区切りなしの長い文", 4), "区切りな");
    }
}
