//! services/api/src/adapters/tts/text.rs
//!
//! Text preparation shared by every synthesis backend: markdown and emoji
//! stripping, then sentence-aware chunking under a backend's length ceiling.

use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on chunks per synthesis call. Readings long enough to exceed
/// this are truncated rather than allowed to hold a connection for minutes.
pub const MAX_CHUNKS: usize = 40;

fn markdown_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Images go first so the link rule cannot claim their alt text.
            (r"!\[[^\]]*\]\([^)]*\)", ""),
            (r"\[([^\]]*)\]\([^)]*\)", "$1"),
            (r"(?m)^#{1,6}\s*", ""),
            (r"\*\*([^*]+)\*\*", "$1"),
            (r"\*([^*]+)\*", "$1"),
            (r"__([^_]+)__", "$1"),
            (r"_([^_]+)_", "$1"),
            (r"`([^`]*)`", "$1"),
            (r"(?m)^>\s*", ""),
            (r"(?m)^\s*[-*+]\s+", ""),
            (r"(?m)^\s*\d+\.\s+", ""),
            (r"(?m)^\s*([-*_]\s*){3,}$", ""),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            // Patterns are literals, compile failures would be caught by the
            // first test run.
            (Regex::new(pattern).unwrap(), replacement)
        })
        .collect()
    })
}

fn is_emoji(ch: char) -> bool {
    matches!(ch,
        '\u{1F300}'..='\u{1F9FF}'
        | '\u{2600}'..='\u{26FF}'
        | '\u{2700}'..='\u{27BF}'
        | '\u{1F600}'..='\u{1F64F}'
        | '\u{1F680}'..='\u{1F6FF}'
        | '\u{FE0F}'
        | '\u{200D}'
    )
}

/// Strips markdown decoration and emoji from a reading so the synthesized
/// audio does not spell out asterisks and pictographs, then collapses runs of
/// blank lines.
pub fn clean_for_speech(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (regex, replacement) in markdown_patterns() {
        cleaned = regex.replace_all(&cleaned, *replacement).into_owned();
    }
    let cleaned: String = cleaned.chars().filter(|c| !is_emoji(*c)).collect();

    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    blank_runs.replace_all(&cleaned, "\n\n").trim().to_string()
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？' | '；' | '.' | '!' | '?' | ';' | '\n')
}

/// Splits text into sentences on CJK and Latin terminators, keeping the
/// terminator attached to its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if is_terminator(ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        sentences.push(trailing.to_string());
    }
    sentences
}

/// Hard-splits one overlong sentence into pieces of at most `max_chars`
/// characters, cutting on character boundaries.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Cuts cleaned text into synthesis chunks of at most `max_chars` characters,
/// packing whole sentences greedily and never splitting inside one unless a
/// single sentence alone exceeds the ceiling. At most [`MAX_CHUNKS`] chunks
/// are returned.
pub fn chunk_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if sentence_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(hard_split(&sentence, max_chars));
            continue;
        }
        if current_len + sentence_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&sentence);
        current_len += sentence_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.truncate(MAX_CHUNKS);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_decoration() {
        let raw = "# 今日运势\n\n**圣杯三** 代表 *庆祝*，详见 [说明](https://example.com)。";
        let cleaned = clean_for_speech(raw);
        assert_eq!(cleaned, "今日运势\n\n圣杯三 代表 庆祝，详见 说明。");
    }

    #[test]
    fn drops_images_but_keeps_link_text() {
        let raw = "看这张 ![牌面](https://x/img.png) 和 [解读](https://x/read)";
        assert_eq!(clean_for_speech(raw), "看这张  和 解读");
    }

    #[test]
    fn strips_emoji_and_list_markers() {
        let raw = "- 财运 💰 上升 ✨\n- 爱情 ❤️ 平稳";
        let cleaned = clean_for_speech(raw);
        assert!(!cleaned.contains('💰'));
        assert!(!cleaned.contains('✨'));
        assert!(!cleaned.starts_with('-'));
    }

    #[test]
    fn collapses_blank_line_runs() {
        assert_eq!(clean_for_speech("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn packs_whole_sentences_greedily() {
        let text = "一句。两句。三句。";
        let chunks = chunk_for_synthesis(text, 6);
        assert_eq!(chunks, vec!["一句。两句。", "三句。"]);
    }

    #[test]
    fn never_splits_inside_a_fitting_sentence() {
        let chunks = chunk_for_synthesis("短。这是一个稍长的句子。", 12);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12);
        }
        assert!(chunks.iter().any(|c| c.contains("稍长的句子。")));
    }

    #[test]
    fn overlong_sentence_is_hard_split_on_char_boundaries() {
        let long = "无标点".repeat(10);
        let chunks = chunk_for_synthesis(&long, 7);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
        }
        assert_eq!(chunks.concat(), long);
    }

    #[test]
    fn chunk_count_is_capped() {
        let text = "句。".repeat(MAX_CHUNKS * 3);
        let chunks = chunk_for_synthesis(&text, 2);
        assert_eq!(chunks.len(), MAX_CHUNKS);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_for_synthesis("", 100).is_empty());
        assert!(chunk_for_synthesis("   \n  ", 100).is_empty());
    }
}
