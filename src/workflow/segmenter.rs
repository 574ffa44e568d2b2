//! 子句切分：连接词边界上的小状态机
//!
//! 词法：按空白切块，逗号/分号独立成符号，词尾的 `. ! ?` 视为句子边界。
//! 状态：Start → InClause ⇄ AtBoundary。位于 InClause 时遇到连接词（或连接短语）即闭合当前子句，
//! 之后连续出现的连接词（如 ", and then"）都被吸收进同一个边界，并原样记录，便于回拼。

use std::sync::OnceLock;

use regex::Regex;

/// 多词连接短语（先于单词连接词匹配，按长度降序）
const CONNECTOR_PHRASES: &[&[&str]] = &[
    &["as", "well", "as"],
    &["and", "then"],
    &["after", "that"],
    &["followed", "by"],
    &["and", "also"],
];

const CONNECTOR_WORDS: &[&str] = &[
    "then",
    "and",
    "also",
    "next",
    "afterwards",
    "subsequently",
    "finally",
    "plus",
];

fn chunk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]|[^\s,;]+").expect("valid chunk regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Comma,
    Semicolon,
    SentenceEnd(char),
}

impl Token {
    /// 作为边界时的原文表示（单词前带空格，标点紧贴）
    fn surface(&self) -> String {
        match self {
            Token::Word(w) => format!(" {w}"),
            Token::Comma => ",".to_string(),
            Token::Semicolon => ";".to_string(),
            Token::SentenceEnd(c) => c.to_string(),
        }
    }
}

fn lex(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for m in chunk_regex().find_iter(text) {
        match m.as_str() {
            "," => tokens.push(Token::Comma),
            ";" => tokens.push(Token::Semicolon),
            chunk => {
                let word = chunk.trim_end_matches(['.', '!', '?']);
                let end = chunk[word.len()..].chars().next();
                if !word.is_empty() {
                    tokens.push(Token::Word(word.to_string()));
                }
                if let Some(c) = end {
                    tokens.push(Token::SentenceEnd(c));
                }
            }
        }
    }
    tokens
}

/// 一个子句及其前导边界
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub text: String,
    /// 该子句之前的边界原文（第一个子句为 None，除非文本以连接词开头）
    pub boundary: Option<String>,
}

/// 切分结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub clauses: Vec<Clause>,
    /// 出现过的连接边界数量（包括首尾被吸收的连接词）
    pub connector_count: usize,
}

impl Segmentation {
    pub fn has_connectors(&self) -> bool {
        self.connector_count > 0
    }

    pub fn texts(&self) -> Vec<&str> {
        self.clauses.iter().map(|c| c.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    InClause,
    AtBoundary,
}

/// 连接词切分器（无内部状态，可在请求间共享）
#[derive(Debug, Clone, Copy, Default)]
pub struct Segmenter;

impl Segmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn segment(&self, text: &str) -> Segmentation {
        let tokens = lex(text);
        let mut result = Segmentation::default();
        let mut state = State::Start;
        let mut words: Vec<String> = Vec::new();
        let mut boundary = String::new();
        let mut i = 0;

        while i < tokens.len() {
            let connector_len = connector_at(&tokens, i);
            if connector_len > 0 {
                if state == State::InClause {
                    result.clauses.push(Clause {
                        text: words.join(" "),
                        boundary: take_boundary(&mut boundary),
                    });
                    words.clear();
                    result.connector_count += 1;
                } else if state == State::Start {
                    result.connector_count += 1;
                }
                for token in &tokens[i..i + connector_len] {
                    boundary.push_str(&token.surface());
                }
                state = State::AtBoundary;
                i += connector_len;
                continue;
            }

            if let Token::Word(w) = &tokens[i] {
                words.push(w.clone());
            }
            state = State::InClause;
            i += 1;
        }

        if state == State::InClause && !words.is_empty() {
            result.clauses.push(Clause {
                text: words.join(" "),
                boundary: take_boundary(&mut boundary),
            });
        }
        result
    }
}

fn take_boundary(boundary: &mut String) -> Option<String> {
    if boundary.is_empty() {
        None
    } else {
        Some(std::mem::take(boundary))
    }
}

/// 位置 i 起的连接词长度（token 数）；0 表示不是连接词
fn connector_at(tokens: &[Token], i: usize) -> usize {
    match &tokens[i] {
        Token::Comma | Token::Semicolon | Token::SentenceEnd(_) => return 1,
        Token::Word(_) => {}
    }

    for phrase in CONNECTOR_PHRASES {
        if i + phrase.len() <= tokens.len()
            && phrase.iter().enumerate().all(|(k, p)| {
                matches!(&tokens[i + k], Token::Word(w) if w.eq_ignore_ascii_case(p))
            })
        {
            return phrase.len();
        }
    }

    match &tokens[i] {
        Token::Word(w) if CONNECTOR_WORDS.iter().any(|c| w.eq_ignore_ascii_case(c)) => 1,
        _ => 0,
    }
}

/// 回拼两个子句：前句 + 边界原文 + 空格 + 后句
pub fn rejoin(previous: &str, boundary: Option<&str>, next: &str) -> String {
    match boundary {
        Some(b) => format!("{previous}{b} {next}"),
        None => format!("{previous} {next}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        Segmenter::new()
            .segment(input)
            .clauses
            .into_iter()
            .map(|c| c.text)
            .collect()
    }

    #[test]
    fn test_comma_boundary() {
        assert_eq!(
            texts("prior art search 5g ai, draft 2 claims"),
            vec!["prior art search 5g ai", "draft 2 claims"]
        );
    }

    #[test]
    fn test_then_boundary() {
        assert_eq!(
            texts("web search ramy atawia then prior art search"),
            vec!["web search ramy atawia", "prior art search"]
        );
    }

    #[test]
    fn test_stacked_connectors_form_one_boundary() {
        let seg = Segmenter::new().segment("search the web, and then draft claims.");
        assert_eq!(seg.texts(), vec!["search the web", "draft claims"]);
        assert_eq!(seg.clauses[1].boundary.as_deref(), Some(", and then"));
        assert_eq!(seg.connector_count, 2);
    }

    #[test]
    fn test_no_connector_single_clause() {
        let seg = Segmenter::new().segment("prior art search for 5g technology");
        assert_eq!(seg.texts(), vec!["prior art search for 5g technology"]);
        assert!(!seg.has_connectors());
    }

    #[test]
    fn test_only_connectors_and_empty() {
        let seg = Segmenter::new().segment("and then , and");
        assert!(seg.clauses.is_empty());
        assert!(seg.has_connectors());
        assert!(Segmenter::new().segment("").clauses.is_empty());
        assert!(Segmenter::new().segment("   ").clauses.is_empty());
    }

    #[test]
    fn test_connector_phrases() {
        assert_eq!(
            texts("look up rust after that draft claims followed by review"),
            vec!["look up rust", "draft claims", "review"]
        );
    }

    #[test]
    fn test_sentence_end_and_semicolon() {
        assert_eq!(
            texts("Search prior art! Draft claims; review them?"),
            vec!["Search prior art", "Draft claims", "review them"]
        );
    }

    #[test]
    fn test_rejoin_restores_original_phrasing() {
        let seg = Segmenter::new().segment("prior art for ai and 5g");
        assert_eq!(seg.texts(), vec!["prior art for ai", "5g"]);
        let merged = rejoin(
            &seg.clauses[0].text,
            seg.clauses[1].boundary.as_deref(),
            &seg.clauses[1].text,
        );
        assert_eq!(merged, "prior art for ai and 5g");
    }
}
