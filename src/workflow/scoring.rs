//! 子句 → 工具打分
//!
//! 三类证据：静态关键词短语（按词连续匹配，得分 = 短语词数）、工具名分词命中数、
//! 描述中的实词命中数。排序键为 (关键词分, 名称分 + 描述分, 目录位置靠前)，因此结果只依赖输入，
//! 对同一 (文本, 目录) 总是得到相同的选择。

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::tools::{catalog, ToolDirectory};

/// 描述中不计入证据的常见词
const STOPWORDS: &[&str] = &[
    "about", "based", "from", "given", "into", "that", "their", "them", "then", "this", "tool",
    "tools", "using", "what", "when", "where", "which", "will", "with", "your", "provide",
    "provides", "return", "returns", "user", "users", "also", "other", "some", "such", "have",
];

/// 分词并归一化：小写、去掉首尾标点、简单去复数
pub fn normalize_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == '_' || c == '/' || c == ',' || c == ';')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|w| !w.is_empty())
        .map(|w| stem(&w.to_lowercase()))
        .collect()
}

fn stem(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// 单个工具对某子句的得分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolScore {
    pub tool: String,
    /// 在目录中的位置
    pub position: usize,
    pub keyword: u32,
    pub name: u32,
    pub name_complete: bool,
    pub description: u32,
}

impl ToolScore {
    /// 是否构成「识别到该动作」的证据
    pub fn is_match(&self) -> bool {
        self.keyword > 0 || self.name_complete || self.description >= 2
    }

    fn specificity(&self) -> u32 {
        self.name + self.description
    }

    /// 排名比较：Greater 表示 self 更优
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.keyword
            .cmp(&other.keyword)
            .then(self.specificity().cmp(&other.specificity()))
            .then(other.position.cmp(&self.position))
    }
}

struct IndexedTool {
    name: String,
    keywords: Vec<Vec<String>>,
    name_tokens: Vec<String>,
    description_tokens: HashSet<String>,
}

/// 针对单个目录预先分词的打分索引
pub struct ScoringIndex {
    tools: Vec<IndexedTool>,
}

impl ScoringIndex {
    pub fn new(directory: &ToolDirectory) -> Self {
        let tools = directory
            .iter()
            .map(|spec| {
                let keywords = catalog::keywords(&spec.name)
                    .iter()
                    .map(|k| normalize_tokens(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                let name_tokens = normalize_tokens(&spec.name)
                    .into_iter()
                    .filter(|t| t != "tool")
                    .collect();
                let description_tokens = spec
                    .description
                    .split_whitespace()
                    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                    .filter(|w| w.len() >= 4 && !STOPWORDS.contains(&w.as_str()))
                    .map(|w| stem(&w))
                    .collect();
                IndexedTool {
                    name: spec.name.clone(),
                    keywords,
                    name_tokens,
                    description_tokens,
                }
            })
            .collect();
        Self { tools }
    }

    /// 对归一化后的子句逐个工具打分（目录顺序）
    pub fn score(&self, clause_tokens: &[String]) -> Vec<ToolScore> {
        let present: HashSet<&str> = clause_tokens.iter().map(String::as_str).collect();
        self.tools
            .iter()
            .enumerate()
            .map(|(position, tool)| {
                let keyword = tool
                    .keywords
                    .iter()
                    .filter(|k| contains_phrase(clause_tokens, k))
                    .map(|k| k.len() as u32)
                    .sum();
                let name = tool
                    .name_tokens
                    .iter()
                    .filter(|t| present.contains(t.as_str()))
                    .count() as u32;
                let name_complete =
                    !tool.name_tokens.is_empty() && name as usize == tool.name_tokens.len();
                let description = tool
                    .description_tokens
                    .iter()
                    .filter(|t| present.contains(t.as_str()))
                    .count() as u32;
                ToolScore {
                    tool: tool.name.clone(),
                    position,
                    keyword,
                    name,
                    name_complete,
                    description,
                }
            })
            .collect()
    }

    /// 子句的最佳匹配工具（无匹配时为 None）
    pub fn best(&self, clause: &str) -> Option<ToolScore> {
        let tokens = normalize_tokens(clause);
        let best = self
            .score(&tokens)
            .into_iter()
            .filter(ToolScore::is_match)
            .max_by(|a, b| a.rank_cmp(b));
        if let Some(score) = &best {
            tracing::debug!(
                clause = %clause,
                tool = %score.tool,
                keyword = score.keyword,
                name = score.name,
                description = score.description,
                "clause resolved"
            );
        }
        best
    }

    /// 文本中有证据的全部工具（目录顺序）
    pub fn matching_tools(&self, text: &str) -> Vec<String> {
        let tokens = normalize_tokens(text);
        self.score(&tokens)
            .into_iter()
            .filter(ToolScore::is_match)
            .map(|s| s.tool)
            .collect()
    }
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty()
        && tokens.len() >= phrase.len()
        && tokens.windows(phrase.len()).any(|w| w == phrase)
}
