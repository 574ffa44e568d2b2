//! 静态工具画像：关键词、默认参数、产物类型
//!
//! 目录只给出名称与描述；已知工具在这里额外登记关键词列表、主参数名，以及
//! 「产出 / 消费」的中间产物类型，规划器据此连接 input_from。未登记的工具仍可规划，
//! 只是证据只来自名称与描述。

/// 步骤之间传递的中间产物类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    SearchResults,
    PriorArt,
    Claims,
    Analysis,
    Review,
    Guidance,
    Document,
}

/// 单个已知工具的静态画像
#[derive(Debug, Clone, Copy)]
pub struct ToolProfile {
    pub name: &'static str,
    /// 关键词短语（小写，按词匹配，不做子串匹配）
    pub keywords: &'static [&'static str],
    /// 子句文本填入的参数名
    pub primary_param: &'static str,
    pub produces: Option<Artifact>,
    /// 可消费的上游产物，按优先级排列
    pub consumes: &'static [Artifact],
    /// 是否附带请求中的文档上下文
    pub uses_document: bool,
}

/// 未登记工具的主参数名
pub const DEFAULT_PRIMARY_PARAM: &str = "query";
/// 上游输出注入的参数名
pub const CONTEXT_PARAM: &str = "context";
/// 文档上下文注入的参数名
pub const DOCUMENT_PARAM: &str = "document_context";

const PROFILES: &[ToolProfile] = &[
    ToolProfile {
        name: "web_search_tool",
        keywords: &[
            "web search",
            "search the web",
            "search online",
            "online search",
            "google",
            "look up",
            "internet",
        ],
        primary_param: "query",
        produces: Some(Artifact::SearchResults),
        consumes: &[],
        uses_document: false,
    },
    ToolProfile {
        name: "prior_art_search_tool",
        keywords: &[
            "prior art",
            "prior-art",
            "patent search",
            "novelty search",
            "existing patents",
        ],
        primary_param: "query",
        produces: Some(Artifact::PriorArt),
        consumes: &[],
        uses_document: false,
    },
    ToolProfile {
        name: "claim_drafting_tool",
        keywords: &["draft", "drafting", "write claims", "claims"],
        primary_param: "user_query",
        produces: Some(Artifact::Claims),
        consumes: &[Artifact::PriorArt, Artifact::SearchResults],
        uses_document: true,
    },
    ToolProfile {
        name: "claim_analysis_tool",
        keywords: &["analyze", "analyse", "claim analysis", "evaluate claims"],
        primary_param: "claims_text",
        produces: Some(Artifact::Analysis),
        consumes: &[Artifact::Claims],
        uses_document: true,
    },
    ToolProfile {
        name: "claim_review_tool",
        keywords: &["review", "review claims", "check claims"],
        primary_param: "claims_text",
        produces: Some(Artifact::Review),
        consumes: &[Artifact::Claims, Artifact::Analysis],
        uses_document: true,
    },
    ToolProfile {
        name: "patent_guidance_tool",
        keywords: &["guidance", "patentability", "how to file", "filing"],
        primary_param: "query",
        produces: Some(Artifact::Guidance),
        consumes: &[],
        uses_document: false,
    },
    ToolProfile {
        name: "document_drafting_tool",
        keywords: &[
            "write a document",
            "patent application",
            "specification",
            "disclosure",
        ],
        primary_param: "user_query",
        produces: Some(Artifact::Document),
        consumes: &[Artifact::PriorArt, Artifact::Claims],
        uses_document: true,
    },
];

/// 查找已知工具画像
pub fn profile(name: &str) -> Option<&'static ToolProfile> {
    PROFILES.iter().find(|p| p.name == name)
}

pub fn primary_param(name: &str) -> &'static str {
    profile(name)
        .map(|p| p.primary_param)
        .unwrap_or(DEFAULT_PRIMARY_PARAM)
}

pub fn keywords(name: &str) -> &'static [&'static str] {
    profile(name).map(|p| p.keywords).unwrap_or(&[])
}

/// consumer 能否消费 producer 的产物；返回匹配的优先级（越小越优先）
pub fn consumes_from(consumer: &str, producer: &str) -> Option<usize> {
    let produced = profile(producer)?.produces?;
    profile(consumer)?
        .consumes
        .iter()
        .position(|a| *a == produced)
}

pub fn uses_document(name: &str) -> bool {
    profile(name).map(|p| p.uses_document).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_profile_lookup() {
        assert_eq!(primary_param("claim_drafting_tool"), "user_query");
        assert_eq!(primary_param("web_search_tool"), "query");
        assert_eq!(primary_param("unknown_tool"), DEFAULT_PRIMARY_PARAM);
        assert!(keywords("unknown_tool").is_empty());
    }

    #[test]
    fn test_drafting_consumes_search_outputs() {
        assert_eq!(consumes_from("claim_drafting_tool", "prior_art_search_tool"), Some(0));
        assert_eq!(consumes_from("claim_drafting_tool", "web_search_tool"), Some(1));
        assert_eq!(consumes_from("web_search_tool", "prior_art_search_tool"), None);
        assert_eq!(consumes_from("claim_drafting_tool", "mystery_tool"), None);
    }

    #[test]
    fn test_profile_keywords_are_lowercase() {
        for p in PROFILES {
            for kw in p.keywords {
                assert_eq!(*kw, kw.to_lowercase(), "keyword {kw} of {}", p.name);
            }
        }
    }
}
