use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of web resource handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutType {
    Css,
    Javascript,
    Html,
    Png,
    Jpeg,
    Gif,
    Woff,
    SourceMap,
}

impl NutType {
    pub const ALL: [NutType; 8] = [
        NutType::Css,
        NutType::Javascript,
        NutType::Html,
        NutType::Png,
        NutType::Jpeg,
        NutType::Gif,
        NutType::Woff,
        NutType::SourceMap,
    ];

    /// Extensions recognized for this type, the first one being canonical.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            NutType::Css => &[".css"],
            NutType::Javascript => &[".js"],
            NutType::Html => &[".html", ".htm"],
            NutType::Png => &[".png"],
            NutType::Jpeg => &[".jpg", ".jpeg"],
            NutType::Gif => &[".gif"],
            NutType::Woff => &[".woff", ".woff2"],
            NutType::SourceMap => &[".map"],
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            NutType::Css => "text/css",
            NutType::Javascript => "text/javascript",
            NutType::Html => "text/html",
            NutType::Png => "image/png",
            NutType::Jpeg => "image/jpeg",
            NutType::Gif => "image/gif",
            NutType::Woff => "font/woff",
            NutType::SourceMap => "application/json",
        }
    }

    /// Whether the content is text that can be concatenated with its peers.
    pub fn is_aggregatable(self) -> bool {
        matches!(
            self,
            NutType::Css | NutType::Javascript | NutType::Html | NutType::SourceMap
        )
    }

    /// Looks the type up from a path's extension, case-insensitively.
    pub fn for_path(path: &str) -> Option<NutType> {
        let lower = path.to_ascii_lowercase();
        NutType::ALL
            .into_iter()
            .find(|t| t.extensions().iter().any(|ext| lower.ends_with(ext)))
    }
}

impl fmt::Display for NutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical extension without the leading dot
        write!(f, "{}", &self.extensions()[0][1..])
    }
}
