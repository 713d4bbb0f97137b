use tree_sitter::Language;

/// A tree-sitter language paired with its highlights query.
#[derive(Debug, Clone)]
pub struct Grammar {
    name: String,
    language: Language,
    highlights_query: String,
}

impl Grammar {
    pub fn new(
        name: impl Into<String>,
        language: Language,
        highlights_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            highlights_query: highlights_query.into(),
        }
    }

    /// Go, with the highlights query bundled by tree-sitter-go
    pub fn go() -> Self {
        Self::new(
            "go",
            tree_sitter_go::LANGUAGE.into(),
            tree_sitter_go::HIGHLIGHTS_QUERY,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn highlights_query(&self) -> &str {
        &self.highlights_query
    }
}
