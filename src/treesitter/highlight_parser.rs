//! Tree-sitter backed implementation of [`LayerParser`].
//!
//! Runs the grammar's highlights query over a fresh (incrementally reused)
//! tree and groups captures into one layer per highlight category.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Mutex;

use tree_sitter::{
    ParseOptions, ParseState, Parser, Query, QueryCursor, StreamingIterator, Tree,
};

use super::incremental::compute_incremental_edit;
use crate::config::HighlightSettings;
use crate::document::{Layer, Region};
use crate::error::{HighlightError, HighlightResult, LockResultExt};
use crate::language::{Grammar, LayerParser, ParseCancellation};
use crate::text::CharOffsets;

const LOG_TARGET: &str = "highlight_sync::treesitter";

/// Last successfully parsed source and its tree, reused for incremental parsing
struct CachedTree {
    source: String,
    tree: Tree,
}

struct ParserState {
    parser: Parser,
    cache: Option<CachedTree>,
}

pub struct TreeSitterLayerParser {
    name: String,
    grammar: Grammar,
    query: Query,
    settings: HighlightSettings,
    state: Mutex<ParserState>,
}

impl std::fmt::Debug for TreeSitterLayerParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeSitterLayerParser")
            .field("name", &self.name)
            .field("grammar", &self.grammar.name())
            .finish()
    }
}

impl TreeSitterLayerParser {
    /// Build a parser for `grammar`, compiling its highlights query.
    pub fn new(grammar: Grammar, settings: HighlightSettings) -> HighlightResult<Self> {
        settings.validate()?;

        let mut parser = Parser::new();
        parser.set_language(grammar.language()).map_err(|e| {
            HighlightError::internal(format!(
                "failed to set language for {}: {}",
                grammar.name(),
                e
            ))
        })?;

        let query = Query::new(grammar.language(), grammar.highlights_query()).map_err(|e| {
            HighlightError::query(format!(
                "highlights query for {} at row {}, column {}: {}",
                grammar.name(),
                e.row,
                e.column,
                e.message
            ))
        })?;

        Ok(Self {
            name: format!("{}-syntax-highlight", grammar.name()),
            grammar,
            query,
            settings,
            state: Mutex::new(ParserState {
                parser,
                cache: None,
            }),
        })
    }

    /// Go highlighting with the given settings
    pub fn go(settings: HighlightSettings) -> HighlightResult<Self> {
        Self::new(Grammar::go(), settings)
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Drop the cached tree so the next parse starts from scratch
    pub fn clear_cache(&self) {
        self.state.lock().recover_poison("TreeSitterLayerParser::clear_cache").cache = None;
    }

    /// Parse `text`, reusing the cached tree when there is one.
    ///
    /// Tree-sitter polls `cancel` while parsing; an aborted parse resets the
    /// parser and leaves the cache as it was.
    fn parse_tree(&self, text: &str, cancel: &ParseCancellation) -> HighlightResult<Tree> {
        let mut state = self.state.lock().recover_poison("TreeSitterLayerParser::parse");
        let ParserState { parser, cache } = &mut *state;

        let old_tree = match cache.as_ref() {
            Some(cached) => match compute_incremental_edit(&cached.source, text) {
                Some(edit) => {
                    let mut old_tree = cached.tree.clone();
                    old_tree.edit(&edit);
                    log::trace!(
                        target: LOG_TARGET,
                        "Incremental parse: edit at byte {}..{} -> {}..{}",
                        edit.start_byte,
                        edit.old_end_byte,
                        edit.start_byte,
                        edit.new_end_byte
                    );
                    Some(old_tree)
                }
                None => {
                    log::trace!(target: LOG_TARGET, "Source unchanged, reusing cached tree");
                    cancel.check()?;
                    return Ok(cached.tree.clone());
                }
            },
            None => None,
        };

        let bytes = text.as_bytes();
        let mut progress = |_: &ParseState| {
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let tree = parser.parse_with_options(
            &mut |byte, _| bytes.get(byte..).unwrap_or_default(),
            old_tree.as_ref(),
            Some(ParseOptions::new().progress_callback(&mut progress)),
        );

        let tree = match tree {
            Some(tree) => tree,
            None if cancel.is_cancelled() => {
                parser.reset();
                log::trace!(target: LOG_TARGET, "{}: parse aborted by cancellation", self.name);
                return Err(HighlightError::Cancelled);
            }
            None => {
                parser.reset();
                *cache = None;
                return Err(HighlightError::parse(format!(
                    "tree-sitter produced no tree for {}",
                    self.grammar.name()
                )));
            }
        };

        // A superseded parse leaves the cache as it was
        cancel.check()?;

        *cache = Some(CachedTree {
            source: text.to_owned(),
            tree: tree.clone(),
        });
        Ok(tree)
    }

    /// Run the highlights query and group captures into layers
    fn extract_layers(
        &self,
        text: &str,
        tree: &Tree,
        cancel: &ParseCancellation,
    ) -> HighlightResult<Vec<Layer>> {
        let offsets = CharOffsets::new(text);
        let capture_names = self.query.capture_names();
        let interval = self.settings.cancel_check_interval.max(1);

        let mut grouped: BTreeMap<String, Vec<Region>> = BTreeMap::new();
        let mut cursor = QueryCursor::new();
        let mut captures = cursor.captures(&self.query, tree.root_node(), text.as_bytes());
        let mut processed = 0usize;

        while let Some((query_match, capture_idx)) = captures.next() {
            processed += 1;
            if processed % interval == 0 {
                cancel.check()?;
            }

            let capture = &query_match.captures[*capture_idx];
            let kind = capture_names[capture.index as usize];
            // Captures prefixed with `_` are query helpers, not highlights
            if kind.starts_with('_') {
                continue;
            }
            let range = capture.node.byte_range();
            let region = Region::new(
                offsets.byte_to_char(range.start),
                offsets.byte_to_char(range.end),
                kind,
            );
            let layer_name = self.settings.layer_name(region.category()).to_string();
            grouped.entry(layer_name).or_default().push(region);
        }

        cancel.check()?;

        Ok(grouped
            .into_iter()
            .map(|(name, mut regions)| {
                regions.sort_by(|a, b| (a.start, a.end, &a.kind).cmp(&(b.start, b.end, &b.kind)));
                regions.dedup();
                Layer::with_regions(name, regions)
            })
            .collect())
    }
}

impl LayerParser for TreeSitterLayerParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str, cancel: &ParseCancellation) -> HighlightResult<Vec<Layer>> {
        cancel.check()?;

        let tree = self.parse_tree(text, cancel)?;
        if self.settings.reject_error_trees && tree.root_node().has_error() {
            return Err(HighlightError::parse(format!(
                "syntax error in {} source",
                self.grammar.name()
            )));
        }

        let layers = self.extract_layers(text, &tree, cancel)?;
        log::debug!(
            target: LOG_TARGET,
            "{}: {} layers, {} regions",
            self.name,
            layers.len(),
            layers.iter().map(|l| l.regions.len()).sum::<usize>()
        );
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    const SOURCE: &str = r#"package main

// greet says hello
func greet() string {
	return "hi"
}
"#;

    fn layer<'a>(layers: &'a [Layer], name: &str) -> Option<&'a Layer> {
        layers.iter().find(|l| l.name == name)
    }

    fn covered_text(text: &str, region: &Region) -> String {
        text.chars()
            .skip(region.start)
            .take(region.end - region.start)
            .collect()
    }

    #[test]
    fn test_go_parser_name() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        assert_eq!(parser.name(), "go-syntax-highlight");
    }

    #[test]
    fn test_parse_produces_category_layers() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let layers = parser.parse(SOURCE, &ParseCancellation::new()).unwrap();

        let keywords = layer(&layers, "keyword").expect("keyword layer");
        let keyword_text: Vec<String> = keywords
            .regions
            .iter()
            .map(|r| covered_text(SOURCE, r))
            .collect();
        assert!(keyword_text.contains(&"package".to_string()));
        assert!(keyword_text.contains(&"func".to_string()));
        assert!(keyword_text.contains(&"return".to_string()));

        let comments = layer(&layers, "comment").expect("comment layer");
        assert_eq!(comments.regions.len(), 1);
        assert_eq!(
            covered_text(SOURCE, &comments.regions[0]),
            "// greet says hello"
        );

        let strings = layer(&layers, "string").expect("string layer");
        assert!(
            strings
                .regions
                .iter()
                .any(|r| covered_text(SOURCE, r) == "\"hi\"")
        );
    }

    #[test]
    fn test_layers_are_sorted_by_name() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let layers = parser.parse(SOURCE, &ParseCancellation::new()).unwrap();
        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_unicode_offsets_are_chars() {
        let source = "package main\n\n// héllo wörld\nvar s = \"日本\"\n";
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let layers = parser.parse(source, &ParseCancellation::new()).unwrap();

        let comments = layer(&layers, "comment").expect("comment layer");
        assert_eq!(
            (comments.regions[0].start, comments.regions[0].end),
            (14, 28)
        );

        let strings = layer(&layers, "string").expect("string layer");
        assert!(
            strings
                .regions
                .iter()
                .any(|r| (r.start, r.end) == (37, 41)),
            "string regions: {:?}",
            strings.regions
        );
    }

    #[test]
    fn test_regions_land_in_their_category_layer() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(len(\"x\"))\n}\n";
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let layers = parser.parse(source, &ParseCancellation::new()).unwrap();

        // Dotted captures such as `function.method` share their category's layer
        assert!(
            layers.iter().flat_map(|l| &l.regions).any(|r| r.kind.contains('.')),
            "no dotted captures in {layers:?}"
        );
        for layer in &layers {
            assert!(!layer.name.contains('.'));
            for region in &layer.regions {
                assert_eq!(region.category(), layer.name);
            }
        }
    }

    #[test]
    fn test_layer_name_overrides() {
        let mut settings = HighlightSettings::default();
        settings
            .layer_names
            .insert("keyword".to_string(), "kw".to_string());
        let parser = TreeSitterLayerParser::go(settings).unwrap();
        let layers = parser.parse(SOURCE, &ParseCancellation::new()).unwrap();

        assert!(layer(&layers, "kw").is_some());
        assert!(layer(&layers, "keyword").is_none());
    }

    #[test]
    fn test_cancelled_parse_returns_cancelled() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let cancel = ParseCancellation::new();
        cancel.cancel();

        let result = parser.parse(SOURCE, &cancel);
        assert!(matches!(result, Err(HighlightError::Cancelled)));
        assert!(parser.state.lock().unwrap().cache.is_none());
    }

    fn large_source(functions: usize) -> String {
        let mut source = String::from("package main\n\n");
        for i in 0..functions {
            source.push_str(&format!(
                "func f{i}(a int, b string) int {{\n\treturn a + len(b) // {i}\n}}\n\n"
            ));
        }
        source
    }

    #[test]
    fn test_cancel_aborts_large_parse_mid_flight() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        parser.parse(SOURCE, &ParseCancellation::new()).unwrap();
        let large = large_source(60_000);

        let cancel = ParseCancellation::new();
        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(1));
                cancel.cancel();
                Instant::now()
            })
        };

        let result = parser.parse_tree(&large, &cancel);
        let returned_at = Instant::now();
        let cancelled_at = canceller.join().unwrap();

        assert!(matches!(result, Err(HighlightError::Cancelled)));
        let lag = returned_at.saturating_duration_since(cancelled_at);
        assert!(lag < Duration::from_millis(250), "parse kept running for {lag:?}");

        // The tree from the last completed parse is still cached
        let state = parser.state.lock().unwrap();
        assert_eq!(state.cache.as_ref().map(|c| c.source.as_str()), Some(SOURCE));
    }

    #[test]
    fn test_parse_after_aborted_parse_starts_fresh() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let expected = parser.parse(SOURCE, &ParseCancellation::new()).unwrap();

        let cancel = ParseCancellation::new();
        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(1));
                cancel.cancel();
            })
        };
        let aborted = parser.parse(&large_source(60_000), &cancel);
        canceller.join().unwrap();
        assert!(matches!(aborted, Err(HighlightError::Cancelled)));

        let edited = SOURCE.replace("hi", "hello");
        let fresh = TreeSitterLayerParser::go(HighlightSettings::default())
            .unwrap()
            .parse(&edited, &ParseCancellation::new())
            .unwrap();
        let layers = parser.parse(&edited, &ParseCancellation::new()).unwrap();
        assert_eq!(layers, fresh);
        assert_ne!(layers, expected);
    }

    #[test]
    fn test_error_trees_are_highlighted_by_default() {
        let parser = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let result = parser.parse("package main\nfunc (", &ParseCancellation::new());
        assert!(result.is_ok());
    }

    #[test]
    fn test_reject_error_trees() {
        let settings = HighlightSettings {
            reject_error_trees: true,
            ..Default::default()
        };
        let parser = TreeSitterLayerParser::go(settings).unwrap();
        let result = parser.parse("package main\nfunc (", &ParseCancellation::new());
        assert!(matches!(result, Err(HighlightError::Parse { .. })));

        // Valid source still parses after a failure
        assert!(parser.parse(SOURCE, &ParseCancellation::new()).is_ok());
    }

    #[test]
    fn test_incremental_parse_matches_fresh_parse() {
        let incremental = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        let cancel = ParseCancellation::new();
        incremental.parse(SOURCE, &cancel).unwrap();

        let edited = SOURCE.replace("\"hi\"", "\"hello\" + name");
        let reused = incremental.parse(&edited, &cancel).unwrap();

        let fresh = TreeSitterLayerParser::go(HighlightSettings::default()).unwrap();
        assert_eq!(reused, fresh.parse(&edited, &cancel).unwrap());
    }

    #[test]
    fn test_invalid_query_is_reported() {
        let grammar = Grammar::new(
            "go",
            tree_sitter_go::LANGUAGE.into(),
            "(not_a_node) @keyword",
        );
        let result = TreeSitterLayerParser::new(grammar, HighlightSettings::default());
        assert!(matches!(result, Err(HighlightError::Query { .. })));
    }
}
