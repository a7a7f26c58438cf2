//! Whittle Purge - usage-based CSS reduction
//!
//! Reduces a stylesheet against a usage corpus: a style rule survives only
//! if at least one of its selectors matches the corpus document. Structural
//! at-rules (`@keyframes`, `@font-face`) are retained by configuration, not
//! by selector matching; conditional groups (`@media`, `@supports`) are
//! reduced recursively and dropped when they end up empty.
//!
//! Parsing is deliberately forgiving: unparseable selectors and unbalanced
//! trailing input are kept verbatim, so a broken stylesheet degrades to a
//! less-reduced one rather than aborting the run.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use scraper::{Html, Selector};

/// Recognized reduction options
///
/// Mirrors the knobs the reduction pipeline actually sets; no open-ended
/// option map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOptions {
    /// Retain `@keyframes` blocks structurally
    pub keyframes: bool,
    /// Retain `@font-face` blocks structurally
    pub font_face: bool,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            keyframes: true,
            font_face: true,
        }
    }
}

/// Reduce `css` against `corpus_html`
///
/// Returns the surviving stylesheet text, one block per line.
#[must_use]
pub fn reduce_stylesheet(css: &str, corpus_html: &str, options: &PurgeOptions) -> String {
    let corpus = Html::parse_document(corpus_html);
    let kept = reduce_blocks(css, &corpus, options);
    kept.join("\n")
}

fn reduce_blocks(css: &str, corpus: &Html, options: &PurgeOptions) -> Vec<String> {
    let mut kept = Vec::new();

    for block in split_blocks(css) {
        match block {
            Block::Rule { selectors, body } => {
                if selectors
                    .split(',')
                    .any(|selector| selector_in_use(corpus, selector))
                {
                    kept.push(format!("{}{{{}}}", selectors, body));
                } else {
                    tracing::trace!(selectors = selectors.trim(), "dropping unused rule");
                }
            }
            Block::AtStatement(text) => kept.push(text),
            Block::AtBlock { prelude, body } => {
                let name = at_rule_name(&prelude);
                match name.as_str() {
                    "keyframes" | "-webkit-keyframes" | "-moz-keyframes" => {
                        if options.keyframes {
                            kept.push(format!("{}{{{}}}", prelude, body));
                        }
                    }
                    "font-face" => {
                        if options.font_face {
                            kept.push(format!("{}{{{}}}", prelude, body));
                        }
                    }
                    "media" | "supports" => {
                        let inner = reduce_blocks(&body, corpus, options);
                        if !inner.is_empty() {
                            kept.push(format!("{}{{{}}}", prelude, inner.join("\n")));
                        }
                    }
                    // @page, @counter-style, and anything unrecognized stays.
                    _ => kept.push(format!("{}{{{}}}", prelude, body)),
                }
            }
            Block::Verbatim(text) => {
                // Unbalanced tail: keep it rather than guess.
                kept.push(text);
            }
        }
    }

    kept
}

/// One top-level stylesheet block
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    /// `selectors { body }`
    Rule { selectors: String, body: String },
    /// Statement at-rule such as `@import url(...);`
    AtStatement(String),
    /// Block at-rule such as `@media (...) { ... }`
    AtBlock { prelude: String, body: String },
    /// Unparseable trailing input, kept as-is
    Verbatim(String),
}

/// Split a stylesheet into top-level blocks by brace depth
///
/// Comment- and string-aware; no grammar beyond that.
fn split_blocks(css: &str) -> Vec<Block> {
    let bytes = css.as_bytes();
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let mut brace = None;

        // Scan for the end of one block: `;` at depth zero or a balanced
        // `{ ... }` pair.
        let mut depth = 0usize;
        let mut end = None;
        let mut cursor = pos;
        while cursor < bytes.len() {
            match bytes[cursor] {
                b'/' if bytes.get(cursor + 1) == Some(&b'*') => {
                    cursor = skip_comment(bytes, cursor);
                    continue;
                }
                quote @ (b'"' | b'\'') => {
                    cursor = skip_string(bytes, cursor, quote);
                    continue;
                }
                b'{' => {
                    if depth == 0 {
                        brace = Some(cursor);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = Some(cursor);
                        break;
                    }
                }
                b';' if depth == 0 => {
                    end = Some(cursor);
                    break;
                }
                _ => {}
            }
            cursor += 1;
        }

        let Some(end) = end else {
            // Ran off the end mid-block.
            let tail = css[start..].trim();
            if !tail.is_empty() {
                blocks.push(Block::Verbatim(tail.to_string()));
            }
            break;
        };
        pos = end + 1;

        match brace {
            None => {
                let statement = css[start..=end].trim();
                if !statement.is_empty() && statement != ";" {
                    blocks.push(Block::AtStatement(statement.to_string()));
                }
            }
            Some(brace) => {
                let prelude = css[start..brace].trim();
                let body = &css[brace + 1..end];
                if prelude.starts_with('@') {
                    blocks.push(Block::AtBlock {
                        prelude: prelude.to_string(),
                        body: body.to_string(),
                    });
                } else if !prelude.is_empty() {
                    blocks.push(Block::Rule {
                        selectors: prelude.to_string(),
                        body: body.to_string(),
                    });
                }
            }
        }
    }

    blocks
}

fn skip_comment(bytes: &[u8], mut cursor: usize) -> usize {
    cursor += 2;
    while cursor < bytes.len() {
        if bytes[cursor] == b'*' && bytes.get(cursor + 1) == Some(&b'/') {
            return cursor + 2;
        }
        cursor += 1;
    }
    bytes.len()
}

fn skip_string(bytes: &[u8], mut cursor: usize, quote: u8) -> usize {
    cursor += 1;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'\\' => cursor += 2,
            byte if byte == quote => return cursor + 1,
            _ => cursor += 1,
        }
    }
    bytes.len()
}

/// At-rule name without the `@`, lowercased
fn at_rule_name(prelude: &str) -> String {
    prelude
        .trim_start_matches('@')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Does a single selector match anything in the corpus?
///
/// Pseudo-classes and pseudo-elements are stripped before matching (a rule
/// on `.btn:hover` is in use whenever `.btn` exists). Selectors the matcher
/// cannot parse are treated as in use.
fn selector_in_use(corpus: &Html, selector: &str) -> bool {
    let stripped = strip_pseudo(selector);
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return true;
    }
    let parsed = match Selector::parse(stripped) {
        Ok(parsed) => parsed,
        Err(_) => return true,
    };
    corpus.select(&parsed).next().is_some()
}

/// Remove pseudo-class/pseudo-element segments from a selector
fn strip_pseudo(selector: &str) -> String {
    let bytes = selector.as_bytes();
    let mut out = String::with_capacity(selector.len());
    let mut cursor = 0;

    while cursor < bytes.len() {
        match bytes[cursor] {
            b':' => {
                // Skip `:` / `::`, the ident, and any functional arguments.
                while cursor < bytes.len() && bytes[cursor] == b':' {
                    cursor += 1;
                }
                while cursor < bytes.len()
                    && (bytes[cursor].is_ascii_alphanumeric() || bytes[cursor] == b'-')
                {
                    cursor += 1;
                }
                if bytes.get(cursor) == Some(&b'(') {
                    let mut parens = 0usize;
                    while cursor < bytes.len() {
                        match bytes[cursor] {
                            b'(' => parens += 1,
                            b')' => {
                                parens -= 1;
                                if parens == 0 {
                                    cursor += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        cursor += 1;
                    }
                }
            }
            b'[' => {
                // Attribute selectors may contain `:` in quoted values.
                let close = bytes[cursor..]
                    .iter()
                    .position(|b| *b == b']')
                    .map_or(bytes.len(), |offset| cursor + offset + 1);
                out.push_str(&selector[cursor..close]);
                cursor = close;
            }
            _ => {
                out.push(bytes[cursor] as char);
                cursor += 1;
            }
        }
    }

    let trimmed = out.trim();
    // A selector that was nothing but pseudo parts attaches to everything.
    if trimmed.is_empty() || trimmed.ends_with(['>', '+', '~']) {
        return "*".to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CORPUS: &str = r#"<html><body>
        <div class="used" id="main"><span class="nested">x</span></div>
    </body></html>"#;

    fn reduce(css: &str) -> String {
        reduce_stylesheet(css, CORPUS, &PurgeOptions::default())
    }

    #[test]
    fn unused_class_rule_is_dropped() {
        let css = ".used{color:red}.unused{color:blue}";
        assert_eq!(reduce(css), ".used{color:red}");
    }

    #[test]
    fn tag_and_id_selectors_match() {
        let css = "span{a:b}#main{c:d}#absent{e:f}";
        assert_eq!(reduce(css), "span{a:b}\n#main{c:d}");
    }

    #[test]
    fn pseudo_classes_are_stripped_before_matching() {
        let css = ".used:hover{a:b}.unused:hover{c:d}.nested::before{e:f}";
        assert_eq!(reduce(css), ".used:hover{a:b}\n.nested::before{e:f}");
    }

    #[test]
    fn rule_survives_if_any_selector_matches() {
        let css = ".unused, .used{a:b}";
        assert_eq!(reduce(css), ".unused, .used{a:b}");
    }

    #[test]
    fn keyframes_and_font_face_are_structural() {
        let css = "@keyframes spin{from{a:b}}@font-face{font-family:x}";
        assert_eq!(
            reduce(css),
            "@keyframes spin{from{a:b}}\n@font-face{font-family:x}"
        );

        let none = PurgeOptions {
            keyframes: false,
            font_face: false,
        };
        assert_eq!(reduce_stylesheet(css, CORPUS, &none), "");
    }

    #[test]
    fn media_blocks_recurse_and_drop_when_empty() {
        let css = "@media (min-width: 100px){.used{a:b}.unused{c:d}}";
        assert_eq!(reduce(css), "@media (min-width: 100px){.used{a:b}}");

        let css = "@media (min-width: 100px){.unused{c:d}}";
        assert_eq!(reduce(css), "");
    }

    #[test]
    fn import_statements_are_kept() {
        let css = "@import url(\"x.css\");.unused{a:b}";
        assert_eq!(reduce(css), "@import url(\"x.css\");");
    }

    #[test]
    fn unparseable_selector_is_kept() {
        let css = ".used{a:b}%%%{c:d}";
        assert_eq!(reduce(css), ".used{a:b}\n%%%{c:d}");
    }

    #[test]
    fn unbalanced_tail_is_kept_verbatim() {
        let css = ".used{a:b}.broken{c:d";
        assert_eq!(reduce(css), ".used{a:b}\n.broken{c:d");
    }

    #[test]
    fn comments_and_strings_do_not_confuse_the_scanner() {
        // The brace inside the comment and the one inside the string must not
        // terminate the block; the comment itself rides along in the prelude.
        let css = "/* } not a close */.used{content:\"}\"}";
        assert_eq!(reduce(css), "/* } not a close */.used{content:\"}\"}");
    }

    #[test]
    fn bare_pseudo_selector_attaches_to_everything() {
        assert_eq!(strip_pseudo(":hover"), "*");
        assert_eq!(strip_pseudo("div > :first-child"), "*");
        assert_eq!(strip_pseudo(".a:not(.b)"), ".a");
    }
}
