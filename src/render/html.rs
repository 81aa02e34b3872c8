/// HTML renderer
use std::collections::HashMap;

use html_escape::encode_double_quoted_attribute as escape;
use tracing::warn;

use crate::ast::{Alignment, ListType, NodeId, NodeKind, Tree, WalkStatus};
use crate::error::{Error, Result};
use crate::options::Options;

use super::{NodeRenderer, RenderContext, render_subtree};

/// CommonMark-style HTML.
pub struct HtmlRenderer<'a> {
    tree: &'a Tree,
    options: &'a Options,
    ctx: RenderContext,
    /// Generated ids of headings without an explicit one, when the document
    /// has a table of contents.
    heading_ids: HashMap<NodeId, String>,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(tree: &'a Tree, options: &'a Options) -> Self {
        let mut renderer = HtmlRenderer {
            tree,
            options,
            ctx: RenderContext::new("\n"),
            heading_ids: HashMap::new(),
        };
        if has_toc(tree) {
            renderer.heading_ids = generate_heading_ids(tree);
        }
        renderer
    }

    pub fn render(mut self) -> String {
        super::render(&mut self)
    }

    fn write(&mut self, s: &str) {
        self.ctx.write_str(s);
    }

    fn write_escaped(&mut self, s: &str) {
        self.ctx.write_str(&escape(s));
    }

    fn heading_id(&self, heading: NodeId) -> Option<String> {
        self.tree
            .child_by_kind(heading, |k| matches!(k, NodeKind::HeadingId))
            .map(|id| self.tree.tokens(id).to_string())
            .or_else(|| self.heading_ids.get(&heading).cloned())
    }

    fn in_tight_item(&self, node: NodeId) -> bool {
        matches!(
            self.tree.parent(node).map(|p| self.tree.kind(p)),
            Some(NodeKind::ListItem(data)) if data.tight
        )
    }

    fn link_parts(&self, link: NodeId, kind: &'static str) -> Result<(String, Option<String>)> {
        let dest = self
            .tree
            .child_by_kind(link, |k| matches!(k, NodeKind::LinkDest))
            .ok_or_else(|| Error::missing_child(link, kind, "link-dest"))?;
        let title = self
            .tree
            .child_by_kind(link, |k| matches!(k, NodeKind::LinkTitle))
            .map(|t| self.tree.tokens(t).to_string());
        Ok((self.tree.tokens(dest).to_string(), title))
    }

    fn render_code_block(&mut self, node: NodeId) -> Result<()> {
        let code = self
            .tree
            .child_by_kind(node, |k| matches!(k, NodeKind::CodeBlockCode))
            .ok_or_else(|| Error::missing_child(node, "code-block", "code-block-code"))?;
        let language = self.tree.children(node).find_map(|c| match self.tree.kind(c) {
            NodeKind::CodeBlockFenceInfoMarker { info } => {
                info.split_whitespace().next().map(str::to_string)
            }
            _ => None,
        });

        self.ctx.newline();
        match language {
            Some(lang) => {
                self.write("<pre><code class=\"language-");
                self.write_escaped(&lang);
                self.write("\">");
            }
            None => self.write("<pre><code>"),
        }
        let tree = self.tree;
        self.write_escaped(tree.tokens(code));
        self.write("</code></pre>\n");
        Ok(())
    }

    fn render_footnote_def(&mut self, node: NodeId) -> Result<()> {
        let kind = self.tree.kind(node);
        if !matches!(kind, NodeKind::FootnotesDef { .. }) {
            return Err(Error::unexpected(node, "footnotes-def", kind.name()));
        }
        render_subtree(self, node)?;
        Ok(())
    }

    fn render_toc(&mut self) {
        let tree = self.tree;
        let mut headings = Vec::new();
        tree.walk(tree.root(), &mut |n, entering| {
            if entering && let NodeKind::Heading { level, .. } = tree.kind(n) {
                headings.push((*level, n));
                return WalkStatus::SkipChildren;
            }
            WalkStatus::Continue
        });

        self.ctx.newline();
        self.write("<div class=\"toc\">\n");
        let mut levels: Vec<u8> = Vec::new();
        for (level, heading) in headings {
            match levels.last() {
                Some(&last) if level <= last => {
                    while levels.len() > 1 && levels.last().is_some_and(|&l| level < l) {
                        self.write("</li>\n</ul>\n");
                        levels.pop();
                    }
                    self.write("</li>\n");
                }
                _ => {
                    if !levels.is_empty() {
                        self.write("\n");
                    }
                    self.write("<ul>\n");
                    levels.push(level);
                }
            }
            self.write("<li><a href=\"#");
            let id = self.heading_id(heading).unwrap_or_default();
            self.write_escaped(&id);
            self.write("\">");
            self.write_escaped(&tree.inline_text(heading));
            self.write("</a>");
        }
        for _ in levels {
            self.write("</li>\n</ul>\n");
        }
        self.write("</div>\n");
    }
}

impl NodeRenderer for HtmlRenderer<'_> {
    fn tree(&self) -> &Tree {
        self.tree
    }

    fn context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus> {
        let tree = self.tree;
        match tree.kind(node) {
            NodeKind::Document => {}
            NodeKind::Paragraph => {
                if !self.in_tight_item(node) {
                    if entering {
                        self.ctx.newline();
                        self.write("<p>");
                    } else {
                        self.write("</p>\n");
                    }
                }
            }
            NodeKind::Heading { level, .. } => {
                if entering {
                    self.ctx.newline();
                    self.write(&format!("<h{}", level));
                    if let Some(id) = self.heading_id(node) {
                        self.write(" id=\"");
                        self.write_escaped(&id);
                        self.write("\"");
                    }
                    self.write(">");
                } else {
                    self.write(&format!("</h{}>\n", level));
                }
            }
            NodeKind::HeadingId => return Ok(WalkStatus::SkipChildren),
            NodeKind::Blockquote => {
                self.ctx.newline();
                self.write(if entering {
                    "<blockquote>\n"
                } else {
                    "</blockquote>\n"
                });
            }
            NodeKind::List(data) => {
                self.ctx.newline();
                let ordered = data.bullet_char == 0;
                match (entering, ordered) {
                    (true, true) if data.start != 1 => {
                        self.write(&format!("<ol start=\"{}\">\n", data.start))
                    }
                    (true, true) => self.write("<ol>\n"),
                    (true, false) if data.typ == ListType::Task => {
                        self.write("<ul class=\"contains-task-list\">\n")
                    }
                    (true, false) => self.write("<ul>\n"),
                    (false, true) => self.write("</ol>\n"),
                    (false, false) => self.write("</ul>\n"),
                }
            }
            NodeKind::ListItem(data) => {
                if entering {
                    self.ctx.newline();
                    if data.typ == ListType::Task {
                        self.write("<li class=\"task-list-item\">");
                    } else {
                        self.write("<li>");
                    }
                } else {
                    self.write("</li>\n");
                }
            }
            NodeKind::TaskListItemMarker { checked } => {
                if entering {
                    if *checked {
                        self.write("<input checked=\"\" disabled=\"\" type=\"checkbox\" /> ");
                    } else {
                        self.write("<input disabled=\"\" type=\"checkbox\" /> ");
                    }
                }
            }
            NodeKind::ThematicBreak => {
                if entering {
                    self.ctx.newline();
                    self.write("<hr />\n");
                }
            }
            NodeKind::CodeBlock { .. } => {
                self.render_code_block(node)?;
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::MathBlock { .. } => {
                let content = tree
                    .child_by_kind(node, |k| matches!(k, NodeKind::MathBlockContent))
                    .ok_or_else(|| Error::missing_child(node, "math-block", "math-block-content"))?;
                self.ctx.newline();
                self.write("<div class=\"language-math\">");
                self.write_escaped(tree.tokens(content));
                self.write("</div>\n");
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::HtmlBlock { .. } => {
                self.ctx.newline();
                self.write(tree.tokens(node).trim_end_matches('\n'));
                self.write("\n");
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Table { .. } => {
                if entering {
                    self.ctx.newline();
                    self.write("<table>\n");
                } else {
                    let has_body = tree
                        .last_child(node)
                        .is_some_and(|c| matches!(tree.kind(c), NodeKind::TableRow));
                    if has_body {
                        self.write("</tbody>\n");
                    }
                    self.write("</table>\n");
                }
            }
            NodeKind::TableHead => {
                self.write(if entering {
                    "<thead>\n<tr>\n"
                } else {
                    "</tr>\n</thead>\n"
                });
            }
            NodeKind::TableRow => {
                if entering {
                    let first_body_row = tree
                        .prev(node)
                        .is_none_or(|p| matches!(tree.kind(p), NodeKind::TableHead));
                    if first_body_row {
                        self.write("<tbody>\n");
                    }
                    self.write("<tr>\n");
                } else {
                    self.write("</tr>\n");
                }
            }
            NodeKind::TableCell { align } => {
                let tag = if tree.parent_is(node, |k| matches!(k, NodeKind::TableHead)) {
                    "th"
                } else {
                    "td"
                };
                if entering {
                    let align = match align {
                        Alignment::None => "",
                        Alignment::Left => " align=\"left\"",
                        Alignment::Center => " align=\"center\"",
                        Alignment::Right => " align=\"right\"",
                    };
                    self.write(&format!("<{}{}>", tag, align));
                } else {
                    self.write(&format!("</{}>\n", tag));
                }
            }
            NodeKind::FootnotesDef { label } => {
                let (index, _) = tree
                    .definitions
                    .footnote(label)
                    .ok_or_else(|| Error::UnknownFootnote(label.clone()))?;
                if entering {
                    self.ctx.newline();
                    self.write(&format!("<li id=\"fn-{}\">\n", index));
                } else {
                    self.ctx.newline();
                    self.write(&format!(
                        "<a href=\"#fnref-{}\" class=\"footnote-backref\">↩</a>\n</li>\n",
                        index
                    ));
                }
            }
            NodeKind::ToC => {
                self.render_toc();
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Text | NodeKind::BackslashContent => {
                if entering {
                    self.write_escaped(tree.tokens(node));
                }
            }
            NodeKind::Backslash => {}
            NodeKind::SoftBreak => {
                if entering {
                    if self.options.soft_break_as_hard_break {
                        self.write("<br />\n");
                    } else {
                        self.write("\n");
                    }
                }
            }
            NodeKind::HardBreak => {
                if entering {
                    self.write("<br />\n");
                }
            }
            NodeKind::Emphasis => self.write(if entering { "<em>" } else { "</em>" }),
            NodeKind::Strong => self.write(if entering { "<strong>" } else { "</strong>" }),
            NodeKind::Strikethrough => self.write(if entering { "<del>" } else { "</del>" }),
            NodeKind::CodeSpan { .. } => self.write(if entering { "<code>" } else { "</code>" }),
            NodeKind::CodeSpanContent | NodeKind::InlineMathContent => {
                if entering {
                    self.write_escaped(tree.tokens(node));
                }
            }
            NodeKind::InlineMath => self.write(if entering {
                "<span class=\"language-math\">"
            } else {
                "</span>"
            }),
            NodeKind::HtmlEntity { decoded } => {
                if entering {
                    self.write_escaped(decoded);
                }
            }
            NodeKind::InlineHtml => {
                if entering {
                    self.write(tree.tokens(node));
                }
            }
            NodeKind::Link { .. } => {
                if entering {
                    let (dest, title) = self.link_parts(node, "a")?;
                    self.write("<a href=\"");
                    self.write_escaped(&url_encode(&dest));
                    self.write("\"");
                    if let Some(title) = title {
                        self.write(" title=\"");
                        self.write_escaped(&title);
                        self.write("\"");
                    }
                    self.write(">");
                } else {
                    self.write("</a>");
                }
            }
            NodeKind::Image { .. } => {
                let (dest, title) = self.link_parts(node, "img")?;
                self.write("<img src=\"");
                self.write_escaped(&url_encode(&dest));
                self.write("\" alt=\"");
                self.write_escaped(&tree.inline_text(node));
                self.write("\"");
                if let Some(title) = title {
                    self.write(" title=\"");
                    self.write_escaped(&title);
                    self.write("\"");
                }
                self.write(" />");
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::WikiLink => {
                if entering {
                    self.write("<a href=\"");
                    self.write_escaped(&url_encode(tree.tokens(node)));
                    self.write("\" class=\"wikilink\">");
                } else {
                    self.write("</a>");
                }
            }
            NodeKind::FootnotesRef { index, .. } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(&format!(
                    "<sup class=\"footnote-ref\"><a href=\"#fn-{0}\" id=\"fnref-{0}\">{0}</a></sup>",
                    index
                ));
            }
            // Markers carry source syntax only
            NodeKind::CodeBlockFenceOpenMarker
            | NodeKind::CodeBlockFenceInfoMarker { .. }
            | NodeKind::CodeBlockCode
            | NodeKind::CodeBlockFenceCloseMarker
            | NodeKind::MathBlockOpenMarker
            | NodeKind::MathBlockContent
            | NodeKind::MathBlockCloseMarker
            | NodeKind::EmOpenMarker
            | NodeKind::EmCloseMarker
            | NodeKind::StrongOpenMarker
            | NodeKind::StrongCloseMarker
            | NodeKind::StrikethroughOpenMarker
            | NodeKind::StrikethroughCloseMarker
            | NodeKind::CodeSpanOpenMarker
            | NodeKind::CodeSpanCloseMarker
            | NodeKind::InlineMathOpenMarker
            | NodeKind::InlineMathCloseMarker
            | NodeKind::Bang
            | NodeKind::OpenBracket
            | NodeKind::CloseBracket
            | NodeKind::OpenParen
            | NodeKind::CloseParen
            | NodeKind::LinkDest
            | NodeKind::LinkSpace
            | NodeKind::LinkTitle => return Ok(WalkStatus::SkipChildren),
        }
        Ok(WalkStatus::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        let tree = self.tree;
        let footnotes = tree.definitions.footnotes();
        if footnotes.is_empty() {
            return Ok(());
        }
        self.ctx.newline();
        self.write("<section class=\"footnotes\">\n<ol>\n");
        for def in footnotes {
            let checkpoint = self.ctx.checkpoint();
            if let Err(err) = self.render_footnote_def(def.node) {
                self.ctx.restore(checkpoint);
                warn!(label = %def.label, error = %err, "skipping footnote definition");
            }
        }
        self.write("</ol>\n</section>\n");
        Ok(())
    }
}

fn has_toc(tree: &Tree) -> bool {
    tree.children(tree.root())
        .any(|c| matches!(tree.kind(c), NodeKind::ToC))
}

/// Slug ids for every heading lacking an explicit `{id}`, unique per
/// document.
fn generate_heading_ids(tree: &Tree) -> HashMap<NodeId, String> {
    let mut ids = HashMap::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    tree.walk(tree.root(), &mut |n, entering| {
        if !entering || !matches!(tree.kind(n), NodeKind::Heading { .. }) {
            return WalkStatus::Continue;
        }
        if tree
            .child_by_kind(n, |k| matches!(k, NodeKind::HeadingId))
            .is_none()
        {
            let base = slugify(&tree.inline_text(n));
            let count = seen.entry(base.clone()).or_insert(0);
            let id = if *count == 0 {
                base
            } else {
                format!("{}-{}", base, count)
            };
            *count += 1;
            ids.insert(n, id);
        }
        WalkStatus::SkipChildren
    });
    ids
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if c.is_whitespace() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug
}

/// Percent-encodes a URL, leaving existing `%XX` escapes alone.
fn url_encode(text: &str) -> String {
    let mut result = String::new();
    let bytes = text.as_bytes();

    for (i, ch) in text.char_indices() {
        if ch == '%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit)
        {
            result.push(ch);
        } else if ch.is_ascii_alphanumeric()
            || matches!(
                ch,
                '-' | '_'
                    | '.'
                    | '~'
                    | '!'
                    | '*'
                    | '\''
                    | '('
                    | ')'
                    | ';'
                    | ':'
                    | '@'
                    | '&'
                    | '='
                    | '+'
                    | '$'
                    | ','
                    | '/'
                    | '?'
                    | '#'
                    | '['
                    | ']'
            )
        {
            result.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn html(input: &str) -> String {
        let options = Options::default();
        let tree = parse(input, &options);
        HtmlRenderer::new(&tree, &options).render()
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("/a b"), "/a%20b");
        assert_eq!(url_encode("/%20ok%zz"), "/%20ok%25zz");
        assert_eq!(url_encode("/ä"), "/%C3%A4");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Ünïcode  Title "), "ünïcode-title");
    }

    #[test]
    fn test_tight_and_loose_lists() {
        assert_eq!(html("- a\n- b\n"), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
        assert_eq!(
            html("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
        assert_eq!(
            html("3. a\n4. b\n"),
            "<ol start=\"3\">\n<li>a</li>\n<li>b</li>\n</ol>\n"
        );
    }

    #[test]
    fn test_nested_tight_list() {
        assert_eq!(
            html("- a\n  - b\n"),
            "<ul>\n<li>a\n<ul>\n<li>b</li>\n</ul>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_code_block_language() {
        assert_eq!(
            html("```rust extra\nlet x = 1 < 2;\n```\n"),
            "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_table() {
        assert_eq!(
            html("| a | b |\n| --- | :-: |\n| 1 | 2 |\n"),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n<th align=\"center\">b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>1</td>\n<td align=\"center\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn test_task_list() {
        assert_eq!(
            html("- [x] done\n"),
            "<ul class=\"contains-task-list\">\n<li class=\"task-list-item\">\
             <input checked=\"\" disabled=\"\" type=\"checkbox\" /> done</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_footnotes() {
        assert_eq!(
            html("a[^n]\n\n[^n]: note\n"),
            "<p>a<sup class=\"footnote-ref\"><a href=\"#fn-1\" id=\"fnref-1\">1</a></sup></p>\n\
             <section class=\"footnotes\">\n<ol>\n<li id=\"fn-1\">\n<p>note</p>\n\
             <a href=\"#fnref-1\" class=\"footnote-backref\">↩</a>\n</li>\n</ol>\n</section>\n"
        );
    }

    #[test]
    fn test_failing_footnote_keeps_the_others() {
        let options = Options::default();
        let mut tree = parse("a[^x] b[^y]\n\n[^x]: one\n\n[^y]: two\n", &options);
        let (_, def) = tree.definitions.footnote("x").expect("footnote x");
        let def = def.node;
        let code = tree.new_node(
            NodeKind::CodeBlock {
                fenced: true,
                fence_char: b'`',
                fence_len: 3,
                fence_offset: 0,
                closed: true,
            },
            "",
        );
        tree.append_child(def, code);

        assert_eq!(
            HtmlRenderer::new(&tree, &options).render(),
            "<p>a<sup class=\"footnote-ref\"><a href=\"#fn-1\" id=\"fnref-1\">1</a></sup> \
             b<sup class=\"footnote-ref\"><a href=\"#fn-2\" id=\"fnref-2\">2</a></sup></p>\n\
             <section class=\"footnotes\">\n<ol>\n<li id=\"fn-2\">\n<p>two</p>\n\
             <a href=\"#fnref-2\" class=\"footnote-backref\">↩</a>\n</li>\n</ol>\n</section>\n"
        );
    }

    #[test]
    fn test_toc() {
        assert_eq!(
            html("[toc]\n\n# A\n\n## B\n\n# C {c-id}\n"),
            "<div class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a>\n<ul>\n<li><a href=\"#b\">B</a>\
             </li>\n</ul>\n</li>\n<li><a href=\"#c-id\">C</a></li>\n</ul>\n</div>\n\
             <h1 id=\"a\">A</h1>\n<h2 id=\"b\">B</h2>\n<h1 id=\"c-id\">C</h1>\n"
        );
    }

    #[test]
    fn test_image_and_escaping() {
        assert_eq!(
            html("![a *b*](/i.png \"t\") & <x"),
            "<p><img src=\"/i.png\" alt=\"a b\" title=\"t\" /> &amp; &lt;x</p>\n"
        );
    }
}
