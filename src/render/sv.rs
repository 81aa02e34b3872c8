//! Split-view editor DOM
//!
//! Every construct becomes a `<span data-type=…>` and keeps its Markdown
//! markers in marker spans, so the editor shows the source and its styling
//! side by side. Lines end with the [`NEWLINE`] element rather than a bare
//! line feed.

use html_escape::encode_double_quoted_attribute as escape;
use tracing::warn;

use crate::ast::{LinkType, ListType, NodeId, NodeKind, Tree, WalkStatus};
use crate::error::Result;

use super::markdown::{delimiter_cell, escape_title, format_destination};
use super::{NodeRenderer, RenderContext, item_number, render_subtree};

/// Line separator of the split-view DOM.
pub const NEWLINE: &str =
    "<span data-type=\"newline\"><br /><span style=\"display: none\">\n</span></span>";
/// [`NEWLINE`] without its two closing tags.
const NEWLINE_OPEN: &str = "<span data-type=\"newline\"><br /><span style=\"display: none\">\n";
const CLOSE: &str = "</span>";

const QUOTE_MARKER: &str = "<span data-type=\"blockquote-marker\" class=\"sv-marker\">&gt; </span>";
const QUOTE_MARKER_BLANK: &str =
    "<span data-type=\"blockquote-marker\" class=\"sv-marker\">&gt;</span>";
const FOOTNOTE_INDENT: &str = "<span data-type=\"footnotes-space\">    </span>";

/// Renders the annotated-span DOM of a split-view editor.
///
/// Resolved reference links lose their destination sub-nodes while they are
/// rendered, hence the mutable borrow.
pub struct SvRenderer<'a> {
    tree: &'a mut Tree,
    ctx: RenderContext,
}

impl<'a> SvRenderer<'a> {
    pub fn new(tree: &'a mut Tree) -> Self {
        SvRenderer {
            tree,
            ctx: RenderContext::new(NEWLINE),
        }
    }

    pub fn render(mut self) -> String {
        super::render(&mut self)
    }

    fn open(&mut self, attrs: &[(&str, &str)]) {
        self.ctx.write_str("<span");
        for (name, value) in attrs {
            self.ctx.write_str(&format!(" {}=\"{}\"", name, escape(value)));
        }
        self.ctx.write_str(">");
    }

    fn marker(&mut self, class: &str, text: &str) {
        self.ctx
            .write_str(&format!("<span class=\"{}\">{}</span>", class, escape(text)));
    }

    /// Closes a block element, leaving a blank line after it.
    fn end_block(&mut self) {
        newline(&mut self.ctx);
        self.ctx.write_str(NEWLINE);
        self.ctx.write_str(CLOSE);
    }

    fn in_tight_item(&self, node: NodeId) -> bool {
        matches!(
            self.tree.parent(node).map(|p| self.tree.kind(p)),
            Some(NodeKind::ListItem(data)) if data.tight
        )
    }

    /// Drops the parenthesized destination of a link resolved through a
    /// definition; the label suffix is written when the link is exited.
    fn strip_reference_destination(&mut self, link: NodeId) {
        let detached: Vec<NodeId> = self
            .tree
            .children(link)
            .filter(|&c| {
                matches!(
                    self.tree.kind(c),
                    NodeKind::OpenParen
                        | NodeKind::LinkDest
                        | NodeKind::LinkSpace
                        | NodeKind::LinkTitle
                        | NodeKind::CloseParen
                )
            })
            .collect();
        for child in detached {
            self.tree.unlink(child);
        }
    }

    fn write_reference_suffix(&mut self, link_type: LinkType, label: &str) {
        match link_type {
            LinkType::Reference => self.marker("sv-marker--link", &format!("[{}]", label)),
            LinkType::Collapsed => self.marker("sv-marker--link", "[]"),
            _ => {}
        }
    }

    fn write_lines(&mut self, text: &str) {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.ctx.write_str(NEWLINE);
            }
            self.ctx.write_str(&escape(line));
        }
    }

    fn render_autolink(&mut self, link: NodeId) {
        let text = self.tree.inline_text(link);
        self.open(&[("data-type", "a")]);
        self.marker("sv-marker--bracket", "<");
        self.marker("sv-marker--link", &text);
        self.marker("sv-marker--bracket", ">");
        self.ctx.write_str(CLOSE);
    }

    fn render_link_ref_defs(&mut self) {
        let links = self.tree.definitions.links().to_vec();
        if links.is_empty() {
            return;
        }
        newline(&mut self.ctx);
        self.open(&[("data-block", "0"), ("data-type", "link-ref-defs-block")]);
        for def in links {
            self.marker("sv-marker--bracket", "[");
            self.marker("sv-marker--link", &def.label);
            self.marker("sv-marker--bracket", "]");
            self.ctx.write_str(": ");
            self.marker("sv-marker--link", &format_destination(&def.destination));
            if let Some(title) = &def.title {
                self.ctx.write_char(' ');
                self.marker("sv-marker--title", &format!("\"{}\"", escape_title(title)));
            }
            self.ctx.write_str(NEWLINE);
        }
        self.end_block();
    }

    fn render_footnote_defs(&mut self) {
        let footnotes: Vec<(String, NodeId)> = self
            .tree
            .definitions
            .footnotes()
            .iter()
            .map(|def| (def.label.clone(), def.node))
            .collect();
        if footnotes.is_empty() {
            return;
        }
        newline(&mut self.ctx);
        self.open(&[("data-block", "0"), ("data-type", "footnotes-block")]);
        for (label, node) in footnotes {
            let checkpoint = self.ctx.checkpoint();
            self.ctx.push_buffer();
            if let Err(err) = render_subtree(self, node) {
                self.ctx.restore(checkpoint);
                warn!(label = %label, error = %err, "skipping footnote definition");
                continue;
            }
            let content = self.ctx.pop_buffer();
            let first = format!(
                "<span class=\"sv-marker--bracket\">[</span><span class=\"sv-marker--link\">^{}</span>\
                 <span class=\"sv-marker--bracket\">]</span>: ",
                escape(&label)
            );
            self.open(&[("data-type", "footnotes-def")]);
            self.ctx
                .write_str(&decorate(&content, &first, FOOTNOTE_INDENT, ""));
            newline(&mut self.ctx);
            self.ctx.write_str(CLOSE);
        }
        self.ctx.write_str(CLOSE);
    }
}

impl NodeRenderer for SvRenderer<'_> {
    fn tree(&self) -> &Tree {
        self.tree
    }

    fn context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus> {
        match self.tree.kind(node).clone() {
            NodeKind::Document | NodeKind::FootnotesDef { .. } => {}
            NodeKind::Paragraph => {
                if entering {
                    self.open(&[("data-type", "p"), ("data-block", "0")]);
                } else if self.in_tight_item(node) {
                    newline(&mut self.ctx);
                    self.ctx.write_str(CLOSE);
                } else {
                    self.end_block();
                }
            }
            NodeKind::Heading { level, .. } => {
                if entering {
                    self.open(&[("data-block", "0"), ("data-type", "heading")]);
                    let class = format!("h{}", level);
                    self.open(&[("class", class.as_str())]);
                    self.ctx.write_str(&format!(
                        "<span class=\"sv-marker--heading\" data-type=\"heading-marker\">{} </span>",
                        "#".repeat(level as usize)
                    ));
                } else {
                    self.ctx.write_str(CLOSE);
                    self.end_block();
                }
            }
            NodeKind::HeadingId => {
                let id = format!(" {{{}}}", self.tree.tokens(node));
                self.marker("sv-marker", &id);
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Blockquote => {
                if entering {
                    self.ctx.push_buffer();
                } else {
                    let content = self.ctx.pop_buffer();
                    self.open(&[("data-block", "0"), ("data-type", "blockquote")]);
                    self.ctx.write_str(&decorate(
                        &content,
                        QUOTE_MARKER,
                        QUOTE_MARKER,
                        QUOTE_MARKER_BLANK,
                    ));
                    self.end_block();
                }
            }
            NodeKind::List(data) => {
                if entering {
                    let typ = match data.typ {
                        ListType::Bullet => "ul",
                        ListType::Ordered => "ol",
                        ListType::Task => "task",
                    };
                    let marker = data.marker();
                    let start = data.start.to_string();
                    let mut attrs = vec![("data-type", typ), ("data-marker", marker.as_str())];
                    if data.tight {
                        attrs.push(("data-tight", "true"));
                    }
                    if data.bullet_char == 0 && data.start != 1 {
                        attrs.push(("start", start.as_str()));
                    }
                    attrs.push(("data-block", "0"));
                    self.open(&attrs);
                } else {
                    newline(&mut self.ctx);
                    self.ctx.write_str(NEWLINE);
                    self.ctx.write_str(CLOSE);
                }
            }
            NodeKind::ListItem(data) => {
                if entering {
                    self.ctx.push_buffer();
                } else {
                    let content = self.ctx.pop_buffer();
                    let marker = if data.bullet_char == 0 {
                        format!("{}{}", item_number(self.tree, node), data.delimiter as char)
                    } else {
                        (data.bullet_char as char).to_string()
                    };
                    let first = format!(
                        "<span data-type=\"li-marker\" class=\"sv-marker\">{} </span>",
                        marker
                    );
                    let padding = format!(
                        "<span data-type=\"padding\">{}</span>",
                        " ".repeat(marker.len() + 1)
                    );
                    self.open(&[("data-type", "li"), ("data-marker", marker.as_str())]);
                    self.ctx
                        .write_str(&decorate(&content, &first, &padding, ""));
                    newline(&mut self.ctx);
                    self.ctx.write_str(CLOSE);
                    if !data.tight && self.tree.next(node).is_some() {
                        self.ctx.write_str(NEWLINE);
                    }
                }
            }
            NodeKind::TaskListItemMarker { checked } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let marker = if checked { "[x] " } else { "[ ] " };
                self.ctx.write_str(&format!(
                    "<span data-type=\"task-marker\" class=\"sv-marker--bi\">{}</span>",
                    marker
                ));
            }
            NodeKind::ThematicBreak => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.open(&[("data-block", "0"), ("data-type", "thematic-break")]);
                self.marker("sv-marker", "***");
                self.end_block();
            }
            NodeKind::CodeBlock { fenced, .. } => {
                if entering {
                    self.open(&[("data-block", "0"), ("data-type", "code-block")]);
                    if !fenced {
                        self.ctx.write_str(
                            "<span data-type=\"code-block-open-marker\" class=\"sv-marker\">```</span>",
                        );
                        newline(&mut self.ctx);
                    }
                } else {
                    if !fenced {
                        newline(&mut self.ctx);
                        self.ctx.write_str(
                            "<span data-type=\"code-block-close-marker\" class=\"sv-marker\">```</span>",
                        );
                    }
                    self.end_block();
                }
            }
            NodeKind::CodeBlockFenceOpenMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let fence = self.tree.tokens(node).to_string();
                self.ctx.write_str(&format!(
                    "<span data-type=\"code-block-open-marker\" class=\"sv-marker\">{}</span>",
                    escape(&fence)
                ));
            }
            NodeKind::CodeBlockFenceInfoMarker { info } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.ctx.write_str(&format!(
                    "<span class=\"sv-marker--info\" data-type=\"code-block-info\">{}</span>",
                    escape(&info)
                ));
                newline(&mut self.ctx);
            }
            NodeKind::CodeBlockCode | NodeKind::MathBlockContent => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let code = self.tree.tokens(node).trim_end_matches('\n').to_string();
                self.ctx.write_str("<span>");
                self.write_lines(&code);
                self.ctx.write_str(CLOSE);
            }
            NodeKind::CodeBlockFenceCloseMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let fence = self.tree.tokens(node).to_string();
                newline(&mut self.ctx);
                self.ctx.write_str(&format!(
                    "<span data-type=\"code-block-close-marker\" class=\"sv-marker\">{}</span>",
                    escape(&fence)
                ));
            }
            NodeKind::MathBlock { .. } => {
                if entering {
                    self.open(&[("data-block", "0"), ("data-type", "math-block")]);
                } else {
                    self.end_block();
                }
            }
            NodeKind::MathBlockOpenMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.ctx.write_str(
                    "<span data-type=\"math-block-open-marker\" class=\"sv-marker\">$$</span>",
                );
                newline(&mut self.ctx);
            }
            NodeKind::MathBlockCloseMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                newline(&mut self.ctx);
                self.ctx.write_str(
                    "<span data-type=\"math-block-close-marker\" class=\"sv-marker\">$$</span>",
                );
            }
            NodeKind::HtmlBlock { .. } => {
                let html = self.tree.tokens(node).trim_end_matches('\n').to_string();
                self.open(&[("data-block", "0"), ("data-type", "html-block")]);
                self.ctx.write_str("<span class=\"sv-marker\">");
                self.write_lines(&html);
                self.ctx.write_str(CLOSE);
                self.end_block();
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Table { .. } => {
                if entering {
                    self.open(&[("data-block", "0"), ("data-type", "table")]);
                } else {
                    self.end_block();
                }
            }
            NodeKind::TableHead => {
                if !entering {
                    self.marker("sv-marker", "|");
                    self.ctx.write_str(NEWLINE);
                    self.write_delimiter_row(node);
                }
            }
            NodeKind::TableRow => {
                if !entering {
                    self.marker("sv-marker", "|");
                    self.ctx.write_str(NEWLINE);
                }
            }
            NodeKind::TableCell { .. } => {
                if entering {
                    self.marker("sv-marker", "|");
                }
                self.ctx.write_char(' ');
            }
            NodeKind::ToC => {
                self.open(&[("data-block", "0"), ("data-type", "toc-block")]);
                self.marker("sv-marker", "[toc]");
                self.end_block();
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Text => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let mut text = self.tree.tokens(node).to_string();
                if self
                    .tree
                    .parent_is(node, |k| matches!(k, NodeKind::TableCell { .. }))
                {
                    text = text.replace('|', "\\|");
                }
                self.ctx
                    .write_str(&format!("<span data-type=\"text\">{}</span>", escape(&text)));
            }
            NodeKind::Backslash => {
                if entering {
                    self.open(&[("data-type", "backslash")]);
                    self.marker("sv-marker", "\\");
                } else {
                    self.ctx.write_str(CLOSE);
                }
            }
            NodeKind::BackslashContent => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let content = self.tree.tokens(node).to_string();
                self.ctx.write_str(&escape(&content));
            }
            NodeKind::SoftBreak => {
                if entering {
                    self.ctx.write_str(NEWLINE);
                }
            }
            NodeKind::HardBreak => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.marker("sv-marker", "\\");
                self.ctx.write_str(NEWLINE);
            }
            NodeKind::Emphasis => self.inline_span(node, entering, "em"),
            NodeKind::Strong => self.inline_span(node, entering, "strong"),
            NodeKind::Strikethrough => self.inline_span(node, entering, "s"),
            NodeKind::EmOpenMarker
            | NodeKind::EmCloseMarker
            | NodeKind::StrongOpenMarker
            | NodeKind::StrongCloseMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let marker = self.tree.tokens(node).to_string();
                self.marker("sv-marker--bi", &marker);
            }
            NodeKind::StrikethroughOpenMarker
            | NodeKind::StrikethroughCloseMarker
            | NodeKind::InlineMathOpenMarker
            | NodeKind::InlineMathCloseMarker
            | NodeKind::Bang => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let marker = self.tree.tokens(node).to_string();
                self.marker("sv-marker", &marker);
            }
            NodeKind::CodeSpan { .. } => self.inline_span(node, entering, "code"),
            NodeKind::CodeSpanOpenMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let content = self.tree.next(node).map(|c| self.tree.tokens(c).to_string());
                let padded = content.as_deref().is_some_and(needs_code_padding);
                let ticks = self.tree.tokens(node).to_string();
                let marker = if padded { format!("{} ", ticks) } else { ticks };
                self.marker("sv-marker", &marker);
            }
            NodeKind::CodeSpanCloseMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let content = self.tree.prev(node).map(|c| self.tree.tokens(c).to_string());
                let padded = content.as_deref().is_some_and(needs_code_padding);
                let ticks = self.tree.tokens(node).to_string();
                let marker = if padded { format!(" {}", ticks) } else { ticks };
                self.marker("sv-marker", &marker);
            }
            NodeKind::CodeSpanContent | NodeKind::InlineMathContent => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let content = self.tree.tokens(node).to_string();
                self.ctx.write_str(&format!("<span>{}</span>", escape(&content)));
            }
            NodeKind::InlineMath => self.inline_span(node, entering, "inline-math"),
            NodeKind::HtmlEntity { .. } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let raw = self.tree.tokens(node).to_string();
                self.open(&[("data-type", "html-entity")]);
                self.marker("sv-marker", &raw);
                self.ctx.write_str(CLOSE);
            }
            NodeKind::InlineHtml => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let html = self.tree.tokens(node).to_string();
                self.open(&[("data-type", "html-inline")]);
                self.marker("sv-marker", &html);
                self.ctx.write_str(CLOSE);
            }
            NodeKind::Link {
                link_type,
                ref_label,
            } => {
                if link_type == LinkType::Autolink {
                    self.render_autolink(node);
                    return Ok(WalkStatus::SkipChildren);
                }
                if entering {
                    let data_type = if link_type.is_reference() {
                        self.strip_reference_destination(node);
                        "link-ref"
                    } else {
                        "a"
                    };
                    self.open(&[("data-type", data_type)]);
                } else {
                    self.write_reference_suffix(link_type, &ref_label);
                    self.ctx.write_str(CLOSE);
                }
            }
            NodeKind::Image {
                link_type,
                ref_label,
            } => {
                if entering {
                    if link_type.is_reference() {
                        self.strip_reference_destination(node);
                    }
                    self.open(&[("data-type", "img")]);
                } else {
                    self.write_reference_suffix(link_type, &ref_label);
                    self.ctx.write_str(CLOSE);
                }
            }
            NodeKind::WikiLink => {
                if entering {
                    let target = self.tree.tokens(node).to_string();
                    self.open(&[("data-type", "wikilink")]);
                    self.marker("sv-marker--bracket", "[[");
                    if self.tree.inline_text(node) != target {
                        self.marker("sv-marker--link", &target);
                        self.marker("sv-marker--bracket", "|");
                    }
                } else {
                    self.marker("sv-marker--bracket", "]]");
                    self.ctx.write_str(CLOSE);
                }
            }
            NodeKind::OpenBracket | NodeKind::CloseBracket => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let bracket = self.tree.tokens(node).to_string();
                self.marker("sv-marker--bracket", &bracket);
            }
            NodeKind::OpenParen | NodeKind::CloseParen => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let paren = self.tree.tokens(node).to_string();
                self.marker("sv-marker--paren", &paren);
            }
            NodeKind::LinkDest => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let dest = format_destination(self.tree.tokens(node));
                self.marker("sv-marker--link", &dest);
            }
            NodeKind::LinkSpace => {
                if entering {
                    self.ctx.write_char(' ');
                }
            }
            NodeKind::LinkTitle => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let title = format!("\"{}\"", escape_title(self.tree.tokens(node)));
                self.marker("sv-marker--title", &title);
            }
            NodeKind::FootnotesRef { label, .. } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.open(&[("class", "sup"), ("data-type", "footnotes-ref")]);
                self.marker("sv-marker--bracket", "[");
                self.marker("sv-marker--link", &format!("^{}", label));
                self.marker("sv-marker--bracket", "]");
                self.ctx.write_str(CLOSE);
            }
        }
        Ok(WalkStatus::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        self.render_link_ref_defs();
        self.render_footnote_defs();
        Ok(())
    }
}

impl SvRenderer<'_> {
    fn inline_span(&mut self, node: NodeId, entering: bool, data_type: &str) {
        if !entering {
            self.ctx.write_str(CLOSE);
            return;
        }
        let class = match self.tree.kind(node) {
            NodeKind::Emphasis | NodeKind::Strong | NodeKind::Strikethrough => Some(data_type),
            _ => None,
        };
        match class {
            Some(class) => self.open(&[("data-type", data_type), ("class", class)]),
            None => self.open(&[("data-type", data_type)]),
        }
    }

    /// Writes the `| --- | :-: |` row below the head row.
    fn write_delimiter_row(&mut self, head: NodeId) {
        let aligns = match self.tree.parent(head).map(|table| self.tree.kind(table)) {
            Some(NodeKind::Table { aligns }) => aligns.clone(),
            _ => Vec::new(),
        };
        let row: String = aligns
            .iter()
            .map(|&align| format!("| {} ", delimiter_cell(align)))
            .collect();
        self.marker("sv-marker", &format!("{}|", row));
        self.ctx.write_str(NEWLINE);
    }
}

/// Whether `content` needs a space between itself and the backticks.
pub(crate) fn needs_code_padding(content: &str) -> bool {
    content.starts_with('`')
        || content.ends_with('`')
        || (content.starts_with(' ') && content.ends_with(' ') && !content.trim().is_empty())
}

/// Writes [`NEWLINE`] unless the output already ends a line, ignoring
/// closing tags written since.
fn newline(ctx: &mut RenderContext) {
    if ctx.at_start() {
        return;
    }
    let mut tail = ctx.last_out();
    while let Some(rest) = tail.strip_suffix(CLOSE) {
        tail = rest;
    }
    if !tail.ends_with(NEWLINE_OPEN) {
        ctx.write_str(NEWLINE);
    }
}

/// Drops trailing line breaks from buffered content, keeping the closing
/// tags that follow them.
fn trim_trailing_newlines(content: &str) -> String {
    let mut body = content;
    let mut closers = 0;
    loop {
        if let Some(rest) = body.strip_suffix(NEWLINE) {
            body = rest;
        } else if let Some(rest) = body.strip_suffix(CLOSE) {
            body = rest;
            closers += 1;
        } else {
            break;
        }
    }
    format!("{}{}", body, CLOSE.repeat(closers))
}

/// Prefixes the first line of `content` with `first`, later lines with
/// `rest` and blank lines with `blank`.
fn decorate(content: &str, first: &str, rest: &str, blank: &str) -> String {
    let content = trim_trailing_newlines(content);
    let mut out = String::with_capacity(content.len() + first.len());
    for (i, line) in content.split(NEWLINE).enumerate() {
        if i == 0 {
            out.push_str(first);
        } else {
            out.push_str(NEWLINE);
            let mut visible = line;
            while let Some(r) = visible.strip_prefix(CLOSE) {
                visible = r;
            }
            out.push_str(if visible.is_empty() { blank } else { rest });
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn sv(input: &str) -> String {
        let mut tree = parse(input, &Options::default());
        SvRenderer::new(&mut tree).render()
    }

    /// Visible text of the DOM: tags dropped, newline elements as `\n`.
    fn visible(dom: &str) -> String {
        let dom = dom.replace(NEWLINE, "\n");
        let mut out = String::new();
        let mut in_tag = false;
        for c in dom.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        html_escape::decode_html_entities(&out).into_owned()
    }

    #[test]
    fn test_trim_trailing_newlines_keeps_closers() {
        let content = format!("<span>a</span>{}{}</span>", NEWLINE, NEWLINE);
        assert_eq!(trim_trailing_newlines(&content), "<span>a</span></span>");
    }

    #[test]
    fn test_decorate() {
        let content = format!("a{}{}b{}", NEWLINE, NEWLINE, NEWLINE);
        assert_eq!(
            decorate(&content, "> ", "> ", ">"),
            format!("> a{}>{}> b", NEWLINE, NEWLINE)
        );
    }

    #[test]
    fn test_paragraph_and_heading() {
        let dom = sv("# Title\n\nsome *text*\n");
        assert!(dom.contains("data-type=\"heading-marker\">#"));
        assert!(dom.contains("<span data-type=\"em\" class=\"em\">"));
        assert_eq!(visible(&dom), "# Title\n\nsome *text*\n\n");
    }

    #[test]
    fn test_entities_keep_their_source() {
        let dom = sv("AT&amp;T &copy;\n");
        assert!(dom.contains("<span data-type=\"html-entity\">"), "{}", dom);
        assert_eq!(visible(&dom), "AT&amp;T &copy;\n\n");
    }

    #[test]
    fn test_blockquote_lines_are_marked() {
        let dom = sv("> a\n> b\n>\n> c\n");
        assert_eq!(visible(&dom), "> a\n> b\n>\n> c\n\n");
        assert_eq!(dom.matches("blockquote-marker").count(), 4);
    }

    #[test]
    fn test_list_item_padding() {
        let dom = sv("- a\n\n  b\n- c\n");
        assert_eq!(visible(&dom), "- a\n\n  b\n\n- c\n\n");
        assert!(dom.contains("data-type=\"padding\">  </span>"));
    }

    #[test]
    fn test_code_block_markers() {
        let dom = sv("```rust\nfn main() {}\n```\n");
        assert_eq!(visible(&dom), "```rust\nfn main() {}\n```\n\n");
    }

    #[test]
    fn test_reference_link_drops_destination() {
        let dom = sv("[text][ref]\n\n[ref]: /url \"t\"\n");
        assert!(dom.contains("data-type=\"link-ref\""));
        assert_eq!(visible(&dom), "[text][ref]\n\n[ref]: /url \"t\"\n\n");
    }

    #[test]
    fn test_inline_link_keeps_destination() {
        assert_eq!(visible(&sv("[a](/b \"c\")\n")), "[a](/b \"c\")\n\n");
    }

    #[test]
    fn test_footnotes_block() {
        let dom = sv("x[^1]\n\n[^1]: first\n    second\n");
        assert!(dom.contains("data-type=\"footnotes-block\""));
        assert_eq!(visible(&dom), "x[^1]\n\n[^1]: first\n    second\n");
    }
}
