/// Canonical Markdown renderer
///
/// Writes the tree back as Markdown that reparses to the same structure:
/// ATX headings, fenced code, `***` breaks, escaped text. Reference and
/// footnote definitions are collected at the end of the document.
use tracing::warn;

use crate::ast::{Alignment, LinkType, NodeId, NodeKind, Tree, WalkStatus};
use crate::error::{Error, Result};

use super::{
    NodeRenderer, RenderContext, content_lines, item_number, render_subtree,
    separated_by_blank_line,
};

pub struct MarkdownRenderer<'a> {
    tree: &'a Tree,
    ctx: RenderContext,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        MarkdownRenderer {
            tree,
            ctx: RenderContext::new("\n"),
        }
    }

    pub fn render(mut self) -> String {
        super::render(&mut self)
    }

    fn write(&mut self, s: &str) {
        self.ctx.write_str(s);
    }

    /// Moves to a fresh line before a block, with a blank line when the
    /// block's container separates its children by one.
    fn begin_block(&mut self, node: NodeId) {
        if self.ctx.at_start() {
            return;
        }
        self.ctx.newline();
        if separated_by_blank_line(self.tree, node)
            && self.tree.prev(node).is_some()
            && !self.ctx.ends_with("\n\n")
        {
            self.write("\n");
        }
    }

    fn blank_line(&mut self) {
        if self.ctx.at_start() {
            return;
        }
        self.ctx.newline();
        if !self.ctx.ends_with("\n\n") {
            self.write("\n");
        }
    }

    fn in_heading(&self, node: NodeId) -> bool {
        self.tree
            .parent_is(node, |k| matches!(k, NodeKind::Heading { .. }))
    }

    fn in_reference_link(&self, node: NodeId) -> bool {
        matches!(
            self.tree.parent(node).map(|p| self.tree.kind(p)),
            Some(NodeKind::Link { link_type, .. } | NodeKind::Image { link_type, .. })
                if link_type.is_reference()
        )
    }

    fn escape_text(&self, text: &str, in_heading: bool) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let line_start = self.ctx.at_start() || self.ctx.ends_with("\n");
        let mut digits_only = line_start;
        let mut digits = 0;
        for (i, &c) in chars.iter().enumerate() {
            let at_line_start = line_start && i == 0;
            let next = chars.get(i + 1).copied();
            let escape = match c {
                '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '~' | '$' => true,
                '!' => next.is_none(),
                '&' => next.is_some_and(|n| n.is_ascii_alphanumeric() || n == '#'),
                '#' => at_line_start || in_heading,
                '{' | '}' => in_heading,
                '>' | '-' | '+' | '=' => at_line_start,
                '.' | ')' => digits_only && digits > 0,
                _ => false,
            };
            if digits_only && c.is_ascii_digit() {
                digits += 1;
            } else {
                digits_only = false;
            }
            if escape {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn render_code_block(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let code = tree
            .child_by_kind(node, |k| matches!(k, NodeKind::CodeBlockCode))
            .map(|c| tree.tokens(c))
            .ok_or_else(|| Error::missing_child(node, "code-block", "code-block-code"))?;
        let info = tree
            .children(node)
            .find_map(|c| match tree.kind(c) {
                NodeKind::CodeBlockFenceInfoMarker { info } => Some(info.as_str()),
                _ => None,
            })
            .unwrap_or("");

        let fence_char = if info.contains('`') { '~' } else { '`' };
        let fence_len = longest_run(code, fence_char).max(2) + 1;
        let fence: String = std::iter::repeat_n(fence_char, fence_len).collect();

        self.begin_block(node);
        self.write(&fence);
        self.write(info);
        self.write("\n");
        self.write(code);
        if !code.is_empty() && !code.ends_with('\n') {
            self.write("\n");
        }
        self.write(&fence);
        Ok(())
    }

    fn render_table_cell(&mut self, node: NodeId, entering: bool) {
        if entering {
            self.ctx.push_buffer();
            return;
        }
        let content = self.ctx.pop_buffer().replace('|', "\\|");
        self.write(" ");
        self.write(&content);
        self.write(" |");

        let last_in_head = self.tree.next(node).is_none()
            && self
                .tree
                .parent(node)
                .is_some_and(|p| matches!(self.tree.kind(p), NodeKind::TableHead));
        if last_in_head {
            self.write_delimiter_row(node);
        }
    }

    fn write_delimiter_row(&mut self, head_cell: NodeId) {
        let tree = self.tree;
        let Some(NodeKind::Table { aligns }) = tree
            .parent(head_cell)
            .and_then(|head| tree.parent(head))
            .map(|table| tree.kind(table))
        else {
            return;
        };
        self.write("\n|");
        for &align in aligns {
            self.write(" ");
            self.write(delimiter_cell(align));
            self.write(" |");
        }
    }

    fn render_footnote_defs(&mut self) {
        let tree = self.tree;
        for def in tree.definitions.footnotes() {
            let checkpoint = self.ctx.checkpoint();
            self.ctx.push_buffer();
            if let Err(err) = render_subtree(self, def.node) {
                self.ctx.restore(checkpoint);
                warn!(label = %def.label, error = %err, "skipping footnote definition");
                continue;
            }
            let content = self.ctx.pop_buffer();
            self.blank_line();
            let first = format!("[^{}]: ", def.label);
            self.write(&prefix_lines(&content, &first, "    ", ""));
        }
    }
}

impl NodeRenderer for MarkdownRenderer<'_> {
    fn tree(&self) -> &Tree {
        self.tree
    }

    fn context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus> {
        let tree = self.tree;
        match tree.kind(node) {
            NodeKind::Document | NodeKind::FootnotesDef { .. } => {}
            NodeKind::Paragraph => {
                if entering {
                    self.begin_block(node);
                }
            }
            NodeKind::Heading { level, .. } => {
                if entering {
                    self.begin_block(node);
                    self.write(&"#".repeat(*level as usize));
                    self.write(" ");
                } else {
                    self.ctx.trim_trailing(" ");
                }
            }
            NodeKind::HeadingId => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(" {");
                self.write(tree.tokens(node));
                self.write("}");
            }
            NodeKind::Blockquote => {
                if entering {
                    self.begin_block(node);
                    self.ctx.push_buffer();
                } else {
                    let content = self.ctx.pop_buffer();
                    self.write(&prefix_lines(&content, "> ", "> ", ">"));
                }
            }
            NodeKind::List(_) => {
                if entering {
                    self.begin_block(node);
                }
            }
            NodeKind::ListItem(data) => {
                if entering {
                    self.begin_block(node);
                    self.ctx.push_buffer();
                } else {
                    let content = self.ctx.pop_buffer();
                    let marker = if data.bullet_char == 0 {
                        format!("{}{}", item_number(tree, node), data.delimiter as char)
                    } else {
                        (data.bullet_char as char).to_string()
                    };
                    let padding = " ".repeat(marker.len() + 1);
                    self.write(&prefix_lines(&content, &format!("{} ", marker), &padding, ""));
                }
            }
            NodeKind::TaskListItemMarker { checked } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(if *checked { "[x] " } else { "[ ] " });
            }
            NodeKind::ThematicBreak => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.begin_block(node);
                self.write("***");
            }
            NodeKind::CodeBlock { .. } => {
                self.render_code_block(node)?;
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::MathBlock { .. } => {
                let content = tree
                    .child_by_kind(node, |k| matches!(k, NodeKind::MathBlockContent))
                    .map(|c| tree.tokens(c))
                    .unwrap_or("");
                self.begin_block(node);
                self.write("$$\n");
                if !content.is_empty() {
                    self.write(content);
                    self.write("\n");
                }
                self.write("$$");
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::HtmlBlock { .. } => {
                self.begin_block(node);
                self.write(tree.tokens(node).trim_end_matches('\n'));
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::Table { .. } => {
                if entering {
                    self.begin_block(node);
                }
            }
            NodeKind::TableHead | NodeKind::TableRow => {
                if entering {
                    self.ctx.newline();
                    self.write("|");
                }
            }
            NodeKind::TableCell { .. } => self.render_table_cell(node, entering),
            NodeKind::ToC => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.begin_block(node);
                self.write("[toc]");
            }
            NodeKind::Text => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let escaped = self.escape_text(tree.tokens(node), self.in_heading(node));
                self.write(&escaped);
            }
            NodeKind::Backslash => {
                if entering {
                    self.write("\\");
                }
            }
            NodeKind::BackslashContent => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(tree.tokens(node));
            }
            NodeKind::SoftBreak => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(if self.in_heading(node) { " " } else { "\n" });
            }
            NodeKind::HardBreak => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(if self.in_heading(node) { " " } else { "\\\n" });
            }
            NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::Strikethrough
            | NodeKind::CodeSpan { .. }
            | NodeKind::InlineMath => {}
            NodeKind::EmOpenMarker
            | NodeKind::EmCloseMarker
            | NodeKind::StrongOpenMarker
            | NodeKind::StrongCloseMarker
            | NodeKind::StrikethroughOpenMarker
            | NodeKind::StrikethroughCloseMarker
            | NodeKind::InlineMathOpenMarker
            | NodeKind::InlineMathCloseMarker
            | NodeKind::Bang
            | NodeKind::OpenBracket
            | NodeKind::CloseBracket => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(tree.tokens(node));
            }
            NodeKind::CodeSpanOpenMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(tree.tokens(node));
                let content = tree.next(node).map_or("", |c| tree.tokens(c));
                if super::sv::needs_code_padding(content) {
                    self.write(" ");
                }
            }
            NodeKind::CodeSpanCloseMarker => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                let content = tree.prev(node).map_or("", |c| tree.tokens(c));
                if super::sv::needs_code_padding(content) {
                    self.write(" ");
                }
                self.write(tree.tokens(node));
            }
            NodeKind::CodeSpanContent
            | NodeKind::InlineMathContent
            | NodeKind::InlineHtml
            | NodeKind::HtmlEntity { .. } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write(tree.tokens(node));
            }
            NodeKind::Link {
                link_type,
                ref_label,
            }
            | NodeKind::Image {
                link_type,
                ref_label,
            } => {
                if *link_type == LinkType::Autolink {
                    self.write("<");
                    self.write(&tree.inline_text(node));
                    self.write(">");
                    return Ok(WalkStatus::SkipChildren);
                }
                if !entering {
                    match link_type {
                        LinkType::Reference => {
                            self.write("[");
                            self.write(ref_label);
                            self.write("]");
                        }
                        LinkType::Collapsed => self.write("[]"),
                        _ => {}
                    }
                }
            }
            NodeKind::OpenParen | NodeKind::CloseParen | NodeKind::LinkSpace => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                if !self.in_reference_link(node) {
                    self.write(tree.tokens(node));
                }
            }
            NodeKind::LinkDest => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                if !self.in_reference_link(node) {
                    self.write(&format_destination(tree.tokens(node)));
                }
            }
            NodeKind::LinkTitle => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                if !self.in_reference_link(node) {
                    self.write(&format!("\"{}\"", escape_title(tree.tokens(node))));
                }
            }
            NodeKind::WikiLink => {
                let target = tree.tokens(node);
                let shown = tree.inline_text(node);
                self.write("[[");
                self.write(target);
                if shown != target {
                    self.write("|");
                    self.write(&shown);
                }
                self.write("]]");
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::FootnotesRef { label, .. } => {
                if !entering {
                    return Ok(WalkStatus::Continue);
                }
                self.write("[^");
                self.write(label);
                self.write("]");
            }
            NodeKind::CodeBlockFenceOpenMarker
            | NodeKind::CodeBlockFenceInfoMarker { .. }
            | NodeKind::CodeBlockCode
            | NodeKind::CodeBlockFenceCloseMarker
            | NodeKind::MathBlockOpenMarker
            | NodeKind::MathBlockContent
            | NodeKind::MathBlockCloseMarker => return Ok(WalkStatus::SkipChildren),
        }
        Ok(WalkStatus::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        let tree = self.tree;
        let links = tree.definitions.links();
        if !links.is_empty() {
            self.blank_line();
            for def in links {
                self.ctx.newline();
                self.write(&format!(
                    "[{}]: {}",
                    def.label,
                    format_destination(&def.destination)
                ));
                if let Some(title) = &def.title {
                    self.write(&format!(" \"{}\"", escape_title(title)));
                }
            }
        }
        self.render_footnote_defs();
        self.ctx.newline();
        Ok(())
    }
}

/// Prefixes the first line of `content` with `first`, later lines with
/// `rest` and empty lines with `blank`.
fn prefix_lines(content: &str, first: &str, rest: &str, blank: &str) -> String {
    let lines = content_lines(content, "\n");
    if lines.is_empty() {
        return first.trim_end().to_string();
    }
    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.into_iter().enumerate() {
        out.push(match (i, line.is_empty()) {
            (0, true) => first.trim_end().to_string(),
            (0, false) => format!("{}{}", first, line),
            (_, true) => blank.to_string(),
            (_, false) => format!("{}{}", rest, line),
        });
    }
    out.join("\n")
}

fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Link destination in a form that reparses to `dest`.
pub(crate) fn format_destination(dest: &str) -> String {
    let pointy = dest.is_empty() || dest.contains([' ', '\t', '<', '>']);
    let mut out = String::with_capacity(dest.len() + 2);
    if pointy {
        out.push('<');
    }
    for c in dest.chars() {
        let escape = match c {
            '\\' | '&' => true,
            '<' | '>' => pointy,
            '(' | ')' => !pointy,
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    if pointy {
        out.push('>');
    }
    out
}

/// Title text for a `"…"` quoted title.
pub(crate) fn escape_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if matches!(c, '"' | '\\' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn delimiter_cell(align: Alignment) -> &'static str {
    match align {
        Alignment::None => "---",
        Alignment::Left => ":--",
        Alignment::Right => "--:",
        Alignment::Center => ":-:",
    }
}
