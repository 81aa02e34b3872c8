//! Plain-text extraction.

use tracing::warn;

use crate::ast::{LinkType, NodeId, NodeKind, Tree, WalkStatus};
use crate::error::Result;

use super::{NodeRenderer, RenderContext, render_subtree};

/// Visible text of a document, one block per line.
pub struct TextRenderer<'a> {
    tree: &'a Tree,
    ctx: RenderContext,
}

impl<'a> TextRenderer<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        TextRenderer {
            tree,
            ctx: RenderContext::new("\n"),
        }
    }

    pub fn render(mut self) -> String {
        super::render(&mut self)
    }
}

impl NodeRenderer for TextRenderer<'_> {
    fn tree(&self) -> &Tree {
        self.tree
    }

    fn context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus> {
        let tree = self.tree;
        let kind = tree.kind(node);
        if kind.is_block() && entering {
            self.ctx.newline();
        }
        match kind {
            NodeKind::Text
            | NodeKind::BackslashContent
            | NodeKind::CodeSpanContent
            | NodeKind::InlineMathContent => {
                if entering {
                    self.ctx.write_str(tree.tokens(node));
                }
            }
            NodeKind::CodeBlockCode | NodeKind::MathBlockContent | NodeKind::HtmlBlock { .. } => {
                self.ctx.write_str(tree.tokens(node).trim_end_matches('\n'));
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::SoftBreak | NodeKind::HardBreak | NodeKind::TableRow => {
                if entering {
                    self.ctx.newline();
                }
            }
            NodeKind::TableCell { .. } => {
                if entering && tree.prev(node).is_some() {
                    self.ctx.write_char('\t');
                }
            }
            NodeKind::HtmlEntity { decoded } => {
                if entering {
                    self.ctx.write_str(decoded);
                }
            }
            NodeKind::TaskListItemMarker { checked } => {
                if entering {
                    self.ctx.write_str(if *checked { "[x] " } else { "[ ] " });
                }
            }
            NodeKind::FootnotesRef { index, .. } => {
                if entering {
                    self.ctx.write_str(&format!("[{}]", index));
                }
            }
            NodeKind::Link {
                link_type: LinkType::Autolink,
                ..
            } => {
                self.ctx.write_str(&tree.inline_text(node));
                return Ok(WalkStatus::SkipChildren);
            }
            NodeKind::LinkDest
            | NodeKind::LinkTitle
            | NodeKind::HeadingId
            | NodeKind::InlineHtml
            | NodeKind::ToC => return Ok(WalkStatus::SkipChildren),
            _ => {}
        }
        Ok(WalkStatus::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        let tree = self.tree;
        for (i, def) in tree.definitions.footnotes().iter().enumerate() {
            let checkpoint = self.ctx.checkpoint();
            self.ctx.push_buffer();
            if let Err(err) = render_subtree(self, def.node) {
                self.ctx.restore(checkpoint);
                warn!(label = %def.label, error = %err, "skipping footnote definition");
                continue;
            }
            let content = self.ctx.pop_buffer();
            self.ctx.newline();
            self.ctx
                .write_str(&format!("[{}] {}", i + 1, content.trim_end_matches('\n')));
        }
        self.ctx.trim_trailing("\n");
        self.ctx.newline();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn text(input: &str) -> String {
        let tree = parse(input, &Options::default());
        TextRenderer::new(&tree).render()
    }

    #[test]
    fn test_blocks_on_separate_lines() {
        assert_eq!(
            text("# Title\n\nsome *emph* and [a link](/url \"t\")\n\n- one\n- two\n"),
            "Title\nsome emph and a link\none\ntwo\n"
        );
    }

    #[test]
    fn test_code_and_tables() {
        assert_eq!(
            text("```\nlet x;\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n"),
            "let x;\na\tb\n1\t2\n"
        );
    }

    #[test]
    fn test_footnotes_follow_document() {
        assert_eq!(text("a[^n]\n\n[^n]: note\n"), "a[1]\n[1] note\n");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(text(""), "");
    }
}
