/// A structured Markdown engine: container/delimiter parsing into a typed
/// tree, projected into HTML, split-view editor DOM, canonical Markdown or
/// plain text
pub mod ast;
pub mod error;
pub mod options;
pub mod parser;
pub mod render;

pub use ast::{NodeId, NodeKind, Tree};
pub use error::{Error, Result};
pub use options::Options;
pub use parser::{Parser, parse};
pub use render::{HtmlRenderer, MarkdownRenderer, NodeRenderer, SvRenderer, TextRenderer};

/// Parse markdown text and render to HTML
pub fn markdown_to_html(markdown: &str, options: &Options) -> String {
    let tree = parse(markdown, options);
    HtmlRenderer::new(&tree, options).render()
}

/// Parse markdown text and render to the split-view editor DOM
pub fn markdown_to_sv(markdown: &str, options: &Options) -> String {
    let mut tree = parse(markdown, options);
    SvRenderer::new(&mut tree).render()
}

/// Parse markdown text and write it back in canonical form
pub fn format_markdown(markdown: &str, options: &Options) -> String {
    let tree = parse(markdown, options);
    MarkdownRenderer::new(&tree).render()
}

/// Parse markdown text and extract its visible text
pub fn plain_text(markdown: &str, options: &Options) -> String {
    let tree = parse(markdown, options);
    TextRenderer::new(&tree).render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn html(markdown: &str) -> String {
        markdown_to_html(markdown, &Options::default())
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(html(""), "");
        assert_eq!(markdown_to_sv("", &Options::default()), "");
        assert_eq!(format_markdown("", &Options::default()), "");
    }

    #[test]
    fn test_basic_image() {
        assert_eq!(
            html("![foo](/url \"title\")\n"),
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n"
        );
    }

    #[test]
    fn test_image_without_title() {
        assert_eq!(html("![bar](/path)\n"), "<p><img src=\"/path\" alt=\"bar\" /></p>\n");
    }

    #[test]
    fn test_link_and_wikilink() {
        assert_eq!(
            html("[reallink](linktext) [[wikilink]]\n"),
            "<p><a href=\"linktext\">reallink</a> <a href=\"wikilink\" class=\"wikilink\">wikilink</a></p>\n"
        );
    }

    #[test]
    fn test_wikilink_disabled() {
        let options = Options {
            wikilink: false,
            ..Options::default()
        };
        assert_eq!(
            markdown_to_html("[[page]]\n", &options),
            "<p>[[page]]</p>\n"
        );
    }

    #[test]
    fn test_soft_break_as_hard_break() {
        let options = Options {
            soft_break_as_hard_break: true,
            ..Options::default()
        };
        assert_eq!(markdown_to_html("a\nb\n", &options), "<p>a<br />\nb</p>\n");
    }

    #[test]
    fn test_leaf_nodes_render_once() {
        let options = Options::default();
        assert_eq!(html("**foo*\n"), "<p>*<em>foo</em></p>\n");
        assert_eq!(html("a `b` <i>c</i>\\\nd\n"), "<p>a <code>b</code> <i>c</i><br />\nd</p>\n");
        assert_eq!(format_markdown("> a\n---\n", &options), "> a\n\n***\n");
        assert_eq!(
            plain_text("> - a1\n>\n>   a2\n>\n> - b1\n>\n>   b2\n", &options),
            "a1\na2\nb1\nb2\n"
        );
        let sv = markdown_to_sv("a1 *b*\n", &options);
        assert_eq!(sv.matches("a1").count(), 1, "{}", sv);
        assert_eq!(sv.matches(">b<").count(), 1, "{}", sv);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text("**a** `b`\n", &Options::default()), "a b\n");
    }
}

#[cfg(test)]
mod fuzz {
    use super::*;

    #[test_fuzz::test_fuzz]
    fn render_all(markdown: String) {
        let options = Options::default();
        let tree = parse(&markdown, &options);
        assert!(tree.check_links(tree.root()));
        HtmlRenderer::new(&tree, &options).render();
        MarkdownRenderer::new(&tree).render();
        TextRenderer::new(&tree).render();
        let mut tree = tree;
        SvRenderer::new(&mut tree).render();
    }

    #[test]
    fn seeds() {
        for seed in [
            "",
            "*",
            "***a**b*",
            "> - [ ] x\n>\n>   ```\n",
            "[a]: <\n[a]\n",
            "| a |\n| - |\n| `|` |",
            "[^x]: [^x]\n\n[^x]",
            "$$\n$$ $ $$a$ \\",
            "<!-- -->\n<div>\n\n</div>",
            "\t-\t\t1.\t>\t#",
            "[[|]] [[a|]] ![[b]]",
        ] {
            render_all(seed.to_string());
        }
    }
}
