use pretty_assertions::assert_eq;
use rstest::rstest;
use weavemark::ast::WalkStatus;
use weavemark::render::{self, RenderContext};
use weavemark::{
    Error, NodeId, NodeKind, NodeRenderer, Options, Result, Tree, format_markdown,
    markdown_to_html, markdown_to_sv, parse, plain_text,
};

fn options() -> Options {
    Options::default()
}

#[rstest]
#[case::paragraphs("a\nb\n\nc\n")]
#[case::nested_quote("> a\n> > b\n>\n> c\n")]
#[case::loose_list_in_quote("> - a\n>\n>   b\n>\n> - c\n")]
#[case::tight_nested_lists("1. a\n   - b\n   - c\n2. d\n")]
#[case::code("```rust\nfn main() {}\n```\n\n    indented\n")]
#[case::escapes("\\*a\\* \\_b\\_ 1\\. \\# c\n")]
#[case::links("[a][r] ![i](/img.png \"t\") <https://x.y> [[w|alias]]\n\n[r]: /u\n")]
#[case::table("| a | b |\n| :-- | --: |\n| 1 | 2 |\n")]
#[case::footnotes("x[^1] y[^b]\n\n[^1]: one\n\n[^b]: two\n    more\n")]
#[case::math("$$\na^2\n$$\n\ninline $b$\n")]
#[case::tasks("- [ ] a\n- [x] b\n")]
fn canonical_markdown_is_a_fixpoint(#[case] input: &str) {
    let once = format_markdown(input, &options());
    let twice = format_markdown(&once, &options());
    assert_eq!(once, twice);
    assert_eq!(
        markdown_to_html(input, &options()),
        markdown_to_html(&once, &options())
    );
}

/// Line separator element of the split-view DOM.
const SV_NEWLINE: &str =
    "<span data-type=\"newline\"><br /><span style=\"display: none\">\n</span></span>";

/// What the split-view editor shows: tags dropped, newline elements as `\n`.
fn visible(dom: &str) -> String {
    let dom = dom.replace(SV_NEWLINE, "\n");
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
fn quote_with_loose_list_uses_buffer_stack() {
    let input = "> - a1\n>\n>   a2\n>\n> - b1\n>\n>   b2\n";
    assert_eq!(format_markdown(input, &options()), input);

    let sv = markdown_to_sv(input, &options());
    assert_eq!(visible(&sv), format!("{}\n", input));
    assert_eq!(sv.matches("data-type=\"blockquote-marker\"").count(), 7, "{}", sv);
    assert_eq!(sv.matches("data-type=\"li-marker\"").count(), 2, "{}", sv);
    for text in ["a1", "a2", "b1", "b2"] {
        assert_eq!(sv.matches(text).count(), 1, "{}", sv);
    }
}

#[test]
fn sv_keeps_markers_and_reference_definitions() {
    let sv = markdown_to_sv("**b** [x][r]\n\n[r]: /url\n", &options());
    assert!(sv.contains("data-type=\"strong\""), "{}", sv);
    assert!(sv.contains("**"), "{}", sv);
    assert!(sv.contains("data-type=\"link-ref-defs-block\""), "{}", sv);
    // the reference link itself carries only its label
    assert_eq!(sv.matches("/url").count(), 1, "{}", sv);
}

#[test]
fn reference_definitions_are_extracted() {
    let tree = parse(
        "[a]: /one\n[B]: </two words> 'title'\n[a]: /ignored\n\ntext\n",
        &options(),
    );
    let links = tree.definitions.links();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].destination, "/one");
    assert_eq!(links[1].destination, "/two words");
    assert_eq!(links[1].title.as_deref(), Some("title"));
    assert!(tree.definitions.link("b").is_some());

    // only the paragraph remains in the visible tree
    let root = tree.root();
    assert_eq!(tree.children(root).count(), 1);
    assert_eq!(tree.text(root), "text");
}

#[test]
fn footnote_definitions_are_detached() {
    let tree = parse("a[^n]\n\n[^n]: note\n", &options());
    let root = tree.root();
    assert_eq!(tree.children(root).count(), 1);
    let (index, def) = tree
        .definitions
        .footnote("N")
        .expect("footnote is defined");
    assert_eq!(index, 1);
    assert_eq!(tree.parent(def.node), None);
    assert_eq!(tree.text(def.node), "note");
}

#[rstest]
#[case::nul("a\0b".to_string())]
#[case::crlf("a\r\n\r\n- b\r".to_string())]
#[case::unclosed_everything("> ```\n> [a](<\n- $$\n<div".to_string())]
#[case::deep_nesting("> - ".repeat(200))]
#[case::delimiters("*_~`$[".repeat(100))]
fn parsing_and_rendering_never_fail(#[case] input: String) {
    let input = input.as_str();
    let tree = parse(input, &options());
    assert!(tree.check_links(tree.root()));
    markdown_to_html(input, &options());
    markdown_to_sv(input, &options());
    format_markdown(input, &options());
    plain_text(input, &options());
}

/// Renders headings as errors to exercise per-block isolation.
struct FailOnHeading<'a> {
    tree: &'a Tree,
    ctx: RenderContext,
}

impl NodeRenderer for FailOnHeading<'_> {
    fn tree(&self) -> &Tree {
        self.tree
    }

    fn context(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus> {
        match self.tree.kind(node) {
            NodeKind::Heading { .. } if !entering => {
                Err(Error::unexpected(node, "paragraph", "heading"))
            }
            NodeKind::Text if entering => {
                self.ctx.write_str(self.tree.tokens(node));
                Ok(WalkStatus::Continue)
            }
            NodeKind::Paragraph | NodeKind::Heading { .. } if entering => {
                self.ctx.newline();
                Ok(WalkStatus::Continue)
            }
            _ => Ok(WalkStatus::Continue),
        }
    }
}

#[test]
fn failing_block_is_dropped_and_rendering_continues() {
    let tree = parse("before\n\n# broken\n\nafter\n", &options());
    let mut renderer = FailOnHeading {
        tree: &tree,
        ctx: RenderContext::new("\n"),
    };
    assert_eq!(render::render(&mut renderer), "before\nafter");
}
