/// Document tree for parsed Markdown
///
/// Nodes live in an arena owned by [`Tree`] and refer to each other through
/// [`NodeId`] handles, so parent and sibling links never own anything.
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_casefold::UnicodeCaseFold;

/// Handle to a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListType {
    Bullet,
    Ordered,
    Task,
}

/// Marker data shared by a list and its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData {
    pub typ: ListType,
    /// `-`, `+` or `*` for bullet lists, `0` for ordered ones.
    pub bullet_char: u8,
    /// `.` or `)` for ordered lists, `0` for bullet ones.
    pub delimiter: u8,
    pub start: usize,
    /// Item number (ordered lists only).
    pub num: usize,
    /// Columns of indentation before the marker.
    pub marker_offset: usize,
    /// Marker width plus the spaces separating it from the content.
    pub padding: usize,
    pub tight: bool,
}

impl ListData {
    /// Whether an item with these marker settings continues a list with `other`'s.
    pub fn matches(&self, other: &ListData) -> bool {
        let ordered = |t: ListType| t == ListType::Ordered;
        ordered(self.typ) == ordered(other.typ)
            && self.delimiter == other.delimiter
            && self.bullet_char == other.bullet_char
    }

    /// Source text of the item marker, e.g. `-` or `3.`.
    pub fn marker(&self) -> String {
        if self.bullet_char == 0 {
            format!("{}{}", self.num, self.delimiter as char)
        } else {
            (self.bullet_char as char).to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    /// `[text](dest "title")`
    Inline,
    /// `[text][label]`
    Reference,
    /// `[text][]`
    Collapsed,
    /// `[text]`
    Shortcut,
    /// `<scheme:dest>` or `<user@host>`
    Autolink,
}

impl LinkType {
    /// Whether the destination came from a reference definition.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    // Blocks
    Paragraph,
    Heading {
        level: u8,
        setext: bool,
    },
    HeadingId,
    Blockquote,
    List(ListData),
    ListItem(ListData),
    TaskListItemMarker {
        checked: bool,
    },
    ThematicBreak,
    CodeBlock {
        fenced: bool,
        fence_char: u8,
        fence_len: usize,
        fence_offset: usize,
        closed: bool,
    },
    CodeBlockFenceOpenMarker,
    CodeBlockFenceInfoMarker {
        info: String,
    },
    CodeBlockCode,
    CodeBlockFenceCloseMarker,
    MathBlock {
        closed: bool,
    },
    MathBlockOpenMarker,
    MathBlockContent,
    MathBlockCloseMarker,
    HtmlBlock {
        block_type: u8,
    },
    Table {
        aligns: Vec<Alignment>,
    },
    TableHead,
    TableRow,
    TableCell {
        align: Alignment,
    },
    FootnotesDef {
        label: String,
    },
    ToC,
    // Inlines
    Text,
    Backslash,
    BackslashContent,
    SoftBreak,
    HardBreak,
    Emphasis,
    EmOpenMarker,
    EmCloseMarker,
    Strong,
    StrongOpenMarker,
    StrongCloseMarker,
    Strikethrough,
    StrikethroughOpenMarker,
    StrikethroughCloseMarker,
    CodeSpan {
        marker_len: usize,
    },
    CodeSpanOpenMarker,
    CodeSpanContent,
    CodeSpanCloseMarker,
    InlineMath,
    InlineMathOpenMarker,
    InlineMathContent,
    InlineMathCloseMarker,
    InlineHtml,
    /// `&name;` or `&#n;`; `tokens` keep the source text.
    HtmlEntity {
        decoded: String,
    },
    Link {
        link_type: LinkType,
        ref_label: String,
    },
    Image {
        link_type: LinkType,
        ref_label: String,
    },
    /// `[[target]]`; `tokens` holds the target, children the shown text.
    WikiLink,
    Bang,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    LinkDest,
    LinkSpace,
    LinkTitle,
    FootnotesRef {
        label: String,
        index: usize,
    },
}

impl NodeKind {
    /// Stable name of the kind, used in errors and debug output.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::HeadingId => "heading-id",
            NodeKind::Blockquote => "blockquote",
            NodeKind::List(_) => "list",
            NodeKind::ListItem(_) => "list-item",
            NodeKind::TaskListItemMarker { .. } => "task-marker",
            NodeKind::ThematicBreak => "thematic-break",
            NodeKind::CodeBlock { .. } => "code-block",
            NodeKind::CodeBlockFenceOpenMarker => "code-block-open-marker",
            NodeKind::CodeBlockFenceInfoMarker { .. } => "code-block-info",
            NodeKind::CodeBlockCode => "code-block-code",
            NodeKind::CodeBlockFenceCloseMarker => "code-block-close-marker",
            NodeKind::MathBlock { .. } => "math-block",
            NodeKind::MathBlockOpenMarker => "math-block-open-marker",
            NodeKind::MathBlockContent => "math-block-content",
            NodeKind::MathBlockCloseMarker => "math-block-close-marker",
            NodeKind::HtmlBlock { .. } => "html-block",
            NodeKind::Table { .. } => "table",
            NodeKind::TableHead => "table-head",
            NodeKind::TableRow => "table-row",
            NodeKind::TableCell { .. } => "table-cell",
            NodeKind::FootnotesDef { .. } => "footnotes-def",
            NodeKind::ToC => "toc",
            NodeKind::Text => "text",
            NodeKind::Backslash => "backslash",
            NodeKind::BackslashContent => "backslash-content",
            NodeKind::SoftBreak => "soft-break",
            NodeKind::HardBreak => "hard-break",
            NodeKind::Emphasis => "em",
            NodeKind::EmOpenMarker => "em-open-marker",
            NodeKind::EmCloseMarker => "em-close-marker",
            NodeKind::Strong => "strong",
            NodeKind::StrongOpenMarker => "strong-open-marker",
            NodeKind::StrongCloseMarker => "strong-close-marker",
            NodeKind::Strikethrough => "s",
            NodeKind::StrikethroughOpenMarker => "s-open-marker",
            NodeKind::StrikethroughCloseMarker => "s-close-marker",
            NodeKind::CodeSpan { .. } => "code",
            NodeKind::CodeSpanOpenMarker => "code-open-marker",
            NodeKind::CodeSpanContent => "code-content",
            NodeKind::CodeSpanCloseMarker => "code-close-marker",
            NodeKind::InlineMath => "inline-math",
            NodeKind::InlineMathOpenMarker => "inline-math-open-marker",
            NodeKind::InlineMathContent => "inline-math-content",
            NodeKind::InlineMathCloseMarker => "inline-math-close-marker",
            NodeKind::InlineHtml => "html-inline",
            NodeKind::HtmlEntity { .. } => "html-entity",
            NodeKind::Link { .. } => "a",
            NodeKind::Image { .. } => "img",
            NodeKind::WikiLink => "wikilink",
            NodeKind::Bang => "bang",
            NodeKind::OpenBracket => "open-bracket",
            NodeKind::CloseBracket => "close-bracket",
            NodeKind::OpenParen => "open-paren",
            NodeKind::CloseParen => "close-paren",
            NodeKind::LinkDest => "link-dest",
            NodeKind::LinkSpace => "link-space",
            NodeKind::LinkTitle => "link-title",
            NodeKind::FootnotesRef { .. } => "footnotes-ref",
        }
    }

    /// Block-level nodes. Everything else lives inside paragraphs, headings or cells.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Document
                | NodeKind::Paragraph
                | NodeKind::Heading { .. }
                | NodeKind::Blockquote
                | NodeKind::List(_)
                | NodeKind::ListItem(_)
                | NodeKind::ThematicBreak
                | NodeKind::CodeBlock { .. }
                | NodeKind::MathBlock { .. }
                | NodeKind::HtmlBlock { .. }
                | NodeKind::Table { .. }
                | NodeKind::FootnotesDef { .. }
                | NodeKind::ToC
        )
    }

    /// Blocks whose raw `tokens` are expanded by the inline parser.
    pub fn contains_inlines(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading { .. } | NodeKind::TableCell { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Raw content for leaf kinds; unexpanded inline text before the inline phase.
    pub tokens: String,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

/// Result of a walk callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// Descend into the children; the callback runs again on exit.
    Continue,
    /// Do not descend and do not run the exit callback.
    SkipChildren,
    /// Stop the whole walk.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRefDef {
    /// Label as written in the source.
    pub label: String,
    pub destination: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootnoteDef {
    pub label: String,
    /// Detached `FootnotesDef` node holding the definition's blocks.
    pub node: NodeId,
}

/// Document-scoped definition tables, filled during block parsing.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    links: Vec<LinkRefDef>,
    link_index: HashMap<String, usize>,
    footnotes: Vec<FootnoteDef>,
    footnote_index: HashMap<String, usize>,
}

impl Definitions {
    /// Records a link reference definition; the first definition of a label wins.
    pub fn add_link(&mut self, def: LinkRefDef) -> bool {
        let key = normalize_label(&def.label);
        if key.is_empty() || self.link_index.contains_key(&key) {
            return false;
        }
        self.link_index.insert(key, self.links.len());
        self.links.push(def);
        true
    }

    pub fn link(&self, label: &str) -> Option<&LinkRefDef> {
        self.link_index
            .get(&normalize_label(label))
            .map(|&i| &self.links[i])
    }

    /// Link definitions in source order.
    pub fn links(&self) -> &[LinkRefDef] {
        &self.links
    }

    /// Records a footnote definition; the first definition of a label wins.
    pub fn add_footnote(&mut self, label: &str, node: NodeId) -> bool {
        let key = normalize_label(label);
        if self.footnote_index.contains_key(&key) {
            return false;
        }
        self.footnote_index.insert(key, self.footnotes.len());
        self.footnotes.push(FootnoteDef {
            label: label.to_string(),
            node,
        });
        true
    }

    /// 1-based index and definition of a footnote label.
    pub fn footnote(&self, label: &str) -> Option<(usize, &FootnoteDef)> {
        self.footnote_index
            .get(&normalize_label(label))
            .map(|&i| (i + 1, &self.footnotes[i]))
    }

    /// Footnote definitions in first-seen order.
    pub fn footnotes(&self) -> &[FootnoteDef] {
        &self.footnotes
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.footnotes.is_empty()
    }
}

/// Normalize a label for matching (Unicode case fold, collapse whitespace)
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .chars()
        .case_fold()
        .collect()
}

/// Arena-backed document tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    pub definitions: Definitions,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only an empty document node.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
            definitions: Definitions::default(),
        };
        tree.root = tree.new_node(NodeKind::Document, String::new());
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_child(self.root).is_none()
    }

    /// Allocates a detached node.
    pub fn new_node(&mut self, kind: NodeKind, tokens: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            tokens: tokens.into(),
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn tokens(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tokens
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].last_child
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].prev
    }

    /// Iterates over the direct children of `id`.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// First direct child matching `pred`.
    pub fn child_by_kind(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.children(id).find(|&c| pred(self.kind(c)))
    }

    /// Whether some ancestor of `id` matches `pred`.
    pub fn parent_is(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if pred(self.kind(p)) {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Detaches `id` (with its subtree) from its parent and siblings.
    pub fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let n = &self.nodes[id.0];
            (n.parent, n.prev, n.next)
        };
        match prev {
            Some(p) => self.nodes[p.0].next = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n.0].prev = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = prev;
                }
            }
        }
        let n = &mut self.nodes[id.0];
        n.parent = None;
        n.prev = None;
        n.next = None;
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        let last = self.nodes[parent.0].last_child;
        {
            let c = &mut self.nodes[child.0];
            c.parent = Some(parent);
            c.prev = last;
        }
        match last {
            Some(l) => self.nodes[l.0].next = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        match self.first_child(parent) {
            Some(first) => self.insert_before(first, child),
            None => self.append_child(parent, child),
        }
    }

    /// Inserts `sibling` directly after `id`.
    pub fn insert_after(&mut self, id: NodeId, sibling: NodeId) {
        self.unlink(sibling);
        let (parent, next) = {
            let n = &self.nodes[id.0];
            (n.parent, n.next)
        };
        {
            let s = &mut self.nodes[sibling.0];
            s.parent = parent;
            s.prev = Some(id);
            s.next = next;
        }
        self.nodes[id.0].next = Some(sibling);
        match next {
            Some(n) => self.nodes[n.0].prev = Some(sibling),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = Some(sibling);
                }
            }
        }
    }

    /// Inserts `sibling` directly before `id`.
    pub fn insert_before(&mut self, id: NodeId, sibling: NodeId) {
        self.unlink(sibling);
        let (parent, prev) = {
            let n = &self.nodes[id.0];
            (n.parent, n.prev)
        };
        {
            let s = &mut self.nodes[sibling.0];
            s.parent = parent;
            s.prev = prev;
            s.next = Some(id);
        }
        self.nodes[id.0].prev = Some(sibling);
        match prev {
            Some(p) => self.nodes[p.0].next = Some(sibling),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = Some(sibling);
                }
            }
        }
    }

    /// Depth-first walk calling `f(node, entering)`.
    ///
    /// Returns `false` when the walk was terminated.
    pub fn walk<F>(&self, node: NodeId, f: &mut F) -> bool
    where
        F: FnMut(NodeId, bool) -> WalkStatus,
    {
        match f(node, true) {
            WalkStatus::Terminate => return false,
            WalkStatus::SkipChildren => return true,
            WalkStatus::Continue => {}
        }
        let mut child = self.first_child(node);
        while let Some(c) = child {
            if !self.walk(c, f) {
                return false;
            }
            child = self.next(c);
        }
        f(node, false) != WalkStatus::Terminate
    }

    /// Plain-text projection of a subtree: text runs, link destinations and
    /// titles, code and math content and raw HTML, without structural markup.
    pub fn text(&self, node: NodeId) -> String {
        let mut ret = String::new();
        self.walk(node, &mut |n, entering| {
            if entering {
                match self.kind(n) {
                    NodeKind::Text
                    | NodeKind::BackslashContent
                    | NodeKind::LinkDest
                    | NodeKind::LinkTitle
                    | NodeKind::CodeBlockCode
                    | NodeKind::CodeSpanContent
                    | NodeKind::InlineMathContent
                    | NodeKind::MathBlockContent
                    | NodeKind::HtmlBlock { .. }
                    | NodeKind::InlineHtml => ret.push_str(self.tokens(n)),
                    NodeKind::HtmlEntity { decoded } => ret.push_str(decoded),
                    NodeKind::CodeBlockFenceInfoMarker { info } => ret.push_str(info),
                    NodeKind::SoftBreak | NodeKind::HardBreak => ret.push('\n'),
                    _ => {}
                }
            }
            WalkStatus::Continue
        });
        ret
    }

    /// Text a reader sees in an inline subtree: no destinations, titles or markup.
    pub fn inline_text(&self, node: NodeId) -> String {
        let mut ret = String::new();
        self.walk(node, &mut |n, entering| {
            if !entering {
                return WalkStatus::Continue;
            }
            match self.kind(n) {
                NodeKind::Text
                | NodeKind::BackslashContent
                | NodeKind::CodeSpanContent
                | NodeKind::InlineMathContent => ret.push_str(self.tokens(n)),
                NodeKind::HtmlEntity { decoded } => ret.push_str(decoded),
                NodeKind::SoftBreak | NodeKind::HardBreak => ret.push(' '),
                _ => {}
            }
            WalkStatus::Continue
        });
        ret
    }

    /// Verifies parent and sibling links below `node` are mutually consistent.
    pub fn check_links(&self, node: NodeId) -> bool {
        let mut prev = None;
        for child in self.children(node) {
            let n = self.node(child);
            if n.parent != Some(node) || n.prev != prev {
                return false;
            }
            if let Some(p) = prev
                && self.next(p) != Some(child)
            {
                return false;
            }
            if !self.check_links(child) {
                return false;
            }
            prev = Some(child);
        }
        self.last_child(node) == prev
    }

    /// Serializes the subtree under `node` to pretty JSON.
    pub fn to_json(&self, node: NodeId) -> String {
        serde_json::to_string_pretty(&self.snapshot(node)).unwrap_or_default()
    }

    fn snapshot(&self, id: NodeId) -> Snapshot<'_> {
        let node = self.node(id);
        Snapshot {
            kind: &node.kind,
            tokens: &node.tokens,
            children: self.children(id).map(|c| self.snapshot(c)).collect(),
        }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    kind: &'a NodeKind,
    #[serde(skip_serializing_if = "is_empty_str")]
    tokens: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Snapshot<'a>>,
}

fn is_empty_str(s: &&str) -> bool {
    s.is_empty()
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_node(tree: &mut Tree, s: &str) -> NodeId {
        tree.new_node(NodeKind::Text, s)
    }

    #[test]
    fn test_append_and_unlink_keep_links_consistent() {
        let mut tree = Tree::new();
        let para = tree.new_node(NodeKind::Paragraph, "");
        let root = tree.root();
        tree.append_child(root, para);
        let a = text_node(&mut tree, "a");
        let b = text_node(&mut tree, "b");
        let c = text_node(&mut tree, "c");
        tree.append_child(para, a);
        tree.append_child(para, b);
        tree.append_child(para, c);
        assert!(tree.check_links(root));

        tree.unlink(b);
        assert!(tree.check_links(root));
        assert_eq!(tree.children(para).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(tree.parent(b), None);

        tree.insert_before(a, b);
        assert_eq!(tree.children(para).collect::<Vec<_>>(), vec![b, a, c]);
        tree.insert_after(c, b);
        assert_eq!(tree.children(para).collect::<Vec<_>>(), vec![a, c, b]);
        assert!(tree.check_links(root));
    }

    #[test]
    fn test_walk_skip_children() {
        let mut tree = Tree::new();
        let root = tree.root();
        let para = tree.new_node(NodeKind::Paragraph, "");
        tree.append_child(root, para);
        let t = text_node(&mut tree, "hidden");
        tree.append_child(para, t);

        let mut seen = Vec::new();
        tree.walk(root, &mut |n, entering| {
            seen.push((tree.kind(n).name(), entering));
            if matches!(tree.kind(n), NodeKind::Paragraph) {
                WalkStatus::SkipChildren
            } else {
                WalkStatus::Continue
            }
        });
        assert_eq!(
            seen,
            vec![("document", true), ("paragraph", true), ("document", false)]
        );
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Foo\n  BAR "), "foo bar");
        assert_eq!(normalize_label("ẞ"), "ss");
    }

    #[test]
    fn test_first_definition_wins() {
        let mut defs = Definitions::default();
        assert!(defs.add_link(LinkRefDef {
            label: "Foo".into(),
            destination: "/one".into(),
            title: None,
        }));
        assert!(!defs.add_link(LinkRefDef {
            label: "foo".into(),
            destination: "/two".into(),
            title: None,
        }));
        assert_eq!(defs.link("FOO").unwrap().destination, "/one");
        assert_eq!(defs.links().len(), 1);
    }
}
