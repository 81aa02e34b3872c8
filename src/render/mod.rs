//! Renderer dispatch framework
//!
//! A renderer implements [`NodeRenderer`]: one handler call when a node is
//! entered and, unless the handler skips its children, one more when it is
//! exited. [`render`] drives the walk and isolates failures per top-level
//! block. Nested containers whose per-line decoration depends on their whole
//! content (block quotes, list items) render into a pushed buffer of the
//! [`RenderContext`] and decorate it when popped.

mod html;
mod markdown;
mod sv;
mod text;

use tracing::{debug, warn};

use crate::ast::{NodeId, NodeKind, Tree, WalkStatus};
use crate::error::Result;

pub use html::HtmlRenderer;
pub use markdown::MarkdownRenderer;
pub use sv::SvRenderer;
pub use text::TextRenderer;

/// Window of recent output kept for lookbehind checks.
const LAST_OUT_MAX: usize = 1024;
const LAST_OUT_KEEP: usize = 512;

/// Per-node-kind handlers of one output format.
pub trait NodeRenderer {
    fn tree(&self) -> &Tree;

    fn context(&mut self) -> &mut RenderContext;

    /// Handles `node` on entry (`entering == true`) and on exit.
    ///
    /// The children of `node` are read after the entry call returns, so the
    /// handler may detach sub-nodes of the node it enters.
    fn render_node(&mut self, node: NodeId, entering: bool) -> Result<WalkStatus>;

    /// Runs once after the whole tree was walked.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Renders the whole tree held by `renderer`.
///
/// A handler error discards the partial output of the top-level block it
/// occurred in; rendering goes on with the next block.
pub fn render<R: NodeRenderer>(renderer: &mut R) -> String {
    let root = renderer.tree().root();
    if let Err(err) = renderer.render_node(root, true) {
        warn!(error = %err, "document handler failed");
    }

    let mut blocks = 0;
    let mut failed = 0;
    let mut child = renderer.tree().first_child(root);
    while let Some(block) = child {
        let checkpoint = renderer.context().checkpoint();
        match render_subtree(renderer, block) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                renderer.context().restore(checkpoint);
                warn!(
                    node = %block,
                    kind = renderer.tree().kind(block).name(),
                    error = %err,
                    "skipping block that failed to render"
                );
                failed += 1;
            }
        }
        blocks += 1;
        child = renderer.tree().next(block);
    }

    if let Err(err) = renderer.render_node(root, false) {
        warn!(error = %err, "document handler failed");
    }
    if let Err(err) = renderer.finish() {
        warn!(error = %err, "finishing render failed");
    }
    debug!(blocks, failed, "rendered document");
    renderer.context().take_output()
}

/// Walks the subtree under `node`. Returns `false` when a handler asked to
/// terminate.
pub fn render_subtree<R: NodeRenderer + ?Sized>(renderer: &mut R, node: NodeId) -> Result<bool> {
    match renderer.render_node(node, true)? {
        WalkStatus::Terminate => return Ok(false),
        WalkStatus::SkipChildren => return Ok(true),
        WalkStatus::Continue => {}
    }
    let mut child = renderer.tree().first_child(node);
    while let Some(c) = child {
        if !render_subtree(renderer, c)? {
            return Ok(false);
        }
        child = renderer.tree().next(c);
    }
    Ok(renderer.render_node(node, false)? != WalkStatus::Terminate)
}

/// Whether a blank line sits between `node` and the block before it.
///
/// Only tight lists separate their items, and the blocks inside an item, by
/// a bare line break.
pub(crate) fn separated_by_blank_line(tree: &Tree, node: NodeId) -> bool {
    match tree.kind(node) {
        NodeKind::ListItem(data) => !data.tight,
        _ => !matches!(
            tree.parent(node).map(|p| tree.kind(p)),
            Some(NodeKind::ListItem(data)) if data.tight
        ),
    }
}

/// Display number of a list item: the list start plus the item's position.
pub(crate) fn item_number(tree: &Tree, item: NodeId) -> usize {
    let start = match tree.parent(item).map(|l| tree.kind(l)) {
        Some(NodeKind::List(data)) => data.start,
        _ => 1,
    };
    let mut position = 0;
    let mut prev = tree.prev(item);
    while let Some(p) = prev {
        position += 1;
        prev = tree.prev(p);
    }
    start + position
}

#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    depth: usize,
    len: usize,
}

/// Output state of one render call.
#[derive(Debug)]
pub struct RenderContext {
    /// Buffer stack; the bottom buffer is the final output. Never empty.
    buffers: Vec<String>,
    /// Tail of the current buffer.
    last_out: String,
    separator: &'static str,
}

impl RenderContext {
    /// Creates a context whose [`newline`](Self::newline) writes `separator`.
    pub fn new(separator: &'static str) -> Self {
        RenderContext {
            buffers: vec![String::new()],
            last_out: String::new(),
            separator,
        }
    }

    fn top(&mut self) -> &mut String {
        if self.buffers.is_empty() {
            self.buffers.push(String::new());
        }
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    pub fn write_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.top().push_str(s);
        self.last_out.push_str(s);
        if self.last_out.len() > LAST_OUT_MAX {
            self.last_out = tail(&self.last_out, LAST_OUT_KEEP).to_string();
        }
    }

    pub fn write_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.write_str(c.encode_utf8(&mut buf));
    }

    /// Writes the line separator unless nothing was written yet or the
    /// output already ends with it.
    pub fn newline(&mut self) {
        if !self.last_out.is_empty() && !self.last_out.ends_with(self.separator) {
            let separator = self.separator;
            self.write_str(separator);
        }
    }

    /// Whether the current buffer has no output yet.
    pub fn at_start(&self) -> bool {
        self.last_out.is_empty()
    }

    pub fn ends_with(&self, s: &str) -> bool {
        self.last_out.ends_with(s)
    }

    /// Recent output of the current buffer.
    pub fn last_out(&self) -> &str {
        &self.last_out
    }

    /// Removes every trailing occurrence of `suffix` from the current buffer.
    pub fn trim_trailing(&mut self, suffix: &str) {
        if suffix.is_empty() {
            return;
        }
        let top = self.top();
        while top.ends_with(suffix) {
            top.truncate(top.len() - suffix.len());
        }
        self.sync_last_out();
    }

    /// Starts capturing output in a fresh buffer.
    pub fn push_buffer(&mut self) {
        self.buffers.push(String::new());
        self.last_out.clear();
    }

    /// Ends the innermost capture and returns what it collected.
    pub fn pop_buffer(&mut self) -> String {
        if self.buffers.len() <= 1 {
            warn!("pop_buffer without a pushed buffer");
            return String::new();
        }
        let content = self.buffers.pop().unwrap_or_default();
        self.sync_last_out();
        content
    }

    fn sync_last_out(&mut self) {
        self.last_out = self
            .buffers
            .last()
            .map_or("", |b| tail(b, LAST_OUT_KEEP))
            .to_string();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            depth: self.buffers.len(),
            len: self.buffers.last().map_or(0, String::len),
        }
    }

    /// Drops everything written since `checkpoint`, including buffers pushed
    /// after it.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.buffers.truncate(checkpoint.depth.max(1));
        let top = self.top();
        if checkpoint.len <= top.len() && top.is_char_boundary(checkpoint.len) {
            top.truncate(checkpoint.len);
        }
        self.sync_last_out();
    }

    /// Takes the finished output, folding in any buffer left pushed.
    pub fn take_output(&mut self) -> String {
        if self.buffers.len() > 1 {
            warn!(depth = self.buffers.len(), "render ended with pushed buffers");
        }
        let output = self.buffers.concat();
        self.buffers = vec![String::new()];
        self.last_out.clear();
        output
    }
}

/// Last `max` bytes of `s`, cut at a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Splits buffered container content into lines, without trailing empty
/// lines.
pub(crate) fn content_lines<'a>(content: &'a str, separator: &str) -> Vec<&'a str> {
    let mut trimmed = content;
    while let Some(rest) = trimmed.strip_suffix(separator) {
        trimmed = rest;
    }
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(separator).collect()
}
