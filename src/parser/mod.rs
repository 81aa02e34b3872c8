//! Block parser
//!
//! Lines are consumed one at a time against a stack of open blocks. For every
//! line the parser first matches the open containers, then opens whatever new
//! blocks the rest of the line starts, then adds the remaining text to the
//! innermost leaf. Once all lines are in, inline content is expanded.

mod inline;
mod link;
mod scanners;
mod table;

use std::cmp::min;
use std::mem;

use tracing::{debug, trace};

use crate::ast::{NodeId, NodeKind, Tree, WalkStatus};
use crate::options::Options;

pub use inline::parse_inlines;
pub use link::{decode_entities, unescape};

use scanners::{at, is_space_or_tab};

const TAB_STOP: usize = 4;
const CODE_INDENT: usize = 4;
/// Deepest container nesting the parser will open.
const MAX_NESTING: usize = 100;

/// Parses a Markdown document. Never fails: malformed markup degrades to its
/// most literal reading.
pub fn parse(markdown: &str, options: &Options) -> Tree {
    let normalized = markdown.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    if normalized.ends_with('\n') {
        lines.pop();
    }
    parse_lines(&lines, options)
}

/// Parses a document that was already split into lines.
pub fn parse_lines(lines: &[&str], options: &Options) -> Tree {
    let mut parser = Parser::new(options);
    for line in lines {
        parser.feed(line);
    }
    parser.finish()
}

#[derive(Debug, Clone, Copy, Default)]
struct BlockState {
    last_line_blank: bool,
    start_line: usize,
}

/// Incremental block parser. Feed lines, then call [`Parser::finish`].
pub struct Parser<'o> {
    tree: Tree,
    options: &'o Options,
    states: Vec<BlockState>,
    /// Open blocks, document first.
    stack: Vec<NodeId>,
    /// Stack index of the innermost block matched by the current line.
    matched: usize,
    line_number: usize,
    offset: usize,
    column: usize,
    first_nonspace: usize,
    first_nonspace_column: usize,
    indent: usize,
    blank: bool,
    partially_consumed_tab: bool,
}

impl<'o> Parser<'o> {
    pub fn new(options: &'o Options) -> Self {
        let tree = Tree::new();
        let root = tree.root();
        Parser {
            states: vec![BlockState::default(); tree.len()],
            tree,
            options,
            stack: vec![root],
            matched: 0,
            line_number: 0,
            offset: 0,
            column: 0,
            first_nonspace: 0,
            first_nonspace_column: 0,
            indent: 0,
            blank: false,
            partially_consumed_tab: false,
        }
    }

    /// Feeds one line, without its line ending.
    pub fn feed(&mut self, line: &str) {
        let mut chars: Vec<char> = line
            .chars()
            .map(|c| if c == '\0' { '\u{FFFD}' } else { c })
            .collect();
        chars.push('\n');
        self.process_line(&chars);
    }

    /// Closes every open block and runs the inline phase.
    pub fn finish(mut self) -> Tree {
        while self.stack.len() > 1 {
            self.finalize_top();
        }
        self.collect_footnotes();
        self.process_inlines();
        debug!(
            lines = self.line_number,
            nodes = self.tree.len(),
            links = self.tree.definitions.links().len(),
            footnotes = self.tree.definitions.footnotes().len(),
            "parsed document"
        );
        self.tree
    }

    fn process_line(&mut self, line: &[char]) {
        self.offset = 0;
        self.column = 0;
        self.first_nonspace = 0;
        self.first_nonspace_column = 0;
        self.indent = 0;
        self.blank = false;
        self.partially_consumed_tab = false;
        self.line_number += 1;

        let Some(all_matched) = self.check_open_blocks(line) else {
            return;
        };
        if let Some(container) = self.open_new_blocks(line, all_matched) {
            self.add_text_to_container(container, line);
        }
    }

    fn kind(&self, node: NodeId) -> &NodeKind {
        self.tree.kind(node)
    }

    fn top(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    /////////////////////////
    // Match open blocks   //
    /////////////////////////

    /// Matches the open containers against the line. Returns whether all of
    /// them matched, or `None` when the line was consumed by a closing fence.
    fn check_open_blocks(&mut self, line: &[char]) -> Option<bool> {
        let mut depth = 0;
        while depth + 1 < self.stack.len() {
            let container = self.stack[depth + 1];
            self.find_first_nonspace(line);

            let matched = match self.kind(container).clone() {
                NodeKind::Blockquote => self.parse_block_quote_prefix(line),
                NodeKind::ListItem(data) => {
                    if self.indent >= data.marker_offset + data.padding {
                        self.advance_offset(line, data.marker_offset + data.padding, true);
                        true
                    } else if self.blank && self.tree.first_child(container).is_some() {
                        let count = self.first_nonspace - self.offset;
                        self.advance_offset(line, count, false);
                        true
                    } else {
                        false
                    }
                }
                NodeKind::CodeBlock {
                    fenced,
                    fence_char,
                    fence_len,
                    fence_offset,
                    ..
                } => {
                    if !fenced {
                        if self.indent >= CODE_INDENT {
                            self.advance_offset(line, CODE_INDENT, true);
                            true
                        } else if self.blank {
                            let count = self.first_nonspace - self.offset;
                            self.advance_offset(line, count, false);
                            true
                        } else {
                            false
                        }
                    } else {
                        let rest = &line[self.first_nonspace..];
                        let closing = if self.indent <= 3 && at(rest, 0) == fence_char as char {
                            scanners::close_code_fence(rest).unwrap_or(0)
                        } else {
                            0
                        };
                        if closing >= fence_len {
                            if let NodeKind::CodeBlock { closed, .. } =
                                &mut self.tree.node_mut(container).kind
                            {
                                *closed = true;
                            }
                            self.finalize_top();
                            return None;
                        }
                        let mut i = fence_offset;
                        while i > 0 && is_space_or_tab(at(line, self.offset)) {
                            self.advance_offset(line, 1, true);
                            i -= 1;
                        }
                        true
                    }
                }
                NodeKind::MathBlock { .. } => {
                    if self.indent <= 3 && scanners::math_block_fence(&line[self.first_nonspace..])
                    {
                        if let NodeKind::MathBlock { closed } =
                            &mut self.tree.node_mut(container).kind
                        {
                            *closed = true;
                        }
                        self.finalize_top();
                        return None;
                    }
                    true
                }
                NodeKind::HtmlBlock { block_type } => block_type <= 5 || !self.blank,
                NodeKind::Paragraph => !self.blank,
                NodeKind::Table { .. } => table::continues(&line[self.first_nonspace..]),
                NodeKind::FootnotesDef { .. } => {
                    if self.indent >= CODE_INDENT {
                        self.advance_offset(line, CODE_INDENT, true);
                        true
                    } else {
                        self.blank
                    }
                }
                NodeKind::Heading { .. } => false,
                _ => true,
            };

            if !matched {
                self.matched = depth;
                return Some(false);
            }
            depth += 1;
        }
        self.matched = depth;
        Some(true)
    }

    fn find_first_nonspace(&mut self, line: &[char]) {
        let mut chars_to_tab = TAB_STOP - (self.column % TAB_STOP);

        if self.first_nonspace <= self.offset {
            self.first_nonspace = self.offset;
            self.first_nonspace_column = self.column;

            loop {
                match at(line, self.first_nonspace) {
                    ' ' => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += 1;
                        chars_to_tab -= 1;
                        if chars_to_tab == 0 {
                            chars_to_tab = TAB_STOP;
                        }
                    }
                    '\t' => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += chars_to_tab;
                        chars_to_tab = TAB_STOP;
                    }
                    _ => break,
                }
            }
        }

        self.indent = self.first_nonspace_column - self.column;
        self.blank = scanners::is_line_end(at(line, self.first_nonspace));
    }

    fn advance_offset(&mut self, line: &[char], mut count: usize, columns: bool) {
        while count > 0 && self.offset < line.len() {
            if line[self.offset] == '\t' {
                let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
                if columns {
                    self.partially_consumed_tab = chars_to_tab > count;
                    let chars_to_advance = min(count, chars_to_tab);
                    self.column += chars_to_advance;
                    self.offset += if self.partially_consumed_tab { 0 } else { 1 };
                    count -= chars_to_advance;
                } else {
                    self.partially_consumed_tab = false;
                    self.column += chars_to_tab;
                    self.offset += 1;
                    count -= 1;
                }
            } else {
                self.partially_consumed_tab = false;
                self.offset += 1;
                self.column += 1;
                count -= 1;
            }
        }
    }

    fn parse_block_quote_prefix(&mut self, line: &[char]) -> bool {
        if self.indent <= 3 && at(line, self.first_nonspace) == '>' {
            self.advance_offset(line, self.indent + 1, true);
            if is_space_or_tab(at(line, self.offset)) {
                self.advance_offset(line, 1, true);
            }
            return true;
        }
        false
    }

    /////////////////////
    // Open new blocks //
    /////////////////////

    /// Opens the blocks the line starts. Returns the container the remaining
    /// text goes to, or `None` when the line is used up.
    fn open_new_blocks(&mut self, line: &[char], all_matched: bool) -> Option<NodeId> {
        let mut container = self.stack[self.matched];
        let mut maybe_lazy = matches!(self.kind(self.top()), NodeKind::Paragraph);

        loop {
            if matches!(
                self.kind(container),
                NodeKind::CodeBlock { .. } | NodeKind::HtmlBlock { .. } | NodeKind::MathBlock { .. }
            ) {
                break;
            }
            self.find_first_nonspace(line);
            let indented = self.indent >= CODE_INDENT;

            let opened = if !indented {
                if self.open_block_quote(&mut container, line)
                    || self.open_atx_heading(&mut container, line)
                    || self.open_code_fence(&mut container, line)
                    || self.open_math_block(&mut container, line)
                    || self.open_html_block(&mut container, line)
                {
                    true
                } else if self.open_setext_heading(container, line)
                    || self.open_thematic_break(container, line, all_matched)
                {
                    return None;
                } else {
                    self.open_footnote_definition(&mut container, line)
                }
            } else {
                false
            };

            let opened = opened
                || self.open_list_item(&mut container, line, indented)
                || self.open_indented_code(&mut container, line, indented, maybe_lazy);

            if !opened {
                if !indented && self.open_table(container, line) {
                    return None;
                }
                break;
            }

            if matches!(self.kind(container), NodeKind::Heading { .. }) {
                break;
            }
            maybe_lazy = false;
        }

        Some(container)
    }

    fn open_block_quote(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        if at(line, self.first_nonspace) != '>' || self.stack.len() >= MAX_NESTING {
            return false;
        }
        let count = self.first_nonspace + 1 - self.offset;
        self.advance_offset(line, count, false);
        if is_space_or_tab(at(line, self.offset)) {
            self.advance_offset(line, 1, true);
        }
        *container = self.add_child(NodeKind::Blockquote);
        true
    }

    fn open_atx_heading(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        let Some((level, matched)) = scanners::atx_heading_start(&line[self.first_nonspace..])
        else {
            return false;
        };
        let count = self.first_nonspace + matched - self.offset;
        self.advance_offset(line, count, false);
        *container = self.add_child(NodeKind::Heading {
            level,
            setext: false,
        });
        true
    }

    fn open_code_fence(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        let Some(fence_len) = scanners::open_code_fence(&line[self.first_nonspace..]) else {
            return false;
        };
        let kind = NodeKind::CodeBlock {
            fenced: true,
            fence_char: line[self.first_nonspace] as u8,
            fence_len,
            fence_offset: self.first_nonspace - self.offset,
            closed: false,
        };
        let count = self.first_nonspace + fence_len - self.offset;
        *container = self.add_child(kind);
        self.advance_offset(line, count, false);
        true
    }

    fn open_math_block(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        if !self.options.math_block || !scanners::math_block_fence(&line[self.first_nonspace..]) {
            return false;
        }
        let count = self.first_nonspace + 2 - self.offset;
        *container = self.add_child(NodeKind::MathBlock { closed: false });
        self.advance_offset(line, count, false);
        true
    }

    fn open_html_block(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        let rest = &line[self.first_nonspace..];
        let block_type = match scanners::html_block_start(rest) {
            Some(t) => t,
            None if !matches!(self.kind(*container), NodeKind::Paragraph)
                && scanners::html_block_start_7(rest) =>
            {
                7
            }
            None => return false,
        };
        *container = self.add_child(NodeKind::HtmlBlock { block_type });
        true
    }

    fn open_setext_heading(&mut self, container: NodeId, line: &[char]) -> bool {
        if !matches!(self.kind(container), NodeKind::Paragraph) {
            return false;
        }
        let Some(level) = scanners::setext_heading_line(&line[self.first_nonspace..]) else {
            return false;
        };
        if !self.resolve_reference_definitions(container) {
            // Nothing but definitions: the underline is paragraph text
            return false;
        }
        self.tree.node_mut(container).kind = NodeKind::Heading {
            level,
            setext: true,
        };
        trace!(node = %container, level, "setext heading");
        true
    }

    fn open_thematic_break(&mut self, container: NodeId, line: &[char], all_matched: bool) -> bool {
        if matches!(self.kind(container), NodeKind::Paragraph) && !all_matched {
            return false;
        }
        if !scanners::thematic_break(&line[self.first_nonspace..]) {
            return false;
        }
        self.close_unmatched();
        let mut parent = self.top();
        while !can_contain(self.kind(parent), &NodeKind::ThematicBreak) && self.stack.len() > 1 {
            self.finalize_top();
            parent = self.top();
        }
        let node = self.tree.new_node(NodeKind::ThematicBreak, "");
        self.track(node);
        self.tree.append_child(parent, node);
        trace!(node = %node, "thematic break");
        true
    }

    fn open_footnote_definition(&mut self, container: &mut NodeId, line: &[char]) -> bool {
        if !self.options.footnotes || self.stack.len() >= MAX_NESTING {
            return false;
        }
        let Some((label, matched)) = scanners::footnote_definition(&line[self.first_nonspace..])
        else {
            return false;
        };
        let count = self.first_nonspace + matched - self.offset;
        self.advance_offset(line, count, false);
        *container = self.add_child(NodeKind::FootnotesDef { label });
        true
    }

    fn open_list_item(&mut self, container: &mut NodeId, line: &[char], indented: bool) -> bool {
        let in_list = matches!(self.kind(*container), NodeKind::List(_));
        if (indented && !in_list) || self.indent >= CODE_INDENT || self.stack.len() >= MAX_NESTING
        {
            return false;
        }
        let interrupts_paragraph = matches!(self.kind(*container), NodeKind::Paragraph);
        let Some((matched, mut data)) =
            scanners::list_marker(&line[self.first_nonspace..], interrupts_paragraph)
        else {
            return false;
        };

        let count = self.first_nonspace + matched - self.offset;
        self.advance_offset(line, count, false);
        let (saved_tab, saved_offset, saved_column) =
            (self.partially_consumed_tab, self.offset, self.column);

        while self.column - saved_column <= 5 && is_space_or_tab(at(line, self.offset)) {
            self.advance_offset(line, 1, true);
        }

        let spaces = self.column - saved_column;
        if !(1..5).contains(&spaces) || scanners::is_line_end(at(line, self.offset)) {
            // Content starts with indented code, or the item is empty
            data.padding = matched + 1;
            self.offset = saved_offset;
            self.column = saved_column;
            self.partially_consumed_tab = saved_tab;
            if spaces > 0 {
                self.advance_offset(line, 1, true);
            }
        } else {
            data.padding = matched + spaces;
        }
        data.marker_offset = self.indent;

        let continues_list = match self.kind(*container) {
            NodeKind::List(list) => list.matches(&data),
            _ => false,
        };
        if !continues_list {
            *container = self.add_child(NodeKind::List(data));
        }
        *container = self.add_child(NodeKind::ListItem(data));
        true
    }

    fn open_indented_code(
        &mut self,
        container: &mut NodeId,
        line: &[char],
        indented: bool,
        maybe_lazy: bool,
    ) -> bool {
        if !indented || maybe_lazy || self.blank {
            return false;
        }
        self.advance_offset(line, CODE_INDENT, true);
        *container = self.add_child(NodeKind::CodeBlock {
            fenced: false,
            fence_char: 0,
            fence_len: 0,
            fence_offset: 0,
            closed: false,
        });
        true
    }

    /// Turns a one-line paragraph followed by a matching delimiter row into a
    /// table.
    fn open_table(&mut self, container: NodeId, line: &[char]) -> bool {
        if !self.options.gfm_table || !matches!(self.kind(container), NodeKind::Paragraph) {
            return false;
        }
        let header = self.tree.tokens(container);
        if header.trim_end().contains('\n') {
            return false;
        }
        let Some(aligns) = table::delimiter_row(&line[self.first_nonspace..]) else {
            return false;
        };
        if table::split_row(header).len() != aligns.len() {
            return false;
        }
        trace!(node = %container, columns = aligns.len(), "table");
        self.tree.node_mut(container).kind = NodeKind::Table { aligns };
        true
    }

    //////////////
    // Add text //
    //////////////

    fn add_text_to_container(&mut self, container: NodeId, line: &[char]) {
        self.find_first_nonspace(line);

        if self.blank
            && let Some(last_child) = self.tree.last_child(container)
        {
            self.states[last_child.index()].last_line_blank = true;
        }

        let last_line_blank = self.blank
            && match self.kind(container) {
                NodeKind::Blockquote
                | NodeKind::Heading { .. }
                | NodeKind::ThematicBreak
                | NodeKind::Table { .. } => false,
                NodeKind::CodeBlock { fenced, .. } => !fenced,
                NodeKind::ListItem(_) => {
                    self.tree.first_child(container).is_some()
                        || self.states[container.index()].start_line != self.line_number
                }
                _ => true,
            };
        self.states[container.index()].last_line_blank = last_line_blank;

        let mut tmp = container;
        while let Some(parent) = self.tree.parent(tmp) {
            self.states[parent.index()].last_line_blank = false;
            tmp = parent;
        }

        let tip = self.top();
        if tip != container && !self.blank && matches!(self.kind(tip), NodeKind::Paragraph) {
            // Lazy paragraph continuation
            self.add_line(tip, line);
            return;
        }
        self.close_unmatched();

        match self.kind(container).clone() {
            NodeKind::CodeBlock { .. } | NodeKind::MathBlock { .. } => self.add_line(container, line),
            NodeKind::HtmlBlock { block_type } => {
                self.add_line(container, line);
                if block_type <= 5
                    && scanners::html_block_end(&line[self.first_nonspace..], block_type)
                {
                    self.finalize_top();
                }
            }
            _ if self.blank => {}
            NodeKind::Heading { setext: false, .. } => {
                let count = self.first_nonspace - self.offset;
                self.advance_offset(line, count, false);
                let text: String = line[self.offset.min(line.len())..].iter().collect();
                let text = scanners::chop_trailing_hashes(&text).to_string();
                self.tree.node_mut(container).tokens.push_str(&text);
            }
            NodeKind::Paragraph | NodeKind::Heading { .. } | NodeKind::Table { .. } => {
                let count = self.first_nonspace - self.offset;
                self.advance_offset(line, count, false);
                self.add_line(container, line);
            }
            _ => {
                let paragraph = self.add_child(NodeKind::Paragraph);
                let count = self.first_nonspace - self.offset;
                self.advance_offset(line, count, false);
                self.add_line(paragraph, line);
            }
        }
    }

    fn add_line(&mut self, node: NodeId, line: &[char]) {
        let tokens = &mut self.tree.node_mut(node).tokens;
        if self.partially_consumed_tab {
            self.offset += 1;
            let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
            tokens.extend(std::iter::repeat_n(' ', chars_to_tab));
        }
        if self.offset < line.len() {
            tokens.extend(&line[self.offset..]);
        }
    }

    //////////////////////
    // Open and close   //
    //////////////////////

    fn track(&mut self, node: NodeId) {
        self.states.resize(self.tree.len(), BlockState::default());
        self.states[node.index()].start_line = self.line_number;
    }

    /// Appends a new open block under the innermost block that can hold it.
    fn add_child(&mut self, kind: NodeKind) -> NodeId {
        self.close_unmatched();
        while self.stack.len() > 1 && !can_contain(self.kind(self.top()), &kind) {
            self.finalize_top();
        }
        let parent = self.top();
        trace!(kind = kind.name(), parent = %parent, line = self.line_number, "open block");
        let node = self.tree.new_node(kind, "");
        self.track(node);
        self.tree.append_child(parent, node);
        self.stack.push(node);
        self.matched = self.stack.len() - 1;
        node
    }

    fn close_unmatched(&mut self) {
        while self.stack.len() > self.matched + 1 {
            self.finalize_top();
        }
    }

    fn finalize_top(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };
        if self.stack.is_empty() {
            // The document stays open
            self.stack.push(node);
            return;
        }
        self.matched = self.matched.min(self.stack.len() - 1);
        trace!(kind = self.kind(node).name(), node = %node, "close block");

        match self.kind(node).clone() {
            NodeKind::Paragraph => {
                if !self.resolve_reference_definitions(node) {
                    self.tree.unlink(node);
                } else if self.options.toc
                    && self.tree.tokens(node).trim().eq_ignore_ascii_case("[toc]")
                {
                    let n = self.tree.node_mut(node);
                    n.kind = NodeKind::ToC;
                    n.tokens.clear();
                }
            }
            NodeKind::Heading { .. } => {
                let n = self.tree.node_mut(node);
                n.tokens = n.tokens.trim().to_string();
            }
            NodeKind::CodeBlock {
                fenced,
                fence_char,
                fence_len,
                closed,
                ..
            } => self.finalize_code_block(node, fenced, fence_char, fence_len, closed),
            NodeKind::MathBlock { closed } => self.finalize_math_block(node, closed),
            NodeKind::List(_) => {
                let tight = self.determine_list_tight(node);
                let items: Vec<NodeId> = self.tree.children(node).collect();
                for id in std::iter::once(node).chain(items) {
                    if let NodeKind::List(data) | NodeKind::ListItem(data) =
                        &mut self.tree.node_mut(id).kind
                    {
                        data.tight = tight;
                    }
                }
            }
            NodeKind::Table { .. } => table::finalize(&mut self.tree, node),
            _ => {}
        }
    }

    /// Strips leading link reference definitions from a paragraph.
    /// Returns whether any content remains.
    fn resolve_reference_definitions(&mut self, node: NodeId) -> bool {
        let chars: Vec<char> = self.tree.tokens(node).chars().collect();
        let mut pos = 0;
        while at(&chars, pos) == '['
            && let Some((consumed, def)) = link::parse_reference_definition(&chars[pos..])
        {
            trace!(label = %def.label, destination = %def.destination, "link reference definition");
            self.tree.definitions.add_link(def);
            pos += consumed;
        }
        if pos > 0 {
            self.tree.node_mut(node).tokens = chars[pos..].iter().collect();
        }
        !self.tree.tokens(node).trim().is_empty()
    }

    fn finalize_code_block(
        &mut self,
        node: NodeId,
        fenced: bool,
        fence_char: u8,
        fence_len: usize,
        closed: bool,
    ) {
        let content = mem::take(&mut self.tree.node_mut(node).tokens);
        if !fenced {
            let mut code = content.trim_end_matches(['\n', ' ', '\t']).to_string();
            // Keep trailing spaces of the last real line
            if let Some(last) = content.lines().rev().find(|l| !l.trim().is_empty())
                && let Some(stripped) = code.strip_suffix(last.trim_end())
            {
                code = format!("{}{}", stripped, last);
            }
            code.push('\n');
            let child = self.tree.new_node(NodeKind::CodeBlockCode, code);
            self.tree.append_child(node, child);
            return;
        }

        let (info_line, code) = content.split_once('\n').unwrap_or((content.as_str(), ""));
        let info = link::clean(info_line.trim());
        let fence: String = std::iter::repeat_n(fence_char as char, fence_len).collect();

        let open = self.tree.new_node(NodeKind::CodeBlockFenceOpenMarker, fence.clone());
        self.tree.append_child(node, open);
        let info = self
            .tree
            .new_node(NodeKind::CodeBlockFenceInfoMarker { info }, "");
        self.tree.append_child(node, info);
        let code = self.tree.new_node(NodeKind::CodeBlockCode, code);
        self.tree.append_child(node, code);
        if closed {
            let close = self.tree.new_node(NodeKind::CodeBlockFenceCloseMarker, fence);
            self.tree.append_child(node, close);
        }
    }

    fn finalize_math_block(&mut self, node: NodeId, closed: bool) {
        let content = mem::take(&mut self.tree.node_mut(node).tokens);
        let math = content.split_once('\n').map_or("", |(_, rest)| rest);
        let math = math.trim_end_matches('\n').to_string();

        let open = self.tree.new_node(NodeKind::MathBlockOpenMarker, "$$");
        self.tree.append_child(node, open);
        let math = self.tree.new_node(NodeKind::MathBlockContent, math);
        self.tree.append_child(node, math);
        if closed {
            let close = self.tree.new_node(NodeKind::MathBlockCloseMarker, "$$");
            self.tree.append_child(node, close);
        }
    }

    fn ends_with_blank_line(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.states[n.index()].last_line_blank {
                return true;
            }
            current = match self.kind(n) {
                NodeKind::List(_) | NodeKind::ListItem(_) => self.tree.last_child(n),
                _ => None,
            };
        }
        false
    }

    fn determine_list_tight(&self, list: NodeId) -> bool {
        for item in self.tree.children(list) {
            let has_next = self.tree.next(item).is_some();
            if self.states[item.index()].last_line_blank && has_next {
                return false;
            }
            for child in self.tree.children(item) {
                if (has_next || self.tree.next(child).is_some()) && self.ends_with_blank_line(child)
                {
                    return false;
                }
            }
        }
        true
    }

    ////////////////////
    // Inline phase   //
    ////////////////////

    /// Detaches footnote definitions into the definition table.
    fn collect_footnotes(&mut self) {
        let mut defs = Vec::new();
        let root = self.tree.root();
        self.tree.walk(root, &mut |n, entering| {
            if entering && matches!(self.tree.kind(n), NodeKind::FootnotesDef { .. }) {
                defs.push(n);
                return WalkStatus::SkipChildren;
            }
            WalkStatus::Continue
        });

        for def in defs {
            self.tree.unlink(def);
            let NodeKind::FootnotesDef { label } = self.kind(def).clone() else {
                continue;
            };
            if !self.tree.definitions.add_footnote(&label, def) {
                debug!(label = %label, "duplicate footnote definition ignored");
            }
        }
    }

    fn process_inlines(&mut self) {
        let mut roots = vec![self.tree.root()];
        roots.extend(self.tree.definitions.footnotes().iter().map(|f| f.node));

        let mut blocks = Vec::new();
        for root in roots {
            self.tree.walk(root, &mut |n, entering| {
                if entering && self.tree.kind(n).contains_inlines() {
                    blocks.push(n);
                }
                WalkStatus::Continue
            });
        }

        let defs = mem::take(&mut self.tree.definitions);
        for block in &blocks {
            parse_inlines(&mut self.tree, *block, &defs, self.options);
        }
        self.tree.definitions = defs;
        debug!(blocks = blocks.len(), "expanded inline content");
    }
}

fn can_contain(parent: &NodeKind, child: &NodeKind) -> bool {
    match parent {
        NodeKind::Document
        | NodeKind::Blockquote
        | NodeKind::ListItem(_)
        | NodeKind::FootnotesDef { .. } => {
            child.is_block() && !matches!(child, NodeKind::ListItem(_) | NodeKind::Document)
        }
        NodeKind::List(_) => matches!(child, NodeKind::ListItem(_)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ListType, NodeKind};
    use pretty_assertions::assert_eq;

    fn kinds(tree: &Tree, node: NodeId) -> Vec<&'static str> {
        tree.children(node).map(|c| tree.kind(c).name()).collect()
    }

    fn parse_default(input: &str) -> Tree {
        parse(input, &Options::default())
    }

    #[test]
    fn test_empty_document() {
        let tree = parse_default("");
        assert!(tree.is_empty());
        assert!(tree.check_links(tree.root()));
    }

    #[test]
    fn test_block_sequence() {
        let tree = parse_default("# Title\n\ntext\n\n> quote\n\n---\n\n```rust\nfn f() {}\n```\n");
        assert_eq!(
            kinds(&tree, tree.root()),
            vec!["heading", "paragraph", "blockquote", "thematic-break", "code-block"]
        );
    }

    #[test]
    fn test_mixed_markers_are_not_a_break() {
        let tree = parse_default("-*-\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["paragraph"]);
    }

    #[test]
    fn test_lazy_continuation() {
        let tree = parse_default("> a\nb\n");
        let quote = tree.first_child(tree.root()).unwrap();
        assert_eq!(kinds(&tree, tree.root()), vec!["blockquote"]);
        assert_eq!(kinds(&tree, quote), vec!["paragraph"]);
        assert_eq!(tree.text(quote), "a\nb");
    }

    #[test]
    fn test_list_tightness() {
        let tight = parse_default("- a\n- b\n");
        let list = tight.first_child(tight.root()).unwrap();
        assert!(matches!(tight.kind(list), NodeKind::List(d) if d.tight));

        let loose = parse_default("- a\n\n- b\n");
        let list = loose.first_child(loose.root()).unwrap();
        assert!(matches!(loose.kind(list), NodeKind::List(d) if !d.tight));
        assert_eq!(kinds(&loose, list), vec!["list-item", "list-item"]);
    }

    #[test]
    fn test_changing_bullet_starts_new_list() {
        let tree = parse_default("- a\n+ b\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["list", "list"]);
    }

    #[test]
    fn test_ordered_list_interrupting_paragraph_must_start_at_one() {
        let tree = parse_default("text\n2. no\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["paragraph"]);
        let tree = parse_default("text\n1. yes\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["paragraph", "list"]);
    }

    #[test]
    fn test_reference_definition_only() {
        let tree = parse_default("[label]: /url \"title\"\n");
        assert!(tree.is_empty());
        let def = tree.definitions.link("LABEL").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title.as_deref(), Some("title"));
    }

    #[test]
    fn test_unterminated_fence_closes_at_end() {
        let tree = parse_default("```\ncode\n");
        let code = tree.first_child(tree.root()).unwrap();
        assert_eq!(
            kinds(&tree, code),
            vec!["code-block-open-marker", "code-block-info", "code-block-code"]
        );
        assert_eq!(tree.text(code), "code\n");
    }

    #[test]
    fn test_indented_code_strips_trailing_blank_lines() {
        let tree = parse_default("    a\n    b\n\n\n");
        let code = tree.first_child(tree.root()).unwrap();
        assert!(matches!(tree.kind(code), NodeKind::CodeBlock { fenced: false, .. }));
        assert_eq!(tree.text(code), "a\nb\n");
    }

    #[test]
    fn test_math_block() {
        let tree = parse_default("$$\nx^2\n$$\n");
        let math = tree.first_child(tree.root()).unwrap();
        assert_eq!(
            kinds(&tree, math),
            vec![
                "math-block-open-marker",
                "math-block-content",
                "math-block-close-marker"
            ]
        );
        assert_eq!(tree.text(math), "x^2");
    }

    #[test]
    fn test_table() {
        let tree = parse_default("| a | b |\n| :- | -: |\n| 1 | 2 | 3 |\n| 4 |\n");
        let table = tree.first_child(tree.root()).unwrap();
        assert_eq!(kinds(&tree, table), vec!["table-head", "table-row", "table-row"]);
        for row in tree.children(table) {
            assert_eq!(tree.children(row).count(), 2);
        }
    }

    #[test]
    fn test_footnote_definition_is_detached() {
        let tree = parse_default("text[^1]\n\n[^1]: the note\n    more\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["paragraph"]);
        let (index, def) = tree.definitions.footnote("1").unwrap();
        assert_eq!(index, 1);
        assert_eq!(tree.parent(def.node), None);
        assert_eq!(tree.text(def.node), "the note\nmore");
    }

    #[test]
    fn test_toc_placeholder() {
        let tree = parse_default("[toc]\n\n# A\n");
        assert_eq!(kinds(&tree, tree.root()), vec!["toc", "heading"]);
    }

    #[test]
    fn test_task_list() {
        let tree = parse_default("- [x] done\n- [ ] todo\n");
        let list = tree.first_child(tree.root()).unwrap();
        assert!(matches!(tree.kind(list), NodeKind::List(d) if d.typ == ListType::Task));
        let item = tree.first_child(list).unwrap();
        let para = tree.first_child(item).unwrap();
        assert!(matches!(
            tree.kind(tree.first_child(para).unwrap()),
            NodeKind::TaskListItemMarker { checked: true }
        ));
    }

    #[test]
    fn test_crlf_and_nul() {
        let tree = parse_default("a\r\nb\0\r");
        let para = tree.first_child(tree.root()).unwrap();
        assert_eq!(tree.text(para), "a\nb\u{FFFD}");
    }
}
