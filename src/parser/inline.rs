//! Inline parser
//!
//! Expands the raw text of a paragraph, heading or table cell into inline
//! nodes. Emphasis is resolved with a delimiter stack, links with a bracket
//! stack; code spans, math, autolinks and raw HTML are matched directly and
//! their content never takes part in delimiter scanning.

use tracing::trace;

use crate::ast::{Definitions, LinkType, ListType, NodeId, NodeKind, Tree};
use crate::options::Options;

use super::link::{
    scan_entity, scan_link_destination, scan_link_label, scan_link_title,
    skip_spaces_and_newline,
};
use super::scanners::at;

/// Replaces the raw `tokens` of `block` with parsed inline children.
///
/// `defs` is only read: link and footnote references resolve against it.
pub fn parse_inlines(tree: &mut Tree, block: NodeId, defs: &Definitions, options: &Options) {
    let raw = std::mem::take(&mut tree.node_mut(block).tokens);
    let mut text = raw.trim().to_string();

    let mut heading_id = None;
    if options.heading_id
        && matches!(tree.kind(block), NodeKind::Heading { setext: false, .. })
        && let Some((content, id)) = split_heading_id(&text)
    {
        heading_id = Some(id.to_string());
        text = content.to_string();
    }

    if options.gfm_task_list_item
        && let Some((checked, rest)) = split_task_marker(&text)
        && let Some(item) = tree.parent(block)
        && matches!(tree.kind(item), NodeKind::ListItem(_))
        && tree.first_child(item) == Some(block)
    {
        let marker = tree.new_node(NodeKind::TaskListItemMarker { checked }, "");
        tree.append_child(block, marker);
        mark_task_list(tree, item);
        text = rest.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let parser = InlineParser {
        tree: &mut *tree,
        block,
        chars,
        pos: 0,
        defs,
        options,
        delimiters: Vec::new(),
        brackets: Vec::new(),
        next_delimiter_id: 1,
    };
    parser.parse();

    if let Some(id) = heading_id {
        let node = tree.new_node(NodeKind::HeadingId, id);
        tree.append_child(block, node);
    }
}

/// Splits a trailing ` {id}` off heading content.
fn split_heading_id(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    let id = &inner[open + 1..];
    let content = &inner[..open];
    if id.is_empty()
        || id.contains(|c: char| c.is_whitespace() || c == '{' || c == '}')
        || !content.ends_with([' ', '\t'])
    {
        return None;
    }
    Some((content.trim_end(), id.strip_prefix('#').unwrap_or(id)))
}

/// `[ ]`, `[x]` or `[X]` followed by whitespace.
fn split_task_marker(text: &str) -> Option<(bool, &str)> {
    let checked = match text.get(..3)? {
        "[ ]" => false,
        "[x]" | "[X]" => true,
        _ => return None,
    };
    let rest = &text[3..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((checked, rest.trim_start()))
}

fn mark_task_list(tree: &mut Tree, item: NodeId) {
    let list = tree.parent(item);
    for node in std::iter::once(item).chain(list) {
        if let NodeKind::List(data) | NodeKind::ListItem(data) = &mut tree.node_mut(node).kind {
            data.typ = ListType::Task;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Delimiter {
    /// Increases with source position; used to bound opener searches.
    id: usize,
    node: NodeId,
    ch: char,
    /// Characters left in the run.
    num: usize,
    orig_len: usize,
    can_open: bool,
    can_close: bool,
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    node: NodeId,
    image: bool,
    active: bool,
    /// Index just after the `[`.
    position: usize,
    /// Delimiter stack height when the bracket was pushed.
    delim_bottom: usize,
}

/// Resolved link target.
struct Target {
    link_type: LinkType,
    ref_label: String,
    destination: String,
    title: Option<String>,
    end: usize,
}

struct InlineParser<'a> {
    tree: &'a mut Tree,
    block: NodeId,
    chars: Vec<char>,
    pos: usize,
    defs: &'a Definitions,
    options: &'a Options,
    delimiters: Vec<Delimiter>,
    brackets: Vec<Bracket>,
    next_delimiter_id: usize,
}

fn is_special(c: char) -> bool {
    matches!(
        c,
        '\n' | '\\' | '`' | '*' | '_' | '~' | '$' | '[' | ']' | '!' | '<' | '&'
    )
}

impl InlineParser<'_> {
    fn parse(mut self) {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            let handled = match c {
                '\n' => {
                    self.handle_newline();
                    true
                }
                '\\' => self.handle_backslash(),
                '`' => self.handle_backticks(),
                '*' | '_' => {
                    self.handle_delimiter(c);
                    true
                }
                '~' if self.options.gfm_strikethrough => {
                    self.handle_delimiter(c);
                    true
                }
                '$' if self.options.inline_math => self.handle_dollars(),
                '[' => self.handle_open_bracket(),
                '!' if at(&self.chars, self.pos + 1) == '[' => {
                    self.push_bracket(true);
                    true
                }
                ']' => {
                    self.handle_close_bracket();
                    true
                }
                '<' => self.handle_pointy_brace(),
                '&' => self.handle_entity(),
                _ => false,
            };
            if !handled {
                self.handle_text();
            }
        }

        self.process_emphasis(0);
        merge_text(self.tree, self.block);
    }

    fn append(&mut self, kind: NodeKind, tokens: impl Into<String>) -> NodeId {
        let node = self.tree.new_node(kind, tokens);
        self.tree.append_child(self.block, node);
        node
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn handle_text(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.chars.len() && !is_special(self.chars[self.pos]) {
            self.pos += 1;
        }
        let text = self.slice(start, self.pos);
        self.append(NodeKind::Text, text);
    }

    fn skip_spaces(&mut self) {
        while matches!(at(&self.chars, self.pos), ' ' | '\t') && self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    fn handle_newline(&mut self) {
        self.pos += 1;
        let mut hard = false;
        if let Some(last) = self.tree.last_child(self.block)
            && matches!(self.tree.kind(last), NodeKind::Text)
        {
            let tokens = &mut self.tree.node_mut(last).tokens;
            let trimmed_len = tokens.trim_end_matches(' ').len();
            hard = tokens.len() - trimmed_len >= 2;
            tokens.truncate(trimmed_len);
            if tokens.is_empty() {
                self.tree.unlink(last);
            }
        }
        let kind = if hard {
            NodeKind::HardBreak
        } else {
            NodeKind::SoftBreak
        };
        self.append(kind, "");
        self.skip_spaces();
    }

    fn handle_backslash(&mut self) -> bool {
        let next = at(&self.chars, self.pos + 1);
        if self.pos + 1 < self.chars.len() && next == '\n' {
            self.pos += 2;
            self.append(NodeKind::HardBreak, "");
            self.skip_spaces();
            return true;
        }
        if self.pos + 1 < self.chars.len() && next.is_ascii_punctuation() {
            self.pos += 2;
            let backslash = self.append(NodeKind::Backslash, "\\");
            let content = self
                .tree
                .new_node(NodeKind::BackslashContent, next.to_string());
            self.tree.append_child(backslash, content);
            return true;
        }
        false
    }

    fn run_length(&self, start: usize, c: char) -> usize {
        self.chars[start..].iter().take_while(|&&x| x == c).count()
    }

    /// Finds a run of exactly `len` copies of `c` at or after `from`.
    fn find_closing_run(&self, from: usize, c: char, len: usize) -> Option<usize> {
        let mut i = from;
        while i < self.chars.len() {
            if self.chars[i] == c {
                let run = self.run_length(i, c);
                if run == len {
                    return Some(i);
                }
                i += run;
            } else {
                i += 1;
            }
        }
        None
    }

    fn handle_backticks(&mut self) -> bool {
        let start = self.pos;
        let len = self.run_length(start, '`');
        let content_start = start + len;

        let Some(close) = self.find_closing_run(content_start, '`', len) else {
            self.pos = content_start;
            self.append(NodeKind::Text, "`".repeat(len));
            return true;
        };

        let mut content = self.slice(content_start, close).replace('\n', " ");
        if content.len() >= 2
            && content.starts_with(' ')
            && content.ends_with(' ')
            && !content.chars().all(|c| c == ' ')
        {
            content = content[1..content.len() - 1].to_string();
        }

        let ticks = "`".repeat(len);
        let span = self.append(NodeKind::CodeSpan { marker_len: len }, "");
        for (kind, tokens) in [
            (NodeKind::CodeSpanOpenMarker, ticks.clone()),
            (NodeKind::CodeSpanContent, content),
            (NodeKind::CodeSpanCloseMarker, ticks),
        ] {
            let child = self.tree.new_node(kind, tokens);
            self.tree.append_child(span, child);
        }
        self.pos = close + len;
        true
    }

    fn handle_dollars(&mut self) -> bool {
        let start = self.pos;
        let len = self.run_length(start, '$');
        if len > 2 {
            self.pos += len;
            self.append(NodeKind::Text, "$".repeat(len));
            return true;
        }
        let content_start = start + len;
        if matches!(at(&self.chars, content_start), ' ' | '\t' | '\n') {
            return false;
        }

        let mut search = content_start;
        let close = loop {
            let Some(close) = self.find_closing_run(search, '$', len) else {
                return false;
            };
            let valid = close > content_start
                && self.chars[close - 1] != '\\'
                && !self.chars[close - 1].is_whitespace()
                && !(len == 1 && at(&self.chars, close + len).is_ascii_digit());
            if valid {
                break close;
            }
            search = close + len;
        };

        let marker = "$".repeat(len);
        let content = self.slice(content_start, close);
        let math = self.append(NodeKind::InlineMath, "");
        for (kind, tokens) in [
            (NodeKind::InlineMathOpenMarker, marker.clone()),
            (NodeKind::InlineMathContent, content),
            (NodeKind::InlineMathCloseMarker, marker),
        ] {
            let child = self.tree.new_node(kind, tokens);
            self.tree.append_child(math, child);
        }
        self.pos = close + len;
        true
    }

    fn handle_entity(&mut self) -> bool {
        let Some((decoded, end)) = scan_entity(&self.chars, self.pos) else {
            return false;
        };
        let raw = self.slice(self.pos, end);
        self.pos = end;
        self.append(NodeKind::HtmlEntity { decoded }, raw);
        true
    }

    fn handle_pointy_brace(&mut self) -> bool {
        if let Some((content, destination, end)) = scan_autolink(&self.chars, self.pos) {
            let link = self.append(
                NodeKind::Link {
                    link_type: LinkType::Autolink,
                    ref_label: String::new(),
                },
                "",
            );
            let text = self.tree.new_node(NodeKind::Text, content);
            self.tree.append_child(link, text);
            let dest = self.tree.new_node(NodeKind::LinkDest, destination);
            self.tree.append_child(link, dest);
            self.pos = end;
            return true;
        }
        if let Some(end) = scan_html_tag(&self.chars, self.pos) {
            let html = self.slice(self.pos, end);
            self.append(NodeKind::InlineHtml, html);
            self.pos = end;
            return true;
        }
        false
    }

    ////////////////
    // Emphasis   //
    ////////////////

    fn handle_delimiter(&mut self, c: char) {
        let start = self.pos;
        let len = self.run_length(start, c);
        let before = if start == 0 {
            '\n'
        } else {
            self.chars[start - 1]
        };
        let after = at(&self.chars, start + len);

        let left = is_left_flanking(before, after);
        let right = is_right_flanking(before, after);
        let (can_open, can_close) = if c == '_' {
            (
                left && (!right || is_punctuation(before)),
                right && (!left || is_punctuation(after)),
            )
        } else {
            (left, right)
        };

        self.pos += len;
        let node = self.append(NodeKind::Text, c.to_string().repeat(len));
        if (can_open || can_close) && !(c == '~' && len > 2) {
            self.delimiters.push(Delimiter {
                id: self.next_delimiter_id,
                node,
                ch: c,
                num: len,
                orig_len: len,
                can_open,
                can_close,
            });
            self.next_delimiter_id += 1;
        }
    }

    /// Matches closers with openers above stack index `bottom`, then drops
    /// every delimiter above it.
    fn process_emphasis(&mut self, bottom: usize) {
        // Per character, closer length mod 3 and closer can-open: the id at
        // or below which no opener can be found
        let mut openers_bottom = [[[0usize; 2]; 3]; 3];

        let mut ci = bottom;
        while ci < self.delimiters.len() {
            let closer = self.delimiters[ci];
            if !closer.can_close {
                ci += 1;
                continue;
            }
            let char_index = match closer.ch {
                '*' => 0,
                '_' => 1,
                _ => 2,
            };
            let memo = &mut openers_bottom[char_index][closer.orig_len % 3][closer.can_open as usize];

            let mut opener = None;
            let mut j = ci;
            while j > bottom {
                j -= 1;
                let d = &self.delimiters[j];
                if d.id <= *memo {
                    break;
                }
                if d.ch != closer.ch || !d.can_open {
                    continue;
                }
                let compatible = if closer.ch == '~' {
                    d.orig_len == closer.orig_len
                } else {
                    let odd_match = (closer.can_open || d.can_close)
                        && (d.orig_len + closer.orig_len) % 3 == 0
                        && !(d.orig_len % 3 == 0 && closer.orig_len % 3 == 0);
                    !odd_match
                };
                if compatible {
                    opener = Some(j);
                    break;
                }
            }

            match opener {
                Some(oi) => ci = self.insert_emphasis(oi, ci),
                None => {
                    *memo = if ci > 0 { self.delimiters[ci - 1].id } else { 0 };
                    if closer.can_open {
                        ci += 1;
                    } else {
                        self.delimiters.remove(ci);
                    }
                }
            }
        }

        self.delimiters.truncate(bottom);
    }

    /// Wraps the nodes between opener `oi` and closer `ci` and returns the
    /// stack index of the closer afterwards.
    fn insert_emphasis(&mut self, oi: usize, ci: usize) -> usize {
        let opener = self.delimiters[oi];
        let closer = self.delimiters[ci];
        let used = if closer.ch == '~' {
            closer.num
        } else if closer.num >= 2 && opener.num >= 2 {
            2
        } else {
            1
        };

        for d in [opener, closer] {
            let tokens = &mut self.tree.node_mut(d.node).tokens;
            tokens.truncate(tokens.len() - used);
        }
        self.delimiters[oi].num -= used;
        self.delimiters[ci].num -= used;

        let (kind, open_kind, close_kind) = match (closer.ch, used) {
            ('~', _) => (
                NodeKind::Strikethrough,
                NodeKind::StrikethroughOpenMarker,
                NodeKind::StrikethroughCloseMarker,
            ),
            (_, 2) => (
                NodeKind::Strong,
                NodeKind::StrongOpenMarker,
                NodeKind::StrongCloseMarker,
            ),
            _ => (
                NodeKind::Emphasis,
                NodeKind::EmOpenMarker,
                NodeKind::EmCloseMarker,
            ),
        };
        let marker = closer.ch.to_string().repeat(used);
        trace!(kind = kind.name(), marker = %marker, "emphasis");

        let emph = self.tree.new_node(kind, "");
        self.tree.insert_after(opener.node, emph);
        let open = self.tree.new_node(open_kind, marker.clone());
        self.tree.append_child(emph, open);
        let mut current = self.tree.next(emph);
        while let Some(n) = current {
            if n == closer.node {
                break;
            }
            current = self.tree.next(n);
            self.tree.append_child(emph, n);
        }
        let close = self.tree.new_node(close_kind, marker);
        self.tree.append_child(emph, close);

        // Delimiters between the two can no longer match anything
        self.delimiters.drain(oi + 1..ci);
        let mut ci = oi + 1;

        if self.delimiters[oi].num == 0 {
            self.tree.unlink(opener.node);
            self.delimiters.remove(oi);
            ci -= 1;
        }
        if self.delimiters[ci].num == 0 {
            self.tree.unlink(closer.node);
            self.delimiters.remove(ci);
        }
        ci
    }

    //////////////////////
    // Links and images //
    //////////////////////

    fn push_bracket(&mut self, image: bool) {
        let marker = if image { "![" } else { "[" };
        let node = self.append(NodeKind::Text, marker);
        self.pos += marker.len();
        self.brackets.push(Bracket {
            node,
            image,
            active: true,
            position: self.pos,
            delim_bottom: self.delimiters.len(),
        });
    }

    fn handle_open_bracket(&mut self) -> bool {
        let next = at(&self.chars, self.pos + 1);
        if next == '[' && self.options.wikilink && self.try_wikilink() {
            return true;
        }
        if next == '^' && self.options.footnotes && self.try_footnote_ref() {
            return true;
        }
        self.push_bracket(false);
        true
    }

    fn try_wikilink(&mut self) -> bool {
        let start = self.pos + 2;
        let mut end = start;
        while end + 1 < self.chars.len() && !(self.chars[end] == ']' && self.chars[end + 1] == ']')
        {
            if matches!(self.chars[end], '\n' | '[' | ']') {
                return false;
            }
            end += 1;
        }
        if end + 1 >= self.chars.len() {
            return false;
        }
        let content = self.slice(start, end);
        let (target, alias) = match content.split_once('|') {
            Some((target, alias)) => (target.trim(), alias.trim()),
            None => (content.trim(), content.trim()),
        };
        if target.is_empty() {
            return false;
        }
        let shown = if alias.is_empty() { target } else { alias };

        let link = self.tree.new_node(NodeKind::WikiLink, target);
        let text = self.tree.new_node(NodeKind::Text, shown);
        self.tree.append_child(link, text);
        self.tree.append_child(self.block, link);
        self.pos = end + 2;
        true
    }

    fn try_footnote_ref(&mut self) -> bool {
        let start = self.pos + 2;
        let mut end = start;
        while end < self.chars.len() && self.chars[end] != ']' {
            if self.chars[end].is_whitespace() || self.chars[end] == '[' {
                return false;
            }
            end += 1;
        }
        if end >= self.chars.len() || end == start {
            return false;
        }
        let label = self.slice(start, end);
        let Some((index, _)) = self.defs.footnote(&label) else {
            return false;
        };
        self.append(NodeKind::FootnotesRef { label, index }, "");
        self.pos = end + 1;
        true
    }

    fn handle_close_bracket(&mut self) {
        let close = self.pos;
        self.pos += 1;

        let Some(bracket) = self.brackets.last().copied() else {
            self.append(NodeKind::Text, "]");
            return;
        };
        if !bracket.active {
            self.brackets.pop();
            self.append(NodeKind::Text, "]");
            return;
        }

        let Some(target) = self.resolve_target(bracket, close) else {
            self.brackets.pop();
            self.append(NodeKind::Text, "]");
            return;
        };
        self.pos = target.end;
        self.build_link(bracket, target);

        self.process_emphasis(bracket.delim_bottom);
        self.brackets.pop();
        if !bracket.image {
            for earlier in &mut self.brackets {
                if !earlier.image {
                    earlier.active = false;
                }
            }
        }
    }

    fn resolve_target(&self, bracket: Bracket, close: usize) -> Option<Target> {
        let after = close + 1;
        if at(&self.chars, after) == '('
            && after < self.chars.len()
            && let Some(target) = self.inline_target(after)
        {
            return Some(target);
        }

        let (link_type, label, end) = match scan_link_label(&self.chars, after) {
            Some((label, end)) => (LinkType::Reference, label, end),
            None => {
                let text = self.slice(bracket.position, close);
                if at(&self.chars, after) == '[' && at(&self.chars, after + 1) == ']' {
                    (LinkType::Collapsed, text, after + 2)
                } else {
                    (LinkType::Shortcut, text, after)
                }
            }
        };
        if label.trim().is_empty() || label.chars().count() > 999 {
            return None;
        }
        let def = self.defs.link(&label)?;
        Some(Target {
            link_type,
            ref_label: label,
            destination: def.destination.clone(),
            title: def.title.clone(),
            end,
        })
    }

    /// `(dest "title")` starting at the `(`.
    fn inline_target(&self, open: usize) -> Option<Target> {
        let chars = &self.chars;
        let mut i = skip_spaces_and_newline(chars, open + 1);
        let (destination, dest_end) = if at(chars, i) == ')' {
            (String::new(), i)
        } else {
            scan_link_destination(chars, i)?
        };
        i = skip_spaces_and_newline(chars, dest_end);

        let mut title = None;
        if i > dest_end
            && let Some((t, title_end)) = scan_link_title(chars, i)
        {
            title = Some(t);
            i = skip_spaces_and_newline(chars, title_end);
        }
        if at(chars, i) != ')' || i >= chars.len() {
            return None;
        }
        Some(Target {
            link_type: LinkType::Inline,
            ref_label: String::new(),
            destination,
            title,
            end: i + 1,
        })
    }

    fn build_link(&mut self, bracket: Bracket, target: Target) {
        let kind = if bracket.image {
            NodeKind::Image {
                link_type: target.link_type,
                ref_label: target.ref_label,
            }
        } else {
            NodeKind::Link {
                link_type: target.link_type,
                ref_label: target.ref_label,
            }
        };
        trace!(kind = kind.name(), destination = %target.destination, "link");

        let link = self.tree.new_node(kind, "");
        self.tree.insert_before(bracket.node, link);
        if bracket.image {
            let bang = self.tree.new_node(NodeKind::Bang, "!");
            self.tree.append_child(link, bang);
        }
        let open = self.tree.new_node(NodeKind::OpenBracket, "[");
        self.tree.append_child(link, open);

        let mut current = self.tree.next(bracket.node);
        while let Some(n) = current {
            current = self.tree.next(n);
            self.tree.append_child(link, n);
        }
        self.tree.unlink(bracket.node);

        let mut tail = vec![
            (NodeKind::CloseBracket, "]".to_string()),
            (NodeKind::OpenParen, "(".to_string()),
            (NodeKind::LinkDest, target.destination),
        ];
        if let Some(title) = target.title {
            tail.push((NodeKind::LinkSpace, " ".to_string()));
            tail.push((NodeKind::LinkTitle, title));
        }
        tail.push((NodeKind::CloseParen, ")".to_string()));
        for (kind, tokens) in tail {
            let child = self.tree.new_node(kind, tokens);
            self.tree.append_child(link, child);
        }
    }
}

/// Joins adjacent text nodes and drops empty ones, below `node`.
fn merge_text(tree: &mut Tree, node: NodeId) {
    let mut current = tree.first_child(node);
    while let Some(n) = current {
        if !matches!(tree.kind(n), NodeKind::Text) {
            merge_text(tree, n);
            current = tree.next(n);
            continue;
        }
        while let Some(next) = tree.next(n)
            && matches!(tree.kind(next), NodeKind::Text)
        {
            let tail = std::mem::take(&mut tree.node_mut(next).tokens);
            tree.node_mut(n).tokens.push_str(&tail);
            tree.unlink(next);
        }
        current = tree.next(n);
        if tree.tokens(n).is_empty() {
            tree.unlink(n);
        }
    }
}

/// Unicode punctuation or symbol, for flanking rules.
fn is_punctuation(c: char) -> bool {
    if c.is_ascii_punctuation() {
        return true;
    }
    matches!(c as u32,
        0x00A1..=0x00BF | 0x00D7 | 0x00F7 |
        0x20A0..=0x20CF |
        0x2000..=0x206F |
        0x2E00..=0x2E7F |
        0x2190..=0x23FF |
        0x2500..=0x27BF |
        0x27C0..=0x27EF | 0x27F0..=0x297F | 0x2980..=0x29FF |
        0x2B00..=0x2BFF |
        0x3000..=0x303F |
        0xFF01..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65
    )
}

fn is_left_flanking(before: char, after: char) -> bool {
    if after.is_whitespace() {
        return false;
    }
    if !is_punctuation(after) {
        return true;
    }
    before.is_whitespace() || is_punctuation(before)
}

fn is_right_flanking(before: char, after: char) -> bool {
    if before.is_whitespace() {
        return false;
    }
    if !is_punctuation(before) {
        return true;
    }
    after.is_whitespace() || is_punctuation(after)
}

/// `<scheme:...>` or `<user@host>` at `start`.
///
/// Returns the shown text, the destination and the index after the `>`.
fn scan_autolink(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let mut i = start + 1;
    while i < chars.len() && !matches!(chars[i], '>' | '<') && !chars[i].is_whitespace() {
        i += 1;
    }
    if at(chars, i) != '>' || i >= chars.len() || i == start + 1 {
        return None;
    }
    let content: String = chars[start + 1..i].iter().collect();

    if is_email_address(&content) {
        let destination = format!("mailto:{}", content);
        return Some((content, destination, i + 1));
    }
    if is_absolute_uri(&content) {
        let destination = content.replace('\\', "%5C");
        return Some((content, destination, i + 1));
    }
    None
}

fn is_absolute_uri(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && !text.chars().any(|c| c.is_ascii_control())
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));
    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|part| {
            !part.is_empty()
                && part.len() <= 63
                && !part.starts_with('-')
                && !part.ends_with('-')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}

/// Scans a raw HTML construct at `start` (`<`): open or closing tag,
/// comment, processing instruction, declaration or CDATA section.
///
/// Returns the index after it.
pub fn scan_html_tag(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'<') {
        return None;
    }
    let rest = &chars[start + 1..];
    let starts = |prefix: &str| {
        prefix.chars().count() <= rest.len() && prefix.chars().zip(rest).all(|(a, &b)| a == b)
    };

    let end = if starts("!--") {
        let body = start + 4;
        if starts("!-->") {
            body + 1
        } else if starts("!--->") {
            body + 2
        } else {
            find_sequence(chars, body, "-->")? + 3
        }
    } else if starts("?") {
        find_sequence(chars, start + 2, "?>")? + 2
    } else if starts("![CDATA[") {
        find_sequence(chars, start + 9, "]]>")? + 3
    } else if starts("!") {
        if !at(chars, start + 2).is_ascii_alphabetic() {
            return None;
        }
        find_sequence(chars, start + 2, ">")? + 1
    } else if starts("/") {
        let mut i = scan_tag_name(chars, start + 2)?;
        while matches!(at(chars, i), ' ' | '\t' | '\n') && i < chars.len() {
            i += 1;
        }
        if at(chars, i) != '>' || i >= chars.len() {
            return None;
        }
        i + 1
    } else {
        scan_open_tag(chars, start + 1)?
    };
    Some(end)
}

fn find_sequence(chars: &[char], from: usize, seq: &str) -> Option<usize> {
    let seq: Vec<char> = seq.chars().collect();
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(seq.len())
        .position(|w| w == seq.as_slice())
        .map(|p| from + p)
}

fn scan_tag_name(chars: &[char], start: usize) -> Option<usize> {
    if !chars.get(start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        i += 1;
    }
    Some(i)
}

// Spaces, tabs and at most one line ending.
fn skip_tag_whitespace(chars: &[char], mut i: usize) -> Option<usize> {
    let mut newline_seen = false;
    while i < chars.len() && matches!(chars[i], ' ' | '\t' | '\n') {
        if chars[i] == '\n' {
            if newline_seen {
                return None;
            }
            newline_seen = true;
        }
        i += 1;
    }
    Some(i)
}

fn scan_open_tag(chars: &[char], start: usize) -> Option<usize> {
    let mut i = scan_tag_name(chars, start)?;

    loop {
        let before_space = i;
        i = skip_tag_whitespace(chars, i)?;
        match chars.get(i)? {
            '>' => return Some(i + 1),
            '/' if chars.get(i + 1) == Some(&'>') => return Some(i + 2),
            _ => {}
        }
        // Attributes must be separated from what precedes them
        if i == before_space {
            return None;
        }

        let c = *chars.get(i)?;
        if !(c.is_ascii_alphabetic() || c == '_' || c == ':') {
            return None;
        }
        i += 1;
        while i < chars.len()
            && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '.' | ':' | '-'))
        {
            i += 1;
        }

        let after_name = i;
        i = skip_tag_whitespace(chars, i)?;
        if chars.get(i) != Some(&'=') {
            i = after_name;
            continue;
        }
        i = skip_tag_whitespace(chars, i + 1)?;
        match *chars.get(i)? {
            q @ ('"' | '\'') => {
                let close = chars[i + 1..].iter().position(|&c| c == q)?;
                i += close + 2;
            }
            _ => {
                let value_start = i;
                while i < chars.len()
                    && !matches!(
                        chars[i],
                        ' ' | '\t' | '\n' | '"' | '\'' | '=' | '<' | '>' | '`'
                    )
                {
                    i += 1;
                }
                if i == value_start {
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LinkRefDef;
    use pretty_assertions::assert_eq;

    fn parse_with(text: &str, defs: &Definitions, options: &Options) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let para = tree.new_node(NodeKind::Paragraph, text);
        let root = tree.root();
        tree.append_child(root, para);
        parse_inlines(&mut tree, para, defs, options);
        assert!(tree.check_links(root));
        (tree, para)
    }

    /// Compact s-expression of the inline structure, markers omitted.
    fn shape(text: &str) -> String {
        let (tree, para) = parse_with(text, &Definitions::default(), &Options::default());
        render_shape(&tree, para)
    }

    fn render_shape(tree: &Tree, node: NodeId) -> String {
        tree.children(node)
            .filter_map(|c| match tree.kind(c) {
                NodeKind::Text | NodeKind::CodeSpanContent | NodeKind::LinkDest => {
                    Some(tree.tokens(c).to_string())
                }
                NodeKind::Emphasis
                | NodeKind::Strong
                | NodeKind::Strikethrough
                | NodeKind::Link { .. }
                | NodeKind::Image { .. }
                | NodeKind::CodeSpan { .. } => Some(format!(
                    "({} {})",
                    tree.kind(c).name(),
                    render_shape(tree, c)
                )),
                NodeKind::SoftBreak => Some("\\n".to_string()),
                NodeKind::HardBreak => Some("<br>".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn test_emphasis_basics() {
        assert_eq!(shape("*a* **b**"), "(em a)| |(strong b)");
        assert_eq!(shape("a***b***c"), "a|(em (strong b))|c");
        assert_eq!(shape("a**b*c*d**e"), "a|(strong b|(em c)|d)|e");
    }

    #[test]
    fn test_intraword_underscore_does_not_open() {
        assert_eq!(shape("snake_case_name"), "snake_case_name");
        assert_eq!(shape("_a_"), "(em a)");
    }

    #[test]
    fn test_multiple_of_three_rule() {
        assert_eq!(shape("*foo**bar**baz*"), "(em foo|(strong bar)|baz)");
        assert_eq!(shape("*foo**bar*"), "(em foo**bar)");
    }

    #[test]
    fn test_unmatched_delimiters_stay_literal() {
        assert_eq!(shape("**a"), "**a");
        assert_eq!(shape("a *"), "a *");
    }

    #[test]
    fn test_strikethrough() {
        assert_eq!(shape("~~a~~"), "(s a)");
        assert_eq!(shape("~~a~"), "~~a~");
    }

    #[test]
    fn test_code_span_hides_delimiters() {
        assert_eq!(shape("`*a*` *b*"), "(code *a*)| |(em b)");
        assert_eq!(shape("``a ` b``"), "(code a ` b)");
        assert_eq!(shape("`unclosed"), "`unclosed");
    }

    #[test]
    fn test_inline_link() {
        assert_eq!(shape("[a *b*](/url \"t\")"), "(a a |(em b)|/url)");
    }

    #[test]
    fn test_reference_links() {
        let mut defs = Definitions::default();
        defs.add_link(LinkRefDef {
            label: "Foo".into(),
            destination: "/foo".into(),
            title: None,
        });
        let options = Options::default();
        for input in ["[foo]", "[foo][]", "[x][FOO]"] {
            let (tree, para) = parse_with(input, &defs, &options);
            let link = tree.first_child(para).unwrap();
            assert!(matches!(tree.kind(link), NodeKind::Link { .. }), "{input}");
            let dest = tree
                .child_by_kind(link, |k| matches!(k, NodeKind::LinkDest))
                .unwrap();
            assert_eq!(tree.tokens(dest), "/foo");
        }
        let (tree, para) = parse_with("[x][nope]", &defs, &options);
        assert_eq!(tree.text(para), "[x][nope]");
    }

    #[test]
    fn test_links_do_not_nest() {
        let (tree, para) = parse_with(
            "[a [b](/inner) c](/outer)",
            &Definitions::default(),
            &Options::default(),
        );
        let links: Vec<_> = tree
            .children(para)
            .filter(|&c| matches!(tree.kind(c), NodeKind::Link { .. }))
            .collect();
        assert_eq!(links.len(), 1);
        assert_eq!(tree.inline_text(para), "[a b c](/outer)");
    }

    #[test]
    fn test_wikilink() {
        let (tree, para) = parse_with(
            "[[target|shown]] and [[plain]]",
            &Definitions::default(),
            &Options::default(),
        );
        let first = tree.first_child(para).unwrap();
        assert_eq!(tree.kind(first), &NodeKind::WikiLink);
        assert_eq!(tree.tokens(first), "target");
        assert_eq!(tree.inline_text(first), "shown");
        let last = tree.last_child(para).unwrap();
        assert_eq!(tree.tokens(last), "plain");
    }

    #[test]
    fn test_autolinks_and_html() {
        let (tree, para) = parse_with(
            "<https://a.b/c> <me@x.org> <span class=\"x\">",
            &Definitions::default(),
            &Options::default(),
        );
        let kinds: Vec<_> = tree.children(para).map(|c| tree.kind(c).name()).collect();
        assert_eq!(kinds, vec!["a", "text", "a", "text", "html-inline"]);
        let email = tree.children(para).nth(2).unwrap();
        assert_eq!(tree.text(email), "me@x.orgmailto:me@x.org");
    }

    #[test]
    fn test_scan_html_tag() {
        let scan = |s: &str| {
            let chars: Vec<char> = s.chars().collect();
            scan_html_tag(&chars, 0)
        };
        assert_eq!(scan("<a href='x'>rest"), Some(12));
        assert_eq!(scan("</div >"), Some(7));
        assert_eq!(scan("<!-- c -->"), Some(10));
        assert_eq!(scan("<!-->"), Some(5));
        assert_eq!(scan("<a href='x'"), None);
        assert_eq!(scan("<a b=>"), None);
        assert_eq!(scan("<ab\"c>"), None);
    }

    #[test]
    fn test_breaks() {
        assert_eq!(shape("a  \nb"), "a|<br>|b");
        assert_eq!(shape("a\\\nb"), "a|<br>|b");
        assert_eq!(shape("a\n   b"), "a|\\n|b");
    }

    #[test]
    fn test_math_and_entities() {
        let (tree, para) = parse_with(
            "$x^2$ costs $5 &amp; &copy;",
            &Definitions::default(),
            &Options::default(),
        );
        let first = tree.first_child(para).unwrap();
        assert!(matches!(tree.kind(first), NodeKind::InlineMath));
        assert_eq!(tree.inline_text(para), "x^2 costs $5 & ©");
        let entities: Vec<(&str, &str)> = tree
            .children(para)
            .filter_map(|c| match tree.kind(c) {
                NodeKind::HtmlEntity { decoded } => Some((tree.tokens(c), decoded.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(entities, vec![("&amp;", "&"), ("&copy;", "©")]);
    }

    #[test]
    fn test_heading_id_split() {
        assert_eq!(split_heading_id("Title {#intro}"), Some(("Title", "intro")));
        assert_eq!(split_heading_id("{id}"), None);
        assert_eq!(split_heading_id("Title {a b}"), None);
    }

    #[test]
    fn test_heading_id_only_on_atx_headings() {
        let tree = crate::parser::parse(
            "Title {x}\n=========\n\n# Other {y}\n",
            &Options::default(),
        );
        let headings: Vec<NodeId> = tree.children(tree.root()).collect();
        let id_of = |heading: NodeId| {
            tree.child_by_kind(heading, |k| matches!(k, NodeKind::HeadingId))
                .map(|id| tree.tokens(id).to_string())
        };
        assert_eq!(id_of(headings[0]), None);
        assert_eq!(tree.inline_text(headings[0]), "Title {x}");
        assert_eq!(id_of(headings[1]).as_deref(), Some("y"));
    }
}
