//! GFM pipe tables.

use crate::ast::{Alignment, NodeId, NodeKind, Tree};

use super::scanners::{is_line_end, is_space_or_tab};

/// Splits a table row into trimmed cell texts.
///
/// Leading and trailing pipes are optional; `\|` does not split and is
/// unescaped in the cell text.
pub fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = trimmed.chars().peekable();
    let mut trailing_pipe = false;
    while let Some(c) = chars.next() {
        trailing_pipe = false;
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => {
                cells.push(cell.trim().to_string());
                cell.clear();
                trailing_pipe = true;
            }
            _ => cell.push(c),
        }
    }
    if !trailing_pipe || trimmed.is_empty() {
        cells.push(cell.trim().to_string());
    }
    cells
}

/// Parses a delimiter row such as `| :--- | ---: |` into column alignments.
pub fn delimiter_row(s: &[char]) -> Option<Vec<Alignment>> {
    let line: String = s.iter().take_while(|&&c| !is_line_end(c)).collect();
    if !line.contains('|') {
        return None;
    }
    let mut aligns = Vec::new();
    for cell in split_row(&line) {
        let left = cell.starts_with(':');
        let right = cell.ends_with(':') && cell.len() > 1;
        let dashes = cell.trim_start_matches(':').trim_end_matches(':');
        if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
            return None;
        }
        aligns.push(match (left, right) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::None,
        });
    }
    Some(aligns)
}

/// Whether a line may continue an open table.
pub fn continues(s: &[char]) -> bool {
    s.iter().any(|&c| !is_space_or_tab(c) && !is_line_end(c))
}

/// Expands a finished table's raw rows into head, row and cell nodes.
///
/// The first raw line is the header; the remaining ones are body rows,
/// padded or truncated to the header's column count.
pub fn finalize(tree: &mut Tree, table: NodeId) {
    let columns = match tree.kind(table) {
        NodeKind::Table { aligns } => aligns.clone(),
        _ => return,
    };
    let raw = std::mem::take(&mut tree.node_mut(table).tokens);
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return;
    };
    let head = tree.new_node(NodeKind::TableHead, "");
    tree.append_child(table, head);
    append_cells(tree, head, split_row(header), &columns);

    for line in lines {
        let row = tree.new_node(NodeKind::TableRow, "");
        tree.append_child(table, row);
        append_cells(tree, row, split_row(line), &columns);
    }
}

fn append_cells(tree: &mut Tree, row: NodeId, cells: Vec<String>, columns: &[Alignment]) {
    let mut cells = cells.into_iter();
    for &align in columns {
        let text = cells.next().unwrap_or_default();
        let cell = tree.new_node(NodeKind::TableCell { align }, text);
        tree.append_child(row, cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_row() {
        assert_eq!(split_row("| a | b |"), vec!["a", "b"]);
        assert_eq!(split_row("a | b"), vec!["a", "b"]);
        assert_eq!(split_row("| a \\| b | c"), vec!["a | b", "c"]);
        assert_eq!(split_row("| a | |"), vec!["a", ""]);
    }

    #[test]
    fn test_delimiter_row() {
        let line: Vec<char> = "| :-- | --: | :-: | --- |\n".chars().collect();
        assert_eq!(
            delimiter_row(&line),
            Some(vec![
                Alignment::Left,
                Alignment::Right,
                Alignment::Center,
                Alignment::None
            ])
        );
        let line: Vec<char> = "| -- | x |\n".chars().collect();
        assert_eq!(delimiter_row(&line), None);
        let line: Vec<char> = "---\n".chars().collect();
        assert_eq!(delimiter_row(&line), None);
    }
}
