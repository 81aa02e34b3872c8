//! Line-start scanners for block syntax.
//!
//! Every scanner receives the current line from its first non-space
//! character on, as a char slice that still ends with the `'\n'` terminator.

use crate::ast::{ListData, ListType};

pub fn is_space_or_tab(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub fn is_line_end(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Character at `i`, or the line terminator past the end.
pub fn at(s: &[char], i: usize) -> char {
    s.get(i).copied().unwrap_or('\n')
}

/// Whether only spaces and tabs remain from `i` to the end of the line.
pub fn rest_is_blank(s: &[char], i: usize) -> bool {
    s.iter().skip(i).all(|&c| is_space_or_tab(c) || is_line_end(c))
}

fn run_len(s: &[char], start: usize, c: char) -> usize {
    s.iter().skip(start).take_while(|&&x| x == c).count()
}

/// `#` to `######` followed by whitespace or the end of the line.
///
/// Returns the level and the number of characters to consume (hashes plus
/// the spaces after them).
pub fn atx_heading_start(s: &[char]) -> Option<(u8, usize)> {
    let level = run_len(s, 0, '#');
    if level == 0 || level > 6 {
        return None;
    }
    let next = at(s, level);
    if !is_space_or_tab(next) && !is_line_end(next) {
        return None;
    }
    let spaces = s
        .iter()
        .skip(level)
        .take_while(|&&c| is_space_or_tab(c))
        .count();
    Some((level as u8, level + spaces))
}

/// Opening code fence: three or more backticks (with no backtick in the info
/// string) or tildes. Returns the fence length.
pub fn open_code_fence(s: &[char]) -> Option<usize> {
    let c = at(s, 0);
    if c != '`' && c != '~' {
        return None;
    }
    let len = run_len(s, 0, c);
    if len < 3 {
        return None;
    }
    if c == '`' && s[len..].iter().take_while(|&&x| !is_line_end(x)).any(|&x| x == '`') {
        return None;
    }
    Some(len)
}

/// Closing code fence run length, when nothing but whitespace follows it.
pub fn close_code_fence(s: &[char]) -> Option<usize> {
    let c = at(s, 0);
    if c != '`' && c != '~' {
        return None;
    }
    let len = run_len(s, 0, c);
    if len < 3 || !rest_is_blank(s, len) {
        return None;
    }
    Some(len)
}

/// `$$` alone on its line opens (and closes) a math block.
pub fn math_block_fence(s: &[char]) -> bool {
    at(s, 0) == '$' && at(s, 1) == '$' && rest_is_blank(s, 2)
}

/// `===` or `---` underline: returns the heading level it produces.
pub fn setext_heading_line(s: &[char]) -> Option<u8> {
    let c = at(s, 0);
    let level = match c {
        '=' => 1,
        '-' => 2,
        _ => return None,
    };
    let len = run_len(s, 0, c);
    if rest_is_blank(s, len) {
        Some(level)
    } else {
        None
    }
}

/// At least three of one of `-`, `_`, `*`, optionally separated by spaces or
/// tabs, and nothing else.
pub fn thematic_break(s: &[char]) -> bool {
    let mut marker = None;
    let mut count = 0;
    for &c in s.iter().take_while(|&&c| !is_line_end(c)) {
        if is_space_or_tab(c) {
            continue;
        }
        if c != '-' && c != '_' && c != '*' {
            return false;
        }
        match marker {
            Some(m) if m != c => return false,
            Some(_) => {}
            None => marker = Some(c),
        }
        count += 1;
    }
    count >= 3
}

/// `[^label]:` followed by optional spaces. Returns the label and the number
/// of characters to consume.
pub fn footnote_definition(s: &[char]) -> Option<(String, usize)> {
    if at(s, 0) != '[' || at(s, 1) != '^' {
        return None;
    }
    let mut i = 2;
    while i < s.len() && s[i] != ']' {
        if is_space_or_tab(s[i]) || is_line_end(s[i]) || s[i] == '[' {
            return None;
        }
        i += 1;
    }
    if i == 2 || at(s, i) != ']' || at(s, i + 1) != ':' {
        return None;
    }
    let label: String = s[2..i].iter().collect();
    let mut end = i + 2;
    while is_space_or_tab(at(s, end)) {
        end += 1;
    }
    Some((label, end))
}

/// Bullet (`-`, `+`, `*`) or ordered (`1.`, `1)`) list marker.
///
/// Returns the marker width and the list data with padding and offset still
/// to be filled in by the caller.
pub fn list_marker(s: &[char], interrupts_paragraph: bool) -> Option<(usize, ListData)> {
    let c = at(s, 0);
    if c == '*' || c == '-' || c == '+' {
        if !is_space_or_tab(at(s, 1)) && !is_line_end(at(s, 1)) {
            return None;
        }
        if interrupts_paragraph && rest_is_blank(s, 1) {
            return None;
        }
        return Some((
            1,
            ListData {
                typ: ListType::Bullet,
                bullet_char: c as u8,
                delimiter: 0,
                start: 1,
                num: 1,
                marker_offset: 0,
                padding: 0,
                tight: true,
            },
        ));
    }

    let digits = s.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let start: usize = s[..digits].iter().collect::<String>().parse().ok()?;
    if interrupts_paragraph && start != 1 {
        return None;
    }
    let delimiter = at(s, digits);
    if delimiter != '.' && delimiter != ')' {
        return None;
    }
    let after = at(s, digits + 1);
    if !is_space_or_tab(after) && !is_line_end(after) {
        return None;
    }
    if interrupts_paragraph && rest_is_blank(s, digits + 1) {
        return None;
    }
    Some((
        digits + 1,
        ListData {
            typ: ListType::Ordered,
            bullet_char: 0,
            delimiter: delimiter as u8,
            start,
            num: start,
            marker_offset: 0,
            padding: 0,
            tight: true,
        },
    ))
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

fn lowercase_line(s: &[char]) -> String {
    s.iter()
        .take_while(|&&c| !is_line_end(c))
        .collect::<String>()
        .to_ascii_lowercase()
}

fn tag_name_ends(after: &str, allow_self_close: bool) -> bool {
    after.is_empty()
        || after.starts_with('>')
        || after.starts_with(' ')
        || after.starts_with('\t')
        || (allow_self_close && after.starts_with("/>"))
}

/// HTML block start conditions 1 through 6.
pub fn html_block_start(s: &[char]) -> Option<u8> {
    if at(s, 0) != '<' {
        return None;
    }
    let lower = lowercase_line(s);

    // Type 1: raw text elements
    for tag in ["<pre", "<script", "<style", "<textarea"] {
        if let Some(after) = lower.strip_prefix(tag)
            && tag_name_ends(after, false)
        {
            return Some(1);
        }
    }

    if lower.starts_with("<!--") {
        return Some(2);
    }
    if lower.starts_with("<?") {
        return Some(3);
    }
    if at(s, 1) == '!' && at(s, 2).is_ascii_alphabetic() {
        return Some(4);
    }
    if lower.starts_with("<![cdata[") {
        return Some(5);
    }

    // Type 6: known block-level tags, opening or closing
    let name_start = if lower.starts_with("</") { 2 } else { 1 };
    let rest = &lower[name_start..];
    for tag in BLOCK_TAGS {
        if let Some(after) = rest.strip_prefix(tag)
            && tag_name_ends(after, true)
        {
            return Some(6);
        }
    }

    None
}

/// HTML block start condition 7: a single complete open or close tag,
/// followed only by whitespace. Cannot interrupt a paragraph.
pub fn html_block_start_7(s: &[char]) -> bool {
    let line: String = s.iter().take_while(|&&c| !is_line_end(c)).collect();
    let trimmed = line.trim_end();
    if !trimmed.starts_with('<') {
        return false;
    }

    // Find the end of the first tag, skipping quoted attribute values
    let mut in_quotes = None;
    let mut tag_end = None;
    for (i, ch) in trimmed.char_indices().skip(1) {
        match in_quotes {
            Some(q) if ch == q => in_quotes = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => in_quotes = Some(ch),
            None if ch == '>' => {
                tag_end = Some(i);
                break;
            }
            None => {}
        }
    }
    let Some(tag_end) = tag_end else {
        return false;
    };
    if !trimmed[tag_end + 1..].trim().is_empty() {
        return false;
    }

    let chars: Vec<char> = trimmed[..=tag_end].chars().collect();
    matches!(super::inline::scan_html_tag(&chars, 0), Some(end) if end == chars.len())
        && !chars.starts_with(&['<', '!'])
        && !chars.starts_with(&['<', '?'])
}

/// End condition of HTML block types 1 to 5.
pub fn html_block_end(s: &[char], block_type: u8) -> bool {
    let line = lowercase_line(s);
    match block_type {
        1 => {
            line.contains("</pre>")
                || line.contains("</script>")
                || line.contains("</style>")
                || line.contains("</textarea>")
        }
        2 => line.contains("-->"),
        3 => line.contains("?>"),
        4 => line.contains('>'),
        5 => line.contains("]]>"),
        _ => false,
    }
}

/// Removes an optional closing `#` sequence from ATX heading content.
pub fn chop_trailing_hashes(content: &str) -> &str {
    let trimmed = content.trim_end();
    let without = trimmed.trim_end_matches('#');
    if without.len() == trimmed.len() {
        return trimmed;
    }
    if without.is_empty() {
        return "";
    }
    if without.ends_with([' ', '\t']) {
        without.trim_end()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn line(s: &str) -> Vec<char> {
        format!("{}\n", s).chars().collect()
    }

    #[rstest]
    #[case("***", true)]
    #[case("---", true)]
    #[case("___", true)]
    #[case("- - -", true)]
    #[case("*\t*\t*", true)]
    #[case("**", false)]
    #[case("-*-", false)]
    #[case("--a", false)]
    #[case("_____________________________________", true)]
    fn test_thematic_break(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(thematic_break(&line(input)), expected);
    }

    #[test]
    fn test_atx_heading_start() {
        assert_eq!(atx_heading_start(&line("## foo")), Some((2, 3)));
        assert_eq!(atx_heading_start(&line("#")), Some((1, 1)));
        assert_eq!(atx_heading_start(&line("####### foo")), None);
        assert_eq!(atx_heading_start(&line("#5 bolt")), None);
    }

    #[test]
    fn test_code_fences() {
        assert_eq!(open_code_fence(&line("```rust")), Some(3));
        assert_eq!(open_code_fence(&line("~~~~")), Some(4));
        assert_eq!(open_code_fence(&line("``` a`b")), None);
        assert_eq!(close_code_fence(&line("````  ")), Some(4));
        assert_eq!(close_code_fence(&line("``` x")), None);
    }

    #[test]
    fn test_list_marker() {
        let (width, data) = list_marker(&line("- item"), false).unwrap();
        assert_eq!(width, 1);
        assert_eq!(data.bullet_char, b'-');

        let (width, data) = list_marker(&line("12) item"), false).unwrap();
        assert_eq!(width, 3);
        assert_eq!(data.start, 12);
        assert_eq!(data.delimiter, b')');

        assert!(list_marker(&line("2. item"), true).is_none());
        assert!(list_marker(&line("-"), true).is_none());
        assert!(list_marker(&line("-item"), false).is_none());
    }

    #[test]
    fn test_html_block_start() {
        assert_eq!(html_block_start(&line("<div class=\"x\">")), Some(6));
        assert_eq!(html_block_start(&line("</DIV>")), Some(6));
        assert_eq!(html_block_start(&line("<pre>")), Some(1));
        assert_eq!(html_block_start(&line("<!-- c -->")), Some(2));
        assert_eq!(html_block_start(&line("<span>")), None);
        assert!(html_block_start_7(&line("<span class=\"a\">")));
        assert!(!html_block_start_7(&line("<span> text")));
    }

    #[test]
    fn test_chop_trailing_hashes() {
        assert_eq!(chop_trailing_hashes("foo ##  "), "foo");
        assert_eq!(chop_trailing_hashes("foo#"), "foo#");
        assert_eq!(chop_trailing_hashes("###"), "");
    }

    #[test]
    fn test_footnote_definition() {
        assert_eq!(
            footnote_definition(&line("[^note]: text")),
            Some(("note".to_string(), 9))
        );
        assert_eq!(footnote_definition(&line("[^]: text")), None);
        assert_eq!(footnote_definition(&line("[^a b]: text")), None);
    }
}
