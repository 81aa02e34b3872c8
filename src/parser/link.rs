//! Link pieces shared by the block and inline phases: labels, destinations,
//! titles, entities and reference definitions.

use crate::ast::LinkRefDef;

use super::scanners::{at, is_line_end, is_space_or_tab};

/// Labels longer than this are not labels.
const MAX_LABEL_LEN: usize = 999;

/// Resolves backslash escapes of ASCII punctuation.
pub fn unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && chars[i + 1].is_ascii_punctuation() {
            result.push(chars[i + 1]);
            i += 2;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

/// Decodes every entity and numeric character reference in `text`.
pub fn decode_entities(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '&'
            && let Some((decoded, next)) = scan_entity(&chars, i)
        {
            result.push_str(&decoded);
            i = next;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

/// Unescapes and decodes a destination or title in one pass, so an escaped
/// `&` never starts an entity.
pub fn clean(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && chars[i + 1].is_ascii_punctuation() {
            result.push(chars[i + 1]);
            i += 2;
        } else if chars[i] == '&'
            && let Some((decoded, next)) = scan_entity(&chars, i)
        {
            result.push_str(&decoded);
            i = next;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

/// Entity or numeric character reference starting at `start` (`&`).
///
/// Returns the decoded text and the index after the `;`.
pub fn scan_entity(chars: &[char], start: usize) -> Option<(String, usize)> {
    if chars.get(start) != Some(&'&') {
        return None;
    }
    let mut i = start + 1;

    if chars.get(i) == Some(&'#') {
        i += 1;
        let hex = matches!(chars.get(i), Some('x') | Some('X'));
        if hex {
            i += 1;
        }
        let digits_start = i;
        let max = if hex { 6 } else { 7 };
        while i < chars.len()
            && i - digits_start < max
            && (if hex {
                chars[i].is_ascii_hexdigit()
            } else {
                chars[i].is_ascii_digit()
            })
        {
            i += 1;
        }
        if i == digits_start || chars.get(i) != Some(&';') {
            return None;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let code_point = u32::from_str_radix(&digits, if hex { 16 } else { 10 }).ok()?;
        // NUL and out-of-range references become the replacement character
        let ch = if code_point == 0 {
            '\u{FFFD}'
        } else {
            char::from_u32(code_point).unwrap_or('\u{FFFD}')
        };
        return Some((ch.to_string(), i + 1));
    }

    let name_start = i;
    while i < chars.len() && i - name_start < 32 && chars[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start || chars.get(i) != Some(&';') {
        return None;
    }
    let entity: String = chars[start..=i].iter().collect();
    let decoded = html_escape::decode_html_entities(&entity);
    if decoded == entity {
        return None;
    }
    Some((decoded.into_owned(), i + 1))
}

/// Link label starting at `start` (`[`).
///
/// Returns the raw label text and the index after the closing `]`.
pub fn scan_link_label(chars: &[char], start: usize) -> Option<(String, usize)> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => i += 2,
            '[' => return None,
            ']' => {
                let label: String = chars[start + 1..i].iter().collect();
                if label.trim().is_empty() {
                    return None;
                }
                return Some((label, i + 1));
            }
            _ => i += 1,
        }
        if i - start > MAX_LABEL_LEN {
            return None;
        }
    }
    None
}

/// Link destination starting at `start`: `<...>` or a run of non-space
/// characters with balanced parentheses.
///
/// Returns the unescaped destination and the index after it. A bare
/// destination may not be empty; `<>` may.
pub fn scan_link_destination(chars: &[char], start: usize) -> Option<(String, usize)> {
    if chars.get(start) == Some(&'<') {
        let mut i = start + 1;
        while i < chars.len() {
            match chars[i] {
                '>' => {
                    let raw: String = chars[start + 1..i].iter().collect();
                    return Some((clean(&raw), i + 1));
                }
                '\\' if i + 1 < chars.len() && chars[i + 1].is_ascii_punctuation() => i += 2,
                '<' | '\n' | '\r' => return None,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut i = start;
    let mut paren_depth = 0;
    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => break,
            '\\' if i + 1 < chars.len() && chars[i + 1].is_ascii_punctuation() => i += 2,
            '(' => {
                paren_depth += 1;
                if paren_depth > 32 {
                    return None;
                }
                i += 1;
            }
            ')' => {
                if paren_depth == 0 {
                    break;
                }
                paren_depth -= 1;
                i += 1;
            }
            c if c.is_ascii_control() => return None,
            _ => i += 1,
        }
    }

    if i == start || paren_depth != 0 {
        return None;
    }
    let raw: String = chars[start..i].iter().collect();
    Some((clean(&raw), i))
}

/// Link title starting at `start`: `"..."`, `'...'` or `(...)`.
///
/// Returns the cleaned title and the index after the closing delimiter.
/// A title may span lines but not contain a blank line.
pub fn scan_link_title(chars: &[char], start: usize) -> Option<(String, usize)> {
    let closing = match chars.get(start) {
        Some('"') => '"',
        Some('\'') => '\'',
        Some('(') => ')',
        _ => return None,
    };

    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == closing => {
                let raw: String = chars[start + 1..i].iter().collect();
                return Some((clean(&raw), i + 1));
            }
            '\\' if i + 1 < chars.len() && chars[i + 1].is_ascii_punctuation() => i += 2,
            '(' if closing == ')' => return None,
            '\n' => {
                // Titles cannot contain blank lines
                let mut j = i + 1;
                while j < chars.len() && is_space_or_tab(chars[j]) {
                    j += 1;
                }
                if j >= chars.len() || is_line_end(chars[j]) {
                    return None;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Skips spaces, tabs and at most one line ending.
pub fn skip_spaces_and_newline(chars: &[char], mut i: usize) -> usize {
    let mut seen_newline = false;
    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' => i += 1,
            '\n' if !seen_newline => {
                seen_newline = true;
                i += 1;
            }
            _ => break,
        }
    }
    i
}

// Index after the line ending, when only spaces remain on the line.
fn line_end_after(chars: &[char], mut i: usize) -> Option<usize> {
    while i < chars.len() && is_space_or_tab(chars[i]) {
        i += 1;
    }
    if i >= chars.len() {
        Some(i)
    } else if is_line_end(at(chars, i)) {
        Some(i + 1)
    } else {
        None
    }
}

/// Link reference definition at the start of paragraph content.
///
/// Returns the number of characters it spans (through its line ending) and
/// the definition.
pub fn parse_reference_definition(chars: &[char]) -> Option<(usize, LinkRefDef)> {
    let mut i = 0;
    while i < 3 && at(chars, i) == ' ' {
        i += 1;
    }
    let (label, after_label) = scan_link_label(chars, i)?;
    if at(chars, after_label) != ':' {
        return None;
    }
    i = skip_spaces_and_newline(chars, after_label + 1);

    let (destination, after_dest) = scan_link_destination(chars, i)?;
    if after_dest == i {
        return None;
    }

    let title_start = skip_spaces_and_newline(chars, after_dest);
    if title_start > after_dest
        && let Some((title, after_title)) = scan_link_title(chars, title_start)
        && let Some(end) = line_end_after(chars, after_title)
    {
        return Some((
            end,
            LinkRefDef {
                label,
                destination,
                title: Some(title),
            },
        ));
    }

    let end = line_end_after(chars, after_dest)?;
    Some((
        end,
        LinkRefDef {
            label,
            destination,
            title: None,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_reference_definition_with_title() {
        let input = chars("[label]: /url \"title\"\n");
        let (end, def) = parse_reference_definition(&input).unwrap();
        assert_eq!(end, input.len());
        assert_eq!(def.label, "label");
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title.as_deref(), Some("title"));
    }

    #[test]
    fn test_reference_definition_multiline() {
        let input = chars("[Foo bar]:\n<my url>\n'title'\nrest\n");
        let (end, def) = parse_reference_definition(&input).unwrap();
        assert_eq!(def.destination, "my url");
        assert_eq!(def.title.as_deref(), Some("title"));
        assert_eq!(input[end..].iter().collect::<String>(), "rest\n");
    }

    #[test]
    fn test_title_on_next_line_is_optional() {
        let input = chars("[foo]: /url\n\"title\" ok\n");
        let (end, def) = parse_reference_definition(&input).unwrap();
        assert_eq!(def.title, None);
        assert_eq!(input[end..].iter().collect::<String>(), "\"title\" ok\n");
    }

    #[test]
    fn test_not_a_definition() {
        assert!(parse_reference_definition(&chars("[foo]: /url \"title\" ok\n")).is_none());
        assert!(parse_reference_definition(&chars("[foo]:\n")).is_none());
        assert!(parse_reference_definition(&chars("[foo] /url\n")).is_none());
        assert!(parse_reference_definition(&chars("[]: /url\n")).is_none());
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("&amp; &copy; &#35; &#x22; &bogus;"), "& © # \" &bogus;");
        assert_eq!(decode_entities("&#0;"), "\u{FFFD}");
    }

    #[test]
    fn test_destination_parens() {
        let input = chars("a(b(c))d) rest");
        let (dest, end) = scan_link_destination(&input, 0).unwrap();
        assert_eq!(dest, "a(b(c))d");
        assert_eq!(end, 8);
    }
}
