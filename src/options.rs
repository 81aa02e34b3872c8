/// Parse and render options
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Switches for the syntax extensions on top of CommonMark.
///
/// Every extension is enabled by default. Missing keys in a JSON options file
/// fall back to the default, so `{}` is a valid options document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// GFM pipe tables.
    pub gfm_table: bool,
    /// `[ ]` / `[x]` markers at the start of list items.
    pub gfm_task_list_item: bool,
    /// `~text~` and `~~text~~`.
    pub gfm_strikethrough: bool,
    /// `[^label]` references and `[^label]: ...` definitions.
    pub footnotes: bool,
    /// `$...$` spans.
    pub inline_math: bool,
    /// `$$` fenced blocks.
    pub math_block: bool,
    /// `[[target]]` and `[[target|alias]]`.
    pub wikilink: bool,
    /// A paragraph consisting of `[toc]` becomes a table of contents.
    pub toc: bool,
    /// Trailing `{id}` on ATX headings.
    pub heading_id: bool,
    /// Render soft breaks as hard breaks.
    pub soft_break_as_hard_break: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            gfm_table: true,
            gfm_task_list_item: true,
            gfm_strikethrough: true,
            footnotes: true,
            inline_math: true,
            math_block: true,
            wikilink: true,
            toc: true,
            heading_id: true,
            soft_break_as_hard_break: false,
        }
    }
}

impl Options {
    /// Plain CommonMark: every extension switched off.
    pub fn commonmark() -> Self {
        Options {
            gfm_table: false,
            gfm_task_list_item: false,
            gfm_strikethrough: false,
            footnotes: false,
            inline_math: false,
            math_block: false,
            wikilink: false,
            toc: false,
            heading_id: false,
            soft_break_as_hard_break: false,
        }
    }

    /// Parses options from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Options::from_json("{}").unwrap(), Options::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let options = Options::from_json(r#"{ "wikilink": false, "toc": false }"#).unwrap();
        assert!(!options.wikilink);
        assert!(!options.toc);
        assert!(options.gfm_table);
    }

    #[rstest]
    #[case::type_mismatch(r#"{ "gfm_table": "yes" }"#)]
    #[case::not_an_object("[1, 2]")]
    #[case::truncated(r#"{ "footnotes": true"#)]
    fn test_invalid_json(#[case] json: &str) {
        let err = Options::from_json(json).unwrap_err();
        assert!(err.to_string().starts_with("invalid options"), "{}", err);
    }
}
