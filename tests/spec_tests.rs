use pretty_assertions::assert_eq;
use rstest::rstest;
use weavemark::{Options, markdown_to_html};

fn html(markdown: &str) -> String {
    markdown_to_html(markdown, &Options::commonmark())
}

fn gfm(markdown: &str) -> String {
    markdown_to_html(markdown, &Options::default())
}

// CommonMark examples, grouped by section
#[rstest]
// Tabs
#[case("\tfoo\tbaz\t\tbim\n", "<pre><code>foo\tbaz\t\tbim\n</code></pre>\n")]
#[case("  - foo\n\n\tbar\n", "<ul>\n<li>\n<p>foo</p>\n<p>bar</p>\n</li>\n</ul>\n")]
// Thematic breaks
#[case("***\n---\n___\n", "<hr />\n<hr />\n<hr />\n")]
#[case("+++\n", "<p>+++</p>\n")]
#[case(" - - -\n", "<hr />\n")]
#[case("*-*\n", "<p><em>-</em></p>\n")]
#[case("Foo\n***\nbar\n", "<p>Foo</p>\n<hr />\n<p>bar</p>\n")]
#[case("- foo\n***\n- bar\n", "<ul>\n<li>foo</li>\n</ul>\n<hr />\n<ul>\n<li>bar</li>\n</ul>\n")]
// ATX headings
#[case("# foo\n## foo\n###### foo\n", "<h1>foo</h1>\n<h2>foo</h2>\n<h6>foo</h6>\n")]
#[case("####### foo\n", "<p>####### foo</p>\n")]
#[case("#5 bolt\n", "<p>#5 bolt</p>\n")]
#[case("## foo ##\n", "<h2>foo</h2>\n")]
#[case("### foo ### b\n", "<h3>foo ### b</h3>\n")]
#[case("#\n", "<h1></h1>\n")]
// Setext headings
#[case("Foo *bar*\n=========\n", "<h1>Foo <em>bar</em></h1>\n")]
#[case("Foo\n-------\n\nFoo\n=\n", "<h2>Foo</h2>\n<h1>Foo</h1>\n")]
#[case("> foo\n-----\n", "<blockquote>\n<p>foo</p>\n</blockquote>\n<hr />\n")]
// Indented and fenced code
#[case("    a simple\n      indented code block\n", "<pre><code>a simple\n  indented code block\n</code></pre>\n")]
#[case("```\n<\n >\n```\n", "<pre><code>&lt;\n &gt;\n</code></pre>\n")]
#[case("````\naaa\n```\n``````\n", "<pre><code>aaa\n```\n</code></pre>\n")]
#[case("```\n", "<pre><code></code></pre>\n")]
#[case(" ```\n aaa\naaa\n```\n", "<pre><code>aaa\naaa\n</code></pre>\n")]
#[case("```ruby startline=3\ndef foo(x)\n```\n", "<pre><code class=\"language-ruby\">def foo(x)\n</code></pre>\n")]
// HTML blocks
#[case("<div>\n*hello*\n</div>\n", "<div>\n*hello*\n</div>\n")]
#[case("<!-- foo -->*bar*\n*baz*\n", "<!-- foo -->*bar*\n<p><em>baz</em></p>\n")]
// Link reference definitions
#[case("[foo]: /url \"title\"\n\n[foo]\n", "<p><a href=\"/url\" title=\"title\">foo</a></p>\n")]
#[case("[FOO]: /url\n\n[Foo]\n", "<p><a href=\"/url\">Foo</a></p>\n")]
#[case("[foo]: /url\n", "")]
#[case("[foo]\n\n[foo]: first\n[foo]: second\n", "<p><a href=\"first\">foo</a></p>\n")]
// Paragraphs and block quotes
#[case("aaa\n             bbb\n", "<p>aaa\nbbb</p>\n")]
#[case("> # Foo\n> bar\n> baz\n", "<blockquote>\n<h1>Foo</h1>\n<p>bar\nbaz</p>\n</blockquote>\n")]
#[case("> bar\nbaz\n> foo\n", "<blockquote>\n<p>bar\nbaz\nfoo</p>\n</blockquote>\n")]
#[case("> - foo\n- bar\n", "<blockquote>\n<ul>\n<li>foo</li>\n</ul>\n</blockquote>\n<ul>\n<li>bar</li>\n</ul>\n")]
// Lists
#[case("1.  A paragraph\n    with two lines.\n", "<ol>\n<li>A paragraph\nwith two lines.</li>\n</ol>\n")]
#[case("- foo\n\n\n  bar\n", "<ul>\n<li>\n<p>foo</p>\n<p>bar</p>\n</li>\n</ul>\n")]
#[case("- foo\n- bar\n+ baz\n", "<ul>\n<li>foo</li>\n<li>bar</li>\n</ul>\n<ul>\n<li>baz</li>\n</ul>\n")]
#[case("The number of windows in my house is\n14.  The number of doors is 6.\n", "<p>The number of windows in my house is\n14.  The number of doors is 6.</p>\n")]
#[case("- a\n- b\n\n- c\n", "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n<li>\n<p>c</p>\n</li>\n</ul>\n")]
// Emphasis
#[case("*foo bar*\n", "<p><em>foo bar</em></p>\n")]
#[case("a * foo bar*\n", "<p>a * foo bar*</p>\n")]
#[case("foo*bar*\n", "<p>foo<em>bar</em></p>\n")]
#[case("_foo_bar\n", "<p>_foo_bar</p>\n")]
#[case("**foo*bar*baz**\n", "<p><strong>foo<em>bar</em>baz</strong></p>\n")]
#[case("*foo**bar**baz*\n", "<p><em>foo<strong>bar</strong>baz</em></p>\n")]
#[case("foo***bar***baz\n", "<p>foo<em><strong>bar</strong></em>baz</p>\n")]
#[case("foo******bar*********baz\n", "<p>foo<strong><strong><strong>bar</strong></strong></strong>***baz</p>\n")]
#[case("a***b***c\n", "<p>a<em><strong>b</strong></em>c</p>\n")]
#[case("a**b*c*d**e\n", "<p>a<strong>b<em>c</em>d</strong>e</p>\n")]
#[case("*foo [bar](/url)*\n", "<p><em>foo <a href=\"/url\">bar</a></em></p>\n")]
#[case("*a `*`*\n", "<p><em>a <code>*</code></em></p>\n")]
// Code spans, links, images, autolinks
#[case("`` foo ` bar ``\n", "<p><code>foo ` bar</code></p>\n")]
#[case("[link](/uri \"title\")\n", "<p><a href=\"/uri\" title=\"title\">link</a></p>\n")]
#[case("[link](<foo\nbar>)\n", "<p>[link](<foo\nbar>)</p>\n")]
#[case("[link [foo [bar]]](/uri)\n", "<p><a href=\"/uri\">link [foo [bar]]</a></p>\n")]
#[case("[foo [bar](/uri)](/uri)\n", "<p>[foo <a href=\"/uri\">bar</a>](/uri)</p>\n")]
#[case("![foo *bar*](train.jpg \"train & tracks\")\n", "<p><img src=\"train.jpg\" alt=\"foo bar\" title=\"train &amp; tracks\" /></p>\n")]
#[case("<http://foo.bar.baz>\n", "<p><a href=\"http://foo.bar.baz\">http://foo.bar.baz</a></p>\n")]
#[case("<foo@bar.example.com>\n", "<p><a href=\"mailto:foo@bar.example.com\">foo@bar.example.com</a></p>\n")]
// Entities, escapes, breaks
#[case("&nbsp; &amp; &copy; &#35; &#x22;\n", "<p>\u{a0} &amp; © # &quot;</p>\n")]
#[case("\\*not emphasized*\n", "<p>*not emphasized*</p>\n")]
#[case("foo  \nbaz\n", "<p>foo<br />\nbaz</p>\n")]
#[case("foo\\\nbaz\n", "<p>foo<br />\nbaz</p>\n")]
fn commonmark_examples(#[case] markdown: &str, #[case] expected: &str) {
    assert_eq!(html(markdown), expected);
}

#[rstest]
#[case::table(
    "| foo | bar |\n| --- | --- |\n| baz | bim |\n",
    "<table>\n<thead>\n<tr>\n<th>foo</th>\n<th>bar</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>baz</td>\n<td>bim</td>\n</tr>\n</tbody>\n</table>\n"
)]
#[case::table_head_only(
    "| a |\n| - |\n",
    "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n</table>\n"
)]
#[case::strikethrough("~~Hi~~ Hello, ~there~ world!\n", "<p><del>Hi</del> Hello, <del>there</del> world!</p>\n")]
#[case::strikethrough_unbalanced("x ~~~a~~~\n", "<p>x ~~~a~~~</p>\n")]
#[case::tilde_fence_info_with_tildes(
    "~~~a~~~\n",
    "<pre><code class=\"language-a~~~\"></code></pre>\n"
)]
#[case::inline_math("$a+b$ costs $5\n", "<p><span class=\"language-math\">a+b</span> costs $5</p>\n")]
#[case::math_block("$$\nx < y\n$$\n", "<div class=\"language-math\">x &lt; y</div>\n")]
#[case::wikilink_alias("[[Target|shown text]]\n", "<p><a href=\"Target\" class=\"wikilink\">shown text</a></p>\n")]
#[case::heading_id("# Intro {intro}\n", "<h1 id=\"intro\">Intro</h1>\n")]
#[case::setext_heading_keeps_braces("Intro {intro}\n=====\n", "<h1>Intro {intro}</h1>\n")]
fn extension_examples(#[case] markdown: &str, #[case] expected: &str) {
    assert_eq!(gfm(markdown), expected);
}

#[test]
fn commonmark_options_disable_extensions() {
    assert_eq!(html("~~a~~ $b$ [[c]]\n"), "<p>~~a~~ $b$ [[c]]</p>\n");
    assert_eq!(
        html("| a |\n| - |\n"),
        "<p>| a |\n| - |</p>\n"
    );
}
