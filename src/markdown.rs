use pulldown_cmark::{html, Options, Parser};

/// Converts a post body from markdown to HTML.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_html() {
        assert_eq!(
            "<h1>Hello</h1>\n<p>World</p>\n",
            to_html("# Hello\n\nWorld\n")
        );
    }

    #[test]
    fn test_to_html_keeps_fold_marker() {
        let html = to_html("intro\n\n<!-- more -->\n\nrest\n");
        assert!(html.contains(crate::post::FOLD_TAG));
    }
}
