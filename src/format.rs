//! HTML formatting of model replies
//!
//! Converts free-form model text into a small HTML fragment by classifying
//! lines into paragraphs, ordered lists, and unordered lists. One block per
//! paragraph or list, blocks joined by newlines, all text HTML-escaped.

/// Which list kind the current buffered block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Ordered => "ol",
            Self::Unordered => "ul",
        }
    }
}

/// Render a completed model reply as an HTML fragment.
///
/// Lines are classified as ordered-list items (`1. text`), unordered-list
/// items (`- text`, `* text`, or `• text`), blank separators, or plain
/// paragraph text. Consecutive items of one list kind become a single
/// `<ol>`/`<ul>`; consecutive plain lines become a single `<p>` whose body
/// keeps the original line breaks. A blank line, a plain line after a list,
/// or a list item of a different kind closes the current block.
///
/// Empty or whitespace-only input renders as an empty string.
pub fn format_reply(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut list_kind: Option<ListKind> = None;

    for line in text.trim().lines() {
        let stripped = line.trim();

        if let Some(item) = parse_ordered_item(stripped) {
            if list_kind != Some(ListKind::Ordered) {
                flush_block(&mut blocks, &buffer, list_kind);
                buffer.clear();
                list_kind = Some(ListKind::Ordered);
            }
            buffer.push(item);
        } else if let Some(item) = parse_bullet_item(stripped) {
            if list_kind != Some(ListKind::Unordered) {
                flush_block(&mut blocks, &buffer, list_kind);
                buffer.clear();
                list_kind = Some(ListKind::Unordered);
            }
            buffer.push(item);
        } else if stripped.is_empty() {
            flush_block(&mut blocks, &buffer, list_kind);
            buffer.clear();
            list_kind = None;
        } else {
            if list_kind.is_some() {
                flush_block(&mut blocks, &buffer, list_kind);
                buffer.clear();
                list_kind = None;
            }
            buffer.push(stripped);
        }
    }
    flush_block(&mut blocks, &buffer, list_kind);

    blocks.join("\n")
}

/// Flush whatever is buffered as one block of its own kind
fn flush_block(blocks: &mut Vec<String>, buffer: &[&str], kind: Option<ListKind>) {
    if buffer.is_empty() {
        return;
    }
    match kind {
        Some(kind) => {
            let items: String = buffer
                .iter()
                .map(|item| format!("<li>{}</li>", escape_html(item.trim())))
                .collect();
            blocks.push(format!("<{tag}>{items}</{tag}>", tag = kind.tag()));
        }
        None => {
            blocks.push(format!("<p>{}</p>", escape_html(&buffer.join("\n"))));
        }
    }
}

/// Parse `N. text` where N is one or more ASCII digits.
///
/// At least one whitespace character must follow the period. Returns the item
/// text with leading whitespace removed.
fn parse_ordered_item(line: &str) -> Option<&str> {
    let digits_end = line.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let rest = line[digits_end..].strip_prefix('.')?;
    let item = rest.trim_start();
    if item.len() == rest.len() {
        // No whitespace after the period ("1.stuff" is plain text)
        return None;
    }
    Some(item)
}

/// Parse `- text`, `* text`, or `• text`.
///
/// At least one whitespace character must follow the marker.
fn parse_bullet_item(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    if !matches!(chars.next()?, '-' | '*' | '•') {
        return None;
    }
    let rest = chars.as_str();
    let item = rest.trim_start();
    if item.is_empty() || item.len() == rest.len() {
        return None;
    }
    Some(item)
}

/// Escape `&`, `<`, `>`, `"`, and `'` for safe HTML embedding
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
