//! Telegram MarkdownV2 rendering
//!
//! MarkdownV2 rejects a whole message if any reserved character appears
//! unescaped outside an entity, so every piece of untrusted text is escaped
//! on its own before it is placed in the template.

/// Characters that must be prefixed with `\` in MarkdownV2 text
pub const RESERVED_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape `text` for use in a MarkdownV2 message body
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if RESERVED_CHARS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Bold title, plain link line, italic caption
pub fn format_message(title: &str, link: &str, caption: &str) -> String {
    format!(
        "*{}*\n\nRead more: {}\n\n_{}_",
        escape_markdown(title),
        escape_markdown(link),
        escape_markdown(caption)
    )
}
