use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::media::MediaSummary;

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Terminal columns `s` occupies. Wide CJK characters and emoji count as 2,
/// combining marks as 0.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cuts `s` to at most `max_width` columns, ending in "..." when anything
/// was dropped. Widths too narrow for the ellipsis get a bare prefix.
///
/// ```
/// use marquee::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Blade Runner 2049", 10), "Blade R...");
/// assert_eq!(truncate_to_width("Her", 10), "Her");
/// assert_eq!(truncate_to_width("Dune", 2), "Du");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(take_columns(s, max_width).to_string());
    }
    let kept = take_columns(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{kept}{ELLIPSIS}"))
}

/// Longest prefix of `s` that fits in `width` columns.
fn take_columns(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            return &s[..idx];
        }
        used += w;
    }
    s
}

/// Removes control characters and ANSI escape sequences from upstream text
/// before it reaches the terminal. Newlines and tabs become spaces.
pub fn sanitize(s: &str) -> Cow<'_, str> {
    if !s.chars().any(char::is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                // CSI: parameters up to a final byte in @..~
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: up to BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\u{07}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\n' | '\t' | '\r' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// One-line label for a media card: sanitised title plus year, fitted to
/// `width` columns.
pub fn card_label(item: &MediaSummary, width: usize) -> String {
    let title = sanitize(&item.title);
    let title = if title.trim().is_empty() {
        Cow::Borrowed("(untitled)")
    } else {
        title
    };
    let label = match item.year {
        Some(year) => format!("{} ({year})", title.trim()),
        None => title.trim().to_string(),
    };
    truncate_to_width(&label, width).into_owned()
}
