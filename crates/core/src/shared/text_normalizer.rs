use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds raw hypothesis text into the form alias lookups are keyed on.
///
/// Lowercases, decomposes and drops combining marks (so "Öievaar" and
/// "oievaar" compare equal), then collapses every run of characters that
/// are neither letters nor digits into a single space. The result is
/// trimmed; an empty result means no lookup is possible.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    let folded = text
        .chars()
        .flat_map(char::to_lowercase)
        .nfd()
        .filter(|c| !is_combining_mark(*c));

    for c in folded {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Splits a trailing count off a "species count" utterance.
///
/// `"aalscholver 5"` becomes `("aalscholver", Some(5))`. A decimal remainder
/// (`"5.0"`, `"5,5"`) is accepted and ignored. Text without a trailing
/// whitespace-separated integer is returned trimmed with `None`.
pub fn parse_trailing_integer(text: &str) -> (String, Option<u32>) {
    let trimmed = text.trim();
    let Some((head, tail)) = trimmed.rsplit_once(char::is_whitespace) else {
        return (trimmed.to_string(), None);
    };

    match parse_count(tail) {
        Some(count) => (head.trim_end().to_string(), Some(count)),
        None => (trimmed.to_string(), None),
    }
}

fn parse_count(token: &str) -> Option<u32> {
    let (int_part, fraction) = match token.find(['.', ',']) {
        Some(pos) => (&token[..pos], Some(&token[pos + 1..])),
        None => (token, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.is_some_and(|f| !f.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    int_part.parse().ok()
}
