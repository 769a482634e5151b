use std::{borrow::Cow, path::Path};

pub fn normalise_path(path: &Path) -> Cow<'_, Path> {
    // Try to expand tilde prefix to home directory
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped));
        }
        tracing::warn!("cannot determine home directory, using path as-is");
    }
    Cow::Borrowed(path)
}

/// Split `symbol = value` (or `symbol := value`) at the first assignment
/// operator outside a string literal.
///
/// Comparisons (`==`, `!=`, `<=`, `>=`) and compound operators (`+=`, `<<=`,
/// ...) are not assignments. Both halves are trimmed.
pub fn split_assignment(expression: &str) -> Option<(&str, &str)> {
    let bytes = expression.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                continue;
            }
            b'=' => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let split_at = match prev {
                    Some(b':') => i - 1,
                    Some(
                        b'!' | b'<' | b'>' | b'=' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&'
                        | b'|' | b'^',
                    ) => {
                        i += 1;
                        continue;
                    }
                    _ => i,
                };

                let symbol = expression[..split_at].trim();
                let value = expression[i + 1..].trim();
                if symbol.is_empty() {
                    return None;
                }
                return Some((symbol, value));
            }
            _ => {}
        }
        i += 1;
    }

    None
}
