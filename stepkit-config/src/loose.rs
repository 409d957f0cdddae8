//! Normalizes the loose JSON dialect handlers tend to write into strict JSON.
//!
//! Two relaxations are accepted:
//! - bare property names, when the identifier directly follows `{` or `,`
//!   and is followed by `:` (whitespace between them is allowed);
//! - single-quoted strings, rewritten as double-quoted strings.
//!
//! Content inside strings is never rewritten.

/// Rewrites `input` into strict JSON. Input that is already strict passes
/// through unchanged.
pub fn normalize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut last_significant: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                i = copy_double_quoted(&chars, i, &mut out);
                last_significant = Some('"');
            }
            '\'' => {
                i = convert_single_quoted(&chars, i, &mut out);
                last_significant = Some('"');
            }
            c if is_ident_start(c) && matches!(last_significant, Some('{') | Some(',')) => {
                let end = identifier_end(&chars, i);
                let ident: String = chars[i..end].iter().collect();
                if next_significant(&chars, end) == Some(':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                last_significant = ident.chars().last();
                i = end;
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    last_significant = Some(c);
                }
                i += 1;
            }
        }
    }

    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn identifier_end(chars: &[char], start: usize) -> usize {
    let mut end = start + 1;
    while end < chars.len() && is_ident_continue(chars[end]) {
        end += 1;
    }
    end
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}

/// Copies a double-quoted string verbatim; returns the index after it.
fn copy_double_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        match c {
            '\\' if i < chars.len() => {
                out.push(chars[i]);
                i += 1;
            }
            '"' => return i,
            _ => {}
        }
    }
    i
}

/// Re-quotes a single-quoted string; returns the index after it.
///
/// `\'` becomes a plain `'`, a bare `"` is escaped, every other escape
/// sequence is kept as written.
fn convert_single_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' if i < chars.len() => {
                let escaped = chars[i];
                i += 1;
                if escaped == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(escaped);
                }
            }
            '\'' => {
                out.push('"');
                return i;
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    // Unterminated: leave it unterminated so the decoder reports it.
    i
}
