//! SQL identifier quoting.
//!
//! Identifiers matching `[a-z_][a-z0-9_$]*` that are not reserved words are
//! written as-is; everything else is wrapped in double quotes with `"` escaped
//! as `""`.

/// Keywords that must be quoted when used as identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "case", "check", "column", "constraint", "create",
    "default", "desc", "distinct", "do", "else", "end", "false", "for", "foreign", "from",
    "grant", "group", "having", "in", "into", "is", "join", "limit", "not", "null", "offset",
    "on", "or", "order", "primary", "references", "select", "table", "then", "to", "true",
    "union", "unique", "user", "using", "values", "when", "where", "with",
];

/// Whether `name` can be written without quotes.
pub fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first == '_' || first.is_ascii_lowercase()) {
        return false;
    }
    if !chars.all(|c| c == '_' || c == '$' || c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return false;
    }
    !RESERVED.contains(&name)
}

/// Append `name` to `out`, quoting it when required.
pub fn write_ident(out: &mut String, name: &str) {
    if is_plain(name) {
        out.push_str(name);
        return;
    }
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}
