//! Placeholder scanning for `:name` parameters.
//!
//! The scanner skips quoted strings, quoted identifiers, comments and
//! `::` casts, so only real named placeholders are reported.

use std::ops::Range;

/// A `:name` placeholder found in a SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder<'a> {
    /// Byte range of the placeholder, including the leading `:`.
    pub range: Range<usize>,
    /// Parameter name without the `:`.
    pub name: &'a str,
}

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_ident_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Find every named placeholder in `sql`, in order of appearance.
pub(crate) fn placeholders(sql: &str) -> Vec<Placeholder<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                // Skip a quoted section; doubled quotes stay inside it.
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && quote == b'\'' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    // Postgres cast
                    i += 2;
                    continue;
                }
                let preceded_by_ident = i > 0 && is_ident_char(bytes[i - 1]);
                match bytes.get(i + 1) {
                    Some(&b) if is_ident_start(b) && !preceded_by_ident => {
                        let start = i;
                        i += 1;
                        while i < bytes.len() && is_ident_char(bytes[i]) {
                            i += 1;
                        }
                        out.push(Placeholder {
                            range: start..i,
                            name: &sql[start + 1..i],
                        });
                    }
                    _ => i += 1,
                }
            }
            _ => i += 1,
        }
    }

    out
}

/// Replace each placeholder for which `f` returns `Some`.
pub(crate) fn substitute(sql: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for ph in placeholders(sql) {
        if let Some(replacement) = f(ph.name) {
            out.push_str(&sql[last..ph.range.start]);
            out.push_str(&replacement);
            last = ph.range.end;
        }
    }
    out.push_str(&sql[last..]);
    out
}

/// Rewrite `:name` placeholders to positional `$n` ones.
///
/// Repeated names share one position. Returns the rewritten SQL and the
/// parameter names in position order.
pub fn to_positional(sql: &str) -> (String, Vec<String>) {
    let mut order: Vec<String> = Vec::new();
    let rewritten = substitute(sql, |name| {
        let idx = match order.iter().position(|n| n == name) {
            Some(pos) => pos + 1,
            None => {
                order.push(name.to_string());
                order.len()
            }
        };
        Some(format!("${idx}"))
    });
    (rewritten, order)
}

/// Make `raw` usable inside a parameter name.
pub(crate) fn sanitize_param_name(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c == '_' || c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || !out.as_bytes()[0].is_ascii_alphabetic() && out.as_bytes()[0] != b'_' {
        out.insert(0, 'p');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sql: &str) -> Vec<&str> {
        placeholders(sql).into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn finds_named_placeholders() {
        assert_eq!(
            names("SELECT * FROM t WHERE a = :a AND b IN (:b_1, :b_2)"),
            vec!["a", "b_1", "b_2"]
        );
    }

    #[test]
    fn skips_strings_casts_and_comments() {
        let sql = "SELECT ':not', \"x:y\", a::text -- :nope\nFROM t WHERE id = :id /* :no */";
        assert_eq!(names(sql), vec!["id"]);
    }

    #[test]
    fn skips_escaped_quotes() {
        assert_eq!(names("SELECT 'it''s :x', 'a\\' :y' , :z"), vec!["z"]);
    }

    #[test]
    fn substitute_only_known() {
        let out = substitute("a = :a AND b = :b", |n| (n == "a").then(|| "1".to_string()));
        assert_eq!(out, "a = 1 AND b = :b");
    }

    #[test]
    fn positional_reuses_indices() {
        let (sql, order) = to_positional("a = :x OR b = :y OR c = :x");
        assert_eq!(sql, "a = $1 OR b = $2 OR c = $1");
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_param_name("users.id"), "users_id");
        assert_eq!(sanitize_param_name("1st"), "p1st");
    }
}
