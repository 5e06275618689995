//! SQL fragment tree
//!
//! All generated SQL is assembled from an immutable tree of fragments. Raw
//! text is only ever produced by the engine; user data enters the tree
//! exclusively through [`Fragment::Bind`] leaves, which render to positional
//! placeholders (or escaped literals in DDL contexts). That split is the
//! injection-safety boundary for the whole crate.

use crate::error::QueryError;
use serde_json::Value;

/// A node in the SQL assembly tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Engine-produced SQL text, emitted verbatim.
    Raw(String),
    /// An opaque bound value, parameterized or escaped at render time.
    Bind(Value),
    /// An ordered list of sub-fragments.
    List(Vec<Fragment>),
}

/// Engine-produced SQL text.
pub fn raw(text: impl Into<String>) -> Fragment {
    Fragment::Raw(text.into())
}

/// A bound user value.
pub fn bind(value: impl Into<Value>) -> Fragment {
    Fragment::Bind(value.into())
}

/// An ordered sequence of fragments with no separator.
pub fn seq(parts: Vec<Fragment>) -> Fragment {
    Fragment::List(parts)
}

/// Join non-empty fragments with a separator, skipping `None` entries.
pub fn join_fragments(parts: Vec<Option<Fragment>>, separator: Fragment) -> Fragment {
    let mut items = Vec::new();
    for part in parts.into_iter().flatten() {
        if !items.is_empty() {
            items.push(separator.clone());
        }
        items.push(part);
    }
    Fragment::List(items)
}

/// Render a fragment tree to parameterized SQL.
///
/// Depth-first traversal; every `Bind` leaf becomes the next `$N` placeholder
/// and its value is appended to the positional list.
pub fn render(fragment: &Fragment) -> Result<(String, Vec<Value>), QueryError> {
    let mut sql = String::new();
    let mut values = Vec::new();
    render_into(fragment, &mut sql, &mut values)?;
    Ok((sql, values))
}

fn render_into(
    fragment: &Fragment,
    sql: &mut String,
    values: &mut Vec<Value>,
) -> Result<(), QueryError> {
    match fragment {
        Fragment::Raw(text) => sql.push_str(text),
        Fragment::Bind(value) => {
            values.push(value.clone());
            sql.push('$');
            sql.push_str(&values.len().to_string());
        }
        Fragment::List(items) => {
            for item in items {
                render_into(item, sql, values)?;
            }
        }
    }
    Ok(())
}

/// Render a fragment tree with every bound value inlined as an escaped
/// literal. Used for DDL and trigger bodies, which never carry untrusted
/// runtime input and may not support placeholders.
pub fn render_literal(fragment: &Fragment) -> Result<String, QueryError> {
    match fragment {
        Fragment::Raw(text) => Ok(text.clone()),
        Fragment::Bind(value) => escape_value(value),
        Fragment::List(items) => {
            let mut sql = String::new();
            for item in items {
                sql.push_str(&render_literal(item)?);
            }
            Ok(sql)
        }
    }
}

/// Escape a single value as a SQL literal.
pub fn escape_value(value: &Value) -> Result<String, QueryError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => escape_string(s),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(escape_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("({})", parts.join(", ")))
        }
        Value::Object(_) => {
            let text = serde_json::to_string(value)
                .map_err(|e| QueryError::encode("<literal>", e.to_string()))?;
            escape_string(&text)
        }
    }
}

fn escape_string(s: &str) -> Result<String, QueryError> {
    // Postgres cannot store NUL bytes in text; refusing here beats a
    // truncated literal reaching the server.
    if s.contains('\0') {
        return Err(QueryError::encode(
            "<literal>",
            "string contains a NUL byte",
        ));
    }
    Ok(format!("'{}'", s.replace('\'', "''")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_numbers_placeholders_in_traversal_order() {
        let fragment = seq(vec![
            raw("SELECT * FROM t WHERE a = "),
            bind(1),
            raw(" AND b = "),
            bind("two"),
        ]);

        let (sql, values) = render(&fragment).unwrap();

        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(values, vec![json!(1), json!("two")]);
    }

    #[test]
    fn render_walks_nested_lists_depth_first() {
        let inner = seq(vec![raw("x = "), bind(10)]);
        let fragment = seq(vec![raw("("), inner, raw(") AND y = "), bind(20)]);

        let (sql, values) = render(&fragment).unwrap();

        assert_eq!(sql, "(x = $1) AND y = $2");
        assert_eq!(values, vec![json!(10), json!(20)]);
    }

    #[test]
    fn join_fragments_skips_missing_parts() {
        let fragment = join_fragments(
            vec![Some(raw("a")), None, Some(raw("b")), Some(raw("c"))],
            raw(", "),
        );

        let (sql, values) = render(&fragment).unwrap();
        assert_eq!(sql, "a, b, c");
        assert!(values.is_empty());
    }

    #[test]
    fn literal_rendering_escapes_quotes() {
        let fragment = seq(vec![raw("SELECT "), bind("it's")]);
        assert_eq!(render_literal(&fragment).unwrap(), "SELECT 'it''s'");
    }

    #[test]
    fn literal_rendering_handles_scalars() {
        assert_eq!(escape_value(&json!(null)).unwrap(), "NULL");
        assert_eq!(escape_value(&json!(true)).unwrap(), "TRUE");
        assert_eq!(escape_value(&json!(42)).unwrap(), "42");
        assert_eq!(escape_value(&json!([1, 2])).unwrap(), "(1, 2)");
    }

    #[test]
    fn literal_rendering_rejects_nul_bytes() {
        let err = escape_value(&json!("a\0b")).unwrap_err();
        assert!(matches!(err, QueryError::Encode { .. }));
    }
}
