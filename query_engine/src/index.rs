//! Index registration
//!
//! Indexes are declared next to the model and named by a hash of their own
//! definition, so re-running schema build is idempotent (`IF NOT EXISTS`
//! against a content-derived name) and definition changes produce a new
//! index instead of silently keeping the old one.

use crate::error::QueryError;
use crate::fragment::{raw, render_literal, seq, Fragment};
use crate::model::ModelRef;
use crate::query::QueryData;
use crate::reflect::{quote_ident, table_name};
use crate::symbolic::ModelResolver;
use sha2::{Digest, Sha256};

/// Handle to a registered index; `id` is the content-derived index name.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHandle {
    pub id: String,
}

/// Register an index on a model. The builder receives an unqualified resolver
/// (index expressions have no row alias in scope) and returns the `USING`
/// expression, e.g. `gin ("name")`.
pub fn make_index<F>(model: &ModelRef, build: F) -> Result<IndexHandle, QueryError>
where
    F: FnOnce(&ModelResolver) -> Result<Fragment, QueryError>,
{
    let query = QueryData::empty_unqualified(model.clone());
    let using = build(&ModelResolver::new(&query))?;

    let on = seq(vec![
        raw(format!("ON {} USING ", table_name(model))),
        using,
    ]);
    let mut hasher = Sha256::new();
    hasher.update(render_literal(&on)?.as_bytes());
    let id = format!("{:x}", hasher.finalize())[..32].to_string();

    let statement = seq(vec![
        raw(format!("CREATE INDEX IF NOT EXISTS {} ", quote_ident(&id))),
        on,
    ]);
    model.register_index(statement);

    Ok(IndexHandle { id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, Model};

    fn user_model() -> ModelRef {
        Model::new(
            "User",
            vec![("id", model::generated_id()), ("name", model::text())],
        )
    }

    #[test]
    fn make_index_registers_a_named_create_statement() {
        let user = user_model();
        let handle = make_index(&user, |u| {
            Ok(seq(vec![raw("gin ("), u.column("name")?.fragment(), raw(")")]))
        })
        .unwrap();

        let registered = user.indexes();
        assert_eq!(registered.len(), 1);

        let sql = render_literal(&registered[0]).unwrap();
        assert_eq!(
            sql,
            format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON public.\"user\" USING gin (\"name\")",
                handle.id
            )
        );
    }

    #[test]
    fn index_names_derive_from_their_definition() {
        let a = user_model();
        let b = user_model();

        let on_name = |u: &ModelResolver| {
            Ok(seq(vec![raw("gin ("), u.column("name")?.fragment(), raw(")")]))
        };
        let on_id = |u: &ModelResolver| {
            Ok(seq(vec![raw("btree ("), u.column("id")?.fragment(), raw(")")]))
        };

        let same_1 = make_index(&a, on_name).unwrap();
        let same_2 = make_index(&b, on_name).unwrap();
        let different = make_index(&a, on_id).unwrap();

        assert_eq!(same_1, same_2);
        assert_ne!(same_1, different);
        assert_eq!(same_1.id.len(), 32);
    }

    #[test]
    fn index_columns_render_unqualified() {
        let user = user_model();
        make_index(&user, |u| Ok(u.column("name")?.fragment())).unwrap();
        let sql = render_literal(&user.indexes()[0]).unwrap();
        assert!(sql.contains("USING \"name\""));
        assert!(!sql.contains("\".\""));
    }
}
