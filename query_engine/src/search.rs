//! Full-text search helpers
//!
//! A weighted tsvector column maintained by a trigger, plus query-side rank
//! and match helpers. Trigger DDL renders with inlined literals; the search
//! terms at query time always bind.

use crate::error::QueryError;
use crate::fragment::{bind, join_fragments, raw, render_literal, seq, Fragment};
use crate::model::ModelRef;
use crate::query::QueryData;
use crate::reflect::{camel_to_snake, column_name, quote_ident, table_name};
use crate::symbolic::{ColumnSelector, Decode, ModelResolver, Selector};
use uuid::Uuid;

/// Extensions the search helpers rely on; run these before schema build.
pub fn search_extensions() -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string(),
        "CREATE EXTENSION IF NOT EXISTS btree_gin".to_string(),
    ]
}

/// tsvector weight class, highest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    A,
    B,
    C,
    D,
}

impl Weight {
    fn letter(self) -> char {
        match self {
            Weight::A => 'A',
            Weight::B => 'B',
            Weight::C => 'C',
            Weight::D => 'D',
        }
    }
}

/// What a maintained tsvector column contains: the target column key plus
/// weighted source expressions.
pub struct TsvOptions {
    pub column: String,
    pub weights: Vec<(Weight, Fragment)>,
}

/// DDL for a trigger keeping a weighted tsvector column current on every
/// insert and update. The builder resolves columns under the trigger's `new`
/// record alias.
pub fn maintain_weighted_tsv<F>(model: &ModelRef, build: F) -> Result<String, QueryError>
where
    F: FnOnce(&ModelResolver) -> Result<TsvOptions, QueryError>,
{
    let query = QueryData::with_alias(model.clone(), "new");
    let options = build(&ModelResolver::new(&query))?;
    model.field(&options.column)?;

    let weighted = options
        .weights
        .iter()
        .map(|(weight, value)| {
            Some(seq(vec![
                raw("setweight(to_tsvector('english', COALESCE("),
                value.clone(),
                raw(format!(", '')), '{}')", weight.letter())),
            ]))
        })
        .collect();

    let target = column_name(&options.column);
    let snake = camel_to_snake(&options.column);
    let fn_name = quote_ident(&format!("tsv_{snake}_update_fn"));
    let trigger_name = quote_ident(&format!("tsv_{snake}_update_trigger"));

    let body = seq(vec![
        raw(format!(
            "CREATE FUNCTION {fn_name}() RETURNS trigger AS $$\nbegin\n  \"new\".{target} := "
        )),
        join_fragments(weighted, raw(" || ")),
        raw(format!(
            ";\n  return new;\nend\n$$ LANGUAGE plpgsql;\n\
             CREATE TRIGGER {trigger_name} BEFORE INSERT OR UPDATE\n\
             ON {}\nFOR EACH ROW EXECUTE PROCEDURE {fn_name}()",
            table_name(model)
        )),
    ]);

    render_literal(&body)
}

/// Relevance rank of a tsvector column against search terms.
pub fn tsv_search_rank(column: &ColumnSelector, terms: &str) -> Selector {
    Selector {
        id: Uuid::new_v4().to_string(),
        select: seq(vec![
            raw("ts_rank_cd("),
            column.fragment(),
            raw(", plainto_tsquery('english', "),
            bind(terms),
            raw("))"),
        ]),
        decode: Decode::Scalar,
    }
}

/// Match a tsvector column against all terms of a plain-text search.
pub fn match_tsv(column: &ColumnSelector, terms: &str) -> Fragment {
    seq(vec![
        column.fragment(),
        raw(" @@ plainto_tsquery('english', "),
        bind(terms),
        raw(")"),
    ])
}
