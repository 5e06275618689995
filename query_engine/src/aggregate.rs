//! Aggregations over whole queries

use crate::fragment::{raw, seq};
use crate::query::Query;
use crate::reflect::quote_ident;
use crate::symbolic::{Decode, Selector};
use uuid::Uuid;

/// Wrap a query as a scalar row-count selector. The source query renders as a
/// sub-select, so its filters and joins all apply.
pub fn count(source: &Query) -> Selector {
    let id = Uuid::new_v4().to_string();
    Selector {
        select: seq(vec![
            raw("(select count(*) from ("),
            source.to_fragment(),
            raw(format!(") as {})::integer", quote_ident(&id))),
        ]),
        id,
        decode: Decode::Scalar,
    }
}
