//! Query descriptors and the select builder
//!
//! A [`QueryData`] is the immutable descriptor of one query under
//! construction: target model, unique alias, where fragments, joins,
//! ordering, limit, and the selected fields. Builder operations never mutate
//! in place; each returns a structurally-copied descriptor, so a base query
//! can branch into filtered variants without aliasing bugs.

use crate::client::{DatabaseClient, Row};
use crate::error::QueryError;
use crate::fragment::{bind, join_fragments, raw, render, seq, Fragment};
use crate::model::ModelRef;
use crate::operators::WhereOp;
use crate::symbolic::{ColumnSelector, Decode, ModelResolver, RelationSymbol, Selector};
use serde_json::Value;
use uuid::Uuid;

/// Join flavor; nested descriptors render flattened in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
    Outer,
}

impl JoinKind {
    fn to_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Outer => "OUTER",
        }
    }
}

/// Sort direction for `order_by`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A joined sub-descriptor; its where clauses become the ON condition.
#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub query: QueryData,
}

/// One selected field: output key plus the selector that renders and decodes
/// it.
#[derive(Debug, Clone)]
pub struct SelectEntry {
    pub key: String,
    pub selector: Selector,
}

/// Immutable descriptor of one query.
#[derive(Debug, Clone)]
pub struct QueryData {
    /// Globally-unique alias; self-joins and correlated sub-queries never
    /// collide.
    pub id: String,
    pub model: ModelRef,
    pub select: Vec<SelectEntry>,
    pub wheres: Vec<Fragment>,
    pub joins: Vec<Join>,
    pub order_by: Vec<Fragment>,
    pub limit: Option<i64>,
    qualify: bool,
}

impl QueryData {
    pub fn empty(model: ModelRef) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model,
            select: Vec::new(),
            wheres: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            qualify: true,
        }
    }

    /// A descriptor whose columns render unqualified; used for index
    /// expressions where no alias is in scope.
    pub fn empty_unqualified(model: ModelRef) -> Self {
        Self {
            qualify: false,
            ..Self::empty(model)
        }
    }

    /// A descriptor with a fixed alias; used for trigger bodies referencing
    /// the `new` record.
    pub fn with_alias(model: ModelRef, alias: &str) -> Self {
        Self {
            id: alias.to_string(),
            ..Self::empty(model)
        }
    }

    pub(crate) fn column_sql(&self, key: &str) -> String {
        if self.qualify {
            crate::reflect::qualified_column(&self.id, key)
        } else {
            crate::reflect::column_name(key)
        }
    }
}

/// One value inside a filter map.
#[derive(Debug, Clone)]
pub enum FilterValue {
    /// Plain value; widens to equality (with a placeholder cast for
    /// uuid/timestamp/array columns).
    Value(Value),
    /// A tagged comparison operator.
    Op(WhereOp),
    /// An engine-produced expression compared by equality.
    Expr(Fragment),
    /// Another query's column compared by equality.
    Column(ColumnSelector),
    /// A nested filter against the referenced model; installs an implicit
    /// INNER JOIN scoped by the foreign key.
    Related(Filter),
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::Value(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Value(Value::String(value))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Value(Value::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Value(Value::Bool(value))
    }
}

impl From<WhereOp> for FilterValue {
    fn from(op: WhereOp) -> Self {
        FilterValue::Op(op)
    }
}

impl From<Fragment> for FilterValue {
    fn from(fragment: Fragment) -> Self {
        FilterValue::Expr(fragment)
    }
}

impl From<ColumnSelector> for FilterValue {
    fn from(column: ColumnSelector) -> Self {
        FilterValue::Column(column)
    }
}

impl From<&ColumnSelector> for FilterValue {
    fn from(column: &ColumnSelector) -> Self {
        FilterValue::Column(column.clone())
    }
}

impl From<Filter> for FilterValue {
    fn from(filter: Filter) -> Self {
        FilterValue::Related(filter)
    }
}

/// An ordered field map; entries AND together.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    entries: Vec<(String, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<FilterValue>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }
}

/// A where clause: a field map or a raw fragment.
#[derive(Debug, Clone)]
pub enum Clause {
    Map(Filter),
    Fragment(Fragment),
}

impl From<Filter> for Clause {
    fn from(filter: Filter) -> Self {
        Clause::Map(filter)
    }
}

impl From<Fragment> for Clause {
    fn from(fragment: Fragment) -> Self {
        Clause::Fragment(fragment)
    }
}

/// Append a where clause to a descriptor, returning the extended copy.
pub(crate) fn add_where_clause(
    mut query: QueryData,
    clause: Clause,
) -> Result<QueryData, QueryError> {
    match clause {
        Clause::Fragment(fragment) => {
            query.wheres.push(seq(vec![raw("("), fragment, raw(")")]));
        }
        Clause::Map(filter) => {
            for (key, value) in filter.entries {
                let field = query.model.field(&key)?.clone();
                let column = raw(query.column_sql(&key));
                match value {
                    FilterValue::Op(op) => {
                        query.wheres.push(op.clause(column));
                    }
                    FilterValue::Expr(fragment) => {
                        query.wheres.push(seq(vec![column, raw(" = "), fragment]));
                    }
                    FilterValue::Column(other) => {
                        query
                            .wheres
                            .push(seq(vec![column, raw(" = "), other.fragment()]));
                    }
                    FilterValue::Value(v) => {
                        let mut parts = vec![column, raw(" = ")];
                        if v.is_null() {
                            parts.push(raw("NULL"));
                        } else {
                            parts.push(bind(v));
                            if let Some(cast) = field.bind_cast() {
                                parts.push(raw(format!("::{cast}")));
                            }
                        }
                        query.wheres.push(seq(parts));
                    }
                    FilterValue::Related(inner) => {
                        let references = field.references.as_ref().ok_or_else(|| {
                            QueryError::unknown_field(
                                query.model.name(),
                                &format!("{key} (not a reference field)"),
                            )
                        })?;
                        let mut nested = QueryData::empty(references.model.clone());
                        nested.wheres.push(seq(vec![
                            raw(query.column_sql(&key)),
                            raw(" = "),
                            raw(nested.column_sql(&references.column)),
                        ]));
                        let nested = add_where_clause(nested, Clause::Map(inner))?;
                        query.joins.push(Join {
                            kind: JoinKind::Inner,
                            query: nested,
                        });
                    }
                }
            }
        }
    }
    Ok(query)
}

pub(crate) fn where_to_sql(wheres: &[Fragment]) -> Option<Fragment> {
    if wheres.is_empty() {
        return None;
    }
    Some(seq(vec![
        raw("WHERE "),
        join_fragments(wheres.iter().cloned().map(Some).collect(), raw(" AND ")),
    ]))
}

fn flatten_joins(joins: &[Join]) -> Vec<Join> {
    joins
        .iter()
        .flat_map(|join| {
            let mut out = vec![join.clone()];
            out.extend(flatten_joins(&join.query.joins));
            out
        })
        .collect()
}

fn joins_to_sql(joins: &[Join]) -> Option<Fragment> {
    if joins.is_empty() {
        return None;
    }

    let rendered = flatten_joins(joins)
        .into_iter()
        .map(|join| {
            Some(seq(vec![
                raw(format!("{} JOIN ", join.kind.to_sql())),
                raw(crate::reflect::table_name(&join.query.model)),
                raw(format!(" as {}", crate::reflect::quote_ident(&join.query.id))),
                raw(" ON "),
                join_fragments(
                    join.query.wheres.iter().cloned().map(Some).collect(),
                    raw(" AND "),
                ),
            ]))
        })
        .collect();

    Some(join_fragments(rendered, raw(" ")))
}

fn order_to_sql(order_by: &[Fragment]) -> Option<Fragment> {
    if order_by.is_empty() {
        return None;
    }
    Some(seq(vec![
        raw("ORDER BY "),
        join_fragments(order_by.iter().cloned().map(Some).collect(), raw(", ")),
    ]))
}

fn limit_to_sql(limit: Option<i64>) -> Option<Fragment> {
    limit.map(|count| seq(vec![raw("LIMIT "), bind(count)]))
}

/// The SELECT list: explicit selectors aliased under their keys, or the
/// model's primary-key columns (all columns when the model has none) when
/// nothing was selected.
pub(crate) fn select_clause(query: &QueryData) -> Fragment {
    if query.select.is_empty() {
        return default_columns(query);
    }

    join_fragments(
        query
            .select
            .iter()
            .map(|entry| {
                Some(seq(vec![
                    entry.selector.select.clone(),
                    raw(format!(" AS {}", crate::reflect::quote_ident(&entry.key))),
                ]))
            })
            .collect(),
        raw(", "),
    )
}

fn default_columns(query: &QueryData) -> Fragment {
    let mut keys = query.model.primary_keys();
    if keys.is_empty() {
        keys = query.model.fields().map(|(key, _)| key).collect();
    }
    join_fragments(
        keys.into_iter()
            .map(|key| Some(raw(query.column_sql(key))))
            .collect(),
        raw(", "),
    )
}

/// The SELECT list of a JSON-shaped sub-query: `json_build_object` pairs,
/// aggregated over all rows unless `single`.
pub(crate) fn json_select_clause(single: bool, query: &QueryData) -> Fragment {
    if query.select.is_empty() {
        return default_columns(query);
    }

    let pairs = join_fragments(
        query
            .select
            .iter()
            .map(|entry| {
                Some(seq(vec![
                    bind(entry.key.clone()),
                    raw("::text, "),
                    entry.selector.select.clone(),
                ]))
            })
            .collect(),
        raw(", "),
    );

    if single {
        seq(vec![raw("to_json(json_build_object("), pairs, raw("))")])
    } else {
        seq(vec![
            raw("to_json(array_agg(json_build_object("),
            pairs,
            raw(")))"),
        ])
    }
}

fn query_tail(query: &QueryData) -> Vec<Option<Fragment>> {
    vec![
        Some(seq(vec![
            raw("FROM "),
            raw(crate::reflect::table_name(&query.model)),
            raw(format!(" as {}", crate::reflect::quote_ident(&query.id))),
        ])),
        joins_to_sql(&query.joins),
        where_to_sql(&query.wheres),
        order_to_sql(&query.order_by),
        limit_to_sql(query.limit),
    ]
}

/// Render a descriptor as a plain row-per-result SELECT.
pub(crate) fn select_fragment(query: &QueryData) -> Fragment {
    let mut parts = vec![Some(seq(vec![raw("SELECT "), select_clause(query)]))];
    parts.extend(query_tail(query));
    join_fragments(parts, raw(" "))
}

/// Render a descriptor as a JSON-array-producing sub-select.
pub(crate) fn json_select_fragment(query: &QueryData) -> Fragment {
    let mut parts = vec![Some(seq(vec![
        raw("SELECT "),
        json_select_clause(false, query),
    ]))];
    parts.extend(query_tail(query));
    join_fragments(parts, raw(" "))
}

/// Render a descriptor as a single-JSON-object sub-select.
pub(crate) fn json_single_select_fragment(query: &QueryData) -> Fragment {
    let mut parts = vec![Some(seq(vec![
        raw("SELECT "),
        json_select_clause(true, query),
    ]))];
    parts.extend(query_tail(query));
    join_fragments(parts, raw(" "))
}

/// The select builder. Every operation returns a new query; the receiver is
/// never mutated.
#[derive(Debug, Clone)]
pub struct Query {
    data: QueryData,
}

impl Query {
    pub fn from(model: ModelRef) -> Self {
        Self {
            data: QueryData::empty(model),
        }
    }

    pub fn data(&self) -> &QueryData {
        &self.data
    }

    /// The symbolic resolver scoped to this query's alias.
    pub fn resolver(&self) -> ModelResolver {
        ModelResolver::new(&self.data)
    }

    /// AND a where clause onto the query.
    pub fn filter(self, clause: impl Into<Clause>) -> Result<Self, QueryError> {
        Ok(Self {
            data: add_where_clause(self.data, clause.into())?,
        })
    }

    /// AND a where clause built from the symbolic resolver.
    pub fn filter_with<F>(self, build: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&ModelResolver) -> Result<Clause, QueryError>,
    {
        let clause = build(&ModelResolver::new(&self.data))?;
        self.filter(clause)
    }

    /// Append named selectors built from the symbolic resolver.
    pub fn with<F>(self, build: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&ModelResolver) -> Result<Vec<(String, Selector)>, QueryError>,
    {
        let entries = build(&ModelResolver::new(&self.data))?;
        let mut data = self.data;
        for (key, selector) in entries {
            data.select.push(SelectEntry { key, selector });
        }
        Ok(Self { data })
    }

    /// Order by a selected-field alias or a model column. Last call wins.
    pub fn order_by(self, key: &str, direction: SortOrder) -> Result<Self, QueryError> {
        let mut data = self.data;
        let clause = if data.select.iter().any(|entry| entry.key == key) {
            raw(format!(
                "{} {}",
                crate::reflect::quote_ident(key),
                direction.to_sql()
            ))
        } else {
            data.model.field(key)?;
            raw(format!("{} {}", data.column_sql(key), direction.to_sql()))
        };
        data.order_by = vec![clause];
        Ok(Self { data })
    }

    pub fn limit(self, count: i64) -> Self {
        let mut data = self.data;
        data.limit = Some(count);
        Self { data }
    }

    /// The rendered SELECT statement plus its positional values.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>), QueryError> {
        render(&select_fragment(&self.data))
    }

    pub(crate) fn to_fragment(&self) -> Fragment {
        select_fragment(&self.data)
    }

    /// This query as a SELECT-list selector producing one JSON array per
    /// outer row; zero matches decode to `[]`.
    pub fn json_selector(&self) -> Selector {
        Selector {
            id: format!("{}-subquery", self.data.id),
            select: seq(vec![raw("("), json_select_fragment(&self.data), raw(")")]),
            decode: Decode::JsonRows,
        }
    }

    /// Execute and decode all rows.
    pub async fn get(&self, db: &dyn DatabaseClient) -> Result<Vec<Row>, QueryError> {
        let (sql, values) = self.to_sql()?;
        crate::trace_log!(sql = %sql, "executing select");
        let rows = db.execute(&sql, &values).await?;

        Ok(rows.into_iter().map(|row| self.decode_row(row)).collect())
    }

    /// Decode one raw result row through the query's selectors.
    pub(crate) fn decode_row(&self, row: Row) -> Row {
        if self.data.select.is_empty() {
            return row;
        }
        let mut decoded = Row::new();
        for entry in &self.data.select {
            let value = row.get(&entry.key).cloned().unwrap_or(Value::Null);
            decoded.insert(entry.key.clone(), entry.selector.decode_value(value));
        }
        decoded
    }

    /// Execute and return the first row, if any.
    pub async fn one(&self, db: &dyn DatabaseClient) -> Result<Option<Row>, QueryError> {
        Ok(self.get(db).await?.into_iter().next())
    }
}

/// Start a query over `model` selecting the named columns.
pub fn select(model: &ModelRef, keys: &[&str]) -> Result<Query, QueryError> {
    let data = QueryData::empty(model.clone());
    let mut query = Query { data };
    for key in keys {
        query.data.model.field(key)?;
        let selector = ColumnSelector::new(key, query.data.column_sql(key)).selector();
        query.data.select.push(SelectEntry {
            key: key.to_string(),
            selector,
        });
    }
    Ok(query)
}

/// A single-row reference selection reached through a relation symbol; used
/// inside `with` to embed a to-one related record as one JSON object.
#[derive(Debug, Clone)]
pub struct SubQuery {
    data: QueryData,
}

impl SubQuery {
    pub fn filter(self, clause: impl Into<Clause>) -> Result<Self, QueryError> {
        Ok(Self {
            data: add_where_clause(self.data, clause.into())?,
        })
    }

    pub fn with<F>(self, build: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&ModelResolver) -> Result<Vec<(String, Selector)>, QueryError>,
    {
        let entries = build(&ModelResolver::new(&self.data))?;
        let mut data = self.data;
        for (key, selector) in entries {
            data.select.push(SelectEntry { key, selector });
        }
        Ok(Self { data })
    }

    /// The compiled single-row JSON selector.
    pub fn selector(&self) -> Selector {
        Selector {
            id: Uuid::new_v4().to_string(),
            select: seq(vec![
                raw("("),
                json_single_select_fragment(&self.data),
                raw(")"),
            ]),
            decode: Decode::JsonRow,
        }
    }
}

/// Select named columns of the model behind a relation symbol, keeping the
/// relation's correlated scoping.
pub fn subselect(relation: &RelationSymbol, keys: &[&str]) -> Result<SubQuery, QueryError> {
    let mut data = relation.resolver().query().clone();
    data.select.clear();
    for key in keys {
        data.model.field(key)?;
        let selector = ColumnSelector::new(key, data.column_sql(key)).selector();
        data.select.push(SelectEntry {
            key: key.to_string(),
            selector,
        });
    }
    Ok(SubQuery { data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, Model};
    use crate::operators::{equal, not_equal};
    use crate::reflect::qualified_column;
    use serde_json::json;

    fn models() -> (ModelRef, ModelRef) {
        let user = Model::new(
            "User",
            vec![("id", model::generated_id()), ("name", model::text())],
        );
        let project = Model::new(
            "Project",
            vec![
                ("id", model::generated_id()),
                ("name", model::text()),
                ("compareNumber1", model::integer()),
                ("compareNumber2", model::integer()),
                ("user", model::reference(&user, "id").unwrap()),
            ],
        );
        (user, project)
    }

    #[test]
    fn select_renders_aliased_columns() {
        let (user, _) = models();
        let query = select(&user, &["name"]).unwrap();
        let (sql, values) = query.to_sql().unwrap();

        let alias = &query.data().id;
        assert_eq!(
            sql,
            format!(
                "SELECT {} AS \"name\" FROM public.\"user\" as {}",
                qualified_column(alias, "name"),
                crate::reflect::quote_ident(alias)
            )
        );
        assert!(values.is_empty());
    }

    #[test]
    fn empty_selection_defaults_to_primary_keys() {
        let (user, _) = models();
        let query = Query::from(user);
        let (sql, _) = query.to_sql().unwrap();
        let alias = &query.data().id;
        assert!(sql.starts_with(&format!("SELECT {}", qualified_column(alias, "id"))));
    }

    #[test]
    fn filter_map_binds_value_with_uuid_cast() {
        let (user, _) = models();
        let query = select(&user, &["name"])
            .unwrap()
            .filter(Filter::new().field("id", "3d1e..."))
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();

        let alias = &query.data().id;
        assert!(sql.contains(&format!(
            "WHERE {} = $1::uuid",
            qualified_column(alias, "id")
        )));
        assert_eq!(values, vec![json!("3d1e...")]);
    }

    #[test]
    fn filters_and_together_in_order() {
        let (user, _) = models();
        let query = select(&user, &["name"])
            .unwrap()
            .filter(Filter::new().field("name", "a"))
            .unwrap()
            .filter(Filter::new().field("name", not_equal("b")))
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();

        let alias = &query.data().id;
        let column = qualified_column(alias, "name");
        assert!(sql.contains(&format!("WHERE {column} = $1 AND {column} != $2")));
        assert_eq!(values, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn unknown_filter_key_fails_fast() {
        let (user, _) = models();
        let err = select(&user, &["name"])
            .unwrap()
            .filter(Filter::new().field("nope", "x"))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
    }

    #[test]
    fn related_filter_installs_inner_join() {
        let (_, project) = models();
        let query = select(&project, &["name"])
            .unwrap()
            .filter(Filter::new().field("user", Filter::new().field("name", "alice")))
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();

        let outer = &query.data().id;
        let joined = &query.data().joins[0].query.id;
        assert!(sql.contains(&format!(
            "INNER JOIN public.\"user\" as {} ON {} = {} AND {} = $1",
            crate::reflect::quote_ident(joined),
            qualified_column(outer, "user"),
            qualified_column(joined, "id"),
            qualified_column(joined, "name")
        )));
        assert_eq!(values, vec![json!("alice")]);
    }

    #[test]
    fn order_by_prefers_select_aliases_and_last_call_wins() {
        let (user, _) = models();
        let query = select(&user, &["name"])
            .unwrap()
            .order_by("id", SortOrder::Desc)
            .unwrap()
            .order_by("name", SortOrder::Asc)
            .unwrap();
        let (sql, _) = query.to_sql().unwrap();

        assert!(sql.contains("ORDER BY \"name\" ASC"));
        assert!(!sql.contains("DESC"));
    }

    #[test]
    fn order_by_unknown_key_fails() {
        let (user, _) = models();
        assert!(select(&user, &["name"])
            .unwrap()
            .order_by("nope", SortOrder::Asc)
            .is_err());
    }

    #[test]
    fn limit_binds_its_count() {
        let (user, _) = models();
        let query = select(&user, &["name"]).unwrap().limit(5);
        let (sql, values) = query.to_sql().unwrap();
        assert!(sql.ends_with("LIMIT $1"));
        assert_eq!(values, vec![json!(5)]);
    }

    #[test]
    fn with_appends_resolver_built_selectors() {
        let (user, _) = models();
        let query = select(&user, &[])
            .unwrap()
            .with(|base| Ok(vec![("myName".to_string(), base.column("name")?.selector())]))
            .unwrap();
        let (sql, _) = query.to_sql().unwrap();

        let alias = &query.data().id;
        assert!(sql.contains(&format!(
            "SELECT {} AS \"myName\"",
            qualified_column(alias, "name")
        )));
    }

    #[test]
    fn nested_query_selector_compiles_to_json_array_agg() {
        let (user, project) = models();
        let query = select(&user, &["name"])
            .unwrap()
            .with(|u| {
                let user_id = u.column("id")?;
                let projects = select(&project, &["name"])?
                    .filter(Filter::new().field("user", &user_id))?;
                Ok(vec![("projects".to_string(), projects.json_selector())])
            })
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();

        assert!(sql.contains("to_json(array_agg(json_build_object("));
        // The nested pair key binds as a value; the sub-query filter
        // references the outer alias rather than binding.
        assert_eq!(values, vec![json!("name")]);
        let outer = &query.data().id;
        assert!(sql.contains(&qualified_column(outer, "id")));
    }

    #[test]
    fn subselect_compiles_to_single_json_object() {
        let (_, project) = models();
        let query = select(&project, &["name"])
            .unwrap()
            .with(|p| {
                let relation = match p.resolve("user")? {
                    crate::symbolic::FieldSymbol::Relation(relation) => relation,
                    other => panic!("expected relation, got {other:?}"),
                };
                let user = subselect(&relation, &["name"])?;
                Ok(vec![("user".to_string(), user.selector())])
            })
            .unwrap();
        let (sql, _) = query.to_sql().unwrap();

        assert!(sql.contains("to_json(json_build_object("));
        assert!(!sql.contains("array_agg(json_build_object"));
    }

    #[test]
    fn json_rows_decode_normalizes_null_to_empty_array() {
        let (user, project) = models();
        let _ = user;
        let selector = Query::from(project).json_selector();
        assert_eq!(selector.decode_value(Value::Null), json!([]));
        assert_eq!(
            selector.decode_value(json!([{ "name": "x" }])),
            json!([{ "name": "x" }])
        );
    }

    #[test]
    fn branching_a_base_query_leaves_the_base_untouched() {
        let (user, _) = models();
        let base = select(&user, &["name"]).unwrap();
        let filtered = base
            .clone()
            .filter(Filter::new().field("name", "a"))
            .unwrap();

        assert!(base.data().wheres.is_empty());
        assert_eq!(filtered.data().wheres.len(), 1);
        assert_eq!(base.data().id, filtered.data().id);
    }

    #[test]
    fn column_comparison_via_resolver() {
        let (_, project) = models();
        let query = select(&project, &["name"])
            .unwrap()
            .filter_with(|p| {
                Ok(Clause::Map(
                    Filter::new()
                        .field("name", "test")
                        .field("compareNumber1", equal(&p.column("compareNumber2")?)),
                ))
            })
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();

        let alias = &query.data().id;
        assert!(sql.contains(&format!(
            "{} = {}",
            qualified_column(alias, "compare_number1"),
            qualified_column(alias, "compare_number2")
        )));
        assert_eq!(values, vec![json!("test")]);
    }
}
