//! End-to-end composition tests over a scripted client.

use crate::client::{DatabaseClient, Row};
use crate::error::QueryError;
use crate::model::{self, Model, ModelRef};
use crate::query::{select, Filter};
use crate::writes::{insert, insert_all, remove, transact, update};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every executed statement and replays scripted responses in order;
/// once the script runs out, every statement succeeds with no rows.
struct Scripted {
    executed: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<Result<Vec<Row>, QueryError>>>,
}

impl Scripted {
    fn new(responses: Vec<Result<Vec<Row>, QueryError>>) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    fn statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }
}

#[async_trait]
impl DatabaseClient for Scripted {
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>, QueryError> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), values.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

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
            ("user", model::reference(&user, "id").unwrap()),
        ],
    );
    (user, project)
}

#[tokio::test]
async fn users_with_project_counts() {
    let (user, project) = models();
    let db = Scripted::new(vec![Ok(vec![
        row(&[("name", json!("alice")), ("projectCount", json!(2))]),
        row(&[("name", json!("bob")), ("projectCount", json!(0))]),
    ])]);

    let query = select(&user, &["name"])
        .unwrap()
        .with(|u| {
            let user_id = u.column("id")?;
            let projects =
                select(&project, &[])?.filter(Filter::new().field("user", &user_id))?;
            Ok(vec![(
                "projectCount".to_string(),
                crate::aggregate::count(&projects),
            )])
        })
        .unwrap();

    let rows = query.get(&db).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("projectCount"), Some(&json!(2)));

    let statements = db.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("(select count(*) from (SELECT "));
}

#[tokio::test]
async fn nested_selection_decodes_missing_children_to_empty_array() {
    let (user, project) = models();
    let db = Scripted::new(vec![Ok(vec![
        row(&[
            ("name", json!("alice")),
            ("projects", json!([{ "name": "p1" }])),
        ]),
        row(&[("name", json!("bob")), ("projects", Value::Null)]),
    ])]);

    let query = select(&user, &["name"])
        .unwrap()
        .with(|u| {
            let user_id = u.column("id")?;
            let projects =
                select(&project, &["name"])?.filter(Filter::new().field("user", &user_id))?;
            Ok(vec![("projects".to_string(), projects.json_selector())])
        })
        .unwrap();

    let rows = query.get(&db).await.unwrap();
    assert_eq!(rows[0].get("projects"), Some(&json!([{ "name": "p1" }])));
    assert_eq!(rows[1].get("projects"), Some(&json!([])));
}

#[tokio::test]
async fn insert_all_rolls_back_on_first_failure() {
    let (user, _) = models();
    let db = Scripted::new(vec![
        Ok(Vec::new()), // BEGIN
        Ok(vec![row(&[("id", json!("u1"))])]),
        Err(QueryError::Database {
            message: "duplicate key".to_string(),
            sql: String::new(),
            values: Vec::new(),
        }),
    ]);

    let err = insert_all(
        &db,
        &user,
        vec![
            row(&[("name", json!("a"))]),
            row(&[("name", json!("a"))]),
            row(&[("name", json!("c"))]),
        ],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, QueryError::Database { .. }));

    let statements = db.statements();
    assert_eq!(statements[0], "BEGIN");
    assert!(statements[1].starts_with("INSERT INTO public.\"user\""));
    assert!(statements[2].starts_with("INSERT INTO public.\"user\""));
    // The failed batch never commits; nothing runs after the rollback.
    assert_eq!(statements[3], "ROLLBACK");
    assert_eq!(statements.len(), 4);
}

#[tokio::test]
async fn insert_all_commits_and_collects_returned_keys() {
    let (user, _) = models();
    let db = Scripted::new(vec![
        Ok(Vec::new()),
        Ok(vec![row(&[("id", json!("u1"))])]),
        Ok(vec![row(&[("id", json!("u2"))])]),
        Ok(Vec::new()),
    ]);

    let returned = insert_all(
        &db,
        &user,
        vec![row(&[("name", json!("a"))]), row(&[("name", json!("b"))])],
    )
    .await
    .unwrap();

    assert_eq!(returned.len(), 2);
    assert_eq!(returned[1].get("id"), Some(&json!("u2")));
    assert_eq!(db.statements().last().map(String::as_str), Some("COMMIT"));
}

#[tokio::test]
async fn unfiltered_delete_never_reaches_the_client() {
    let (user, _) = models();
    let db = Scripted::new(Vec::new());

    let err = remove(&user).execute(&db).await.unwrap_err();
    assert!(matches!(err, QueryError::UnsafeDelete { .. }));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn transact_runs_each_statement_with_its_binds_and_collects_rows() {
    let (user, _) = models();
    let db = Scripted::new(vec![
        Ok(Vec::new()), // BEGIN
        Ok(vec![row(&[("id", json!("u1"))])]),
        Ok(vec![row(&[("id", json!("u2"))])]),
        Ok(Vec::new()), // COMMIT
    ]);

    let created = insert(&user, row(&[("name", json!("alice"))]));
    let renamed = update(&user)
        .set("name", json!("alicia"))
        .filter(Filter::new().field("name", json!("alice")))
        .unwrap()
        .returning(&["id"]);

    let results = transact(&db, &[&created, &renamed]).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0][0].get("id"), Some(&json!("u1")));
    assert_eq!(results[1][0].get("id"), Some(&json!("u2")));

    let executed = db.executed.lock().unwrap();
    assert_eq!(executed.len(), 4);
    assert_eq!(executed[0].0, "BEGIN");
    assert!(executed[1].0.starts_with("INSERT INTO public.\"user\""));
    assert_eq!(executed[1].1, vec![json!("alice")]);
    assert!(executed[2].0.starts_with("UPDATE public.\"user\""));
    assert_eq!(executed[2].1, vec![json!("alicia"), json!("alice")]);
    assert_eq!(executed[3].0, "COMMIT");
}

#[tokio::test]
async fn transact_rolls_back_when_a_statement_fails() {
    let (user, _) = models();
    let db = Scripted::new(vec![
        Ok(Vec::new()), // BEGIN
        Ok(vec![row(&[("id", json!("u1"))])]),
        Err(QueryError::Database {
            message: "duplicate key".to_string(),
            sql: String::new(),
            values: Vec::new(),
        }),
    ]);

    let first = insert(&user, row(&[("name", json!("a"))]));
    let second = insert(&user, row(&[("name", json!("a"))]));

    let err = transact(&db, &[&first, &second]).await.unwrap_err();
    assert!(matches!(err, QueryError::Database { .. }));

    let statements = db.statements();
    assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(statements.len(), 4);
}

#[tokio::test]
async fn transact_refuses_an_unfiltered_delete_before_any_statement_runs() {
    let (user, _) = models();
    let db = Scripted::new(Vec::new());

    let created = insert(&user, row(&[("name", json!("a"))]));
    let wipe = remove(&user);

    let err = transact(&db, &[&created, &wipe]).await.unwrap_err();
    assert!(matches!(err, QueryError::UnsafeDelete { .. }));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn single_insert_returns_the_generated_key() {
    let (user, _) = models();
    let db = Scripted::new(vec![Ok(vec![row(&[("id", json!("u9"))])])]);

    let returned = insert(&user, row(&[("name", json!("zoe"))]))
        .execute(&db)
        .await
        .unwrap();
    assert_eq!(returned.get("id"), Some(&json!("u9")));
}
