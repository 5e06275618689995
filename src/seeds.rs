//! Seed scheduler
//!
//! Seeds are named async functions that run concurrently. A seed declares a
//! dependency by awaiting [`SeedContext::wait`] on another seed's name; the
//! scheduler parks it until that seed publishes its result, so declaration
//! order never matters. Dependency cycles are not detected and will park
//! forever.

use futures_util::future::{try_join_all, BoxFuture};
use query_engine::DatabaseClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::errors::QueryHausError;

pub type SeedFn = fn(SeedContext) -> BoxFuture<'static, Result<Value, QueryHausError>>;

/// A named seed; the name keys `wait` lookups.
pub struct Seed {
    pub name: String,
    pub run: SeedFn,
}

impl Seed {
    pub fn new(name: impl Into<String>, run: SeedFn) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

#[derive(Default)]
struct Slot {
    done: Option<Value>,
    waiters: Vec<oneshot::Sender<Value>>,
}

#[derive(Default)]
struct Board {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Handle passed to every running seed.
#[derive(Clone)]
pub struct SeedContext {
    db: Arc<dyn DatabaseClient>,
    board: Arc<Board>,
}

impl SeedContext {
    pub fn db(&self) -> &dyn DatabaseClient {
        self.db.as_ref()
    }

    /// Await another seed's published result. Completed seeds resolve
    /// immediately; otherwise this parks until the seed finishes.
    pub async fn wait(&self, name: &str) -> Result<Value, QueryHausError> {
        let receiver = {
            let mut slots = self.board.slots.lock().await;
            let slot = slots.entry(name.to_string()).or_default();
            if let Some(done) = &slot.done {
                return Ok(done.clone());
            }
            let (sender, receiver) = oneshot::channel();
            slot.waiters.push(sender);
            receiver
        };

        receiver.await.map_err(|_| QueryHausError::Seed {
            name: name.to_string(),
            message: "seed did not complete".to_string(),
        })
    }
}

/// Run all seeds to completion; any failure fails the whole run.
pub async fn run_seeds(
    db: Arc<dyn DatabaseClient>,
    seeds: Vec<Seed>,
) -> Result<(), QueryHausError> {
    let board = Arc::new(Board::default());

    let tasks = seeds.into_iter().map(|seed| {
        let ctx = SeedContext {
            db: db.clone(),
            board: board.clone(),
        };
        let board = board.clone();
        async move {
            let result = (seed.run)(ctx).await.map_err(|e| QueryHausError::Seed {
                name: seed.name.clone(),
                message: e.to_string(),
            })?;
            crate::debug_log!(name = %seed.name, "ran seed");

            let mut slots = board.slots.lock().await;
            let slot = slots.entry(seed.name.clone()).or_default();
            slot.done = Some(result.clone());
            for waiter in slot.waiters.drain(..) {
                let _ = waiter.send(result.clone());
            }
            Ok::<(), QueryHausError>(())
        }
    });

    try_join_all(tasks).await?;
    Ok(())
}
