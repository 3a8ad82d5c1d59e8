//! Concurrent retrieval of objects by identifier.
//!
//! A dispatcher task feeds identifiers into a bounded work queue drained by
//! a fixed pool of workers. Each identifier produces exactly one outcome,
//! sent either on the object channel or on the error channel. Both channels
//! close once every identifier has been resolved.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::client::{ObjectSource, ObjectType};
use crate::error::FetchError;
use crate::object::Object;

/// Default number of workers fetching in parallel.
pub const DEFAULT_THREADS: usize = 5;

/// Receiving halves of a running fetch.
pub struct Retrieval {
  pub objects: mpsc::Receiver<Object>,
  pub errors: mpsc::Receiver<FetchError>,
}

/// Retrieves the objects named by `ids` using at most `threads` concurrent
/// requests.
///
/// `relationships` are requested alongside each object. Results arrive in
/// completion order, not input order. The error channel can buffer one error
/// per identifier, so a consumer may drain all objects before looking at
/// errors without stalling the workers.
///
/// Must be called from within a tokio runtime.
pub fn retrieve_objects<S>(
  source: Arc<S>,
  object_type: ObjectType,
  ids: Vec<String>,
  threads: usize,
  relationships: &[String],
) -> Retrieval
where
  S: ObjectSource + ?Sized + 'static,
{
  let threads = threads.max(1);
  let (obj_tx, objects) = mpsc::channel(threads);
  let (err_tx, errors) = mpsc::channel(ids.len().max(1));
  let (work_tx, work_rx) = mpsc::channel::<String>(threads);
  let work_rx = Arc::new(Mutex::new(work_rx));

  let query = if relationships.is_empty() {
    String::new()
  } else {
    format!("?relationships={}", relationships.join(","))
  };

  debug!(count = ids.len(), threads, ?object_type, "dispatching fetch");

  tokio::spawn(async move {
    for id in ids {
      if work_tx.send(id).await.is_err() {
        break;
      }
    }
  });

  let workers = (0..threads)
    .map(|_| {
      let source = Arc::clone(&source);
      let work_rx = Arc::clone(&work_rx);
      let obj_tx = obj_tx.clone();
      let err_tx = err_tx.clone();
      let query = query.clone();
      tokio::spawn(async move {
        loop {
          let next = work_rx.lock().await.recv().await;
          let Some(id) = next else { break };
          let path = format!("{}{query}", object_type.path(&id));
          match source.get_object(&path).await {
            Ok(obj) => {
              let _ = obj_tx.send(obj).await;
            }
            Err(err) => {
              debug!(%id, error = %err, "fetch failed");
              let _ = err_tx.send(FetchError { id, source: err }).await;
            }
          }
        }
      })
    })
    .collect::<Vec<_>>();

  // The spawned workers hold the only remaining senders; once they finish,
  // both channels close.
  drop((obj_tx, err_tx));
  tokio::spawn(async move {
    join_all(workers).await;
  });

  Retrieval { objects, errors }
}
