//! Worker pool (C2 consumer side): handler registry and the dispatch loop
//! draining `pilot-queue`. Handler bodies are grounded on
//! `internal/pkg/tasks/apify_tasks.go`'s transactional shape, reused as
//! pure/composable functions rather than its direct-notification side
//! effect (`pilot-db`'s anomaly-events-only write is the detector's whole
//! job; the DB trigger is the notification author).

pub mod handlers;
pub mod pool;

pub use handlers::{HandlerError, WorkerContext};
pub use pool::run_worker_loop;
