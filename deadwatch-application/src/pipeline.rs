// Ingestion and dispatch pipeline

pub mod batch;
pub mod dispatcher;
pub mod ingest;
pub mod poller;
pub mod processor;
pub mod scheduler;
pub mod supervisor;
pub mod task;

pub use batch::{start_batch_import, BatchSummary};
pub use dispatcher::{dispatch_tenant, run_dispatch_cycle, DispatchSummary};
pub use ingest::{run_tail_cycle, IngestReport};
pub use poller::{poll_server, run_status_cycle, PollSummary};
pub use processor::{process_kill, KillOutcome};
pub use scheduler::{run_ingest_cycle, start_pipeline, PipelineHandle};
pub use supervisor::{IngestionSupervisor, ModeTransition, ServerSlot};
pub use task::{TaskError, TaskHandle, TaskOutcome};
