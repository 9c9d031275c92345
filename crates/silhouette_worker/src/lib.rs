//! silhouette_worker - Background silhouette generation for triangle meshes
//!
//! This crate offloads silhouette extraction to a single background worker
//! (a thread, or a child process speaking JSON Lines) and hands the result
//! back through a future. At most one job runs per dispatcher; a second
//! submission while busy fails immediately instead of queueing.
//!
//! # Features
//!
//! - **Zero-copy submission**: `MeshBuffers` are moved to the worker thread
//!   and come back inside the result
//! - **Progress streaming**: worker progress reaches a caller callback before
//!   the job settles
//! - **Output modes**: one merged mesh or one mesh per connected group
//! - **Lifecycle**: `dispose` stops the worker and cancels the in-flight job
//!
//! # Example
//!
//! ```ignore
//! use silhouette_worker::{DispatcherConfig, GenerateOptions, MeshBuffers, SilhouetteDispatcher};
//!
//! let dispatcher = SilhouetteDispatcher::create(DispatcherConfig::default())?;
//! let mesh = MeshBuffers::indexed(position, index);
//!
//! let result = dispatcher
//!   .generate(mesh, GenerateOptions::new().with_progress(|p| println!("{p:.2}")))?
//!   .await?;
//!
//! println!("{} triangles", result.meshes()[0].triangle_count());
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod materialize;
pub mod metrics;
pub mod options;
pub mod protocol;
pub mod types;

// Re-export commonly used items
pub use config::DispatcherConfig;
pub use error::{DispatchError, SolveError, TransportError};
pub use options::{AlgorithmOptions, GenerateOptions, ProgressCallback, RequestOptions};
pub use protocol::{JobId, ResultPayload, WorkerMessage, WorkerRequest};
pub use types::{BufferAttribute, MeshBuffers, MeshResult, MinMaxAABB, OutputMode, SilhouetteMesh};

// Geometry work run on the worker
pub mod solver;
pub use solver::{EchoSolver, ProgressReporter, ProjectionOptions, ProjectionSolver, SilhouetteSolver};

// Channels to the worker (thread or child process)
pub mod transport;
pub use transport::{ProcessTransport, ThreadTransport, Transport, TransportEvent};

// Worker-side job loop
pub mod worker;
pub use worker::run_stdio_worker;

// Job state machine and router
pub mod dispatcher;
pub use dispatcher::{DispatcherState, JobHandle, SilhouetteDispatcher};
