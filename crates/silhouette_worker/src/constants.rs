//! Buffer layout and worker constants.

/// Floats per vertex in a position buffer.
pub const POSITION_ITEM_SIZE: usize = 3;

/// Components per index in an index buffer.
pub const INDEX_ITEM_SIZE: usize = 1;

/// Default name of the worker thread.
pub const DEFAULT_THREAD_NAME: &str = "silhouette-worker";

/// Default name of the router thread that delivers worker messages.
pub const ROUTER_THREAD_NAME: &str = "silhouette-router";

/// Command-line argument that starts the stdio worker in a child process.
pub const WORKER_ARG: &str = "worker";

/// Triangles processed between progress reports by the projection solver.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 4096;

/// Grid cells per world unit used to weld projected vertices.
pub const DEFAULT_WELD_SCALE: f32 = 1e4;

/// Exit status of a stdio worker whose solver panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Samples kept in the job duration history.
pub const METRICS_WINDOW: usize = 128;
