//! SQLite-backed store for projects and their Scrapyd job history.
//!
//! Every run Scrapyd reports is mirrored as a [`JobInstance`] plus the
//! [`JobExecution`] that references it. The remote job id is unique across
//! all executions; [`StateRuntime::create_execution`] enforces that inside a
//! single transaction so concurrent writers cannot record a run twice.

mod migrations;
mod model;
mod runtime;

/// Preferred entrypoint: owns the connection pool and schema.
pub use runtime::StateRuntime;

pub use model::ExecutionInsertOutcome;
pub use model::JobExecution;
pub use model::JobExecutionCreateParams;
pub use model::JobInstance;
pub use model::JobInstanceCreateParams;
pub use model::JobRunType;
pub use model::Project;
pub use runtime::state_db_path;

/// Name of the database file inside the keeper home.
///
/// The file holds the only copy of the job history, so the schema evolves
/// through migrations and the file is never replaced.
pub const STATE_DB_FILENAME: &str = "state.sqlite";
