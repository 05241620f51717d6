pub mod context;
pub mod delete;
pub mod dml;
pub mod executor;
pub mod query;
pub mod statement;
pub mod update;

pub use context::ExecutionContext;
pub use delete::DeleteExecutor;
pub use dml::{InsertExecutor, UpsertExecutor};
pub use executor::{Executor, ExecutorPipeline};
pub use query::QueryExecutor;
pub use statement::{Assignment, Filter, Statement};
pub use update::UpdateExecutor;
