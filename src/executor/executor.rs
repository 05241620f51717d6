use super::{ExecutionContext, Statement};
use crate::core::{DbError, Result};
use crate::result::QueryResult;

pub trait Executor: Send + Sync {
    /// Executor name for logs
    fn name(&self) -> &'static str;

    fn can_handle(&self, stmt: &Statement) -> bool;
    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult>;
}

pub struct ExecutorPipeline {
    pub executors: Vec<Box<dyn Executor>>,
}

impl ExecutorPipeline {
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
        }
    }

    /// Pipeline with an executor for every statement kind.
    pub fn with_default_executors() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(super::QueryExecutor));
        pipeline.register(Box::new(super::InsertExecutor));
        pipeline.register(Box::new(super::UpsertExecutor));
        pipeline.register(Box::new(super::UpdateExecutor));
        pipeline.register(Box::new(super::DeleteExecutor));
        pipeline
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) {
        self.executors.push(executor);
    }

    pub fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        for executor in &self.executors {
            if executor.can_handle(stmt) {
                tracing::debug!(
                    executor = executor.name(),
                    txn = %ctx.transaction.id(),
                    "{}",
                    stmt
                );
                return executor.execute(stmt, ctx);
            }
        }

        Err(DbError::UnsupportedOperation(format!(
            "No executor found for statement: {}",
            stmt
        )))
    }
}

impl Default for ExecutorPipeline {
    fn default() -> Self {
        Self::with_default_executors()
    }
}
