//! Command-style service trait.
//!
//! A service receives an operation name plus a keyword map and returns a
//! JSON value. [`Service::run`] wraps [`Service::execute`] with the
//! before/after hooks and a single error hook.

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::record::Record;

#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Registry name of the service.
    fn name(&self) -> &str;

    /// Transform the arguments before execution.
    async fn before_execute(&self, _operation: &str, args: Record) -> AppResult<Record> {
        Ok(args)
    }

    /// Perform the operation.
    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value>;

    /// Transform the result after a successful execution.
    async fn after_execute(&self, _operation: &str, result: Value) -> AppResult<Value> {
        Ok(result)
    }

    /// Called once with any error from the hook chain. Logs and returns the
    /// error unchanged; overrides may translate it.
    fn handle_error(&self, operation: &str, err: AppError) -> AppError {
        error!(service = %self.name(), "Service error in {operation}: {}", err.message);
        err
    }

    /// Run `before_execute → execute → after_execute`.
    async fn run(&self, operation: &str, args: Record) -> AppResult<Value> {
        let outcome: AppResult<Value> = async {
            let args = self.before_execute(operation, args).await?;
            let result = self.execute(operation, args).await?;
            self.after_execute(operation, result).await
        }
        .await;
        outcome.map_err(|e| self.handle_error(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    #[async_trait]
    impl Service for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        async fn before_execute(&self, _operation: &str, mut args: Record) -> AppResult<Record> {
            args.entry("n").or_insert(json!(1));
            Ok(args)
        }

        async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
            match operation {
                "double" => Ok(json!(args["n"].as_i64().unwrap_or(0) * 2)),
                other => Err(AppError::validation(format!("Unknown operation: {other}"))),
            }
        }

        async fn after_execute(&self, _operation: &str, result: Value) -> AppResult<Value> {
            Ok(json!({"result": result}))
        }
    }

    #[tokio::test]
    async fn test_run_chains_hooks() {
        let out = Doubler.run("double", Record::new()).await.unwrap();
        assert_eq!(out, json!({"result": 2}));
    }

    #[tokio::test]
    async fn test_run_reraises_errors() {
        let err = Doubler.run("triple", Record::new()).await.unwrap_err();
        assert_eq!(err.message, "Unknown operation: triple");
    }
}
