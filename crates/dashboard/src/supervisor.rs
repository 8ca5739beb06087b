use std::any::Any;
use std::fmt::Debug;
use std::future::Future;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Runs a long-lived dashboard task to completion and reports how it ended.
///
/// The future runs on its own tokio task so a panic in it is logged rather
/// than unwinding through `main`. `token` is cancelled on every outcome,
/// which also stops the signal handler and the run-duration timer.
///
/// Returns the task's output on success, `None` otherwise.
pub async fn supervise<F, T>(future: F, token: CancellationToken, task_name: &str) -> Option<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static + Debug,
{
    let outcome = match tokio::spawn(future).await {
        Ok(Ok(output)) => {
            log::debug!("{} finished: {:?}", task_name, output);
            Some(output)
        }
        Ok(Err(error)) => {
            log::error!("{} stopped: {:#}", task_name, error);
            None
        }
        Err(join_error) if join_error.is_panic() => {
            log::error!(
                "{} panicked: {}",
                task_name,
                panic_message(join_error.into_panic())
            );
            None
        }
        Err(_) => {
            log::warn!("{} was aborted before finishing", task_name);
            None
        }
    };

    token.cancel();
    outcome
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "<non-string panic payload>".to_string(),
        },
    }
}
