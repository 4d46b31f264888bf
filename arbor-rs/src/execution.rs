//! Scheduling of command executions.
//!
//! An [`ExecutionCoordinator`] decides where the resolution and the handler of
//! each `execute` call run:
//!
//! - **inline**: on the caller's task, while the returned handle is polled.
//! - **serialized**: resolution is spawned onto the runtime; handlers are
//!   queued on one worker so they never overlap.
//! - **concurrent**: the whole execution is spawned and runs in parallel with
//!   others. Cancelling it also aborts a running handler.
//!
//! Every policy produces an [`ExecutionHandle`], a future yielding the
//! [`CommandResult`] or the [`CommandError`] that stopped the execution.

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::{CommandError, CoordinatorError};
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

type WorkerJob = BoxFuture<'static, ()>;

/// Callback run once with the error of a failed execution.
pub(crate) type Reporter = Arc<dyn Fn(&CommandError) + Send + Sync>;

/// A resolved command together with the context its handler received.
pub struct CommandResult<S> {
    pub context: CommandContext<S>,
    pub command: Arc<Command<S>>,
}

impl<S> fmt::Debug for CommandResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandResult")
            .field("context", &self.context)
            .field("command", &self.command)
            .finish()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Clone)]
enum Policy {
    Inline,
    Serialized {
        runtime: Handle,
        worker: mpsc::UnboundedSender<WorkerJob>,
    },
    Concurrent {
        runtime: Handle,
    },
}

/// Execution policy of a [`CommandManager`](crate::CommandManager).
///
/// Cloning shares the same worker for the serialized policy.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    policy: Policy,
}

impl ExecutionCoordinator {
    /// Run on the caller's task. Needs no runtime.
    pub fn inline() -> Self {
        Self {
            policy: Policy::Inline,
        }
    }

    /// Serialize handlers on a single worker of the current runtime.
    pub fn serialized() -> Result<Self, CoordinatorError> {
        Ok(Self::serialized_on(current_runtime()?))
    }

    pub fn serialized_on(runtime: Handle) -> Self {
        let (worker, mut jobs) = mpsc::unbounded_channel::<WorkerJob>();
        runtime.spawn(async move {
            while let Some(job) = jobs.recv().await {
                job.await;
            }
            tracing::trace!("command worker stopped");
        });
        Self {
            policy: Policy::Serialized { runtime, worker },
        }
    }

    /// Spawn each execution onto the current runtime.
    pub fn concurrent() -> Result<Self, CoordinatorError> {
        Ok(Self::concurrent_on(current_runtime()?))
    }

    pub fn concurrent_on(runtime: Handle) -> Self {
        Self {
            policy: Policy::Concurrent { runtime },
        }
    }

    /// Short policy name, used in logs.
    pub fn policy_name(&self) -> &'static str {
        match self.policy {
            Policy::Inline => "inline",
            Policy::Serialized { .. } => "serialized",
            Policy::Concurrent { .. } => "concurrent",
        }
    }

    /// Schedule one execution. `resolve` produces the command and its bound
    /// context; `report` is told about any failure exactly once.
    pub(crate) fn schedule<S>(
        &self,
        resolve: BoxFuture<'static, Result<CommandResult<S>, CommandError>>,
        report: Reporter,
    ) -> ExecutionHandle<CommandResult<S>>
    where
        S: Send + Sync + 'static,
    {
        let token = CancellationToken::new();
        tracing::trace!(policy = self.policy_name(), "scheduling command execution");

        match &self.policy {
            Policy::Inline => {
                let run = drive(resolve, token.clone(), None, report);
                ExecutionHandle::local(run.boxed(), token)
            }
            Policy::Serialized { runtime, worker } => {
                let run = drive(resolve, token.clone(), Some(worker.clone()), report);
                ExecutionHandle::spawned(runtime.spawn(run), token, false)
            }
            Policy::Concurrent { runtime } => {
                let run = drive(resolve, token.clone(), None, report);
                ExecutionHandle::spawned(runtime.spawn(run), token, true)
            }
        }
    }
}

impl Default for ExecutionCoordinator {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("policy", &self.policy_name())
            .finish()
    }
}

fn current_runtime() -> Result<Handle, CoordinatorError> {
    Handle::try_current().map_err(CoordinatorError::NoRuntime)
}

async fn drive<S>(
    resolve: BoxFuture<'static, Result<CommandResult<S>, CommandError>>,
    token: CancellationToken,
    worker: Option<mpsc::UnboundedSender<WorkerJob>>,
    report: Reporter,
) -> Result<CommandResult<S>, CommandError>
where
    S: Send + Sync + 'static,
{
    let result = run(resolve, token, worker).await;
    if let Err(err) = &result {
        report(err);
    }
    result
}

async fn run<S>(
    resolve: BoxFuture<'static, Result<CommandResult<S>, CommandError>>,
    token: CancellationToken,
    worker: Option<mpsc::UnboundedSender<WorkerJob>>,
) -> Result<CommandResult<S>, CommandError>
where
    S: Send + Sync + 'static,
{
    if token.is_cancelled() {
        return Err(CommandError::Cancelled);
    }
    let resolved = tokio::select! {
        biased;
        _ = token.cancelled() => Err(CommandError::Cancelled),
        resolved = resolve => resolved,
    }?;
    if token.is_cancelled() {
        return Err(CommandError::Cancelled);
    }

    let Some(worker) = worker else {
        return invoke(resolved).await;
    };

    let (done, outcome) = oneshot::channel();
    let job = async move {
        let result = if token.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            invoke(resolved).await
        };
        let _ = done.send(result);
    };
    if worker.send(job.boxed()).is_err() {
        tracing::warn!("command worker is gone, dropping execution");
        return Err(CommandError::Cancelled);
    }
    outcome.await.unwrap_or(Err(CommandError::Cancelled))
}

/// Run the handler, turning a panic into [`CommandError::Handler`].
async fn invoke<S>(resolved: CommandResult<S>) -> Result<CommandResult<S>, CommandError>
where
    S: Send + Sync + 'static,
{
    let handler = Arc::clone(resolved.command.handler());
    let context = resolved.context.clone();
    let command = resolved.command.name().to_string();

    let outcome = AssertUnwindSafe(async move { handler.handle(context).await })
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(command = %command, "command handler completed");
            Ok(resolved)
        }
        Ok(Err(err)) => Err(CommandError::Handler(err)),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(command = %command, panic = %message, "command handler panicked");
            Err(CommandError::Handler(
                format!("handler panicked: {message}").into(),
            ))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Cancels an execution from anywhere. Obtained from
/// [`ExecutionHandle::cancel_handle`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    abort: Option<AbortHandle>,
}

impl CancelHandle {
    /// Request cancellation. Takes effect before resolution and before the
    /// handler starts; a concurrent execution is also aborted mid-handler.
    ///
    /// Under the inline and serialized policies the resulting
    /// [`CommandError::Cancelled`] also reaches the exception chain. An
    /// aborted concurrent execution stops before that point, so a
    /// `FailureKind::Cancelled` handler does not run for it; the handle still
    /// resolves to `Cancelled`.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum HandleState<T> {
    Local(BoxFuture<'static, Result<T, CommandError>>),
    Spawned(JoinHandle<Result<T, CommandError>>),
    Finished,
}

/// Eventual outcome of one `execute` call.
///
/// Inline executions only make progress while this future is polled; spawned
/// ones run regardless and may be detached by dropping the handle.
#[must_use = "inline executions do nothing unless awaited"]
pub struct ExecutionHandle<T> {
    state: HandleState<T>,
    cancel: CancelHandle,
}

impl<T> ExecutionHandle<T> {
    fn local(future: BoxFuture<'static, Result<T, CommandError>>, token: CancellationToken) -> Self {
        Self {
            state: HandleState::Local(future),
            cancel: CancelHandle { token, abort: None },
        }
    }

    fn spawned(
        join: JoinHandle<Result<T, CommandError>>,
        token: CancellationToken,
        abortable: bool,
    ) -> Self {
        let abort = abortable.then(|| join.abort_handle());
        Self {
            state: HandleState::Spawned(join),
            cancel: CancelHandle { token, abort },
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl<T> Future for ExecutionHandle<T> {
    type Output = Result<T, CommandError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match &mut this.state {
            HandleState::Local(future) => ready!(future.as_mut().poll(cx)),
            HandleState::Spawned(join) => match ready!(Pin::new(join).poll(cx)) {
                Ok(output) => output,
                Err(err) if err.is_cancelled() => Err(CommandError::Cancelled),
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            },
            HandleState::Finished => panic!("ExecutionHandle polled after completion"),
        };
        this.state = HandleState::Finished;
        Poll::Ready(output)
    }
}

impl<T> fmt::Debug for ExecutionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            HandleState::Local(_) => "local",
            HandleState::Spawned(_) => "spawned",
            HandleState::Finished => "finished",
        };
        f.debug_struct("ExecutionHandle")
            .field("state", &state)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HandlerResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn resolved<F, Fut>(handler: F) -> CommandResult<()>
    where
        F: Fn(CommandContext<()>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let command = Command::builder("test").handler(handler).build().unwrap();
        CommandResult {
            context: CommandContext::new(Arc::new(()), "test"),
            command: Arc::new(command),
        }
    }

    fn ready(
        result: CommandResult<()>,
    ) -> BoxFuture<'static, Result<CommandResult<()>, CommandError>> {
        async move { Ok(result) }.boxed()
    }

    fn counting_reporter() -> (Reporter, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let reporter: Reporter = Arc::new(move |_: &CommandError| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (reporter, count)
    }

    #[tokio::test]
    async fn test_inline_runs_handler() {
        let (report, reported) = counting_reporter();
        let handle = ExecutionCoordinator::inline().schedule(
            ready(resolved(|_ctx| async { Ok(()) })),
            report,
        );
        let result = handle.await.unwrap();
        assert_eq!(result.command.name(), "test");
        assert_eq!(reported.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_are_reported() {
        let (report, reported) = counting_reporter();
        let coordinator = ExecutionCoordinator::inline();

        let failing = resolved(|_ctx| async { Err("boom".into()) });
        let err = coordinator
            .schedule(ready(failing), Arc::clone(&report))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Handler(_)));

        let panicking = resolved(|_ctx| async { panic!("kaboom") });
        let err = coordinator.schedule(ready(panicking), report).await.unwrap_err();
        assert!(err.to_string().contains("kaboom"));
        assert_eq!(reported.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_poll() {
        let (report, reported) = counting_reporter();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let result = resolved(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handle = ExecutionCoordinator::inline().schedule(ready(result), report);
        handle.cancel();
        assert!(matches!(handle.await, Err(CommandError::Cancelled)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_serialized_handlers_do_not_overlap() {
        let coordinator = ExecutionCoordinator::serialized().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            let order = Arc::clone(&order);
            let result = resolved(move |_ctx| {
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                let order = Arc::clone(&order);
                async move {
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    order.lock().unwrap().push(i);
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            });
            let (report, _) = counting_reporter();
            handles.push(coordinator.schedule(ready(result), report));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(order.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_cancel_aborts_running_handler() {
        let coordinator = ExecutionCoordinator::concurrent().unwrap();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let started_tx = Arc::new(Mutex::new(Some(started_tx)));
        let result = resolved(move |_ctx| {
            let started_tx = Arc::clone(&started_tx);
            async move {
                if let Some(tx) = started_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        });

        let (report, _) = counting_reporter();
        let handle = coordinator.schedule(ready(result), report);
        started_rx.await.unwrap();
        handle.cancel_handle().cancel();
        assert!(matches!(handle.await, Err(CommandError::Cancelled)));
    }

    #[test]
    fn test_threaded_policies_need_runtime() {
        assert!(matches!(
            ExecutionCoordinator::concurrent(),
            Err(CoordinatorError::NoRuntime(_))
        ));
        assert!(ExecutionCoordinator::serialized().is_err());
        assert_eq!(ExecutionCoordinator::default().policy_name(), "inline");
    }
}
