use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devwatch::cancel::CancelToken;
use devwatch::errors::{DevwatchError, Result};
use devwatch::supervisor::{ReadyFuture, TaskLaunch};
use devwatch::tasks::{StopFuture, Task};

/// What [`FakeTask::stop`] does.
#[derive(Debug, Clone)]
pub enum StopBehaviour {
    Succeed,
    Fail(String),
    Panic,
    /// Succeed after sleeping.
    Delay(Duration),
}

/// A task that does nothing but record how it was stopped.
///
/// `stopped` is shared between fakes so tests can check which tasks were
/// stopped, in completion order.
#[derive(Debug)]
pub struct FakeTask {
    name: String,
    token: CancelToken,
    behaviour: StopBehaviour,
    stop_calls: AtomicUsize,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl FakeTask {
    pub fn new(name: &str, token: &CancelToken, behaviour: StopBehaviour) -> Arc<Self> {
        Self::with_log(name, token, behaviour, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_log(
        name: &str,
        token: &CancelToken,
        behaviour: StopBehaviour,
        stopped: Arc<Mutex<Vec<String>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            token: token.clone(),
            behaviour,
            stop_calls: AtomicUsize::new(0),
            stopped,
        })
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Pair this task with a readiness future.
    pub fn launch(self: &Arc<Self>, ready: ReadyFuture) -> TaskLaunch {
        TaskLaunch::new(Arc::clone(self) as Arc<dyn Task>, ready)
    }
}

impl Task for FakeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    fn stop(&self) -> StopFuture<'_> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.behaviour {
                StopBehaviour::Succeed => {}
                StopBehaviour::Fail(msg) => {
                    return Err(DevwatchError::Other(anyhow::anyhow!("{msg}")));
                }
                StopBehaviour::Panic => panic!("fake stop panicked"),
                StopBehaviour::Delay(d) => tokio::time::sleep(*d).await,
            }
            self.stopped.lock().unwrap().push(self.name.clone());
            Ok(())
        })
    }
}

/// Ready immediately.
pub fn ready_now() -> ReadyFuture {
    Box::pin(async { Ok::<(), DevwatchError>(()) })
}

/// Ready after `delay`.
pub fn ready_after(delay: Duration) -> ReadyFuture {
    Box::pin(async move {
        tokio::time::sleep(delay).await;
        Ok::<(), DevwatchError>(())
    })
}

/// Never becomes ready.
pub fn never_ready() -> ReadyFuture {
    Box::pin(std::future::pending::<Result<()>>())
}

/// Fails to start with `err`.
pub fn ready_err(err: DevwatchError) -> ReadyFuture {
    Box::pin(async move { Err::<(), _>(err) })
}
