use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use procureflow_events::{EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic bus consumer loop.
///
/// - Subscribes before the thread starts, so no message published after
///   `spawn` returns is missed
/// - Applies an idempotent handler to each message
/// - Handler failures are logged; the loop keeps going
#[derive(Debug)]
pub struct BusWorker;

impl BusWorker {
    pub fn spawn<M, B, H, E>(name: &'static str, bus: &B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M>,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Display + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))?;

        info!(worker = name, "bus worker started");
        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(name: &'static str, sub: Subscription<M>, shutdown_rx: mpsc::Receiver<()>, handler: &mut H)
where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Display,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = %err, "bus worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(worker = name, "bus worker stopped");
}
