use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// A named background thread that runs a task immediately and then once per
/// `interval` until stopped.
///
/// Stopping flips the `running` flag under the same mutex the thread waits
/// on, notifies the condition variable and joins the thread, so a stop never
/// waits for the remainder of an interval.
#[derive(Debug)]
pub(crate) struct PeriodicWorker {
    state: Arc<(Mutex<bool>, Condvar)>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl PeriodicWorker {
    pub(crate) fn spawn<F>(name: &str, interval: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let state = Arc::new((Mutex::new(true), Condvar::new()));
        let thread_state = state.clone();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                jaeger_debug!(name: "PeriodicWorker.ThreadStarted", thread = thread_name.as_str());
                let (lock, cvar) = &*thread_state;
                loop {
                    task();
                    let Ok(running) = lock.lock() else {
                        break;
                    };
                    let Ok((running, _)) =
                        cvar.wait_timeout_while(running, interval, |running| *running)
                    else {
                        break;
                    };
                    if !*running {
                        break;
                    }
                }
                jaeger_debug!(name: "PeriodicWorker.ThreadStopped", thread = thread_name.as_str());
            })?;

        Ok(PeriodicWorker {
            state,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Signals the thread to exit and joins it. Calling this more than once is
    /// harmless.
    pub(crate) fn stop(&self) {
        let (lock, cvar) = &*self.state;
        match lock.lock() {
            Ok(mut running) => *running = false,
            Err(poisoned) => *poisoned.into_inner() = false,
        }
        cvar.notify_all();

        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                jaeger_error!(name: "PeriodicWorker.JoinFailed");
            }
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
