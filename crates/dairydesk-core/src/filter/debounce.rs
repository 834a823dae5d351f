use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Coalescing stage for search keystrokes.
///
/// Each pushed value restarts the quiet period; once input has been quiet
/// for the whole period the latest value is handed to `on_settle`. Values
/// still pending when the debouncer is dropped are discarded.
///
/// Duplicate suppression is left to the consumer, which knows which term
/// was last applied.
#[derive(Debug)]
pub struct Debouncer<T = String> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(quiet: Duration, mut on_settle: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let task = tokio::spawn(async move {
            let mut pending: Option<T> = None;
            loop {
                match pending.take() {
                    None => match rx.recv().await {
                        Some(value) => pending = Some(value),
                        None => break,
                    },
                    Some(value) => {
                        tokio::select! {
                            next = rx.recv() => match next {
                                Some(newer) => pending = Some(newer),
                                None => break,
                            },
                            _ = sleep(quiet) => on_settle(value),
                        }
                    }
                }
            }
        });
        Self { tx, task }
    }

    pub fn push(&self, value: impl Into<T>) {
        // Fails only after abort, when input is meant to be ignored
        let _ = self.tx.send(value.into());
    }

    /// Stop the timer and drop anything pending.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(String) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |term| sink.lock().unwrap().push(term))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_settles_once_with_last_term() {
        let (seen, sink) = recorder();
        let debouncer: Debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        for term in ["c", "co", "cow"] {
            debouncer.push(term);
            sleep(Duration::from_millis(100)).await;
        }
        assert!(seen.lock().unwrap().is_empty());

        sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["cow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_keystroke_restarts_quiet_period() {
        let (seen, sink) = recorder();
        let debouncer: Debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        debouncer.push("b");
        sleep(Duration::from_millis(299)).await;
        debouncer.push("bu");
        sleep(Duration::from_millis(299)).await;
        assert!(seen.lock().unwrap().is_empty());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["bu".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_discards_pending_term() {
        let (seen, sink) = recorder();
        let debouncer: Debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        debouncer.push("cow");
        debouncer.abort();
        sleep(Duration::from_secs(1)).await;
        assert!(seen.lock().unwrap().is_empty());
    }
}
