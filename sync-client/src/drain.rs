//! Sampled drain: accumulate queued items and flush them once per tick.

use galaxy_sync_core::SampleBuffer;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawn a task that drains `rx` into a buffer and hands the whole buffer
/// to `flush` every `period`.
///
/// Ticks with nothing buffered call nothing. When every sender is dropped,
/// whatever is still buffered is flushed and the task ends. Aborting the
/// task drops the buffer.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_sampled_drain<T, F, Fut>(
    mut rx: mpsc::UnboundedReceiver<T>,
    period: Duration,
    mut flush: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(Vec<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut buffer = SampleBuffer::new();
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                item = rx.recv() => match item {
                    Some(item) => buffer.push(item),
                    None => break,
                },
                _ = timer.tick() => {
                    if let Some(batch) = buffer.swap_out() {
                        tracing::debug!(items = batch.len(), "Flushing sampled batch");
                        flush(batch).await;
                    }
                }
            }
        }

        if let Some(batch) = buffer.swap_out() {
            tracing::debug!(items = batch.len(), "Flushing final batch");
            flush(batch).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<Vec<u32>>>>, impl FnMut(Vec<u32>) -> std::future::Ready<()>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        (batches, move |batch| {
            sink.lock().unwrap().push(batch);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_flushed_as_one_batch() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (batches, flush) = recorder();
        let task = spawn_sampled_drain(rx, Duration::from_millis(700), flush);

        for i in 0..25 {
            tx.send(i).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(750)).await;

        let batches = batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], (0..25).collect::<Vec<_>>());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_ticks_flush_nothing() {
        let (_tx, rx) = mpsc::unbounded_channel::<u32>();
        let (batches, flush) = recorder();
        let task = spawn_sampled_drain(rx, Duration::from_millis(700), flush);

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(batches.lock().unwrap().is_empty());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn items_across_ticks_land_in_separate_batches() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (batches, flush) = recorder();
        let task = spawn_sampled_drain(rx, Duration::from_millis(700), flush);

        tx.send(1).unwrap();
        tokio::time::sleep(Duration::from_millis(750)).await;
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(*batches.lock().unwrap(), vec![vec![1], vec![2, 3]]);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_queue_flushes_the_rest() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (batches, flush) = recorder();
        let task = spawn_sampled_drain(rx, Duration::from_secs(60), flush);

        tx.send(7).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![vec![7]]);
    }
}
