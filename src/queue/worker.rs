// src/queue/worker.rs

use async_trait::async_trait;

/// Caller-supplied batch processing function.
///
/// Receives one batch of payload data in submission order and returns a numeric
/// status code. The code is recorded via the diagnostic event sink only; the
/// queue never interprets, retries, or propagates it.
#[async_trait]
pub trait Worker<T>: Send + Sync {
    async fn process(&self, items: Vec<T>) -> i32;
}

#[async_trait]
impl<T, F, Fut> Worker<T> for F
where
    F: Fn(Vec<T>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = i32> + Send,
    T: Send + 'static,
{
    async fn process(&self, items: Vec<T>) -> i32 {
        self(items).await
    }
}
