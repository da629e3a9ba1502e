use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

static TOTAL_REQUESTS: AtomicU64 = AtomicU64::new(0);
static REJECTED_REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Global semaphore bounding concurrent parse requests. Sized once from the
/// environment at first use.
static REQUEST_SEMAPHORE: Lazy<Semaphore> = Lazy::new(|| {
    let max_requests = std::env::var("MAX_CONCURRENT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse::<usize>()
        .unwrap_or(100);

    info!(
        max_concurrent_requests = max_requests,
        "Initializing request semaphore"
    );
    Semaphore::new(max_requests)
});

/// Claims one concurrency slot for the duration of a request. The permit
/// releases its slot on drop; a full semaphore rejects instead of queueing.
pub fn acquire_permit() -> AppResult<SemaphorePermit<'static>> {
    let total = TOTAL_REQUESTS.fetch_add(1, Ordering::Relaxed) + 1;

    REQUEST_SEMAPHORE.try_acquire().map_err(|_| {
        let rejected = REJECTED_REQUESTS.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            total_requests = total,
            rejected_requests = rejected,
            available_permits = REQUEST_SEMAPHORE.available_permits(),
            "Rate limit exceeded - too many concurrent requests"
        );
        AppError::RateLimitExceeded
    })
}

/// (total, rejected, available) counters for the health surface.
pub fn metrics() -> (u64, u64, usize) {
    let total = TOTAL_REQUESTS.load(Ordering::Relaxed);
    let rejected = REJECTED_REQUESTS.load(Ordering::Relaxed);
    let available = REQUEST_SEMAPHORE.available_permits();
    (total, rejected, available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_release_on_drop() {
        let (_, _, before) = metrics();

        let permit = acquire_permit().unwrap();
        assert_eq!(REQUEST_SEMAPHORE.available_permits(), before - 1);

        drop(permit);
        assert_eq!(REQUEST_SEMAPHORE.available_permits(), before);
    }
}
