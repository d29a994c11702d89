//! Concurrent batch with per-item fallback

use crate::Result;
use futures::future::join_all;
use std::future::Future;
use tracing::warn;

/// Run `task` over every item concurrently.
///
/// A failed item is replaced by `fallback(item)`; the batch itself never
/// fails. Output order equals input order.
pub async fn gather_with_fallback<'a, I, T, F, Fut, Fb>(
    items: &'a [I],
    task: F,
    fallback: Fb,
) -> Vec<T>
where
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = Result<T>> + 'a,
    Fb: Fn(&'a I) -> T,
{
    let results = join_all(items.iter().map(&task)).await;

    items
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (item, result))| match result {
            Ok(value) => value,
            Err(e) => {
                warn!(index, kind = e.kind(), error = %e, "Batch item failed, using fallback");
                fallback(item)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_preserved_and_failures_isolated() {
        let items = vec![30u64, 10, 20, 0];

        let out = gather_with_fallback(
            &items,
            |ms| async move {
                if *ms == 0 {
                    return Err(FlowError::ModelUnavailable("down".to_string()));
                }
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(format!("done {}", ms))
            },
            |ms| format!("fallback {}", ms),
        )
        .await;

        assert_eq!(out, vec!["done 30", "done 10", "done 20", "fallback 0"]);
    }

    #[tokio::test]
    async fn test_runs_concurrently() {
        let items = vec![50u64; 4];
        let start = std::time::Instant::now();

        let out = gather_with_fallback(
            &items,
            |ms| async move {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(*ms)
            },
            |_| 0,
        )
        .await;

        assert_eq!(out.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let items: Vec<u8> = vec![];
        let out = gather_with_fallback(&items, |i| async move { Ok(*i) }, |i| *i).await;
        assert!(out.is_empty());
    }
}
