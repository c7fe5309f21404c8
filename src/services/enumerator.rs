//! Cursor-paginated scan of the ids already present in the vector store.

use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashSet;

use crate::error::VectorStoreError;
use crate::services::VectorStore;
use crate::utils::{RetryPolicy, with_retry};

struct Cursor {
    after: Option<String>,
    done: bool,
}

/// Lazily enumerate every indexed id.
///
/// Each page asks for ids strictly after the last one seen; the scan ends on
/// the first page shorter than `page_size`. Nothing is fetched until the
/// stream is polled, and the stream cannot be restarted once consumed.
pub fn enumerate_ids<'a>(
    store: &'a dyn VectorStore,
    page_size: usize,
) -> impl Stream<Item = Result<String, VectorStoreError>> + Send + 'a {
    let page_size = page_size.max(1);
    let policy = RetryPolicy::default();
    let start = Cursor {
        after: None,
        done: false,
    };

    stream::try_unfold(start, move |cursor| {
        let policy = policy.clone();
        async move {
            if cursor.done {
                return Ok(None);
            }

            let page = with_retry(&policy, "fetch_id_page", || {
                store.fetch_id_page(cursor.after.as_deref(), page_size)
            })
            .await?;

            tracing::debug!(
                after = cursor.after.as_deref().unwrap_or("<start>"),
                rows = page.len(),
                "fetched id page"
            );

            let next = Cursor {
                after: page.last().cloned().or(cursor.after),
                done: page.len() < page_size,
            };
            let items = stream::iter(page.into_iter().map(Ok::<String, VectorStoreError>));
            Ok::<_, VectorStoreError>(Some((items, next)))
        }
    })
    .try_flatten()
}

/// Drain [`enumerate_ids`] into a set.
pub async fn collect_existing_ids(
    store: &dyn VectorStore,
    page_size: usize,
) -> Result<HashSet<String>, VectorStoreError> {
    let ids: HashSet<String> = enumerate_ids(store, page_size).try_collect().await?;
    tracing::info!(count = ids.len(), "collected indexed ids");
    Ok(ids)
}
