//! Cursor batch driver: sequential paged processing over an opaque cursor.
//!
//! The driver separates fetching a page from processing its items so jobs
//! only supply the two closures. Pages are strictly sequential; the next
//! fetch is issued only after every item of the current page was processed.

use std::future::Future;

use tracing::debug;

use lattice_core::ontology::{Cursor, Page};
use lattice_core::Result;

/// Totals accumulated by a completed [`for_each_page`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub pages: usize,
    pub items: usize,
}

/// Drive a cursor-paginated fetch to exhaustion.
///
/// `fetch` is called with `None` first, then with each cursor the previous
/// page returned, re-submitted verbatim. The run ends when a page comes back
/// empty or without a cursor. Any error from either closure aborts the run
/// immediately; items already processed are not rolled back.
pub async fn for_each_page<T, FFut, F, PFut, P>(
    mut fetch: F,
    mut process: P,
) -> Result<BatchStats>
where
    F: FnMut(Option<Cursor>) -> FFut,
    FFut: Future<Output = Result<Page<T>>>,
    P: FnMut(T) -> PFut,
    PFut: Future<Output = Result<()>>,
{
    let mut stats = BatchStats::default();
    let mut cursor: Option<Cursor> = None;

    loop {
        let page = fetch(cursor.take()).await?;
        if page.is_empty() {
            break;
        }

        stats.pages += 1;
        let next_cursor = page.cursor.clone();
        for item in page.items {
            process(item).await?;
            stats.items += 1;
        }

        match next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(
        page_count = stats.pages,
        item_count = stats.items,
        "Paged run complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use lattice_core::Error;

    fn page(items: Vec<u32>, cursor: Option<&str>) -> Page<u32> {
        Page {
            items,
            cursor: cursor.map(|c| Cursor(c.to_string())),
        }
    }

    #[tokio::test]
    async fn test_three_pages_processed_in_order() {
        let cursors_seen = Arc::new(Mutex::new(Vec::new()));
        let processed = Arc::new(Mutex::new(Vec::new()));

        let cursors = cursors_seen.clone();
        let items = processed.clone();
        let stats = for_each_page(
            move |cursor| {
                let cursors = cursors.clone();
                async move {
                    cursors.lock().unwrap().push(cursor.clone());
                    Ok(match cursor.as_ref().map(|c| c.0.as_str()) {
                        None => page(vec![1, 2], Some("c1")),
                        Some("c1") => page(vec![3, 4], Some("c2")),
                        Some("c2") => page(vec![5], None),
                        other => panic!("unexpected cursor {other:?}"),
                    })
                }
            },
            move |item| {
                let items = items.clone();
                async move {
                    items.lock().unwrap().push(item);
                    Ok(())
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(stats, BatchStats { pages: 3, items: 5 });
        assert_eq!(*processed.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        let seen = cursors_seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_none());
        assert_eq!(seen[1].as_ref().unwrap().0, "c1");
        assert_eq!(seen[2].as_ref().unwrap().0, "c2");
    }

    #[tokio::test]
    async fn test_empty_first_page_terminates_without_processing() {
        let processed = Arc::new(Mutex::new(Vec::<u32>::new()));
        let items = processed.clone();

        let stats = for_each_page(
            |_cursor| async { Ok(page(vec![], Some("dangling"))) },
            move |item| {
                let items = items.clone();
                async move {
                    items.lock().unwrap().push(item);
                    Ok(())
                }
            },
        )
        .await
        .unwrap();

        // An empty page ends the run even if a cursor came with it.
        assert_eq!(stats, BatchStats::default());
        assert!(processed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_cursor_terminates_after_page() {
        let stats = for_each_page(
            |_cursor| async { Ok(page(vec![9], None)) },
            |_item| async { Ok(()) },
        )
        .await
        .unwrap();
        assert_eq!(stats, BatchStats { pages: 1, items: 1 });
    }

    #[tokio::test]
    async fn test_process_error_aborts_run() {
        let fetches = Arc::new(Mutex::new(0u32));
        let counter = fetches.clone();

        let result = for_each_page(
            move |_cursor| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Ok(page(vec![1, 2, 3], Some("next")))
                }
            },
            |item| async move {
                if item == 2 {
                    Err(Error::Embedding("backend down".into()))
                } else {
                    Ok(())
                }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Embedding(_))));
        assert_eq!(*fetches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let result: Result<BatchStats> = for_each_page(
            |_cursor| async { Err::<Page<u32>, _>(Error::Graph("unavailable".into())) },
            |_item: u32| async { Ok(()) },
        )
        .await;
        assert!(matches!(result, Err(Error::Graph(_))));
    }
}
