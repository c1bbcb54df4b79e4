//! Lazy row iterator over a user's starred repositories.
//!
//! Pages are fetched on demand, one rate-limiter token per page. The
//! iterator holds exactly one page at a time and never looks ahead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, trace, warn};

use crate::error::{FetchError, ScanError, ScanResult};
use crate::metrics::{record_rate_limiter_wait, record_row_emitted};
use crate::models::StarredRepoEdge;
use crate::ports::{Advance, Cursor, GraphQLTransport, Page, RateLimiter, RowSource, Shutdown};
use crate::schema::{Column, ColumnDef, STARRED_REPOS_COLUMNS, Value, project};
use crate::services::fetch::{FetchOptions, MAX_PAGE_SIZE, fetch_starred_repos};
use crate::services::plan::ScanPlan;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Edges requested per page, `1..=MAX_PAGE_SIZE`.
    pub per_page: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            per_page: MAX_PAGE_SIZE,
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Position of the iterator in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Nothing fetched yet.
    Uninitialized,
    /// A current row is available.
    InPage,
    /// Current page consumed; the remote API reported more pages.
    ExhaustedMoreAvailable,
    /// All pages consumed. Terminal.
    ExhaustedFinal,
    /// A fetch or rate-limit wait failed. Terminal.
    Failed,
}

// =============================================================================
// StarredReposIterator
// =============================================================================

/// Row source for `github_starred_repos`.
///
/// # Flow
///
/// 1. Serve rows from the current page while the position is in bounds
/// 2. On exhaustion, if the page reported more (or none was fetched yet),
///    wait on the rate limiter and fetch the next page after the stored cursor
/// 3. Empty pages that still report more are skipped by fetching again
///    after the last cursor received; an empty page without a cursor may be
///    re-requested once before the scan fails
/// 4. Once a page reports no more, return [`Advance::End`] forever
pub struct StarredReposIterator<T: ?Sized, L: ?Sized> {
    plan: ScanPlan,
    per_page: u32,
    transport: Arc<T>,
    limiter: Arc<L>,
    shutdown: Shutdown,
    page: Option<Page<StarredRepoEdge>>,
    position: Option<usize>,
    /// Last non-empty end cursor seen. Pages without one resume from here.
    cursor: Option<Cursor>,
    /// The previous page was empty, reported more, and had no cursor.
    stalled: bool,
    state: IteratorState,
    pages_fetched: u64,
}

impl<T, L> StarredReposIterator<T, L>
where
    T: GraphQLTransport + ?Sized,
    L: RateLimiter + ?Sized,
{
    pub fn new(
        plan: ScanPlan,
        config: ScanConfig,
        transport: Arc<T>,
        limiter: Arc<L>,
        shutdown: Shutdown,
    ) -> ScanResult<Self> {
        if config.per_page == 0 || config.per_page > MAX_PAGE_SIZE {
            return Err(ScanError::ConfigError(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, config.per_page
            )));
        }

        Ok(Self {
            plan,
            per_page: config.per_page,
            transport,
            limiter,
            shutdown,
            page: None,
            position: None,
            cursor: None,
            stalled: false,
            state: IteratorState::Uninitialized,
            pages_fetched: 0,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// The plan this iterator was built from.
    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Edge under the cursor.
    pub fn current(&self) -> ScanResult<&StarredRepoEdge> {
        if self.state != IteratorState::InPage {
            return Err(ScanError::NoCurrentRow);
        }
        match (&self.page, self.position) {
            (Some(page), Some(position)) => {
                page.edges.get(position).ok_or(ScanError::NoCurrentRow)
            }
            _ => Err(ScanError::NoCurrentRow),
        }
    }

    /// Whether another page must be requested once the current one is
    /// consumed.
    fn has_more_pages(&self) -> bool {
        self.page.as_ref().is_none_or(|page| page.has_next_page)
    }

    /// Wait for a token, then fetch the page after the stored cursor.
    #[instrument(skip(self), fields(login = %self.plan.login, page = self.pages_fetched + 1))]
    async fn fetch_next_page(&mut self) -> ScanResult<Page<StarredRepoEdge>> {
        self.limiter.wait(&mut self.shutdown).await?;
        record_rate_limiter_wait();

        let page = fetch_starred_repos(
            self.transport.as_ref(),
            FetchOptions {
                login: &self.plan.login,
                per_page: self.per_page,
                start_cursor: self.cursor.as_ref(),
                order: self.plan.order,
            },
        )
        .await?;

        self.pages_fetched += 1;
        Ok(page)
    }

    /// Track the resume position after a page arrives.
    fn advance_cursor(&mut self, page: &Page<StarredRepoEdge>) -> ScanResult<()> {
        if let Some(cursor) = &page.end_cursor {
            self.cursor = Some(cursor.clone());
            self.stalled = false;
            return Ok(());
        }
        if !page.has_next_page || !page.is_empty() {
            self.stalled = false;
            return Ok(());
        }

        // Same request again would follow; give up on the second time.
        if self.stalled {
            return Err(FetchError::Decode(
                "hasNextPage without endCursor on consecutive empty pages".into(),
            )
            .into());
        }
        debug!(login = %self.plan.login, "Empty page without cursor, retrying after last cursor");
        self.stalled = true;
        Ok(())
    }

    fn fail(&mut self, err: ScanError) -> ScanError {
        warn!(login = %self.plan.login, error = %err, "Scan failed");
        self.state = IteratorState::Failed;
        self.page = None;
        self.position = None;
        err
    }

    fn emit(&mut self, position: usize) -> Advance {
        self.position = Some(position);
        self.state = IteratorState::InPage;
        record_row_emitted();
        Advance::Row
    }
}

#[async_trait]
impl<T, L> RowSource for StarredReposIterator<T, L>
where
    T: GraphQLTransport + ?Sized,
    L: RateLimiter + ?Sized,
{
    fn schema(&self) -> &'static [ColumnDef] {
        &STARRED_REPOS_COLUMNS
    }

    async fn advance(&mut self) -> ScanResult<Advance> {
        match self.state {
            IteratorState::Failed => return Err(ScanError::Poisoned),
            IteratorState::ExhaustedFinal => return Ok(Advance::End),
            _ => {}
        }

        let next = self.position.map_or(0, |p| p + 1);
        if self.page.as_ref().is_some_and(|page| next < page.len()) {
            return Ok(self.emit(next));
        }

        loop {
            if !self.has_more_pages() {
                debug!(
                    login = %self.plan.login,
                    pages = self.pages_fetched,
                    "Scan exhausted"
                );
                self.state = IteratorState::ExhaustedFinal;
                return Ok(Advance::End);
            }
            if self.page.is_some() {
                self.state = IteratorState::ExhaustedMoreAvailable;
            }

            let page = match self.fetch_next_page().await {
                Ok(page) => page,
                Err(e) => return Err(self.fail(e)),
            };
            if let Err(e) = self.advance_cursor(&page) {
                return Err(self.fail(e));
            }

            let empty = page.is_empty();
            self.page = Some(page);
            self.position = None;

            if !empty {
                return Ok(self.emit(0));
            }
            trace!("Empty page, fetching the next one");
        }
    }

    fn value_at(&self, column: Column) -> ScanResult<Value> {
        Ok(project(&self.plan.login, self.current()?, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::error::{FetchError, FetchResult, LimiterError, LimiterResult};
    use crate::ports::{OrderDirection, StarOrder, StarOrderField};
    use crate::services::limiter::Unlimited;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<FetchResult<serde_json::Value>>>,
        calls: Mutex<Vec<serde_json::Value>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<FetchResult<serde_json::Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<serde_json::Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphQLTransport for ScriptedTransport {
        async fn execute(
            &self,
            _query: &str,
            variables: serde_json::Value,
        ) -> FetchResult<serde_json::Value> {
            self.calls.lock().unwrap().push(variables);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    #[derive(Default)]
    struct CountingLimiter {
        waits: AtomicUsize,
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn wait(&self, _shutdown: &mut Shutdown) -> LimiterResult<()> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct DenyingLimiter;

    #[async_trait]
    impl RateLimiter for DenyingLimiter {
        async fn wait(&self, _shutdown: &mut Shutdown) -> LimiterResult<()> {
            Err(LimiterError::Cancelled)
        }
    }

    fn page(names: &[&str], has_next: bool, cursor: Option<&str>) -> FetchResult<serde_json::Value> {
        let edges: Vec<_> = names
            .iter()
            .map(|name| {
                json!({
                    "starredAt": "2021-05-01T00:00:00Z",
                    "node": {
                        "name": name,
                        "url": format!("https://github.com/x/{name}"),
                        "description": null,
                        "createdAt": "2020-01-01T00:00:00Z",
                        "pushedAt": null,
                        "updatedAt": "2021-01-01T00:00:00Z",
                        "stargazerCount": 1,
                        "nameWithOwner": format!("x/{name}")
                    }
                })
            })
            .collect();
        Ok(json!({
            "user": {
                "login": "octocat",
                "starredRepositories": {
                    "edges": edges,
                    "pageInfo": { "endCursor": cursor, "hasNextPage": has_next }
                }
            }
        }))
    }

    fn iterator<L: RateLimiter + ?Sized>(
        transport: Arc<ScriptedTransport>,
        limiter: Arc<L>,
        order: Option<StarOrder>,
    ) -> StarredReposIterator<ScriptedTransport, L> {
        StarredReposIterator::new(
            ScanPlan::new("octocat", order),
            ScanConfig::default(),
            transport,
            limiter,
            Shutdown::never(),
        )
        .unwrap()
    }

    async fn drain<T, L>(iter: &mut StarredReposIterator<T, L>) -> ScanResult<Vec<String>>
    where
        T: GraphQLTransport + ?Sized,
        L: RateLimiter + ?Sized,
    {
        let mut names = Vec::new();
        while iter.advance().await? == Advance::Row {
            names.push(iter.value_at(Column::Name)?.to_string());
        }
        Ok(names)
    }

    #[test]
    fn test_rejects_out_of_range_page_size() {
        let result = StarredReposIterator::new(
            ScanPlan::new("octocat", None),
            ScanConfig { per_page: 101 },
            ScriptedTransport::new(vec![]),
            Arc::new(Unlimited),
            Shutdown::never(),
        );
        assert!(matches!(result, Err(ScanError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_no_fetch_before_first_advance() {
        let transport = ScriptedTransport::new(vec![]);
        let iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(iter.state(), IteratorState::Uninitialized);
        assert!(matches!(iter.value_at(Column::Name), Err(ScanError::NoCurrentRow)));
        assert!(transport.calls().is_empty());
    }

    // Test critique: le cursor de fin est renvoyé tel quel à la page suivante
    #[tokio::test]
    async fn test_pages_are_chained_by_end_cursor() {
        let transport = ScriptedTransport::new(vec![
            page(&["a", "b"], true, Some("c1")),
            page(&["c"], true, Some("c2")),
            page(&["d"], false, None),
        ]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(drain(&mut iter).await.unwrap(), ["a", "b", "c", "d"]);

        let cursors: Vec<_> = transport
            .calls()
            .iter()
            .map(|v| v["startcursor"].clone())
            .collect();
        assert_eq!(cursors, [json!(null), json!("c1"), json!("c2")]);
        assert_eq!(iter.pages_fetched(), 3);
    }

    // Test critique: un jeton par page, jamais par ligne
    #[tokio::test]
    async fn test_limiter_waited_once_per_page() {
        let transport = ScriptedTransport::new(vec![
            page(&["a", "b", "c"], true, Some("c1")),
            page(&["d", "e"], false, None),
        ]);
        let limiter = Arc::new(CountingLimiter::default());
        let mut iter = iterator(transport, limiter.clone(), None);

        assert_eq!(drain(&mut iter).await.unwrap().len(), 5);
        assert_eq!(limiter.waits.load(Ordering::SeqCst), 2);
    }

    // Test critique: End est terminal, aucun fetch après
    #[tokio::test]
    async fn test_end_is_terminal_and_fetches_nothing() {
        let transport = ScriptedTransport::new(vec![page(&["a"], false, Some("ignored"))]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(iter.advance().await.unwrap(), Advance::Row);
        assert_eq!(iter.advance().await.unwrap(), Advance::End);
        assert_eq!(iter.state(), IteratorState::ExhaustedFinal);
        assert_eq!(iter.advance().await.unwrap(), Advance::End);

        assert_eq!(transport.calls().len(), 1);
        assert!(matches!(iter.value_at(Column::Name), Err(ScanError::NoCurrentRow)));
    }

    #[tokio::test]
    async fn test_empty_pages_with_more_are_skipped() {
        let transport = ScriptedTransport::new(vec![
            page(&["a"], true, Some("c1")),
            page(&[], true, Some("c2")),
            page(&[], true, Some("c3")),
            page(&["b"], false, None),
        ]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(drain(&mut iter).await.unwrap(), ["a", "b"]);
        assert_eq!(transport.calls().len(), 4);
    }

    fn start_cursors(transport: &ScriptedTransport) -> Vec<serde_json::Value> {
        transport
            .calls()
            .iter()
            .map(|v| v["startcursor"].clone())
            .collect()
    }

    // Test critique: une page vide sans cursor ne relance pas le scan depuis le début
    #[tokio::test]
    async fn test_empty_page_without_cursor_resumes_after_last_cursor() {
        let transport = ScriptedTransport::new(vec![
            page(&["a", "b"], true, Some("c1")),
            page(&[], true, None),
            page(&["c", "d"], false, None),
        ]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(drain(&mut iter).await.unwrap(), ["a", "b", "c", "d"]);
        assert_eq!(
            start_cursors(&transport),
            [json!(null), json!("c1"), json!("c1")]
        );
    }

    // Test critique: deux pages vides sans cursor d'affilée échouent au lieu de boucler
    #[tokio::test]
    async fn test_repeated_empty_pages_without_cursor_fail() {
        let transport = ScriptedTransport::new(vec![
            page(&["a"], true, Some("c1")),
            page(&[], true, None),
            page(&[], true, Some("")),
        ]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(iter.advance().await.unwrap(), Advance::Row);
        let err = iter.advance().await.unwrap_err();
        assert!(matches!(err, ScanError::Fetch(FetchError::Decode(ref m)) if m.contains("endCursor")));
        assert_eq!(iter.state(), IteratorState::Failed);
        assert!(matches!(iter.advance().await, Err(ScanError::Poisoned)));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_cursor_after_stall_resets_retry() {
        let transport = ScriptedTransport::new(vec![
            page(&[], true, None),
            page(&[], true, Some("c1")),
            page(&[], true, None),
            page(&["a"], false, None),
        ]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        assert_eq!(drain(&mut iter).await.unwrap(), ["a"]);
        assert_eq!(
            start_cursors(&transport),
            [json!(null), json!(null), json!("c1"), json!("c1")]
        );
    }

    // Test critique: des lignes avec hasNextPage sans cursor font échouer le scan
    #[tokio::test]
    async fn test_rows_without_resume_cursor_fail_scan() {
        let transport = ScriptedTransport::new(vec![page(&["a"], true, None)]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        let err = iter.advance().await.unwrap_err();
        assert!(matches!(err, ScanError::Fetch(FetchError::Decode(_))));
        assert!(matches!(iter.advance().await, Err(ScanError::Poisoned)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_first_page_ends_scan() {
        let transport = ScriptedTransport::new(vec![page(&[], false, None)]);
        let mut iter = iterator(transport, Arc::new(Unlimited), None);

        assert_eq!(iter.advance().await.unwrap(), Advance::End);
    }

    #[tokio::test]
    async fn test_state_transitions_between_pages() {
        let transport = ScriptedTransport::new(vec![
            page(&["a"], true, Some("c1")),
            Err(FetchError::Transport("reset".into())),
        ]);
        let mut iter = iterator(transport, Arc::new(Unlimited), None);

        assert_eq!(iter.advance().await.unwrap(), Advance::Row);
        assert_eq!(iter.state(), IteratorState::InPage);

        assert!(iter.advance().await.is_err());
        assert_eq!(iter.state(), IteratorState::Failed);
    }

    // Test critique: après une erreur, l'itérateur refuse d'avancer sans refetch
    #[tokio::test]
    async fn test_failed_iterator_is_poisoned() {
        let transport = ScriptedTransport::new(vec![Err(FetchError::Unauthorized(
            "bad credentials".into(),
        ))]);
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), None);

        let err = iter.advance().await.unwrap_err();
        assert!(matches!(err, ScanError::Fetch(FetchError::Unauthorized(_))));

        assert!(matches!(iter.advance().await, Err(ScanError::Poisoned)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_limiter_failure_skips_fetch() {
        let transport = ScriptedTransport::new(vec![]);
        let mut iter = iterator(transport.clone(), Arc::new(DenyingLimiter), None);

        let err = iter.advance().await.unwrap_err();
        assert!(matches!(err, ScanError::RateLimit(LimiterError::Cancelled)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_order_sent_on_every_page() {
        let transport = ScriptedTransport::new(vec![
            page(&["a"], true, Some("c1")),
            page(&["b"], false, None),
        ]);
        let order = StarOrder {
            field: StarOrderField::StarredAt,
            direction: OrderDirection::Asc,
        };
        let mut iter = iterator(transport.clone(), Arc::new(Unlimited), Some(order));
        drain(&mut iter).await.unwrap();

        for vars in transport.calls() {
            assert_eq!(vars["orderBy"], json!({ "field": "STARRED_AT", "direction": "ASC" }));
        }
    }

    // Test critique: la projection est idempotente
    #[tokio::test]
    async fn test_projection_is_idempotent() {
        let transport = ScriptedTransport::new(vec![page(&["a"], false, None)]);
        let mut iter = iterator(transport, Arc::new(Unlimited), None);
        iter.advance().await.unwrap();

        for column in Column::ALL {
            assert_eq!(iter.value_at(column).unwrap(), iter.value_at(column).unwrap());
        }
        assert_eq!(iter.value_at_index(0).unwrap(), Value::Text("octocat".into()));
        assert_eq!(iter.value_at_index(5).unwrap(), Value::Null);
        assert!(matches!(iter.value_at_index(42), Err(ScanError::UnknownColumn(42))));
        assert_eq!(iter.row().unwrap().len(), STARRED_REPOS_COLUMNS.len());
    }
}
