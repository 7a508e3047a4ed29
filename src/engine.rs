//! The end-to-end search pipeline: parse → compile → evaluate →
//! access-control filter → sort → paginate.

use crate::acl::AuthorityFilter;
use crate::error::SearchError;
use crate::index::reader::Snapshot;
use crate::index::types::DbId;
use crate::query::executor::{EvalContext, compile_sort, evaluate, sort_ids};
use crate::query::parser::parse_query;
use crate::query::planner::{Predicate, compile};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

const QUERY_CACHE_SIZE: usize = 256;

/// A search request against one snapshot.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Full query-language text.
    pub query: String,
    /// Pagination offset into the ordered result list.
    pub start: usize,
    /// Cap on the number of returned ids; the reported total is exact
    /// regardless.
    pub rows: usize,
    /// `field direction[, field direction]*` ordering; db-id order when
    /// absent.
    pub sort: Option<String>,
    /// Locale driving tokenization and multilingual matching.
    pub locale: Option<String>,
    /// Access-control filter; absent means unfiltered (system queries).
    pub filter: Option<AuthorityFilter>,
    /// Per-request execution deadline.
    pub timeout: Option<Duration>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            start: 0,
            rows: 100,
            sort: None,
            locale: None,
            filter: None,
            timeout: None,
        }
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn filter(mut self, filter: AuthorityFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Ordered result ids plus the exact pre-pagination count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub db_ids: Vec<DbId>,
    pub total: u64,
}

/// Stateless-per-request search engine with a compiled-query cache.
pub struct SearchEngine {
    cache: Mutex<LruCache<String, Arc<Predicate>>>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).unwrap(),
            )),
        }
    }

    pub fn search(
        &self,
        snapshot: &Snapshot,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let mut ctx = EvalContext::new(request.locale.clone());
        if let Some(timeout) = request.timeout {
            ctx = ctx.with_deadline(Instant::now() + timeout);
        }

        let predicate = self.compiled(snapshot, &request.query, ctx.now)?;
        let mut matched = evaluate(snapshot, &predicate, &ctx)?;

        if let Some(filter) = &request.filter {
            matched = filter.apply(snapshot, &matched);
        }
        let total = matched.len();

        let ordered: Vec<DbId> = match &request.sort {
            Some(spec) => {
                let keys = compile_sort(snapshot.schema(), spec)?;
                sort_ids(snapshot, &matched, &keys)
            }
            None => matched.iter().collect(),
        };

        let db_ids: Vec<DbId> = ordered
            .into_iter()
            .skip(request.start)
            .take(request.rows)
            .collect();

        debug!(
            query = %request.query,
            total,
            returned = db_ids.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query executed"
        );
        Ok(SearchResponse { db_ids, total })
    }

    fn compiled(
        &self,
        snapshot: &Snapshot,
        query: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Arc<Predicate>, SearchError> {
        // NOW-relative date bounds bind at compile time, so those queries
        // bypass the cache.
        let cacheable = !query.contains("NOW");
        if cacheable {
            if let Some(hit) = self.cache.lock().expect("cache poisoned").get(query) {
                return Ok(Arc::clone(hit));
            }
        }
        let ast = parse_query(query)?;
        let predicate = Arc::new(compile(&ast, snapshot.schema(), now)?);
        if cacheable {
            self.cache
                .lock()
                .expect("cache poisoned")
                .put(query.to_string(), Arc::clone(&predicate));
        }
        Ok(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::{Acl, Document, Value};
    use crate::index::writer::{Store, Transaction};
    use crate::schema::{DataType, QName, Schema};

    const CM: &str = "http://sample.dev/model/content/1.0";

    fn qn(local: &str) -> QName {
        QName::new(CM, local)
    }

    fn store() -> Store {
        let schema = Schema::builder()
            .namespace("cm", CM)
            .property_def(qn("name"), DataType::Text, true)
            .type_def(qn("folder"), None, vec![], vec![])
            .build();
        let store = Store::new(Arc::new(schema));
        let mut txn = Transaction::new();
        txn.put_acl(Acl::new(1).reader("GROUP_EVERYONE"));
        for (db_id, name) in [(1, "alpha"), (2, "beta"), (3, "alpha beta")] {
            txn.index(
                Document::new(db_id, qn("folder"))
                    .acl(1)
                    .owner("andy")
                    .property(qn("name"), Value::Text(name.into())),
            );
        }
        store.commit(txn);
        store
    }

    #[test]
    fn test_search_counts_and_pagination() {
        let store = store();
        let snapshot = store.snapshot();
        let engine = SearchEngine::new();

        let response = engine
            .search(&snapshot, &SearchRequest::new("alpha"))
            .unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.db_ids, vec![1, 3]);

        let response = engine
            .search(&snapshot, &SearchRequest::new("alpha").rows(1))
            .unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.db_ids, vec![1]);

        let response = engine
            .search(&snapshot, &SearchRequest::new("alpha").rows(1).start(1))
            .unwrap();
        assert_eq!(response.db_ids, vec![3]);
    }

    #[test]
    fn test_search_with_filter() {
        let store = store();
        let snapshot = store.snapshot();
        let engine = SearchEngine::new();

        let request = SearchRequest::new("alpha")
            .filter(AuthorityFilter::for_authorities(["nobody"]));
        let response = engine.search(&snapshot, &request).unwrap();
        assert_eq!(response.total, 0);

        let request = SearchRequest::new("alpha")
            .filter(AuthorityFilter::for_authorities(["andy"]));
        let response = engine.search(&snapshot, &request).unwrap();
        assert_eq!(response.total, 2);
    }

    #[test]
    fn test_parse_error_surfaces() {
        let store = store();
        let snapshot = store.snapshot();
        let engine = SearchEngine::new();
        let result = engine.search(&snapshot, &SearchRequest::new("\"unterminated"));
        assert!(matches!(result, Err(SearchError::Parse(_))));
    }

    #[test]
    fn test_query_cache_reuse() {
        let store = store();
        let snapshot = store.snapshot();
        let engine = SearchEngine::new();
        for _ in 0..3 {
            let response = engine
                .search(&snapshot, &SearchRequest::new("alpha beta"))
                .unwrap();
            assert_eq!(response.total, 1);
        }
    }
}
