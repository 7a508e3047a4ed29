use crate::index::reader::Snapshot;
use crate::index::types::{Acl, AclId, DbId, Document, TxId};
use crate::schema::Schema;
use crate::text::AnalyzerRegistry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// The shared, append-mostly document store.
///
/// Mutation happens through atomic transaction commits; readers obtain an
/// immutable [`Snapshot`] handle and never observe a partial commit. The
/// snapshot is rebuilt lazily after a commit and shared until the next one.
pub struct Store {
    schema: Arc<Schema>,
    analyzers: Arc<AnalyzerRegistry>,
    inner: RwLock<Inner>,
}

struct Inner {
    docs: BTreeMap<DbId, Document>,
    acls: HashMap<AclId, Acl>,
    next_tx: TxId,
    cached: Option<Arc<Snapshot>>,
}

impl Store {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_analyzers(schema, Arc::new(AnalyzerRegistry::default()))
    }

    pub fn with_analyzers(schema: Arc<Schema>, analyzers: Arc<AnalyzerRegistry>) -> Self {
        Self {
            schema,
            analyzers,
            inner: RwLock::new(Inner {
                docs: BTreeMap::new(),
                acls: HashMap::new(),
                next_tx: 1,
                cached: None,
            }),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Commit a batch of document/ACL writes atomically, stamping every
    /// document with the new transaction id. A document re-indexed here
    /// supersedes its previous version in all later snapshots.
    pub fn commit(&self, txn: Transaction) -> TxId {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let tx_id = inner.next_tx;
        inner.next_tx += 1;

        for mut acl in txn.acls {
            acl.acl_tx_id = tx_id;
            inner.acls.insert(acl.acl_id, acl);
        }
        for mut doc in txn.docs {
            doc.tx_id = tx_id;
            inner.docs.insert(doc.db_id, doc);
        }
        inner.cached = None;
        tx_id
    }

    /// A point-in-time snapshot of the committed state. Cheap once built;
    /// invalidated by the next commit.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if let Some(snapshot) = &inner.cached {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(Snapshot::build(
            Arc::clone(&self.schema),
            Arc::clone(&self.analyzers),
            inner.docs.clone(),
            inner.acls.clone(),
        ));
        inner.cached = Some(Arc::clone(&snapshot));
        snapshot
    }
}

/// A batch of writes applied atomically by [`Store::commit`].
#[derive(Default)]
pub struct Transaction {
    docs: Vec<Document>,
    acls: Vec<Acl>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&mut self, doc: Document) -> &mut Self {
        self.docs.push(doc);
        self
    }

    pub fn put_acl(&mut self, acl: Acl) -> &mut Self {
        self.acls.push(acl);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty() && self.acls.is_empty()
    }
}
