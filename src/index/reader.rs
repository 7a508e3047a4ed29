use crate::index::types::{Acl, AclId, DbId, Document};
use crate::schema::{QName, Schema};
use crate::text::AnalyzerRegistry;
use ahash::AHashMap;
use roaring::RoaringTreemap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// One occurrence of a term in a document's field value.
#[derive(Debug, Clone)]
pub struct PostingEntry {
    pub doc: DbId,
    /// Locale of the indexed value (multilingual variants and content
    /// payloads carry one; plain text does not).
    pub locale: Option<String>,
    pub positions: Vec<u32>,
}

/// Postings for one term of one field.
#[derive(Debug, Default)]
pub struct Posting {
    pub docs: RoaringTreemap,
    pub entries: Vec<PostingEntry>,
}

/// Term dictionary + postings for one property field.
#[derive(Debug, Default)]
pub struct FieldPostings {
    terms: AHashMap<String, Posting>,
}

impl FieldPostings {
    pub fn posting(&self, term: &str) -> Option<&Posting> {
        self.terms.get(term)
    }

    /// Iterate the field's term dictionary (for wildcard and fuzzy scans).
    pub fn terms(&self) -> impl Iterator<Item = (&str, &Posting)> {
        self.terms.iter().map(|(t, p)| (t.as_str(), p))
    }

    fn insert(&mut self, term: String, doc: DbId, locale: Option<&str>, position: u32) {
        let posting = self.terms.entry(term).or_default();
        posting.docs.insert(doc);
        match posting.entries.iter_mut().rev().find(|e| {
            e.doc == doc && e.locale.as_deref() == locale
        }) {
            Some(entry) => entry.positions.push(position),
            None => posting.entries.push(PostingEntry {
                doc,
                locale: locale.map(str::to_string),
                positions: vec![position],
            }),
        }
    }
}

/// An immutable point-in-time view of the store, carrying everything the
/// executor needs: the documents themselves, per-field inverted postings,
/// derived path sets, and ancestor tables.
pub struct Snapshot {
    schema: Arc<Schema>,
    analyzers: Arc<AnalyzerRegistry>,
    docs: BTreeMap<DbId, Document>,
    acls: HashMap<AclId, Acl>,
    universe: RoaringTreemap,
    postings: AHashMap<QName, FieldPostings>,
    paths: HashMap<DbId, Vec<Vec<QName>>>,
    ancestors: HashMap<DbId, HashSet<DbId>>,
}

impl Snapshot {
    pub(crate) fn build(
        schema: Arc<Schema>,
        analyzers: Arc<AnalyzerRegistry>,
        docs: BTreeMap<DbId, Document>,
        acls: HashMap<AclId, Acl>,
    ) -> Self {
        let mut universe = RoaringTreemap::new();
        let mut postings: AHashMap<QName, FieldPostings> = AHashMap::new();

        for (&db_id, doc) in &docs {
            universe.insert(db_id);
            for (qname, value) in &doc.properties {
                for (locale, text) in value_streams(value) {
                    let analyzer = analyzers.analyzer_for(locale);
                    let field = postings.entry(qname.clone()).or_default();
                    for token in analyzer.tokens(text) {
                        field.insert(token.text, db_id, locale, token.position);
                    }
                }
            }
        }

        let mut paths = HashMap::new();
        let mut ancestors = HashMap::new();
        for &db_id in docs.keys() {
            let mut visiting = HashSet::new();
            collect_paths(db_id, &docs, &mut paths, &mut visiting);
            let mut visiting = HashSet::new();
            collect_ancestors(db_id, &docs, &mut ancestors, &mut visiting);
        }

        Self {
            schema,
            analyzers,
            docs,
            acls,
            universe,
            postings,
            paths,
            ancestors,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    pub fn doc(&self, db_id: DbId) -> Option<&Document> {
        self.docs.get(&db_id)
    }

    /// All documents in ascending db-id order.
    pub fn docs(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub fn acl(&self, acl_id: AclId) -> Option<&Acl> {
        self.acls.get(&acl_id)
    }

    pub fn acl_of(&self, doc: &Document) -> Option<&Acl> {
        self.acls.get(&doc.acl_id)
    }

    /// The full document universe (complement base for NOT).
    pub fn universe(&self) -> &RoaringTreemap {
        &self.universe
    }

    pub fn postings(&self, field: &QName) -> Option<&FieldPostings> {
        self.postings.get(field)
    }

    /// Every root-to-node qname path of a document, primary and secondary
    /// associations combined. The root's single path is empty.
    pub fn paths(&self, db_id: DbId) -> &[Vec<QName>] {
        self.paths.get(&db_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive parents of a document across all associations.
    pub fn ancestors(&self, db_id: DbId) -> Option<&HashSet<DbId>> {
        self.ancestors.get(&db_id)
    }
}

/// The (locale, text) analysis streams a property value contributes.
fn value_streams(value: &crate::index::types::Value) -> Vec<(Option<&str>, &str)> {
    use crate::index::types::Value;
    match value {
        Value::Text(text) => vec![(None, text.as_str())],
        Value::MlText(variants) => variants
            .iter()
            .map(|(locale, text)| (Some(locale.as_str()), text.as_str()))
            .collect(),
        Value::Content(content) => {
            let locale = if content.locale.is_empty() {
                None
            } else {
                Some(content.locale.as_str())
            };
            vec![(locale, content.text.as_str())]
        }
        _ => Vec::new(),
    }
}

fn collect_paths(
    db_id: DbId,
    docs: &BTreeMap<DbId, Document>,
    memo: &mut HashMap<DbId, Vec<Vec<QName>>>,
    visiting: &mut HashSet<DbId>,
) -> Vec<Vec<QName>> {
    if let Some(found) = memo.get(&db_id) {
        return found.clone();
    }
    if !visiting.insert(db_id) {
        return Vec::new();
    }
    let mut out = Vec::new();
    if let Some(doc) = docs.get(&db_id) {
        if doc.parents.is_empty() {
            out.push(Vec::new());
        } else {
            for assoc in &doc.parents {
                for parent_path in collect_paths(assoc.parent, docs, memo, visiting) {
                    let mut path = parent_path;
                    path.push(assoc.qname.clone());
                    out.push(path);
                }
            }
        }
    }
    visiting.remove(&db_id);
    memo.insert(db_id, out.clone());
    out
}

fn collect_ancestors(
    db_id: DbId,
    docs: &BTreeMap<DbId, Document>,
    memo: &mut HashMap<DbId, HashSet<DbId>>,
    visiting: &mut HashSet<DbId>,
) -> HashSet<DbId> {
    if let Some(found) = memo.get(&db_id) {
        return found.clone();
    }
    if !visiting.insert(db_id) {
        return HashSet::new();
    }
    let mut out = HashSet::new();
    if let Some(doc) = docs.get(&db_id) {
        for assoc in &doc.parents {
            out.insert(assoc.parent);
            out.extend(collect_ancestors(assoc.parent, docs, memo, visiting));
        }
    }
    visiting.remove(&db_id);
    memo.insert(db_id, out.clone());
    out
}
