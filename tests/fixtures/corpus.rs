//! Shared fixture corpus: a sixteen-document tree with one shared ACL,
//! secondary associations producing multi-path documents, a small
//! type/aspect hierarchy, multilingual text, and ordering properties.
//!
//! Tree (primary associations, by local name; db ids in parentheses):
//!
//! ```text
//! root(1)
//! ├── one(2)    ├── two(3)    ├── three(4)    ├── four(5)
//! │   ├── five(6)             ├── seven(8)
//! │   │   ├── nine(10) ten(11) eleven(12) twelve(13)
//! │   │   │                       └── thirteen(14)
//! │   │   │                           ├── fourteen(15)
//! │   │   │                           └── fifteen(16)
//! │   └── six(7)               └── eight-2(9)
//! ```
//!
//! Secondary associations: eight(9) is also `eight-0` under root and
//! `eight-1` under one; thirteen(14) is `link` under two; fourteen(15) is
//! `common` under twelve and under thirteen; fifteen(16) is `fourteen`
//! under fourteen(15).

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use ftsq::acl::AuthorityFilter;
use ftsq::engine::{SearchEngine, SearchRequest};
use ftsq::index::reader::Snapshot;
use ftsq::index::types::{Acl, ContentValue, Document, FtsStatus, Value};
use ftsq::index::writer::{Store, Transaction};
use ftsq::schema::{DataType, QName, Schema};
use std::sync::Arc;

pub const CM: &str = "http://sample.dev/model/content/1.0";
pub const SYS: &str = "http://sample.dev/model/system/1.0";
pub const TEST: &str = "http://sample.dev/model/test/1.0";
pub const APP: &str = "http://sample.dev/model/application/1.0";
pub const ST: &str = "http://sample.dev/model/site/1.0";

pub const OWNERS: [&str; 16] = [
    "andy", "bob", "cid", "dave", "eoin", "fred", "gail", "hal", "ian", "jake", "kara", "loon",
    "mike", "noodle", "ood", "pat",
];

pub fn cm(local: &str) -> QName {
    QName::new(CM, local)
}

pub fn sys(local: &str) -> QName {
    QName::new(SYS, local)
}

pub fn test(local: &str) -> QName {
    QName::new(TEST, local)
}

pub fn schema() -> Schema {
    Schema::builder()
        .namespace("cm", CM)
        .namespace("sys", SYS)
        .namespace("test", TEST)
        .namespace("app", APP)
        .namespace("st", ST)
        // Properties searched by unscoped terms and TEXT.
        .property_def(cm("content"), DataType::Content, true)
        .property_def(cm("name"), DataType::Text, true)
        .property_def(cm("title"), DataType::MlText, true)
        // Field-scoped properties.
        .property_def(cm("description"), DataType::MlText, false)
        .property_def(cm("created"), DataType::Date, false)
        .property_def(cm("modified"), DataType::Date, false)
        .property_def(test("ml"), DataType::MlText, false)
        .property_def(test("float-ista"), DataType::Float, false)
        .property_def(test("double-ista"), DataType::Double, false)
        .property_def(test("null"), DataType::Text, false)
        .property_def(test("path-ista"), DataType::Text, false)
        .property_def(test("aspect-property"), DataType::Text, false)
        .property_def(test("unset"), DataType::Text, false)
        .property_def(test("order-text"), DataType::Text, false)
        .property_def(test("order-long"), DataType::Long, false)
        .property_def(test("order-int"), DataType::Int, false)
        .property_def(test("order-double"), DataType::Double, false)
        .property_def(test("order-float"), DataType::Float, false)
        // Types.
        .type_def(
            cm("cmobject"),
            None,
            vec![],
            vec![cm("name"), cm("title"), cm("created"), cm("modified")],
        )
        .type_def(cm("folder"), Some(cm("cmobject")), vec![], vec![])
        .type_def(
            cm("content"),
            Some(cm("cmobject")),
            vec![],
            vec![cm("content"), cm("description")],
        )
        .type_def(
            cm("thumbnail"),
            Some(cm("content")),
            vec![cm("derived")],
            vec![test("unset")],
        )
        .type_def(
            test("extended"),
            Some(cm("content")),
            vec![],
            vec![
                test("ml"),
                test("float-ista"),
                test("double-ista"),
                test("null"),
                test("path-ista"),
            ],
        )
        // Aspects.
        .aspect_def(cm("derived"), None, vec![])
        .aspect_def(test("marker"), None, vec![test("aspect-property")])
        .build()
}

fn created(db_id: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::days(100 - db_id as i64)
}

fn order_text(db_id: u64) -> String {
    // doc 16 sorts first ('a'), doc 2 last ('o'); doc 1 has no value.
    char::from(b'a' + (16 - db_id) as u8).to_string()
}

fn with_order_properties(doc: Document) -> Document {
    let db_id = doc.db_id;
    let double = if db_id <= 8 {
        db_id as f64 + 50.0
    } else {
        db_id as f64
    };
    doc.property(test("order-text"), Value::Text(order_text(db_id)))
        .property(test("order-long"), Value::Long(100 - db_id as i64))
        .property(test("order-int"), Value::Int(db_id as i64))
        .property(test("order-double"), Value::Double(double))
        .property(test("order-float"), Value::Float(100.0 - db_id as f64))
        .property(cm("created"), Value::Date(created(db_id)))
}

pub fn corpus() -> Store {
    let store = Store::new(Arc::new(schema()));
    let now = Utc::now();
    let mut txn = Transaction::new();

    txn.put_acl(
        Acl::new(1)
            .reader("GROUP_EVERYONE")
            .reader("pig")
            .deny("something"),
    );

    let folder = |db_id: u64| {
        with_order_properties(Document::new(db_id, cm("folder")).acl(1)).owner(OWNERS[db_id as usize - 1])
    };

    // 1: root
    txn.index(Document::new(1, cm("folder")).acl(1).owner(OWNERS[0]));
    // 2-5: children of root through sys:children
    txn.index(folder(2).child_of(1, sys("children"), cm("one")));
    txn.index(folder(3).child_of(1, sys("children"), cm("two")));
    txn.index(folder(4).child_of(1, sys("children"), cm("three")));
    txn.index(folder(5).child_of(1, sys("children"), cm("four")));
    // 6-8: second level
    txn.index(folder(6).child_of(2, cm("contains"), cm("five")));
    txn.index(folder(7).child_of(2, cm("contains"), cm("six")));
    txn.index(folder(8).child_of(3, cm("contains"), cm("seven")));
    // 9: three parents
    txn.index(
        folder(9)
            .child_of(3, cm("contains"), cm("eight-2"))
            .secondary_child_of(1, sys("children"), cm("eight-0"))
            .secondary_child_of(2, cm("contains"), cm("eight-1")),
    );
    // 10-13: children of five
    txn.index(folder(10).child_of(6, cm("contains"), cm("nine")));
    txn.index(folder(11).child_of(6, cm("contains"), cm("ten")));
    txn.index(folder(12).child_of(6, cm("contains"), cm("eleven")));
    txn.index(folder(13).child_of(6, cm("contains"), cm("twelve")));
    // 14: thirteen, also linked under two
    txn.index(
        folder(14)
            .child_of(13, cm("contains"), cm("thirteen"))
            .secondary_child_of(3, cm("contains"), cm("link")),
    );
    // 15: fourteen, the content document
    txn.index(
        with_order_properties(Document::new(15, test("extended")).acl(1))
            .owner(OWNERS[14])
            .child_of(14, cm("contains"), cm("fourteen"))
            .secondary_child_of(13, cm("contains"), cm("common"))
            .secondary_child_of(14, cm("contains"), cm("common"))
            .aspect(test("marker"))
            .property(
                cm("content"),
                Value::Content(ContentValue {
                    text: "The quick brown fox jumped over the lazy dog".into(),
                    mimetype: "text/plain".into(),
                    size: 298,
                    locale: "en_GB".into(),
                    encoding: "UTF-8".into(),
                }),
            )
            .property(cm("name"), Value::Text("fox".into()))
            .property(cm("title"), Value::MlText(vec![("en".into(), "àêîðñöûÿ".into())]))
            .property(
                test("ml"),
                Value::MlText(vec![
                    ("en".into(), "banana".into()),
                    ("fr".into(), "banane".into()),
                    ("de".into(), "banane".into()),
                    ("es".into(), "plátano".into()),
                    ("nl".into(), "banaan".into()),
                    ("it".into(), "banana".into()),
                    ("pt".into(), "banana".into()),
                    ("ru".into(), "банан".into()),
                    ("zh".into(), "香蕉".into()),
                    ("el".into(), "μπανάνα".into()),
                    ("ko".into(), "바나나".into()),
                ]),
            )
            .property(test("float-ista"), Value::Float(3.40))
            .property(test("double-ista"), Value::Double(5.6))
            .property(test("null"), Value::Null)
            .property(test("path-ista"), Value::Text("lemur".into()))
            .property(test("aspect-property"), Value::Text("milkshake".into()))
            .property(cm("modified"), Value::Date(now))
            .status(FtsStatus::New),
    );
    // 16: fifteen, the thumbnail
    txn.index(
        with_order_properties(Document::new(16, cm("thumbnail")).acl(1))
            .owner(OWNERS[15])
            .child_of(14, cm("contains"), cm("fifteen"))
            .secondary_child_of(15, cm("contains"), cm("fourteen"))
            .property(cm("name"), Value::Text("pivot point".into()))
            .property(
                cm("description"),
                Value::MlText(vec![("en".into(), "quickstart tutorial".into())]),
            )
            .property(cm("modified"), Value::Date(now))
            .status(FtsStatus::New),
    );

    store.commit(txn);
    store
}

/// One fixture corpus plus the machinery the assertions drive.
pub struct Fixture {
    pub store: Store,
    pub snapshot: Arc<Snapshot>,
    pub engine: SearchEngine,
}

impl Fixture {
    pub fn new() -> Self {
        let store = corpus();
        let snapshot = store.snapshot();
        Self {
            store,
            snapshot,
            engine: SearchEngine::new(),
        }
    }

    pub fn count(&self, query: &str) -> u64 {
        self.engine
            .search(&self.snapshot, &SearchRequest::new(query))
            .unwrap_or_else(|err| panic!("query {query:?} failed: {err}"))
            .total
    }

    pub fn count_locale(&self, query: &str, locale: &str) -> u64 {
        self.engine
            .search(&self.snapshot, &SearchRequest::new(query).locale(locale))
            .unwrap_or_else(|err| panic!("query {query:?} ({locale}) failed: {err}"))
            .total
    }

    pub fn count_filtered(&self, query: &str, filter: AuthorityFilter) -> u64 {
        self.engine
            .search(&self.snapshot, &SearchRequest::new(query).filter(filter))
            .unwrap_or_else(|err| panic!("query {query:?} failed: {err}"))
            .total
    }

    pub fn sorted(&self, query: &str, sort: &str) -> Vec<u64> {
        self.engine
            .search(&self.snapshot, &SearchRequest::new(query).sort(sort))
            .unwrap_or_else(|err| panic!("query {query:?} sort {sort:?} failed: {err}"))
            .db_ids
    }
}
