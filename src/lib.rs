//! # ftsq - Structured Full-Text Query Engine
//!
//! ftsq compiles a structured full-text query language into predicate
//! trees over an inverted document index, with schema-aware field
//! resolution and authority-based access-control filtering.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`schema`] - Qualified names, namespaces, and the data dictionary
//! - [`text`] - Tokenizer/analyzer adapter and fuzzy matching
//! - [`index`] - Document model, transactional store, and snapshots
//! - [`query`] - Query parsing, planning, and execution
//! - [`acl`] - Access-control filtering (JSON + legacy adapters)
//! - [`engine`] - End-to-end search pipeline with a compiled-query cache
//! - [`corpus`] - JSON corpus descriptions for the CLI
//! - [`output`] - Result formatting
//!
//! ## Quick Start
//!
//! ```
//! use ftsq::engine::{SearchEngine, SearchRequest};
//! use ftsq::index::{Acl, Document, Store, Transaction, Value};
//! use ftsq::schema::{DataType, QName, Schema};
//! use std::sync::Arc;
//!
//! let ns = "http://sample.dev/model/content/1.0";
//! let schema = Arc::new(
//!     Schema::builder()
//!         .namespace("cm", ns)
//!         .property_def(QName::new(ns, "name"), DataType::Text, true)
//!         .type_def(QName::new(ns, "folder"), None, vec![], vec![])
//!         .build(),
//! );
//!
//! let store = Store::new(schema);
//! let mut txn = Transaction::new();
//! txn.put_acl(Acl::new(1).reader("GROUP_EVERYONE"));
//! txn.index(
//!     Document::new(1, QName::new(ns, "folder"))
//!         .acl(1)
//!         .property(QName::new(ns, "name"), Value::Text("quick start".into())),
//! );
//! store.commit(txn);
//!
//! let snapshot = store.snapshot();
//! let engine = SearchEngine::new();
//! let response = engine.search(&snapshot, &SearchRequest::new("quick")).unwrap();
//! assert_eq!(response.db_ids, vec![1]);
//! ```
//!
//! ## Pipeline
//!
//! Query text flows through four stages, each a pure function over the
//! snapshot handle passed in:
//!
//! 1. **Parser** - query string to AST
//! 2. **Planner** - AST to predicate tree, resolved against the schema
//! 3. **Evaluator** - predicate tree to a document id set
//! 4. **Access-control filter** - authority-aware narrowing of the set

pub mod acl;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod schema;
pub mod text;
