use crate::schema::QName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Unique identifier for an indexed document (monotonic per store).
pub type DbId = u64;

/// Identifier of an access control list shared by many documents.
pub type AclId = u64;

/// Identifier of a commit transaction.
pub type TxId = u64;

/// Full-text indexing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FtsStatus {
    New,
    #[default]
    Clean,
    Dirty,
}

impl FtsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FtsStatus::New => "New",
            FtsStatus::Clean => "Clean",
            FtsStatus::Dirty => "Dirty",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "New" => Some(FtsStatus::New),
            "Clean" => Some(FtsStatus::Clean),
            "Dirty" => Some(FtsStatus::Dirty),
            _ => None,
        }
    }
}

/// An indexed content payload: extracted text plus content metadata
/// reachable through `.mimetype` / `.size` / `.locale` / `.encoding`
/// sub-selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentValue {
    pub text: String,
    pub mimetype: String,
    pub size: u64,
    pub locale: String,
    #[serde(default)]
    pub encoding: String,
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Text(String),
    /// Multilingual text: (locale, text) variants.
    MlText(Vec<(String, String)>),
    Content(ContentValue),
    Long(i64),
    Int(i64),
    Double(f64),
    Float(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    /// A property explicitly stored with no value (distinct from absent).
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One parent association of a document. A document has exactly one
/// primary association and any number of secondary ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildAssoc {
    pub parent: DbId,
    pub assoc_type: QName,
    pub qname: QName,
    pub primary: bool,
}

/// One indexed document. Immutable once committed; re-indexing the same
/// db id in a later transaction supersedes the earlier version.
#[derive(Debug, Clone)]
pub struct Document {
    pub db_id: DbId,
    pub acl_id: AclId,
    pub tx_id: TxId,
    pub type_name: QName,
    pub aspects: Vec<QName>,
    pub properties: HashMap<QName, Value>,
    pub parents: Vec<ChildAssoc>,
    pub owner: Option<String>,
    pub tenant: String,
    pub fts_status: FtsStatus,
}

impl Document {
    pub fn new(db_id: DbId, type_name: QName) -> Self {
        Self {
            db_id,
            acl_id: 0,
            tx_id: 0,
            type_name,
            aspects: Vec::new(),
            properties: HashMap::new(),
            parents: Vec::new(),
            owner: None,
            tenant: String::new(),
            fts_status: FtsStatus::default(),
        }
    }

    pub fn acl(mut self, acl_id: AclId) -> Self {
        self.acl_id = acl_id;
        self
    }

    pub fn aspect(mut self, aspect: QName) -> Self {
        self.aspects.push(aspect);
        self
    }

    pub fn property(mut self, qname: QName, value: Value) -> Self {
        self.properties.insert(qname, value);
        self
    }

    /// Add a parent association; the first one added is the primary.
    pub fn child_of(mut self, parent: DbId, assoc_type: QName, qname: QName) -> Self {
        let primary = self.parents.is_empty();
        self.parents.push(ChildAssoc {
            parent,
            assoc_type,
            qname,
            primary,
        });
        self
    }

    pub fn secondary_child_of(mut self, parent: DbId, assoc_type: QName, qname: QName) -> Self {
        self.parents.push(ChildAssoc {
            parent,
            assoc_type,
            qname,
            primary: false,
        });
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn status(mut self, status: FtsStatus) -> Self {
        self.fts_status = status;
        self
    }

    pub fn primary_parent(&self) -> Option<&ChildAssoc> {
        self.parents.iter().find(|a| a.primary)
    }
}

/// An access control list: reader and denied authority sets versioned by
/// an ACL transaction id. Ownership is per document.
#[derive(Debug, Clone)]
pub struct Acl {
    pub acl_id: AclId,
    pub acl_tx_id: TxId,
    pub readers: HashSet<String>,
    pub denied: HashSet<String>,
}

impl Acl {
    pub fn new(acl_id: AclId) -> Self {
        Self {
            acl_id,
            acl_tx_id: 0,
            readers: HashSet::new(),
            denied: HashSet::new(),
        }
    }

    pub fn reader(mut self, authority: impl Into<String>) -> Self {
        self.readers.insert(authority.into());
        self
    }

    pub fn deny(mut self, authority: impl Into<String>) -> Self {
        self.denied.insert(authority.into());
        self
    }
}
