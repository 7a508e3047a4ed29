//! Access-control filtering.
//!
//! One canonical representation ([`AuthorityFilter`]) and one allow/deny
//! algorithm, fed by two surface adapters: the structured JSON document
//! and the legacy pipe-separated filter-query string.

use crate::error::SearchError;
use crate::index::reader::Snapshot;
use crate::index::types::{Acl, Document};
use rayon::prelude::*;
use roaring::RoaringTreemap;
use serde::Deserialize;

/// The pseudo-authority granting world read where an ACL lists it.
pub const GROUP_EVERYONE: &str = "GROUP_EVERYONE";

/// One access clause. `Authority` is the grant test (reader-or-owner,
/// vetoed by a deny of the same authority); the category clauses are
/// plain membership tests used by the legacy surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessClause {
    Authority(String),
    Reader(String),
    Owner(String),
    Denied(String),
}

/// Canonical access-control request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityFilter {
    pub clauses: Vec<AccessClause>,
    pub tenants: Vec<String>,
    pub any_deny_denies: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonFilter {
    authorities: Vec<String>,
    #[serde(default)]
    tenants: Vec<String>,
    #[serde(default = "default_any_deny_denies")]
    any_deny_denies: bool,
}

fn default_any_deny_denies() -> bool {
    true
}

impl AuthorityFilter {
    pub fn for_authorities<I, S>(authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clauses: authorities
                .into_iter()
                .map(|a| AccessClause::Authority(a.into()))
                .collect(),
            tenants: Vec::new(),
            any_deny_denies: true,
        }
    }

    /// Structured adapter: `{"authorities": […], "tenants": […],
    /// "anyDenyDenies": bool}`.
    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let parsed: JsonFilter =
            serde_json::from_str(json).map_err(|err| SearchError::Filter(err.to_string()))?;
        Ok(Self {
            clauses: parsed
                .authorities
                .into_iter()
                .map(AccessClause::Authority)
                .collect(),
            tenants: parsed.tenants,
            any_deny_denies: parsed.any_deny_denies,
        })
    }

    /// Legacy adapter: `|AUTHORITY:andy |AUTHORITY:bob`, with `READER:` /
    /// `OWNER:` / `DENIED:` category clauses and the colon-packed
    /// `AUTHSET:` / `DENYSET:` forms. An optional `{!name}` handler prefix
    /// is ignored. The legacy surface has no deny-policy switch; it
    /// behaves as `anyDenyDenies:false`.
    pub fn from_legacy(filter: &str) -> Result<Self, SearchError> {
        let mut clauses = Vec::new();
        let trimmed = filter.trim();
        let body = match trimmed.strip_prefix("{!") {
            Some(rest) => rest.split_once('}').map(|(_, tail)| tail).unwrap_or(trimmed),
            None => trimmed,
        }
        .trim();
        for raw in body.split_whitespace() {
            let clause = raw.strip_prefix('|').unwrap_or(raw);
            let (name, value) = clause
                .split_once(':')
                .ok_or_else(|| SearchError::Filter(format!("malformed clause: {raw}")))?;
            let value = value.trim_matches('"');
            match name {
                "AUTHORITY" => clauses.push(AccessClause::Authority(value.to_string())),
                "READER" => clauses.push(AccessClause::Reader(value.to_string())),
                "OWNER" => clauses.push(AccessClause::Owner(value.to_string())),
                "DENIED" => clauses.push(AccessClause::Denied(value.to_string())),
                "AUTHSET" => {
                    for authority in value.split(':').filter(|a| !a.is_empty()) {
                        clauses.push(AccessClause::Authority(authority.to_string()));
                    }
                }
                "DENYSET" => {
                    for authority in value.split(':').filter(|a| !a.is_empty()) {
                        clauses.push(AccessClause::Denied(authority.to_string()));
                    }
                }
                other => {
                    return Err(SearchError::Filter(format!(
                        "unknown filter clause: {other}"
                    )));
                }
            }
        }
        if clauses.is_empty() {
            return Err(SearchError::Filter("empty authority filter".to_string()));
        }
        Ok(Self {
            clauses,
            tenants: Vec::new(),
            any_deny_denies: false,
        })
    }

    /// The allow/deny decision for one document.
    ///
    /// A document is visible when its tenant is requested (an empty tenant
    /// set means no restriction), at least one clause grants access, and
    /// the deny policy passes: with `any_deny_denies` a single denied
    /// authority among the requested ones hides the document; without it a
    /// grant stands unless the granting authority is itself denied.
    pub fn allows(&self, doc: &Document, acl: Option<&Acl>) -> bool {
        if !self.tenants.is_empty() && !self.tenants.iter().any(|t| *t == doc.tenant) {
            return false;
        }

        if self.any_deny_denies {
            let any_denied = self.clauses.iter().any(|clause| match clause {
                AccessClause::Authority(a) => {
                    acl.is_some_and(|acl| acl.denied.contains(a))
                }
                _ => false,
            });
            if any_denied {
                return false;
            }
        }

        self.clauses.iter().any(|clause| match clause {
            AccessClause::Authority(a) => {
                if acl.is_some_and(|acl| acl.denied.contains(a)) {
                    return false;
                }
                doc.owner.as_deref() == Some(a.as_str())
                    || acl.is_some_and(|acl| acl.readers.contains(a))
            }
            AccessClause::Reader(a) => acl.is_some_and(|acl| acl.readers.contains(a)),
            AccessClause::Owner(a) => doc.owner.as_deref() == Some(a.as_str()),
            AccessClause::Denied(a) => acl.is_some_and(|acl| acl.denied.contains(a)),
        })
    }

    /// Filter a result set. Pure per-document decision, applied in
    /// parallel.
    pub fn apply(&self, snapshot: &Snapshot, results: &RoaringTreemap) -> RoaringTreemap {
        results
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter(|&db_id| {
                snapshot
                    .doc(db_id)
                    .is_some_and(|doc| self.allows(doc, snapshot.acl_of(doc)))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}
