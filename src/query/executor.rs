use crate::error::{CompileError, EvalError};
use crate::index::reader::{FieldPostings, Snapshot};
use crate::index::types::{DbId, Document, Value};
use crate::query::parser::ContentAttr;
use crate::query::planner::{Predicate, PropState, TypedBound};
use crate::schema::{DataType, QName, Schema};
use crate::text::{fold_lower, language_of};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use roaring::RoaringTreemap;
use std::collections::HashMap;
use std::time::Instant;

/// Per-request evaluation context: the clock, the query locale, and an
/// optional hard deadline. Exceeding the deadline aborts the query with an
/// error; partial results are never returned.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub now: DateTime<Utc>,
    pub locale: Option<String>,
    pub deadline: Option<Instant>,
}

impl EvalContext {
    pub fn new(locale: Option<String>) -> Self {
        Self {
            now: Utc::now(),
            locale,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check_deadline(&self) -> Result<(), EvalError> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(EvalError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Evaluate a compiled predicate against a snapshot, producing the set of
/// matching document ids.
pub fn evaluate(
    snapshot: &Snapshot,
    predicate: &Predicate,
    ctx: &EvalContext,
) -> Result<RoaringTreemap, EvalError> {
    ctx.check_deadline()?;
    match predicate {
        Predicate::Nothing => Ok(RoaringTreemap::new()),
        Predicate::Everything => Ok(snapshot.universe().clone()),

        Predicate::Term { prop, text, exact } => {
            let terms: Vec<String> = if *exact {
                vec![fold_lower(text)]
            } else {
                snapshot
                    .analyzers()
                    .analyzer_for(ctx.locale.as_deref())
                    .tokens(text)
                    .into_iter()
                    .map(|t| t.text)
                    .collect()
            };
            match terms.len() {
                0 => Ok(RoaringTreemap::new()),
                1 => Ok(docs_for_slot(snapshot, prop, &terms[0], ctx)?),
                // A multi-word value behaves as an exact phrase.
                _ => phrase_docs(snapshot, prop, &terms, 0, ctx),
            }
        }

        Predicate::Wildcard { prop, pattern } => {
            Ok(docs_for_slot(snapshot, prop, &fold_lower(pattern), ctx)?)
        }

        Predicate::Fuzzy { prop, text, budget } => {
            let query = fold_lower(text);
            let Some(postings) = snapshot.postings(prop) else {
                return Ok(RoaringTreemap::new());
            };
            let is_ml = is_mltext(snapshot.schema(), prop);
            let mut out = RoaringTreemap::new();
            for (term, posting) in postings.terms() {
                if budget.accepts(&query, term) {
                    collect_docs(posting, is_ml, ctx, &mut out);
                }
            }
            Ok(out)
        }

        Predicate::Phrase { prop, text, slop } => {
            let slots: Vec<String> = text.split_whitespace().map(fold_lower).collect();
            if slots.is_empty() {
                return Ok(RoaringTreemap::new());
            }
            if slots.len() == 1 {
                return docs_for_slot(snapshot, prop, &slots[0], ctx);
            }
            phrase_docs(snapshot, prop, &slots, *slop, ctx)
        }

        Predicate::Span {
            prop,
            left,
            right,
            gap,
        } => span_docs(snapshot, prop, &fold_lower(left), &fold_lower(right), *gap, ctx),

        Predicate::Range {
            prop,
            data_type,
            lower,
            upper,
            lower_incl,
            upper_incl,
        } => {
            ctx.check_deadline()?;
            let mut out = RoaringTreemap::new();
            for doc in snapshot.docs() {
                if let Some(value) = doc.properties.get(prop) {
                    if value_in_range(value, *data_type, lower, upper, *lower_incl, *upper_incl) {
                        out.insert(doc.db_id);
                    }
                }
            }
            Ok(out)
        }

        Predicate::PathMatch(pattern) => {
            ctx.check_deadline()?;
            let mut out = RoaringTreemap::new();
            for doc in snapshot.docs() {
                if snapshot.paths(doc.db_id).iter().any(|p| pattern.matches(p)) {
                    out.insert(doc.db_id);
                }
            }
            Ok(out)
        }

        Predicate::TypeIn(types) => Ok(filter_docs(snapshot, |doc| {
            types.contains(&doc.type_name)
        })),
        Predicate::TypeExact(type_name) => Ok(filter_docs(snapshot, |doc| {
            doc.type_name == *type_name
        })),

        Predicate::AspectIn(aspects) => Ok(filter_docs(snapshot, |doc| {
            doc.aspects.iter().any(|a| aspects.contains(a))
                || snapshot
                    .schema()
                    .aspects_implied_by_type(&doc.type_name)
                    .iter()
                    .any(|a| aspects.contains(a))
        })),
        Predicate::AspectExact(aspect) => Ok(filter_docs(snapshot, |doc| {
            doc.aspects.contains(aspect)
        })),

        Predicate::AssocQName {
            pattern,
            primary_only,
        } => Ok(filter_docs(snapshot, |doc| {
            doc.parents
                .iter()
                .filter(|a| !primary_only || a.primary)
                .any(|a| pattern.matches(&a.qname))
        })),
        Predicate::AssocTypeQName {
            pattern,
            primary_only,
        } => Ok(filter_docs(snapshot, |doc| {
            doc.parents
                .iter()
                .filter(|a| !primary_only || a.primary)
                .any(|a| pattern.matches(&a.assoc_type))
        })),

        Predicate::ParentIs(parent) => Ok(filter_docs(snapshot, |doc| {
            doc.parents.iter().any(|a| a.parent == *parent)
        })),
        Predicate::PrimaryParentIs(parent) => Ok(filter_docs(snapshot, |doc| {
            doc.primary_parent().is_some_and(|a| a.parent == *parent)
        })),
        Predicate::AncestorIs(ancestor) => Ok(filter_docs(snapshot, |doc| {
            snapshot
                .ancestors(doc.db_id)
                .is_some_and(|set| set.contains(ancestor))
        })),

        Predicate::IsNode(wanted) => {
            if *wanted {
                Ok(snapshot.universe().clone())
            } else {
                Ok(RoaringTreemap::new())
            }
        }
        Predicate::DbIdIs(db_id) => {
            let mut out = RoaringTreemap::new();
            if snapshot.universe().contains(*db_id) {
                out.insert(*db_id);
            }
            Ok(out)
        }
        Predicate::TxIdIs(tx_id) => Ok(filter_docs(snapshot, |doc| doc.tx_id == *tx_id)),
        Predicate::AclIdIs(acl_id) => Ok(filter_docs(snapshot, |doc| doc.acl_id == *acl_id)),
        Predicate::AclTxIdIs(acl_tx) => Ok(filter_docs(snapshot, |doc| {
            snapshot.acl_of(doc).is_some_and(|acl| acl.acl_tx_id == *acl_tx)
        })),
        Predicate::FtsStatusIs(status) => Ok(filter_docs(snapshot, |doc| {
            doc.fts_status.as_str() == status
        })),

        Predicate::PropState { prop, state } => Ok(filter_docs(snapshot, |doc| {
            let stored = doc.properties.get(prop);
            match state {
                PropState::Exists => stored.is_some(),
                PropState::Null => stored.is_some_and(Value::is_null),
                PropState::NotNull => stored.is_some_and(|v| !v.is_null()),
                PropState::Unset => {
                    stored.is_none()
                        && snapshot.schema().declares_property(
                            &doc.type_name,
                            &doc.aspects,
                            prop,
                        )
                }
            }
        })),

        Predicate::ContentAttrMatch {
            prop,
            attr,
            pattern,
        } => {
            let matcher = AttrMatcher::new(pattern)?;
            Ok(filter_docs(snapshot, |doc| {
                match doc.properties.get(prop) {
                    Some(Value::Content(content)) => match attr {
                        ContentAttr::Mimetype => matcher.matches(&content.mimetype),
                        ContentAttr::Locale => matcher.matches(&content.locale),
                        ContentAttr::Encoding => matcher.matches(&content.encoding),
                        ContentAttr::Size => pattern
                            .parse::<u64>()
                            .is_ok_and(|size| size == content.size),
                    },
                    _ => false,
                }
            }))
        }

        Predicate::OwnerIs(authority) => Ok(filter_docs(snapshot, |doc| {
            doc.owner.as_deref() == Some(authority.as_str())
        })),
        Predicate::ReaderIs(authority) => Ok(filter_docs(snapshot, |doc| {
            snapshot
                .acl_of(doc)
                .is_some_and(|acl| acl.readers.contains(authority))
        })),
        Predicate::DeniedIs(authority) => Ok(filter_docs(snapshot, |doc| {
            snapshot
                .acl_of(doc)
                .is_some_and(|acl| acl.denied.contains(authority))
        })),
        Predicate::AuthorityIs(authority) => Ok(filter_docs(snapshot, |doc| {
            let denied = snapshot
                .acl_of(doc)
                .is_some_and(|acl| acl.denied.contains(authority));
            if denied {
                return false;
            }
            doc.owner.as_deref() == Some(authority.as_str())
                || snapshot
                    .acl_of(doc)
                    .is_some_and(|acl| acl.readers.contains(authority))
        })),
        Predicate::TenantIs(tenant) => Ok(filter_docs(snapshot, |doc| doc.tenant == *tenant)),

        Predicate::Not(inner) => {
            let inner = evaluate(snapshot, inner, ctx)?;
            Ok(snapshot.universe() - &inner)
        }

        Predicate::Bool {
            must,
            should,
            must_not,
        } => {
            let mut base: Option<RoaringTreemap> = None;
            for predicate in must {
                let matched = evaluate(snapshot, predicate, ctx)?;
                base = Some(match base {
                    Some(acc) => acc & matched,
                    None => matched,
                });
                if base.as_ref().is_some_and(RoaringTreemap::is_empty) {
                    break;
                }
            }
            let mut base = match base {
                Some(base) => base,
                None if !should.is_empty() => {
                    let mut union = RoaringTreemap::new();
                    for predicate in should {
                        union |= evaluate(snapshot, predicate, ctx)?;
                    }
                    union
                }
                None if !must_not.is_empty() => snapshot.universe().clone(),
                None => RoaringTreemap::new(),
            };
            for predicate in must_not {
                let excluded = evaluate(snapshot, predicate, ctx)?;
                base -= excluded;
            }
            Ok(base)
        }
    }
}

fn filter_docs(snapshot: &Snapshot, keep: impl Fn(&Document) -> bool) -> RoaringTreemap {
    let mut out = RoaringTreemap::new();
    for doc in snapshot.docs() {
        if keep(doc) {
            out.insert(doc.db_id);
        }
    }
    out
}

fn is_mltext(schema: &Schema, prop: &QName) -> bool {
    schema
        .property(prop)
        .is_some_and(|def| def.data_type == DataType::MlText)
}

/// Multilingual values only match a query whose locale speaks the same
/// language; plain text and content values match cross-locale.
fn locale_compatible(entry_locale: Option<&str>, ctx: &EvalContext, is_ml: bool) -> bool {
    if !is_ml {
        return true;
    }
    match (entry_locale, ctx.locale.as_deref()) {
        (Some(entry), Some(query)) => language_of(entry) == language_of(query),
        _ => true,
    }
}

fn collect_docs(
    posting: &crate::index::reader::Posting,
    is_ml: bool,
    ctx: &EvalContext,
    out: &mut RoaringTreemap,
) {
    if !is_ml {
        *out |= &posting.docs;
        return;
    }
    for entry in &posting.entries {
        if locale_compatible(entry.locale.as_deref(), ctx, is_ml) {
            out.insert(entry.doc);
        }
    }
}

/// Documents matching a single slot pattern (exact term, or `*`/`?`
/// wildcard scan over the field's term dictionary).
fn docs_for_slot(
    snapshot: &Snapshot,
    prop: &QName,
    slot: &str,
    ctx: &EvalContext,
) -> Result<RoaringTreemap, EvalError> {
    let mut out = RoaringTreemap::new();
    let Some(postings) = snapshot.postings(prop) else {
        return Ok(out);
    };
    let is_ml = is_mltext(snapshot.schema(), prop);
    if slot.contains(['*', '?']) {
        let regex = wildcard_regex(slot)?;
        for (term, posting) in postings.terms() {
            if regex.is_match(term) {
                collect_docs(posting, is_ml, ctx, &mut out);
            }
        }
    } else if let Some(posting) = postings.posting(slot) {
        collect_docs(posting, is_ml, ctx, &mut out);
    }
    Ok(out)
}

/// Case-folded comparison of a raw attribute value against a pattern that
/// may carry `*`/`?` wildcards (no word splitting).
struct AttrMatcher {
    regex: Option<Regex>,
    literal: String,
}

impl AttrMatcher {
    fn new(pattern: &str) -> Result<Self, EvalError> {
        let folded = fold_lower(pattern);
        let regex = if folded.contains(['*', '?']) {
            Some(wildcard_regex(&folded)?)
        } else {
            None
        };
        Ok(Self {
            regex,
            literal: folded,
        })
    }

    fn matches(&self, value: &str) -> bool {
        let value = fold_lower(value);
        match &self.regex {
            Some(regex) => regex.is_match(&value),
            None => self.literal == value,
        }
    }
}

fn wildcard_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut source = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|err| EvalError::BadPattern(err.to_string()))
}

/// Positions of every dictionary term matching a slot, grouped by
/// (document, value stream).
fn slot_positions(
    postings: &FieldPostings,
    slot: &str,
    is_ml: bool,
    ctx: &EvalContext,
) -> Result<HashMap<(DbId, Option<String>), Vec<u32>>, EvalError> {
    let mut out: HashMap<(DbId, Option<String>), Vec<u32>> = HashMap::new();
    let mut add = |posting: &crate::index::reader::Posting| {
        for entry in &posting.entries {
            if locale_compatible(entry.locale.as_deref(), ctx, is_ml) {
                out.entry((entry.doc, entry.locale.clone()))
                    .or_default()
                    .extend(entry.positions.iter().copied());
            }
        }
    };
    if slot.contains(['*', '?']) {
        let regex = wildcard_regex(slot)?;
        for (term, posting) in postings.terms() {
            if regex.is_match(term) {
                add(posting);
            }
        }
    } else if let Some(posting) = postings.posting(slot) {
        add(posting);
    }
    for positions in out.values_mut() {
        positions.sort_unstable();
        positions.dedup();
    }
    Ok(out)
}

/// Sloppy phrase matching. The cost of placing adjacent phrase terms at
/// document positions `a` then `b` is `b - a - 1` in order and `a - b`
/// reversed; a stream matches when some assignment of occurrences keeps
/// the total within the slop.
fn phrase_docs(
    snapshot: &Snapshot,
    prop: &QName,
    slots: &[String],
    slop: u32,
    ctx: &EvalContext,
) -> Result<RoaringTreemap, EvalError> {
    ctx.check_deadline()?;
    let mut out = RoaringTreemap::new();
    let Some(postings) = snapshot.postings(prop) else {
        return Ok(out);
    };
    let is_ml = is_mltext(snapshot.schema(), prop);

    let per_slot: Vec<HashMap<(DbId, Option<String>), Vec<u32>>> = slots
        .iter()
        .map(|slot| slot_positions(postings, slot, is_ml, ctx))
        .collect::<Result<_, _>>()?;

    let Some(first) = per_slot.first() else {
        return Ok(out);
    };
    'streams: for stream in first.keys() {
        if out.contains(stream.0) {
            continue;
        }
        let mut option_lists: Vec<&[u32]> = Vec::with_capacity(per_slot.len());
        for slot_map in &per_slot {
            match slot_map.get(stream) {
                Some(positions) => option_lists.push(positions),
                None => continue 'streams,
            }
        }
        if assignment_within_slop(None, &option_lists, 0, slop) {
            out.insert(stream.0);
        }
    }
    Ok(out)
}

fn assignment_within_slop(
    previous: Option<u32>,
    rest: &[&[u32]],
    cost: u32,
    slop: u32,
) -> bool {
    let Some(options) = rest.first() else {
        return cost <= slop;
    };
    options.iter().any(|&position| {
        let step = match previous {
            None => 0,
            Some(prev) if position > prev => position - prev - 1,
            Some(prev) => prev - position,
        };
        match cost.checked_add(step) {
            Some(total) if total <= slop => {
                assignment_within_slop(Some(position), &rest[1..], total, slop)
            }
            _ => false,
        }
    })
}

/// Ordered proximity: `left` must precede `right` in the same value
/// stream, with at most `gap` intervening tokens when a gap is given.
fn span_docs(
    snapshot: &Snapshot,
    prop: &QName,
    left: &str,
    right: &str,
    gap: Option<u32>,
    ctx: &EvalContext,
) -> Result<RoaringTreemap, EvalError> {
    ctx.check_deadline()?;
    let mut out = RoaringTreemap::new();
    let Some(postings) = snapshot.postings(prop) else {
        return Ok(out);
    };
    let is_ml = is_mltext(snapshot.schema(), prop);
    let left_positions = slot_positions(postings, left, is_ml, ctx)?;
    let right_positions = slot_positions(postings, right, is_ml, ctx)?;

    for (stream, lefts) in &left_positions {
        if out.contains(stream.0) {
            continue;
        }
        let Some(rights) = right_positions.get(stream) else {
            continue;
        };
        let hit = lefts.iter().any(|&l| {
            rights.iter().any(|&r| {
                r > l
                    && match gap {
                        Some(gap) => r - l - 1 <= gap,
                        None => true,
                    }
            })
        });
        if hit {
            out.insert(stream.0);
        }
    }
    Ok(out)
}

fn value_in_range(
    value: &Value,
    data_type: DataType,
    lower: &TypedBound,
    upper: &TypedBound,
    lower_incl: bool,
    upper_incl: bool,
) -> bool {
    match data_type {
        DataType::Long | DataType::Int => {
            let Some(v) = (match value {
                Value::Long(v) | Value::Int(v) => Some(*v),
                _ => None,
            }) else {
                return false;
            };
            bound_check(v, lower, upper, lower_incl, upper_incl, |b| match b {
                TypedBound::Long(b) => Some(*b),
                _ => None,
            })
        }
        DataType::Double | DataType::Float => {
            let Some(v) = (match value {
                Value::Double(v) | Value::Float(v) => Some(*v),
                _ => None,
            }) else {
                return false;
            };
            bound_check(v, lower, upper, lower_incl, upper_incl, |b| match b {
                TypedBound::Double(b) => Some(*b),
                _ => None,
            })
        }
        DataType::Date => {
            let Value::Date(v) = value else { return false };
            bound_check(*v, lower, upper, lower_incl, upper_incl, |b| match b {
                TypedBound::Date(b) => Some(*b),
                _ => None,
            })
        }
        DataType::Text | DataType::MlText | DataType::Content => {
            let candidates: Vec<String> = match value {
                Value::Text(text) => vec![text.to_lowercase()],
                Value::MlText(variants) => {
                    variants.iter().map(|(_, text)| text.to_lowercase()).collect()
                }
                Value::Content(content) => vec![content.text.to_lowercase()],
                _ => return false,
            };
            candidates.into_iter().any(|text| {
                bound_check(text, lower, upper, lower_incl, upper_incl, |b| match b {
                    TypedBound::Text(b) => Some(b.clone()),
                    _ => None,
                })
            })
        }
        DataType::Boolean => false,
    }
}

fn bound_check<T: PartialOrd>(
    value: T,
    lower: &TypedBound,
    upper: &TypedBound,
    lower_incl: bool,
    upper_incl: bool,
    extract: impl Fn(&TypedBound) -> Option<T>,
) -> bool {
    if !matches!(lower, TypedBound::Unbounded) {
        let Some(bound) = extract(lower) else {
            return false;
        };
        let ok = if lower_incl {
            value >= bound
        } else {
            value > bound
        };
        if !ok {
            return false;
        }
    }
    if !matches!(upper, TypedBound::Unbounded) {
        let Some(bound) = extract(upper) else {
            return false;
        };
        let ok = if upper_incl {
            value <= bound
        } else {
            value < bound
        };
        if !ok {
            return false;
        }
    }
    true
}

// Sorting

/// A resolved sort field.
#[derive(Debug, Clone, PartialEq)]
pub enum SortField {
    DbId,
    Prop(QName),
    ContentAttr(QName, ContentAttr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: SortField,
    pub ascending: bool,
}

/// Parse and resolve a `field dir[, field dir]*` sort specification.
pub fn compile_sort(schema: &Schema, spec: &str) -> Result<Vec<SortKey>, CompileError> {
    let mut keys = Vec::new();
    for clause in spec.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        let mut parts = clause.split_whitespace();
        let field_text = parts
            .next()
            .ok_or_else(|| CompileError::BadSort(spec.to_string()))?;
        let ascending = match parts.next() {
            None => true,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => true,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => false,
            Some(dir) => return Err(CompileError::BadSort(dir.to_string())),
        };
        if parts.next().is_some() {
            return Err(CompileError::BadSort(clause.to_string()));
        }

        let field = if field_text.eq_ignore_ascii_case("DBID") {
            SortField::DbId
        } else {
            let name = field_text.strip_prefix('@').unwrap_or(field_text);
            let (base, attr) = match name.rsplit_once('.') {
                Some((base, suffix)) => match suffix {
                    "mimetype" => (base, Some(ContentAttr::Mimetype)),
                    "size" => (base, Some(ContentAttr::Size)),
                    "locale" => (base, Some(ContentAttr::Locale)),
                    "encoding" => (base, Some(ContentAttr::Encoding)),
                    _ => (name, None),
                },
                None => (name, None),
            };
            let def = schema.resolve_property(base)?;
            match attr {
                Some(attr) => SortField::ContentAttr(def.qname.clone(), attr),
                None => SortField::Prop(def.qname.clone()),
            }
        };
        keys.push(SortKey { field, ascending });
    }
    if keys.is_empty() {
        return Err(CompileError::BadSort(spec.to_string()));
    }
    Ok(keys)
}

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Long(i64),
    Double(f64),
    Text(String),
    Date(i64),
}

impl Key {
    fn compare(&self, other: &Key) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Key::Long(a), Key::Long(b)) => a.cmp(b),
            (Key::Double(a), Key::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Date(a), Key::Date(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn sort_key(doc: &Document, field: &SortField) -> Option<Key> {
    match field {
        SortField::DbId => Some(Key::Long(doc.db_id as i64)),
        SortField::Prop(prop) => match doc.properties.get(prop)? {
            Value::Long(v) | Value::Int(v) => Some(Key::Long(*v)),
            Value::Double(v) | Value::Float(v) => Some(Key::Double(*v)),
            Value::Date(v) => Some(Key::Date(v.timestamp_millis())),
            Value::Text(text) => Some(Key::Text(text.to_lowercase())),
            Value::MlText(variants) => variants
                .first()
                .map(|(_, text)| Key::Text(text.to_lowercase())),
            Value::Content(content) => Some(Key::Text(content.text.to_lowercase())),
            Value::Boolean(v) => Some(Key::Long(i64::from(*v))),
            Value::Null => None,
        },
        SortField::ContentAttr(prop, attr) => match doc.properties.get(prop)? {
            Value::Content(content) => match attr {
                ContentAttr::Size => Some(Key::Long(content.size as i64)),
                ContentAttr::Mimetype => Some(Key::Text(content.mimetype.to_lowercase())),
                ContentAttr::Locale => Some(Key::Text(content.locale.to_lowercase())),
                ContentAttr::Encoding => Some(Key::Text(content.encoding.to_lowercase())),
            },
            _ => None,
        },
    }
}

/// Order a result set by the sort keys. Documents missing a key sort first
/// ascending and last descending; ties always break by db id ascending, so
/// results are deterministic.
pub fn sort_ids(snapshot: &Snapshot, ids: &RoaringTreemap, keys: &[SortKey]) -> Vec<DbId> {
    let mut rows: Vec<(DbId, Vec<Option<Key>>)> = ids
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|db_id| {
            let doc = snapshot.doc(db_id);
            let extracted = keys
                .iter()
                .map(|key| doc.and_then(|d| sort_key(d, &key.field)))
                .collect();
            (db_id, extracted)
        })
        .collect();

    rows.sort_by(|(a_id, a_keys), (b_id, b_keys)| {
        use std::cmp::Ordering;
        for (slot, key) in keys.iter().enumerate() {
            let ordering = match (&a_keys[slot], &b_keys[slot]) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.compare(b),
            };
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a_id.cmp(b_id)
    });

    rows.into_iter().map(|(db_id, _)| db_id).collect()
}
