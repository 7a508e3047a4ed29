//! Schema / data dictionary: namespaces, type and aspect hierarchies, and
//! typed property definitions. The planner resolves every symbolic field
//! reference through this module before a query touches the index.

pub mod qname;

pub use qname::{QName, QNamePattern, unescape_local};

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declared data type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    MlText,
    Content,
    Long,
    Int,
    Double,
    Float,
    Date,
    Boolean,
}

impl DataType {
    /// Textual name used by `d:`-prefixed data-type field references.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(DataType::Text),
            "mltext" => Some(DataType::MlText),
            "content" => Some(DataType::Content),
            "long" => Some(DataType::Long),
            "int" => Some(DataType::Int),
            "double" => Some(DataType::Double),
            "float" => Some(DataType::Float),
            "date" | "datetime" => Some(DataType::Date),
            "boolean" => Some(DataType::Boolean),
            _ => None,
        }
    }

    /// True for types whose values are matched through tokenized postings.
    pub fn is_textual(self) -> bool {
        matches!(self, DataType::Text | DataType::MlText | DataType::Content)
    }
}

/// A property definition in the data dictionary.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub qname: QName,
    pub data_type: DataType,
    /// Whether unscoped text queries (the TEXT catch-all) search this property.
    pub in_default_text: bool,
}

/// A node type definition. Types form a single-parent hierarchy and may
/// declare mandatory aspects which every instance implicitly carries.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub qname: QName,
    pub parent: Option<QName>,
    pub mandatory_aspects: Vec<QName>,
    pub properties: Vec<QName>,
}

/// An aspect definition, also hierarchical.
#[derive(Debug, Clone)]
pub struct AspectDef {
    pub qname: QName,
    pub parent: Option<QName>,
    pub properties: Vec<QName>,
}

/// Prefix ↔ URI mapping. Prefix lookup is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    by_prefix: HashMap<String, String>,
}

impl NamespaceRegistry {
    pub fn register(&mut self, prefix: &str, uri: &str) {
        self.by_prefix
            .insert(prefix.to_lowercase(), uri.to_string());
    }

    pub fn uri_for(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(&prefix.to_lowercase()).map(|s| s.as_str())
    }
}

/// The data dictionary the planner compiles against.
#[derive(Debug, Default)]
pub struct Schema {
    namespaces: NamespaceRegistry,
    types: HashMap<QName, TypeDef>,
    aspects: HashMap<QName, AspectDef>,
    properties: HashMap<QName, PropertyDef>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema::default(),
        }
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn property(&self, qname: &QName) -> Option<&PropertyDef> {
        self.properties.get(qname)
    }

    pub fn type_def(&self, qname: &QName) -> Option<&TypeDef> {
        self.types.get(qname)
    }

    /// Parse a qname reference in any accepted textual form, without
    /// requiring it to name a known definition. `_xHHHH_` escapes in the
    /// local part are decoded. Bare local names produce namespace-free
    /// patterns that match across namespaces.
    pub fn qname_pattern(&self, text: &str) -> Result<QNamePattern, CompileError> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('{') {
            let (uri, local) = rest
                .split_once('}')
                .ok_or_else(|| CompileError::BadLiteral {
                    field: text.to_string(),
                    expected: "qualified name",
                    literal: text.to_string(),
                })?;
            return Ok(QNamePattern {
                namespace: Some(uri.to_string()),
                local: unescape_local(local),
            });
        }
        if let Some((prefix, local)) = text.split_once(':') {
            let uri = self
                .namespaces
                .uri_for(prefix)
                .ok_or_else(|| CompileError::UnknownPrefix(prefix.to_string()))?;
            return Ok(QNamePattern {
                namespace: Some(uri.to_string()),
                local: unescape_local(local),
            });
        }
        Ok(QNamePattern {
            namespace: None,
            local: unescape_local(text),
        })
    }

    /// Resolve a type reference. Prefix and local-name comparison are
    /// case-insensitive; an unknown type yields `None` (empty result set,
    /// not an error).
    pub fn resolve_type(&self, text: &str) -> Option<&TypeDef> {
        Self::resolve_ci(&self.types, &self.namespaces, text)
    }

    /// Resolve an aspect reference, same rules as [`Self::resolve_type`].
    pub fn resolve_aspect(&self, text: &str) -> Option<&AspectDef> {
        Self::resolve_ci(&self.aspects, &self.namespaces, text)
    }

    fn resolve_ci<'a, T>(
        defs: &'a HashMap<QName, T>,
        namespaces: &NamespaceRegistry,
        text: &str,
    ) -> Option<&'a T> {
        let text = text.trim();
        let (ns, local) = if let Some(rest) = text.strip_prefix('{') {
            let (uri, local) = rest.split_once('}')?;
            (Some(uri.to_string()), unescape_local(local))
        } else if let Some((prefix, local)) = text.split_once(':') {
            let uri = namespaces.uri_for(prefix)?;
            (Some(uri.to_string()), unescape_local(local))
        } else {
            (None, unescape_local(text))
        };
        let local_lc = local.to_lowercase();
        let mut found = None;
        for (qname, def) in defs {
            if qname.local().to_lowercase() != local_lc {
                continue;
            }
            if let Some(ns) = &ns {
                if qname.namespace() != ns {
                    continue;
                }
            }
            if found.is_some() {
                // Ambiguous bare local across namespaces: treat as unknown.
                return None;
            }
            found = Some(def);
        }
        found
    }

    /// Resolve a property field reference strictly: the reference must name
    /// exactly one declared property. Accepts `{uri}local`, `prefix:local`,
    /// `prefix_local`, and bare `local` forms.
    pub fn resolve_property(&self, text: &str) -> Result<&PropertyDef, CompileError> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('{') {
            if let Some((uri, local)) = rest.split_once('}') {
                let qname = QName::new(uri, unescape_local(local));
                return self
                    .properties
                    .get(&qname)
                    .ok_or_else(|| CompileError::UnknownField(text.to_string()));
            }
            return Err(CompileError::UnknownField(text.to_string()));
        }
        if let Some((prefix, local)) = text.split_once(':') {
            let uri = self
                .namespaces
                .uri_for(prefix)
                .ok_or_else(|| CompileError::UnknownPrefix(prefix.to_string()))?;
            let qname = QName::new(uri, unescape_local(local));
            return self
                .properties
                .get(&qname)
                .ok_or_else(|| CompileError::UnknownField(text.to_string()));
        }
        // `prefix_local` form: split at each underscore until a known
        // prefix + declared property falls out.
        let mut split = 0;
        while let Some(idx) = text[split..].find('_') {
            let at = split + idx;
            let (prefix, local) = (&text[..at], &text[at + 1..]);
            if let Some(uri) = self.namespaces.uri_for(prefix) {
                let qname = QName::new(uri, unescape_local(local));
                if let Some(def) = self.properties.get(&qname) {
                    return Ok(def);
                }
            }
            split = at + 1;
        }
        // Bare local: must match exactly one declared property.
        let local = unescape_local(text);
        let mut found = None;
        for (qname, def) in &self.properties {
            if qname.local() == local {
                if found.is_some() {
                    return Err(CompileError::AmbiguousField(text.to_string()));
                }
                found = Some(def);
            }
        }
        found.ok_or_else(|| CompileError::UnknownField(text.to_string()))
    }

    /// The closed set of a type and all its declared subtypes.
    pub fn subtypes_of(&self, root: &QName) -> HashSet<QName> {
        let mut out = HashSet::new();
        out.insert(root.clone());
        loop {
            let before = out.len();
            for def in self.types.values() {
                if let Some(parent) = &def.parent {
                    if out.contains(parent) {
                        out.insert(def.qname.clone());
                    }
                }
            }
            if out.len() == before {
                break;
            }
        }
        out
    }

    /// The closed set of an aspect and all its sub-aspects.
    pub fn subaspects_of(&self, root: &QName) -> HashSet<QName> {
        let mut out = HashSet::new();
        out.insert(root.clone());
        loop {
            let before = out.len();
            for def in self.aspects.values() {
                if let Some(parent) = &def.parent {
                    if out.contains(parent) {
                        out.insert(def.qname.clone());
                    }
                }
            }
            if out.len() == before {
                break;
            }
        }
        out
    }

    /// Aspects a type implies through mandatory-aspect declarations,
    /// collected up the type's ancestor chain.
    pub fn aspects_implied_by_type(&self, type_name: &QName) -> HashSet<QName> {
        let mut out = HashSet::new();
        let mut cursor = self.types.get(type_name);
        while let Some(def) = cursor {
            out.extend(def.mandatory_aspects.iter().cloned());
            cursor = def.parent.as_ref().and_then(|p| self.types.get(p));
        }
        out
    }

    /// Whether a property is declared on a type (including inherited
    /// declarations) or on any of the given aspects. Used by ISUNSET.
    pub fn declares_property(
        &self,
        type_name: &QName,
        aspects: &[QName],
        prop: &QName,
    ) -> bool {
        let mut cursor = self.types.get(type_name);
        while let Some(def) = cursor {
            if def.properties.contains(prop) {
                return true;
            }
            cursor = def.parent.as_ref().and_then(|p| self.types.get(p));
        }
        for aspect in aspects {
            let mut cursor = self.aspects.get(aspect);
            while let Some(def) = cursor {
                if def.properties.contains(prop) {
                    return true;
                }
                cursor = def.parent.as_ref().and_then(|p| self.aspects.get(p));
            }
        }
        false
    }

    /// Every declared property of the given data type (for `d:` fields).
    pub fn properties_of_data_type(&self, data_type: DataType) -> Vec<&PropertyDef> {
        let mut out: Vec<_> = self
            .properties
            .values()
            .filter(|p| p.data_type == data_type)
            .collect();
        out.sort_by(|a, b| a.qname.cmp(&b.qname));
        out
    }

    /// Properties searched by the TEXT catch-all and unscoped terms.
    pub fn default_text_properties(&self) -> Vec<&PropertyDef> {
        let mut out: Vec<_> = self
            .properties
            .values()
            .filter(|p| p.in_default_text && p.data_type.is_textual())
            .collect();
        out.sort_by(|a, b| a.qname.cmp(&b.qname));
        out
    }
}

/// Fluent construction for schemas, used by fixtures and the corpus loader.
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.schema.namespaces.register(prefix, uri);
        self
    }

    pub fn type_def(
        mut self,
        qname: QName,
        parent: Option<QName>,
        mandatory_aspects: Vec<QName>,
        properties: Vec<QName>,
    ) -> Self {
        self.schema.types.insert(
            qname.clone(),
            TypeDef {
                qname,
                parent,
                mandatory_aspects,
                properties,
            },
        );
        self
    }

    pub fn aspect_def(
        mut self,
        qname: QName,
        parent: Option<QName>,
        properties: Vec<QName>,
    ) -> Self {
        self.schema.aspects.insert(
            qname.clone(),
            AspectDef {
                qname,
                parent,
                properties,
            },
        );
        self
    }

    pub fn property_def(mut self, qname: QName, data_type: DataType, in_default_text: bool) -> Self {
        self.schema.properties.insert(
            qname.clone(),
            PropertyDef {
                qname,
                data_type,
                in_default_text,
            },
        );
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CM: &str = "http://sample.dev/model/content/1.0";
    const TEST: &str = "http://sample.dev/model/test/1.0";

    fn schema() -> Schema {
        Schema::builder()
            .namespace("cm", CM)
            .namespace("test", TEST)
            .property_def(QName::new(CM, "content"), DataType::Content, true)
            .property_def(QName::new(CM, "name"), DataType::Text, true)
            .property_def(QName::new(TEST, "float-ista"), DataType::Float, false)
            .type_def(QName::new(CM, "cmobject"), None, vec![], vec![])
            .type_def(
                QName::new(CM, "content"),
                Some(QName::new(CM, "cmobject")),
                vec![],
                vec![QName::new(CM, "content")],
            )
            .type_def(
                QName::new(CM, "thumbnail"),
                Some(QName::new(CM, "content")),
                vec![QName::new(CM, "derived")],
                vec![],
            )
            .aspect_def(QName::new(CM, "derived"), None, vec![])
            .build()
    }

    #[test]
    fn test_resolve_property_forms() {
        let s = schema();
        let full = format!("{{{CM}}}content");
        assert_eq!(s.resolve_property(&full).unwrap().qname.local(), "content");
        assert_eq!(
            s.resolve_property("cm:content").unwrap().data_type,
            DataType::Content
        );
        assert_eq!(s.resolve_property("cm_content").unwrap().qname.local(), "content");
        // Bare local resolves when unique across namespaces.
        assert_eq!(s.resolve_property("name").unwrap().qname.local(), "name");
    }

    #[test]
    fn test_resolve_property_escaped_local() {
        let s = schema();
        assert_eq!(
            s.resolve_property("test:float_x002D_ista").unwrap().data_type,
            DataType::Float
        );
    }

    #[test]
    fn test_resolve_property_ambiguous() {
        let s = schema();
        // "content" matches only the cm property here; add a clash to force
        // ambiguity.
        let mut builder = Schema::builder().namespace("cm", CM).namespace("test", TEST);
        builder = builder
            .property_def(QName::new(CM, "title"), DataType::Text, true)
            .property_def(QName::new(TEST, "title"), DataType::Text, false);
        let clash = builder.build();
        assert!(matches!(
            clash.resolve_property("title"),
            Err(CompileError::AmbiguousField(_))
        ));
        assert!(matches!(
            s.resolve_property("missing"),
            Err(CompileError::UnknownField(_))
        ));
    }

    #[test]
    fn test_resolve_type_case_insensitive() {
        let s = schema();
        for form in ["cm:content", "CM:CONTENT", "content", "CONTENT"] {
            assert!(s.resolve_type(form).is_some(), "form {form}");
        }
        assert!(s.resolve_type("cm:content0").is_none());
        assert!(s.resolve_type("CONTENT1").is_none());
    }

    #[test]
    fn test_subtype_closure() {
        let s = schema();
        let closure = s.subtypes_of(&QName::new(CM, "cmobject"));
        assert_eq!(closure.len(), 3);
        let content = s.subtypes_of(&QName::new(CM, "content"));
        assert!(content.contains(&QName::new(CM, "thumbnail")));
        assert!(!content.contains(&QName::new(CM, "cmobject")));
    }

    #[test]
    fn test_implied_aspects() {
        let s = schema();
        let implied = s.aspects_implied_by_type(&QName::new(CM, "thumbnail"));
        assert!(implied.contains(&QName::new(CM, "derived")));
        assert!(s.aspects_implied_by_type(&QName::new(CM, "content")).is_empty());
    }

    #[test]
    fn test_qname_pattern_bare_local() {
        let s = schema();
        let p = s.qname_pattern("nine").unwrap();
        assert!(p.namespace.is_none());
        assert!(p.matches(&QName::new(CM, "nine")));
    }
}
