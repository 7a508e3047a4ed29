//! JSON corpus descriptions for the CLI: a schema plus documents and ACLs,
//! loaded into a [`Store`] in one transaction.

use crate::index::types::{Acl, Document, FtsStatus, Value};
use crate::index::writer::{Store, Transaction};
use crate::schema::{DataType, QName, Schema};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CorpusFile {
    #[serde(default)]
    pub namespaces: Vec<NamespaceSpec>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub aspects: Vec<AspectSpec>,
    #[serde(default)]
    pub acls: Vec<AclSpec>,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
}

#[derive(Debug, Deserialize)]
pub struct NamespaceSpec {
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub default_text: bool,
}

#[derive(Debug, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub mandatory_aspects: Vec<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AspectSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AclSpec {
    pub id: u64,
    #[serde(default)]
    pub readers: Vec<String>,
    #[serde(default)]
    pub denied: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentSpec {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub acl: u64,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub parents: Vec<ParentSpec>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub status: FtsStatus,
}

#[derive(Debug, Deserialize)]
pub struct ParentSpec {
    pub id: u64,
    pub assoc_type: String,
    pub name: String,
    #[serde(default)]
    pub primary: Option<bool>,
}

/// Load a corpus description file into a fresh store.
pub fn load_corpus(path: &Path) -> Result<(Arc<Schema>, Store)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading corpus file {}", path.display()))?;
    let file: CorpusFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing corpus file {}", path.display()))?;
    build_corpus(file)
}

pub fn build_corpus(file: CorpusFile) -> Result<(Arc<Schema>, Store)> {
    let mut builder = Schema::builder();
    for ns in &file.namespaces {
        builder = builder.namespace(&ns.prefix, &ns.uri);
    }
    // Resolution below only needs the namespace table.
    let namespaces = builder.build();
    let resolve = |name: &str| -> Result<QName> {
        if let Some(rest) = name.strip_prefix('{') {
            let Some((uri, local)) = rest.split_once('}') else {
                bail!("malformed qualified name: {name}");
            };
            return Ok(QName::new(uri, local));
        }
        if let Some((prefix, local)) = name.split_once(':') {
            let Some(uri) = namespaces.namespaces().uri_for(prefix) else {
                bail!("unknown namespace prefix in {name}");
            };
            return Ok(QName::new(uri, local));
        }
        Ok(QName::local_only(name))
    };

    let mut builder = Schema::builder();
    for ns in &file.namespaces {
        builder = builder.namespace(&ns.prefix, &ns.uri);
    }
    for prop in &file.properties {
        builder = builder.property_def(resolve(&prop.name)?, prop.data_type, prop.default_text);
    }
    for type_spec in &file.types {
        let parent = type_spec.parent.as_deref().map(&resolve).transpose()?;
        let mandatory = type_spec
            .mandatory_aspects
            .iter()
            .map(|a| resolve(a))
            .collect::<Result<Vec<_>>>()?;
        let properties = type_spec
            .properties
            .iter()
            .map(|p| resolve(p))
            .collect::<Result<Vec<_>>>()?;
        builder = builder.type_def(resolve(&type_spec.name)?, parent, mandatory, properties);
    }
    for aspect in &file.aspects {
        let parent = aspect.parent.as_deref().map(&resolve).transpose()?;
        let properties = aspect
            .properties
            .iter()
            .map(|p| resolve(p))
            .collect::<Result<Vec<_>>>()?;
        builder = builder.aspect_def(resolve(&aspect.name)?, parent, properties);
    }
    let schema = Arc::new(builder.build());

    let store = Store::new(Arc::clone(&schema));
    let mut txn = Transaction::new();
    for acl in &file.acls {
        let mut built = Acl::new(acl.id);
        for reader in &acl.readers {
            built = built.reader(reader);
        }
        for denied in &acl.denied {
            built = built.deny(denied);
        }
        txn.put_acl(built);
    }
    for spec in file.documents {
        let mut doc = Document::new(spec.id, resolve(&spec.type_name)?).acl(spec.acl);
        for aspect in &spec.aspects {
            doc = doc.aspect(resolve(aspect)?);
        }
        for (name, value) in spec.properties {
            doc = doc.property(resolve(&name)?, value);
        }
        for (position, parent) in spec.parents.iter().enumerate() {
            let assoc_type = resolve(&parent.assoc_type)?;
            let qname = resolve(&parent.name)?;
            let primary = parent.primary.unwrap_or(position == 0);
            if primary {
                doc = doc.child_of(parent.id, assoc_type, qname);
            } else {
                doc = doc.secondary_child_of(parent.id, assoc_type, qname);
            }
        }
        if let Some(owner) = spec.owner {
            doc = doc.owner(owner);
        }
        doc.tenant = spec.tenant;
        doc = doc.status(spec.status);
        txn.index(doc);
    }
    store.commit(txn);
    Ok((schema, store))
}
