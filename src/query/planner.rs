use crate::error::CompileError;
use crate::index::types::DbId;
use crate::query::parser::{
    Ast, ContentAttr, FieldRef, GroupOp, MatchMode, Occur, RangeBound,
};
use crate::schema::{DataType, QName, QNamePattern, Schema};
use crate::text::fuzzy::FuzzyBudget;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashSet;

/// One step of a compiled path pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `/name`: exactly one segment matching the qname pattern.
    Child(QNamePattern),
    /// `/*`: exactly one segment, any qname.
    AnyChild,
    /// `/.`: zero segments.
    Here,
    /// `//`: zero or more segments.
    Descend,
}

/// A compiled path expression, matched against each derived path of a
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub steps: Vec<PathStep>,
}

impl PathPattern {
    pub fn matches(&self, path: &[QName]) -> bool {
        Self::match_steps(&self.steps, path)
    }

    fn match_steps(steps: &[PathStep], path: &[QName]) -> bool {
        match steps.first() {
            None => path.is_empty(),
            Some(PathStep::Here) => Self::match_steps(&steps[1..], path),
            Some(PathStep::AnyChild) => {
                !path.is_empty() && Self::match_steps(&steps[1..], &path[1..])
            }
            Some(PathStep::Child(pattern)) => {
                !path.is_empty()
                    && segment_matches(pattern, &path[0])
                    && Self::match_steps(&steps[1..], &path[1..])
            }
            Some(PathStep::Descend) => (0..=path.len())
                .any(|skip| Self::match_steps(&steps[1..], &path[skip..])),
        }
    }
}

/// Path segments accept `prefix:*` wildcard locals alongside plain qname
/// patterns.
fn segment_matches(pattern: &QNamePattern, qname: &QName) -> bool {
    if pattern.local != "*" {
        return pattern.matches(qname);
    }
    match &pattern.namespace {
        Some(ns) => ns == qname.namespace(),
        None => true,
    }
}

/// A typed range bound, resolved against the property's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBound {
    Unbounded,
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Text(String),
}

/// Property-state tests (`ISNULL` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropState {
    Null,
    NotNull,
    Unset,
    Exists,
}

/// The executable predicate tree produced by compilation. Every leaf is
/// bound to a resolved field; membership never depends on boosts.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Nothing,
    Everything,
    Term {
        prop: QName,
        text: String,
        exact: bool,
    },
    Wildcard {
        prop: QName,
        pattern: String,
    },
    Fuzzy {
        prop: QName,
        text: String,
        budget: FuzzyBudget,
    },
    Phrase {
        prop: QName,
        text: String,
        slop: u32,
    },
    Span {
        prop: QName,
        left: String,
        right: String,
        gap: Option<u32>,
    },
    Range {
        prop: QName,
        data_type: DataType,
        lower: TypedBound,
        upper: TypedBound,
        lower_incl: bool,
        upper_incl: bool,
    },
    PathMatch(PathPattern),
    TypeIn(HashSet<QName>),
    TypeExact(QName),
    AspectIn(HashSet<QName>),
    AspectExact(QName),
    AssocQName {
        pattern: QNamePattern,
        primary_only: bool,
    },
    AssocTypeQName {
        pattern: QNamePattern,
        primary_only: bool,
    },
    ParentIs(DbId),
    AncestorIs(DbId),
    PrimaryParentIs(DbId),
    IsNode(bool),
    DbIdIs(DbId),
    TxIdIs(u64),
    AclIdIs(u64),
    AclTxIdIs(u64),
    FtsStatusIs(String),
    PropState {
        prop: QName,
        state: PropState,
    },
    ContentAttrMatch {
        prop: QName,
        attr: ContentAttr,
        pattern: String,
    },
    OwnerIs(String),
    ReaderIs(String),
    DeniedIs(String),
    /// Reader-or-owner, minus a deny for the same authority.
    AuthorityIs(String),
    TenantIs(String),
    Not(Box<Predicate>),
    Bool {
        must: Vec<Predicate>,
        should: Vec<Predicate>,
        must_not: Vec<Predicate>,
    },
}

/// Compile a parsed query against a schema.
pub fn compile(ast: &Ast, schema: &Schema, now: DateTime<Utc>) -> Result<Predicate, CompileError> {
    let planner = Planner { schema, now };
    planner.lower(ast)
}

struct Planner<'a> {
    schema: &'a Schema,
    now: DateTime<Utc>,
}

impl<'a> Planner<'a> {
    fn lower(&self, ast: &Ast) -> Result<Predicate, CompileError> {
        match ast {
            Ast::Group { op, children } => self.lower_group(*op, children),
            Ast::Term {
                field,
                text,
                mode,
                fuzzy,
                ..
            } => self.lower_term(field.as_ref(), text, *mode, *fuzzy),
            Ast::Phrase {
                field, text, slop, ..
            } => self.lower_phrase(field.as_ref(), text, *slop),
            Ast::Range {
                field,
                lower,
                upper,
                lower_incl,
                upper_incl,
            } => self.lower_range(field.as_ref(), lower, upper, *lower_incl, *upper_incl),
            Ast::Span {
                field,
                left,
                right,
                gap,
            } => self.lower_span(field.as_ref(), left, right, *gap),
        }
    }

    /// Boolean lowering.
    ///
    /// Explicit groups keep conventional semantics: `and` intersects its
    /// default children and subtracts exclusions; `or` unions, with
    /// excluded children contributing complements. A juxtaposed group with
    /// no negations is a conjunction; one negation anywhere degrades the
    /// whole group to a disjunction whose negated children are
    /// complements, so `lazy -dog` widens to a union while
    /// `lazy and -dog` stays an intersection.
    fn lower_group(
        &self,
        op: GroupOp,
        children: &[(Occur, Ast)],
    ) -> Result<Predicate, CompileError> {
        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();

        match op {
            GroupOp::Or => {
                for (occur, child) in children {
                    let lowered = self.lower(child)?;
                    match occur {
                        Occur::Excluded => should.push(Predicate::Not(Box::new(lowered))),
                        _ => should.push(lowered),
                    }
                }
            }
            GroupOp::And => {
                for (occur, child) in children {
                    let lowered = self.lower(child)?;
                    match occur {
                        Occur::Default | Occur::Mandatory => must.push(lowered),
                        Occur::Optional => should.push(lowered),
                        Occur::Excluded => must_not.push(lowered),
                    }
                }
            }
            GroupOp::Implicit => {
                let negated = children.iter().any(|(o, _)| *o == Occur::Excluded);
                for (occur, child) in children {
                    let lowered = self.lower(child)?;
                    if negated {
                        match occur {
                            Occur::Excluded => {
                                should.push(Predicate::Not(Box::new(lowered)))
                            }
                            _ => should.push(lowered),
                        }
                    } else {
                        match occur {
                            Occur::Optional => should.push(lowered),
                            _ => must.push(lowered),
                        }
                    }
                }
            }
        }

        Ok(Predicate::Bool {
            must,
            should,
            must_not,
        })
    }

    fn lower_term(
        &self,
        field: Option<&FieldRef>,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Result<Predicate, CompileError> {
        match field {
            None | Some(FieldRef::Text) => {
                let props = self.schema.default_text_properties();
                self.text_leaf_over(
                    props.into_iter().map(|p| p.qname.clone()).collect(),
                    text,
                    mode,
                    fuzzy,
                )
            }
            Some(FieldRef::Property { name, attr }) => {
                self.property_leaf(name, *attr, text, mode, fuzzy)
            }
            Some(FieldRef::DataType(type_name)) => self.datatype_leaf(type_name, text, mode, fuzzy),
            Some(FieldRef::Path) => Ok(Predicate::PathMatch(self.compile_path(text)?)),
            Some(FieldRef::Type) => Ok(match self.schema.resolve_type(text) {
                Some(def) => Predicate::TypeIn(self.schema.subtypes_of(&def.qname)),
                None => Predicate::Nothing,
            }),
            Some(FieldRef::ExactType) => Ok(match self.schema.resolve_type(text) {
                Some(def) => Predicate::TypeExact(def.qname.clone()),
                None => Predicate::Nothing,
            }),
            Some(FieldRef::Aspect) => Ok(match self.schema.resolve_aspect(text) {
                Some(def) => Predicate::AspectIn(self.schema.subaspects_of(&def.qname)),
                None => Predicate::Nothing,
            }),
            Some(FieldRef::ExactAspect) => Ok(match self.schema.resolve_aspect(text) {
                Some(def) => Predicate::AspectExact(def.qname.clone()),
                None => Predicate::Nothing,
            }),
            Some(FieldRef::QName) => Ok(Predicate::AssocQName {
                pattern: self.schema.qname_pattern(text)?,
                primary_only: false,
            }),
            Some(FieldRef::PrimaryAssocQName) => Ok(Predicate::AssocQName {
                pattern: self.schema.qname_pattern(text)?,
                primary_only: true,
            }),
            Some(FieldRef::AssocTypeQName) => Ok(Predicate::AssocTypeQName {
                pattern: self.schema.qname_pattern(text)?,
                primary_only: false,
            }),
            Some(FieldRef::PrimaryAssocTypeQName) => Ok(Predicate::AssocTypeQName {
                pattern: self.schema.qname_pattern(text)?,
                primary_only: true,
            }),
            Some(FieldRef::Parent) => Ok(Predicate::ParentIs(self.node_ref(field, text)?)),
            Some(FieldRef::Ancestor) => Ok(Predicate::AncestorIs(self.node_ref(field, text)?)),
            Some(FieldRef::PrimaryParent) => {
                Ok(Predicate::PrimaryParentIs(self.node_ref(field, text)?))
            }
            Some(FieldRef::IsNode) => Ok(Predicate::IsNode(matches!(
                text,
                "T" | "t" | "true" | "TRUE"
            ))),
            Some(FieldRef::DbId) => Ok(Predicate::DbIdIs(self.numeric(field, text)?)),
            Some(FieldRef::TxId) | Some(FieldRef::InTxId) => {
                Ok(Predicate::TxIdIs(self.numeric(field, text)?))
            }
            Some(FieldRef::AclId) => Ok(Predicate::AclIdIs(self.numeric(field, text)?)),
            Some(FieldRef::AclTxId) | Some(FieldRef::InAclTxId) => {
                Ok(Predicate::AclTxIdIs(self.numeric(field, text)?))
            }
            Some(FieldRef::FtsStatus) => Ok(Predicate::FtsStatusIs(text.to_string())),
            Some(FieldRef::IsNull) => self.prop_state(text, PropState::Null),
            Some(FieldRef::IsNotNull) => self.prop_state(text, PropState::NotNull),
            Some(FieldRef::IsUnset) => self.prop_state(text, PropState::Unset),
            Some(FieldRef::Exists) => self.prop_state(text, PropState::Exists),
            Some(FieldRef::Owner) => Ok(Predicate::OwnerIs(text.to_string())),
            Some(FieldRef::Reader) => Ok(Predicate::ReaderIs(text.to_string())),
            Some(FieldRef::Denied) => Ok(Predicate::DeniedIs(text.to_string())),
            Some(FieldRef::Authority) => Ok(Predicate::AuthorityIs(text.to_string())),
            Some(FieldRef::Tenant) => Ok(Predicate::TenantIs(text.to_string())),
        }
    }

    fn lower_phrase(
        &self,
        field: Option<&FieldRef>,
        text: &str,
        slop: u32,
    ) -> Result<Predicate, CompileError> {
        match field {
            // Structural fields take their value verbatim, quoted or not.
            Some(
                FieldRef::Path
                | FieldRef::Type
                | FieldRef::ExactType
                | FieldRef::Aspect
                | FieldRef::ExactAspect
                | FieldRef::QName
                | FieldRef::PrimaryAssocQName
                | FieldRef::PrimaryAssocTypeQName
                | FieldRef::AssocTypeQName
                | FieldRef::Parent
                | FieldRef::Ancestor
                | FieldRef::PrimaryParent
                | FieldRef::IsNode
                | FieldRef::DbId
                | FieldRef::TxId
                | FieldRef::InTxId
                | FieldRef::AclId
                | FieldRef::AclTxId
                | FieldRef::InAclTxId
                | FieldRef::FtsStatus
                | FieldRef::IsNull
                | FieldRef::IsNotNull
                | FieldRef::IsUnset
                | FieldRef::Exists
                | FieldRef::Owner
                | FieldRef::Reader
                | FieldRef::Denied
                | FieldRef::Authority
                | FieldRef::Tenant,
            ) => self.lower_term(field, text, MatchMode::Analyzed, None),
            Some(FieldRef::Property { name, attr }) => {
                if attr.is_some() {
                    return self.property_leaf(name, *attr, text, MatchMode::Analyzed, None);
                }
                let def = self.resolve_property_or_datatype(name)?;
                match def {
                    Resolved::Prop(qname, data_type) => {
                        if data_type.is_textual() {
                            Ok(Predicate::Phrase {
                                prop: qname,
                                text: text.to_string(),
                                slop,
                            })
                        } else {
                            // A quoted literal against a non-text property is
                            // an equality test.
                            self.typed_equality(&qname, data_type, text)
                        }
                    }
                    Resolved::DataType(dt) => self.datatype_phrase(dt, text, slop),
                }
            }
            Some(FieldRef::DataType(type_name)) => {
                let dt = DataType::from_name(type_name)
                    .ok_or_else(|| CompileError::UnknownField(format!("d:{type_name}")))?;
                self.datatype_phrase(dt, text, slop)
            }
            None | Some(FieldRef::Text) => {
                let props = self.schema.default_text_properties();
                let mut should = Vec::new();
                for def in props {
                    if def.data_type.is_textual() {
                        should.push(Predicate::Phrase {
                            prop: def.qname.clone(),
                            text: text.to_string(),
                            slop,
                        });
                    }
                }
                Ok(Predicate::Bool {
                    must: vec![],
                    should,
                    must_not: vec![],
                })
            }
        }
    }

    fn datatype_phrase(&self, dt: DataType, text: &str, slop: u32) -> Result<Predicate, CompileError> {
        let mut should = Vec::new();
        for def in self.schema.properties_of_data_type(dt) {
            if def.data_type.is_textual() {
                should.push(Predicate::Phrase {
                    prop: def.qname.clone(),
                    text: text.to_string(),
                    slop,
                });
            } else {
                should.push(self.typed_equality(&def.qname, def.data_type, text)?);
            }
        }
        Ok(Predicate::Bool {
            must: vec![],
            should,
            must_not: vec![],
        })
    }

    fn lower_range(
        &self,
        field: Option<&FieldRef>,
        lower: &RangeBound,
        upper: &RangeBound,
        lower_incl: bool,
        upper_incl: bool,
    ) -> Result<Predicate, CompileError> {
        let field_name = match field {
            Some(FieldRef::Property { name, attr: None }) => name.clone(),
            Some(FieldRef::Property { name, attr: Some(_) }) => {
                return Err(CompileError::RangeUnsupported { field: name.clone() });
            }
            Some(other) => {
                return Err(CompileError::RangeUnsupported {
                    field: format!("{other:?}"),
                });
            }
            None => {
                return Err(CompileError::RangeUnsupported {
                    field: "TEXT".to_string(),
                });
            }
        };
        let def = self.resolve_property_or_datatype(&field_name)?;
        let (qname, data_type) = match def {
            Resolved::Prop(qname, data_type) => (qname, data_type),
            Resolved::DataType(_) => {
                return Err(CompileError::RangeUnsupported { field: field_name });
            }
        };
        Ok(Predicate::Range {
            lower: self.typed_bound(&qname, data_type, lower)?,
            upper: self.typed_bound(&qname, data_type, upper)?,
            prop: qname,
            data_type,
            lower_incl,
            upper_incl,
        })
    }

    fn lower_span(
        &self,
        field: Option<&FieldRef>,
        left: &str,
        right: &str,
        gap: Option<u32>,
    ) -> Result<Predicate, CompileError> {
        let props: Vec<QName> = match field {
            None | Some(FieldRef::Text) => self
                .schema
                .default_text_properties()
                .into_iter()
                .map(|p| p.qname.clone())
                .collect(),
            Some(FieldRef::Property { name, attr: None }) => {
                match self.resolve_property_or_datatype(name)? {
                    Resolved::Prop(qname, _) => vec![qname],
                    Resolved::DataType(dt) => self
                        .schema
                        .properties_of_data_type(dt)
                        .into_iter()
                        .map(|p| p.qname.clone())
                        .collect(),
                }
            }
            Some(other) => {
                return Err(CompileError::UnknownField(format!(
                    "proximity over {other:?}"
                )));
            }
        };
        let mut should = Vec::new();
        for prop in props {
            should.push(Predicate::Span {
                prop,
                left: left.to_string(),
                right: right.to_string(),
                gap,
            });
        }
        Ok(Predicate::Bool {
            must: vec![],
            should,
            must_not: vec![],
        })
    }

    /// A term/wildcard/fuzzy leaf unioned over a set of text properties.
    fn text_leaf_over(
        &self,
        props: Vec<QName>,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Result<Predicate, CompileError> {
        let mut should = Vec::new();
        for prop in props {
            should.push(self.single_text_leaf(prop, text, mode, fuzzy));
        }
        Ok(Predicate::Bool {
            must: vec![],
            should,
            must_not: vec![],
        })
    }

    fn single_text_leaf(
        &self,
        prop: QName,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Predicate {
        if let Some(parameter) = fuzzy {
            let budget = if parameter < 0.0 {
                FuzzyBudget::DEFAULT
            } else {
                FuzzyBudget::from_parameter(parameter)
            };
            return Predicate::Fuzzy {
                prop,
                text: text.to_string(),
                budget,
            };
        }
        if mode == MatchMode::Fuzzy {
            return Predicate::Fuzzy {
                prop,
                text: text.to_string(),
                budget: FuzzyBudget::DEFAULT,
            };
        }
        if text.contains(['*', '?']) {
            return Predicate::Wildcard {
                prop,
                pattern: text.to_string(),
            };
        }
        Predicate::Term {
            prop,
            text: text.to_string(),
            exact: mode == MatchMode::Exact,
        }
    }

    fn property_leaf(
        &self,
        name: &str,
        attr: Option<ContentAttr>,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Result<Predicate, CompileError> {
        let resolved = self.resolve_property_or_datatype(name)?;
        match resolved {
            Resolved::Prop(qname, data_type) => {
                if let Some(attr) = attr {
                    if data_type != DataType::Content {
                        return Err(CompileError::UnknownField(format!(
                            "{name}.{attr:?}"
                        )));
                    }
                    return Ok(Predicate::ContentAttrMatch {
                        prop: qname,
                        attr,
                        pattern: text.to_string(),
                    });
                }
                if data_type.is_textual() {
                    Ok(self.single_text_leaf(qname, text, mode, fuzzy))
                } else {
                    self.typed_equality(&qname, data_type, text)
                }
            }
            Resolved::DataType(dt) => self.datatype_leaf_resolved(dt, text, mode, fuzzy),
        }
    }

    fn datatype_leaf(
        &self,
        type_name: &str,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Result<Predicate, CompileError> {
        let dt = DataType::from_name(type_name)
            .ok_or_else(|| CompileError::UnknownField(format!("d:{type_name}")))?;
        self.datatype_leaf_resolved(dt, text, mode, fuzzy)
    }

    fn datatype_leaf_resolved(
        &self,
        dt: DataType,
        text: &str,
        mode: MatchMode,
        fuzzy: Option<f64>,
    ) -> Result<Predicate, CompileError> {
        let mut should = Vec::new();
        for def in self.schema.properties_of_data_type(dt) {
            if def.data_type.is_textual() {
                should.push(self.single_text_leaf(def.qname.clone(), text, mode, fuzzy));
            } else {
                should.push(self.typed_equality(&def.qname, def.data_type, text)?);
            }
        }
        Ok(Predicate::Bool {
            must: vec![],
            should,
            must_not: vec![],
        })
    }

    /// Equality against a non-text property, expressed as a closed range.
    fn typed_equality(
        &self,
        qname: &QName,
        data_type: DataType,
        literal: &str,
    ) -> Result<Predicate, CompileError> {
        if literal == "*" {
            return Ok(Predicate::PropState {
                prop: qname.clone(),
                state: PropState::NotNull,
            });
        }
        let bound = self.typed_bound(qname, data_type, &RangeBound::Literal(literal.to_string()))?;
        Ok(Predicate::Range {
            prop: qname.clone(),
            data_type,
            lower: bound.clone(),
            upper: bound,
            lower_incl: true,
            upper_incl: true,
        })
    }

    fn typed_bound(
        &self,
        qname: &QName,
        data_type: DataType,
        bound: &RangeBound,
    ) -> Result<TypedBound, CompileError> {
        let literal = match bound {
            RangeBound::Unbounded => return Ok(TypedBound::Unbounded),
            RangeBound::Min => {
                return Ok(match data_type {
                    DataType::Long | DataType::Int => TypedBound::Long(i64::MIN),
                    DataType::Double | DataType::Float => TypedBound::Double(f64::NEG_INFINITY),
                    _ => TypedBound::Unbounded,
                });
            }
            RangeBound::Max => {
                return Ok(match data_type {
                    DataType::Long | DataType::Int => TypedBound::Long(i64::MAX),
                    DataType::Double | DataType::Float => TypedBound::Double(f64::INFINITY),
                    _ => TypedBound::Unbounded,
                });
            }
            RangeBound::Literal(text) => text,
        };
        let field = qname.to_string();
        match data_type {
            DataType::Long | DataType::Int => {
                literal
                    .parse::<i64>()
                    .map(TypedBound::Long)
                    .map_err(|_| CompileError::BadLiteral {
                        field,
                        expected: "integer",
                        literal: literal.clone(),
                    })
            }
            DataType::Double | DataType::Float => {
                literal
                    .parse::<f64>()
                    .map(TypedBound::Double)
                    .map_err(|_| CompileError::BadLiteral {
                        field,
                        expected: "number",
                        literal: literal.clone(),
                    })
            }
            DataType::Date => parse_date_expr(literal, self.now)
                .map(TypedBound::Date)
                .ok_or(CompileError::BadLiteral {
                    field,
                    expected: "date",
                    literal: literal.clone(),
                }),
            DataType::Boolean => Err(CompileError::RangeUnsupported { field }),
            DataType::Text | DataType::MlText | DataType::Content => {
                Ok(TypedBound::Text(literal.to_lowercase()))
            }
        }
    }

    fn prop_state(&self, text: &str, state: PropState) -> Result<Predicate, CompileError> {
        let resolved = self.resolve_property_or_datatype(text)?;
        match resolved {
            Resolved::Prop(qname, _) => Ok(Predicate::PropState { prop: qname, state }),
            Resolved::DataType(_) => Err(CompileError::UnknownField(text.to_string())),
        }
    }

    fn node_ref(&self, field: Option<&FieldRef>, text: &str) -> Result<DbId, CompileError> {
        self.numeric(field, text)
    }

    fn numeric(&self, field: Option<&FieldRef>, text: &str) -> Result<u64, CompileError> {
        text.parse::<u64>().map_err(|_| CompileError::BadLiteral {
            field: format!("{field:?}"),
            expected: "integer",
            literal: text.to_string(),
        })
    }

    fn resolve_property_or_datatype(&self, name: &str) -> Result<Resolved, CompileError> {
        // `d:` is reserved for data-type references; it can reach this path
        // written with an escaped colon.
        if let Some(type_name) = name.strip_prefix("d:") {
            if let Some(dt) = DataType::from_name(type_name) {
                return Ok(Resolved::DataType(dt));
            }
        }
        let def = self.schema.resolve_property(name)?;
        Ok(Resolved::Prop(def.qname.clone(), def.data_type))
    }

    fn compile_path(&self, text: &str) -> Result<PathPattern, CompileError> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| CompileError::BadPath(text.to_string()))?;
        let mut steps = Vec::new();
        if rest.is_empty() {
            return Ok(PathPattern { steps });
        }
        for piece in rest.split('/') {
            match piece {
                "" => steps.push(PathStep::Descend),
                "." => steps.push(PathStep::Here),
                "*" => steps.push(PathStep::AnyChild),
                name => {
                    let pattern = self.schema.qname_pattern(name)?;
                    steps.push(PathStep::Child(pattern));
                }
            }
        }
        Ok(PathPattern { steps })
    }
}

enum Resolved {
    Prop(QName, DataType),
    DataType(DataType),
}

/// Parse a date bound: ISO date/datetime, `NOW`, or `NOW/DAY±N DAY`
/// day-arithmetic expressions.
pub fn parse_date_expr(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(rest) = text.strip_prefix("NOW") {
        if rest.is_empty() {
            return Some(now);
        }
        let rest = rest.strip_prefix("/DAY")?;
        let midnight = Utc
            .from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
        if rest.is_empty() {
            return Some(midnight);
        }
        let (sign, rest) = match rest.as_bytes().first()? {
            b'+' => (1i64, &rest[1..]),
            b'-' => (-1i64, &rest[1..]),
            _ => return None,
        };
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let unit = &rest[digits.len()..];
        let count: i64 = digits.parse().ok()?;
        let delta = match unit {
            "DAY" | "DAYS" => Duration::days(sign * count),
            _ => return None,
        };
        return Some(midnight + delta);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    None
}
