use crate::error::ParseError;

/// Content-property sub-selector (`cm:content.mimetype:…`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAttr {
    Mimetype,
    Size,
    Locale,
    Encoding,
}

impl ContentAttr {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "mimetype" => Some(ContentAttr::Mimetype),
            "size" => Some(ContentAttr::Size),
            "locale" => Some(ContentAttr::Locale),
            "encoding" => Some(ContentAttr::Encoding),
            _ => None,
        }
    }
}

/// A field selector as written in the query, before schema resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Text,
    Path,
    Type,
    ExactType,
    Aspect,
    ExactAspect,
    QName,
    PrimaryAssocQName,
    PrimaryAssocTypeQName,
    AssocTypeQName,
    Parent,
    Ancestor,
    PrimaryParent,
    IsNode,
    DbId,
    TxId,
    InTxId,
    AclId,
    AclTxId,
    InAclTxId,
    FtsStatus,
    Owner,
    Reader,
    Denied,
    Authority,
    Tenant,
    IsNull,
    IsNotNull,
    IsUnset,
    Exists,
    /// A property reference in any qname form, optionally with a content
    /// sub-selector.
    Property {
        name: String,
        attr: Option<ContentAttr>,
    },
    /// A `d:`-prefixed data-type reference matching every property of that
    /// declared type.
    DataType(String),
}

fn pseudo_field(name: &str) -> Option<FieldRef> {
    match name {
        "TEXT" => Some(FieldRef::Text),
        "PATH" => Some(FieldRef::Path),
        "TYPE" => Some(FieldRef::Type),
        "EXACTTYPE" => Some(FieldRef::ExactType),
        "ASPECT" => Some(FieldRef::Aspect),
        "EXACTASPECT" => Some(FieldRef::ExactAspect),
        "QNAME" => Some(FieldRef::QName),
        "PRIMARYASSOCQNAME" => Some(FieldRef::PrimaryAssocQName),
        "PRIMARYASSOCTYPEQNAME" => Some(FieldRef::PrimaryAssocTypeQName),
        "ASSOCTYPEQNAME" => Some(FieldRef::AssocTypeQName),
        "PARENT" => Some(FieldRef::Parent),
        "ANCESTOR" => Some(FieldRef::Ancestor),
        "PRIMARYPARENT" => Some(FieldRef::PrimaryParent),
        "ISNODE" => Some(FieldRef::IsNode),
        "DBID" => Some(FieldRef::DbId),
        "TXID" => Some(FieldRef::TxId),
        "INTXID" => Some(FieldRef::InTxId),
        "ACLID" => Some(FieldRef::AclId),
        "ACLTXID" => Some(FieldRef::AclTxId),
        "INACLTXID" => Some(FieldRef::InAclTxId),
        "FTSSTATUS" => Some(FieldRef::FtsStatus),
        "OWNER" => Some(FieldRef::Owner),
        "READER" => Some(FieldRef::Reader),
        "DENIED" => Some(FieldRef::Denied),
        "AUTHORITY" => Some(FieldRef::Authority),
        "TENANT" => Some(FieldRef::Tenant),
        "ISNULL" => Some(FieldRef::IsNull),
        "ISNOTNULL" => Some(FieldRef::IsNotNull),
        "ISUNSET" => Some(FieldRef::IsUnset),
        "EXISTS" => Some(FieldRef::Exists),
        _ => None,
    }
}

/// How a leaf matches against analyzed terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Analyzed,
    /// `=term`: identifier match, no analysis-chain expansion.
    Exact,
    /// `~term`: fuzzy-preferred match.
    Fuzzy,
}

/// Occurrence of a child within a boolean group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occur {
    #[default]
    Default,
    Mandatory,
    Optional,
    Excluded,
}

/// Boolean group operator. `Implicit` is bare juxtaposition, whose
/// negation semantics differ from an explicit `and` (see the planner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    Implicit,
    And,
    Or,
}

/// An unresolved range bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeBound {
    Unbounded,
    Min,
    Max,
    Literal(String),
}

/// Query AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Term {
        field: Option<FieldRef>,
        text: String,
        mode: MatchMode,
        fuzzy: Option<f64>,
        boost: Option<f64>,
    },
    Phrase {
        field: Option<FieldRef>,
        text: String,
        slop: u32,
        mode: MatchMode,
        boost: Option<f64>,
    },
    Range {
        field: Option<FieldRef>,
        lower: RangeBound,
        upper: RangeBound,
        lower_incl: bool,
        upper_incl: bool,
    },
    /// Ordered proximity: `left *(gap) right`, or `left * right` with no
    /// gap bound.
    Span {
        field: Option<FieldRef>,
        left: String,
        right: String,
        gap: Option<u32>,
    },
    Group {
        op: GroupOp,
        children: Vec<(Occur, Ast)>,
    },
}

/// Parse a query string into an AST.
pub fn parse_query(input: &str) -> Result<Ast, ParseError> {
    let mut parser = QueryParser::new(input);
    let ast = parser.parse_or()?;
    parser.skip_whitespace();
    if !parser.is_eof() {
        return Err(ParseError::new(
            parser.pos,
            format!("unexpected input: {}", parser.remaining()),
        ));
    }
    Ok(ast)
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_or(&mut self) -> Result<Ast, ParseError> {
        let mut children = vec![(Occur::Default, self.parse_and()?)];

        loop {
            self.skip_whitespace();
            if self.consume_keyword("or") {
                children.push((Occur::Default, self.parse_and()?));
            } else {
                break;
            }
        }

        if children.len() == 1 {
            Ok(children.pop().unwrap().1)
        } else {
            Ok(Ast::Group {
                op: GroupOp::Or,
                children,
            })
        }
    }

    fn parse_and(&mut self) -> Result<Ast, ParseError> {
        let mut children: Vec<(Occur, Ast)> = Vec::new();
        let mut explicit_and = false;

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.peek_char() == Some(')') {
                break;
            }
            if self.peek_keyword("or") {
                break;
            }
            if self.consume_keyword("and") {
                explicit_and = true;
                continue;
            }
            if !children.is_empty() && self.span_operator_ahead() {
                let (occur, span) = self.parse_span(children.pop().unwrap())?;
                children.push((occur, span));
                continue;
            }
            children.push(self.parse_unary()?);
        }

        match children.len() {
            0 => Err(ParseError::new(self.pos, "empty query")),
            1 if children[0].0 == Occur::Default && !explicit_and => {
                Ok(children.pop().unwrap().1)
            }
            _ => Ok(Ast::Group {
                op: if explicit_and {
                    GroupOp::And
                } else {
                    GroupOp::Implicit
                },
                children,
            }),
        }
    }

    fn parse_unary(&mut self) -> Result<(Occur, Ast), ParseError> {
        self.skip_whitespace();

        let occur = if self.consume_char('+') {
            Occur::Mandatory
        } else if self.consume_char('|') {
            Occur::Optional
        } else if self.consume_char('-') || self.consume_char('!') {
            Occur::Excluded
        } else if self.consume_keyword("not") {
            self.skip_whitespace();
            Occur::Excluded
        } else {
            Occur::Default
        };

        let mode = if self.consume_char('=') {
            MatchMode::Exact
        } else if self.consume_char('~') {
            MatchMode::Fuzzy
        } else {
            MatchMode::Analyzed
        };

        let mut node = self.parse_primary()?;
        if mode != MatchMode::Analyzed {
            apply_mode(&mut node, mode);
        }
        Ok((occur, node))
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        self.skip_whitespace();

        match self.peek_char() {
            None => Err(ParseError::new(self.pos, "unexpected end of query")),
            Some('(') => {
                let open = self.pos;
                self.advance();
                let node = self.parse_or()?;
                self.skip_whitespace();
                if !self.consume_char(')') {
                    return Err(ParseError::new(open, "unbalanced parenthesis"));
                }
                Ok(node)
            }
            Some('"') => self.parse_phrase(None),
            Some('[') | Some('<') => self.parse_range(None),
            _ => self.parse_field_or_term(),
        }
    }

    /// A leaf that is either `field:value` (any field form) or a bare term.
    fn parse_field_or_term(&mut self) -> Result<Ast, ParseError> {
        let start = self.pos;

        if self.consume_char('@') {
            let field = self.parse_property_field_name(start)?;
            return self.parse_field_value(field);
        }

        if self.peek_char() == Some('{') {
            // `{uri}local:value` is a field reference; a lone `{uri}local`
            // token is a term (it can appear as a quoted-free value).
            if let Some(field) = self.try_parse_uri_field() {
                return self.parse_field_value(field);
            }
            self.pos = start;
            return self.parse_bare_term(None);
        }

        let piece1 = self.scan_name();
        if !piece1.is_empty() && self.peek_char() == Some(':') {
            if let Some(field) = pseudo_field(&piece1) {
                self.advance();
                return self.parse_field_value(field);
            }
            if piece1 == "d" {
                let save = self.pos;
                self.advance();
                let type_name = self.scan_name();
                if !type_name.is_empty() && self.peek_char() == Some(':') {
                    self.advance();
                    return self.parse_field_value(FieldRef::DataType(type_name));
                }
                self.pos = save;
            }
            let colon = self.pos;
            self.advance();
            let piece2 = self.scan_name();
            if !piece2.is_empty() && self.peek_char() == Some(':') {
                // prefix:local:value
                self.advance();
                let (local, attr) = split_attr(&piece2);
                return self.parse_field_value(FieldRef::Property {
                    name: format!("{piece1}:{local}"),
                    attr,
                });
            }
            // Single-colon property field: value starts right after the colon.
            self.pos = colon + 1;
            if self.value_start_ahead() {
                let (local, attr) = split_attr(&piece1);
                return self.parse_field_value(FieldRef::Property { name: local, attr });
            }
        }

        self.pos = start;
        self.parse_bare_term(None)
    }

    /// Property field name after `@`: `@prefix:local`, `@{uri}local`,
    /// `@local`, all with optional `.attr` sub-selector, followed by `:`.
    fn parse_property_field_name(&mut self, start: usize) -> Result<FieldRef, ParseError> {
        if self.peek_char() == Some('{') {
            return self
                .try_parse_uri_field()
                .ok_or_else(|| ParseError::new(start, "malformed property reference"));
        }
        let piece1 = self.scan_name();
        if piece1.is_empty() {
            return Err(ParseError::new(start, "malformed property reference"));
        }
        if self.peek_char() != Some(':') {
            return Err(ParseError::new(self.pos, "expected ':' after field name"));
        }
        let colon = self.pos;
        self.advance();
        let piece2 = self.scan_name();
        if !piece2.is_empty() && self.peek_char() == Some(':') {
            self.advance();
            let (local, attr) = split_attr(&piece2);
            return Ok(FieldRef::Property {
                name: format!("{piece1}:{local}"),
                attr,
            });
        }
        self.pos = colon + 1;
        if !self.value_start_ahead() {
            return Err(ParseError::new(self.pos, "expected field value"));
        }
        let (local, attr) = split_attr(&piece1);
        Ok(FieldRef::Property { name: local, attr })
    }

    /// `{uri}local[.attr]:`. Returns `None` (position restored) when the
    /// braces do not form a field reference.
    fn try_parse_uri_field(&mut self) -> Option<FieldRef> {
        let save = self.pos;
        self.advance(); // '{'
        let uri_start = self.pos;
        while !self.is_eof() && self.peek_char() != Some('}') {
            self.advance();
        }
        if self.is_eof() {
            self.pos = save;
            return None;
        }
        let uri = self.input[uri_start..self.pos].to_string();
        self.advance(); // '}'
        let local = self.scan_name();
        if local.is_empty() || self.peek_char() != Some(':') {
            self.pos = save;
            return None;
        }
        self.advance();
        let (local, attr) = split_attr(&local);
        Some(FieldRef::Property {
            name: format!("{{{uri}}}{local}"),
            attr,
        })
    }

    /// Whether the character at the cursor can begin a field value.
    fn value_start_ahead(&self) -> bool {
        matches!(
            self.peek_char(),
            Some('(') | Some('"') | Some('[') | Some('<') | Some('{') | Some('*') | Some('?')
        ) || self
            .peek_char()
            .is_some_and(|ch| !ch.is_whitespace() && ch != ')')
    }

    fn parse_field_value(&mut self, field: FieldRef) -> Result<Ast, ParseError> {
        match self.peek_char() {
            Some('(') => {
                let open = self.pos;
                self.advance();
                let mut node = self.parse_or()?;
                self.skip_whitespace();
                if !self.consume_char(')') {
                    return Err(ParseError::new(open, "unbalanced parenthesis"));
                }
                apply_field(&mut node, &field);
                Ok(node)
            }
            Some('"') => self.parse_phrase(Some(field)),
            Some('[') | Some('<') => self.parse_range(Some(field)),
            Some(_) => self.parse_bare_term(Some(field)),
            None => Err(ParseError::new(self.pos, "expected field value")),
        }
    }

    fn parse_bare_term(&mut self, field: Option<FieldRef>) -> Result<Ast, ParseError> {
        let start = self.pos;
        let token = self.scan_term_token();
        if token.is_empty() {
            return Err(ParseError::new(start, "expected a term"));
        }

        let (token, boost) = strip_boost(token);
        let (token, fuzzy) = strip_fuzzy(&token);
        if token.is_empty() {
            return Err(ParseError::new(start, "expected a term"));
        }

        // Compact range form `A..B`.
        if fuzzy.is_none() {
            if let Some(idx) = token.find("..") {
                let (lower, upper) = (&token[..idx], &token[idx + 2..]);
                if !lower.is_empty() && !upper.is_empty() && !upper.starts_with('.') {
                    return Ok(Ast::Range {
                        field,
                        lower: RangeBound::Literal(lower.to_string()),
                        upper: RangeBound::Literal(upper.to_string()),
                        lower_incl: true,
                        upper_incl: true,
                    });
                }
            }
        }

        Ok(Ast::Term {
            field,
            text: token,
            mode: MatchMode::Analyzed,
            fuzzy,
            boost,
        })
    }

    fn parse_phrase(&mut self, field: Option<FieldRef>) -> Result<Ast, ParseError> {
        let open = self.pos;
        self.advance(); // '"'
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => return Err(ParseError::new(open, "unbalanced quote")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(ch) = self.peek_char() {
                        text.push(ch);
                        self.advance();
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        let mut slop = 0u32;
        let mut boost = None;
        if self.consume_char('~') {
            let number = self.scan_number();
            slop = number
                .parse::<f64>()
                .map_err(|_| ParseError::new(self.pos, "expected a slop value after '~'"))?
                as u32;
        }
        if self.consume_char('^') {
            let number = self.scan_number();
            boost = Some(
                number
                    .parse::<f64>()
                    .map_err(|_| ParseError::new(self.pos, "expected a boost value after '^'"))?,
            );
        }

        Ok(Ast::Phrase {
            field,
            text,
            slop,
            mode: MatchMode::Analyzed,
            boost,
        })
    }

    fn parse_range(&mut self, field: Option<FieldRef>) -> Result<Ast, ParseError> {
        let open = self.pos;
        let lower_incl = match self.peek_char() {
            Some('[') => true,
            Some('<') => false,
            _ => return Err(ParseError::new(open, "malformed range")),
        };
        self.advance();

        self.skip_whitespace();
        let lower = self.scan_range_bound();
        if lower.is_empty() {
            return Err(ParseError::new(self.pos, "malformed range: missing lower bound"));
        }
        self.skip_whitespace();
        if !self.consume_keyword("to") {
            return Err(ParseError::new(self.pos, "malformed range: expected TO"));
        }
        self.skip_whitespace();
        let upper = self.scan_range_bound();
        if upper.is_empty() {
            return Err(ParseError::new(self.pos, "malformed range: missing upper bound"));
        }
        self.skip_whitespace();
        let upper_incl = match self.peek_char() {
            Some(']') => true,
            Some('>') => false,
            _ => return Err(ParseError::new(open, "unbalanced range brackets")),
        };
        self.advance();

        Ok(Ast::Range {
            field,
            lower: range_bound(&lower),
            upper: range_bound(&upper),
            lower_incl,
            upper_incl,
        })
    }

    /// Span operator lookahead: `*` followed by `(` or by whitespace with a
    /// right-hand term still to come.
    fn span_operator_ahead(&self) -> bool {
        let rest = self.remaining();
        let mut chars = rest.chars();
        if chars.next() != Some('*') {
            return false;
        }
        match chars.next() {
            Some('(') => true,
            Some(ch) if ch.is_whitespace() => {
                chars.clone().any(|c| !c.is_whitespace())
            }
            _ => false,
        }
    }

    fn parse_span(&mut self, left: (Occur, Ast)) -> Result<(Occur, Ast), ParseError> {
        let at = self.pos;
        self.advance(); // '*'
        let gap = if self.consume_char('(') {
            let number = self.scan_number();
            let gap = number
                .parse::<u32>()
                .map_err(|_| ParseError::new(self.pos, "expected a gap after '*('"))?;
            if !self.consume_char(')') {
                return Err(ParseError::new(at, "unbalanced '*(' operator"));
            }
            Some(gap)
        } else {
            None
        };

        self.skip_whitespace();
        let (_, right) = self.parse_unary()?;

        let (occur, left) = left;
        match (left, right) {
            (
                Ast::Term {
                    field, text: left, ..
                },
                Ast::Term { text: right, .. },
            ) => Ok((
                occur,
                Ast::Span {
                    field,
                    left,
                    right,
                    gap,
                },
            )),
            _ => Err(ParseError::new(
                at,
                "proximity operator requires plain terms on both sides",
            )),
        }
    }

    // Scanning helpers

    fn scan_name(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
                out.push(ch);
                self.advance();
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.peek_char() {
                    out.push(escaped);
                    self.advance();
                }
            } else {
                break;
            }
        }
        out
    }

    fn scan_term_token(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.peek_char() {
                    out.push(escaped);
                    self.advance();
                }
            } else {
                out.push(ch);
                self.advance();
            }
        }
        out
    }

    fn scan_number(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '.' {
                out.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        out
    }

    fn scan_range_bound(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == ']' || ch == '>' {
                break;
            }
            if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.peek_char() {
                    out.push(escaped);
                    self.advance();
                }
            } else {
                out.push(ch);
                self.advance();
            }
        }
        out
    }

    fn peek_keyword(&self, word: &str) -> bool {
        let rest = self.remaining();
        if rest.len() < word.len()
            || !rest.is_char_boundary(word.len())
            || !rest[..word.len()].eq_ignore_ascii_case(word)
        {
            return false;
        }
        match rest[word.len()..].chars().next() {
            None => true,
            Some(ch) => ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"',
        }
    }

    fn consume_keyword(&mut self, word: &str) -> bool {
        if self.peek_keyword(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }
}

fn range_bound(token: &str) -> RangeBound {
    match token {
        "*" => RangeBound::Unbounded,
        "MIN" => RangeBound::Min,
        "MAX" => RangeBound::Max,
        _ => RangeBound::Literal(token.to_string()),
    }
}

fn split_attr(name: &str) -> (String, Option<ContentAttr>) {
    if let Some((base, attr_name)) = name.rsplit_once('.') {
        if let Some(attr) = ContentAttr::from_name(attr_name) {
            return (base.to_string(), Some(attr));
        }
    }
    (name.to_string(), None)
}

/// Trailing `^N` boost.
fn strip_boost(token: String) -> (String, Option<f64>) {
    if let Some(idx) = token.rfind('^') {
        if let Ok(boost) = token[idx + 1..].parse::<f64>() {
            return (token[..idx].to_string(), Some(boost));
        }
    }
    (token, None)
}

/// Trailing `~` or `~N` fuzzy parameter. A bare `~` maps to a negative
/// sentinel the planner replaces with the default budget.
fn strip_fuzzy(token: &str) -> (String, Option<f64>) {
    if let Some(idx) = token.rfind('~') {
        let suffix = &token[idx + 1..];
        if suffix.is_empty() {
            return (token[..idx].to_string(), Some(-1.0));
        }
        if let Ok(value) = suffix.parse::<f64>() {
            return (token[..idx].to_string(), Some(value));
        }
    }
    (token.to_string(), None)
}

fn apply_field(node: &mut Ast, field: &FieldRef) {
    match node {
        Ast::Term { field: f, .. }
        | Ast::Phrase { field: f, .. }
        | Ast::Range { field: f, .. }
        | Ast::Span { field: f, .. } => {
            if f.is_none() {
                *f = Some(field.clone());
            }
        }
        Ast::Group { children, .. } => {
            for (_, child) in children {
                apply_field(child, field);
            }
        }
    }
}

fn apply_mode(node: &mut Ast, mode: MatchMode) {
    match node {
        Ast::Term { mode: m, .. } | Ast::Phrase { mode: m, .. } => *m = mode,
        Ast::Group { children, .. } => {
            for (_, child) in children {
                apply_mode(child, mode);
            }
        }
        _ => {}
    }
}
