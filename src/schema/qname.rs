use serde::{Deserialize, Serialize};
use std::fmt;

/// A qualified name: (namespace URI, local name).
///
/// The canonical textual form is `{uri}local`. An empty namespace prints as
/// the bare local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Local-only name in the empty namespace.
    pub fn local_only(local: impl Into<String>) -> Self {
        Self::new("", local)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// A qname-shaped match pattern. Bare local names (no namespace given)
/// match the local part across every namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QNamePattern {
    pub namespace: Option<String>,
    pub local: String,
}

impl QNamePattern {
    pub fn matches(&self, qname: &QName) -> bool {
        if self.local != qname.local() {
            return false;
        }
        match &self.namespace {
            Some(ns) => ns == qname.namespace(),
            None => true,
        }
    }
}

/// Decode `_xHHHH_` escapes in a local name (`float_x002D_ista` → `float-ista`).
pub fn unescape_local(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        // An escape is `_x` + 4 hex digits + `_`, 8 bytes total.
        if bytes[i] == b'_'
            && i + 7 < bytes.len()
            && bytes[i + 1] == b'x'
            && bytes[i + 6] == b'_'
            && bytes[i + 2..i + 6].iter().all(u8::is_ascii_hexdigit)
        {
            let hex = &raw[i + 2..i + 6];
            if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                out.push(ch);
                i += 7;
                continue;
            }
        }
        let ch = raw[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_full_form() {
        let q = QName::new("http://sample.dev/model/content/1.0", "content");
        assert_eq!(q.to_string(), "{http://sample.dev/model/content/1.0}content");
    }

    #[test]
    fn test_display_bare_local() {
        assert_eq!(QName::local_only("nine").to_string(), "nine");
    }

    #[test]
    fn test_unescape_hyphen() {
        assert_eq!(unescape_local("float_x002D_ista"), "float-ista");
    }

    #[test]
    fn test_unescape_passthrough() {
        assert_eq!(unescape_local("plain_name"), "plain_name");
        assert_eq!(unescape_local("_x12"), "_x12");
    }

    #[test]
    fn test_pattern_local_only() {
        let p = QNamePattern {
            namespace: None,
            local: "one".into(),
        };
        assert!(p.matches(&QName::new("http://x", "one")));
        assert!(!p.matches(&QName::new("http://x", "two")));
    }

    #[test]
    fn test_pattern_namespaced() {
        let p = QNamePattern {
            namespace: Some("http://x".into()),
            local: "one".into(),
        };
        assert!(p.matches(&QName::new("http://x", "one")));
        assert!(!p.matches(&QName::new("http://y", "one")));
    }
}
