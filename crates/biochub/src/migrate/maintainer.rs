//! Maintainer contact strings

use regex::Regex;
use std::sync::LazyLock;

/// `Name <email>`, with the name optional. Empty brackets do not match.
static BRACKETED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*<([^<>]+)>$").ok());

/// Name and email parsed out of a maintainer string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Maintainer {
    pub name: Option<String>,
    pub email: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse a raw maintainer field. Never fails; unparseable input gives an
/// empty [`Maintainer`].
pub fn parse_maintainer(raw: Option<&str>) -> Maintainer {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Maintainer::default();
    };

    if let Some(caps) = BRACKETED.as_ref().and_then(|re| re.captures(raw)) {
        // a name is only kept alongside an email
        let Some(email) = caps.get(2).and_then(|m| non_empty(m.as_str())) else {
            return Maintainer::default();
        };
        return Maintainer {
            name: caps.get(1).and_then(|m| non_empty(m.as_str())),
            email: Some(email),
        };
    }

    if raw.contains('@') {
        return Maintainer {
            name: None,
            email: Some(raw.to_string()),
        };
    }

    Maintainer::default()
}
