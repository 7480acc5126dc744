//! Sigil dispatch and postfix-decorator parsing.
//!
//! Grounded on `excore/config/model.py`'s flag constants and
//! `excore/config/parse.py::_parse_param`. A TOML key's leading character
//! selects which [`Node`](crate::node::Node) variant a table becomes; the
//! remainder of the key (after stripping the sigil) may carry `.attr`,
//! `.attr()`, or `@hook` postfix decorators.

/// The five node "flavors" a key's leading sigil selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sigil {
    /// `!` — an intermediate node: a plain value holder, never a callable
    /// target, used purely to structure parameters.
    Intermediate,
    /// `@` — a reused node: built once, memoized, and shared by every
    /// reference to the same name.
    Reused,
    /// `$` — a class node: resolves to the class/type itself, never calls
    /// it.
    Class,
    /// `&` — a reference into a node produced earlier in the same pass.
    Reference,
    /// No sigil — a plain node: built fresh on every reference.
    Plain,
}

impl Sigil {
    pub const INTER_FLAG: char = '!';
    pub const REUSE_FLAG: char = '@';
    pub const CLASS_FLAG: char = '$';
    pub const REFER_FLAG: char = '&';

    /// Strip a leading sigil off `key`, returning the sigil (or `Plain`)
    /// and the remainder.
    pub fn strip(key: &str) -> (Sigil, &str) {
        let mut chars = key.chars();
        match chars.next() {
            Some(Self::INTER_FLAG) => (Sigil::Intermediate, chars.as_str()),
            Some(Self::REUSE_FLAG) => (Sigil::Reused, chars.as_str()),
            Some(Self::CLASS_FLAG) => (Sigil::Class, chars.as_str()),
            Some(Self::REFER_FLAG) => (Sigil::Reference, chars.as_str()),
            _ => (Sigil::Plain, key),
        }
    }

    pub fn is_special(key: &str) -> bool {
        key.starts_with(Self::INTER_FLAG)
            || key.starts_with(Self::REUSE_FLAG)
            || key.starts_with(Self::CLASS_FLAG)
            || key.starts_with(Self::REFER_FLAG)
    }
}

/// A parsed postfix decorator chain attached to a parameter value, e.g.
/// `@some_node.weight` or `@some_node.to(device)()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decorator {
    /// `.attr` — attribute access without calling it.
    Attr(String),
    /// `.attr()` — attribute access followed by a call.
    Call(String),
}

/// The result of splitting a parameter value string into its base name,
/// an optional hook name, and a chain of postfix decorators.
///
/// Mirrors `_parse_param`: the value is first split on `@` to separate a
/// hook suffix, then the remainder is split on `.` to collect attribute
/// accesses / calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParam {
    pub base: String,
    pub hook: Option<String>,
    pub decorators: Vec<Decorator>,
}

pub fn parse_param(raw: &str) -> ParsedParam {
    let (base_and_attrs, hook) = match raw.split_once('@') {
        Some((left, right)) => (left, Some(right.to_string())),
        None => (raw, None),
    };

    let mut parts = base_and_attrs.split('.');
    let base = parts.next().unwrap_or_default().to_string();
    let decorators = parts
        .map(|p| {
            if let Some(stripped) = p.strip_suffix("()") {
                Decorator::Call(stripped.to_string())
            } else {
                Decorator::Attr(p.to_string())
            }
        })
        .collect();

    ParsedParam { base, hook, decorators }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sigils() {
        assert_eq!(Sigil::strip("!foo"), (Sigil::Intermediate, "foo"));
        assert_eq!(Sigil::strip("@foo"), (Sigil::Reused, "foo"));
        assert_eq!(Sigil::strip("$foo"), (Sigil::Class, "foo"));
        assert_eq!(Sigil::strip("&foo"), (Sigil::Reference, "foo"));
        assert_eq!(Sigil::strip("foo"), (Sigil::Plain, "foo"));
    }

    #[test]
    fn parses_plain_param() {
        let p = parse_param("model");
        assert_eq!(p.base, "model");
        assert!(p.hook.is_none());
        assert!(p.decorators.is_empty());
    }

    #[test]
    fn parses_attr_chain() {
        let p = parse_param("model.encoder.weight");
        assert_eq!(p.base, "model");
        assert_eq!(
            p.decorators,
            vec![Decorator::Attr("encoder".into()), Decorator::Attr("weight".into())]
        );
    }

    #[test]
    fn parses_call_decorator() {
        let p = parse_param("model.to_device()");
        assert_eq!(p.base, "model");
        assert_eq!(p.decorators, vec![Decorator::Call("to_device".into())]);
    }

    #[test]
    fn parses_hook_suffix() {
        let p = parse_param("model@freeze");
        assert_eq!(p.base, "model");
        assert_eq!(p.hook, Some("freeze".to_string()));
    }
}
