//! Search filter builder.
//!
//! Filters are built as a tree and rendered to RFC 4515 text. Values are only ever interpolated
//! through [`escape`] or [`escape_bytes`], so user input cannot change the filter structure.

use std::fmt;

use crate::entry::OBJECT_CLASS;

/// Value of an equality assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Text value; only filter metacharacters are escaped.
    Text(String),
    /// Binary value; every byte is escaped.
    Binary(Vec<u8>),
}

/// Search filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(attribute=value)`
    Equals {
        /// Attribute name
        attribute: String,
        /// Asserted value
        value: FilterValue,
    },
    /// `(attribute=*)`
    Present(String),
    /// `(&...)`
    And(Vec<Filter>),
    /// `(|...)`
    Or(Vec<Filter>),
    /// `(!...)`
    Not(Box<Filter>),
    /// Pre-rendered filter text, inserted verbatim.
    Raw(String),
}

impl Filter {
    /// Equality assertion on a text value.
    #[must_use]
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: FilterValue::Text(value.into()),
        }
    }

    /// Equality assertion on a binary value (e.g. `objectSid`).
    #[must_use]
    pub fn equals_bytes(attribute: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: FilterValue::Binary(value.into()),
        }
    }

    /// Presence assertion.
    #[must_use]
    pub fn present(attribute: impl Into<String>) -> Self {
        Self::Present(attribute.into())
    }

    /// Conjunction.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Pre-rendered filter text. The caller is responsible for escaping.
    #[must_use]
    pub fn raw(filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if filter.starts_with('(') {
            Self::Raw(filter)
        } else {
            Self::Raw(format!("({filter})"))
        }
    }

    /// Restricts results to the object classes of the given target types.
    ///
    /// - no set declares a class: `(objectclass=*)`
    /// - one set declares classes: `(|(objectclass=a)(objectclass=b)...)`
    /// - several sets declare classes: `(&(|...)(|...))`, one group per set
    ///
    /// Class names are lowercased.
    #[must_use]
    pub fn only_related<'a>(class_sets: impl IntoIterator<Item = &'a [String]>) -> Self {
        let mut groups = class_sets
            .into_iter()
            .filter(|classes| !classes.is_empty())
            .map(|classes| {
                Self::or(
                    classes
                        .iter()
                        .map(|class| Self::equals(OBJECT_CLASS, class.to_ascii_lowercase())),
                )
            })
            .collect::<Vec<_>>();

        match groups.len() {
            0 => Self::present(OBJECT_CLASS),
            1 => groups.remove(0),
            _ => Self::And(groups),
        }
    }

    /// Renders the filter text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Equals { attribute, value } => {
                out.push('(');
                out.push_str(attribute);
                out.push('=');
                match value {
                    FilterValue::Text(text) => out.push_str(&escape(text)),
                    FilterValue::Binary(bytes) => out.push_str(&escape_bytes(bytes)),
                }
                out.push(')');
            }
            Self::Present(attribute) => {
                out.push('(');
                out.push_str(attribute);
                out.push_str("=*)");
            }
            Self::And(filters) | Self::Or(filters) => {
                out.push_str(if matches!(self, Self::And(_)) { "(&" } else { "(|" });
                for filter in filters {
                    filter.write_to(out);
                }
                out.push(')');
            }
            Self::Not(filter) => {
                out.push_str("(!");
                filter.write_to(out);
                out.push(')');
            }
            Self::Raw(text) => out.push_str(text),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Escapes a text value for interpolation into a filter.
///
/// `*`, `(`, `)`, `\` and NUL are replaced by their `\xx` hex escapes.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escapes every byte of a binary value as `\xx`.
#[must_use]
pub fn escape_bytes(value: &[u8]) -> String {
    use std::fmt::Write;

    let mut escaped = String::with_capacity(value.len() * 3);
    for byte in value {
        // Writing to a String cannot fail.
        let _ = write!(escaped, "\\{byte:02x}");
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn escapes_metacharacters() {
        assert_eq!(escape("a*b(c)d\\e\0f"), "a\\2ab\\28c\\29d\\5ce\\00f");
        assert_eq!(escape("Jürgen"), "Jürgen");
        assert_eq!(escape_bytes(&[0x01, 0xab, 0x00]), "\\01\\ab\\00");
    }

    #[test]
    fn renders_nested_filters() {
        let filter = Filter::and([
            Filter::equals("member", "cn=x*,dc=example,dc=com"),
            Filter::or([Filter::present("mail"), Filter::not(Filter::equals("cn", "y"))]),
        ]);
        assert_eq!(
            filter.render(),
            "(&(member=cn=x\\2a,dc=example,dc=com)(|(mail=*)(!(cn=y))))"
        );
    }

    #[test]
    fn raw_filters_are_parenthesized() {
        assert_eq!(Filter::raw("cn=foo").render(), "(cn=foo)");
        assert_eq!(Filter::raw("(cn=foo)").render(), "(cn=foo)");
    }

    #[test]
    fn only_related_single_type() {
        let user = classes(&["top", "person", "organizationalPerson", "user"]);
        assert_eq!(
            Filter::only_related([user.as_slice()]).render(),
            "(|(objectclass=top)(objectclass=person)(objectclass=organizationalperson)(objectclass=user))"
        );
    }

    #[test]
    fn only_related_without_classes() {
        let none: Vec<String> = Vec::new();
        assert_eq!(
            Filter::only_related([none.as_slice()]).render(),
            "(objectclass=*)"
        );
        assert_eq!(
            Filter::only_related(std::iter::empty()).render(),
            "(objectclass=*)"
        );
    }

    #[test]
    fn only_related_polymorphic() {
        let user = classes(&["top", "person", "organizationalperson", "user"]);
        let group = classes(&["top", "group"]);
        assert_eq!(
            Filter::only_related([user.as_slice(), group.as_slice()]).render(),
            "(&(|(objectclass=top)(objectclass=person)(objectclass=organizationalperson)(objectclass=user))(|(objectclass=top)(objectclass=group)))"
        );
    }
}
