//! Field annotation parsing.
//!
//! A field may carry a raw Go-style struct tag such as
//! `ll:"column:user_name,pk" db:"user_name"`. [`parse`] reads the configured
//! namespaces out of it and merges their properties into one [`Tags`] list
//! under the canonical namespace. Parsing never fails: malformed fragments
//! are skipped.

use std::collections::HashMap;

use crate::config::TagConfig;

/// Property keys understood by the schema builder.
pub mod keys {
    pub const EXCLUDED: &str = "-";
    pub const COLUMN: &str = "column";
    pub const PRIMARY_KEY: &str = "pk";
    pub const FOREIGN_KEY: &str = "fk";
    pub const DEFAULT: &str = "default";
    pub const RELATION: &str = "relation";
}

/// Value recorded for a bare key.
pub const TRUE: &str = "true";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagProperty {
    key: String,
    value: String,
}

impl TagProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    properties: Vec<TagProperty>,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[TagProperty] {
        &self.properties
    }

    /// Value of the first property with this key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.iter().any(|p| p.key == key)
    }
}

/// Ordered list of parsed tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.0.iter().find(|t| t.name == name)
    }

    /// Append a property to the named tag, creating the tag if needed.
    pub fn set(&mut self, name: &str, property: TagProperty) {
        match self.0.iter_mut().find(|t| t.name == name) {
            Some(tag) => tag.properties.push(property),
            None => self.0.push(Tag {
                name: name.to_string(),
                properties: vec![property],
            }),
        }
    }

    pub fn has_key(&self, name: &str, key: &str) -> bool {
        self.get(name).is_some_and(|t| t.has(key))
    }

    pub fn get_by_key(&self, name: &str, key: &str) -> Option<&str> {
        self.get(name).and_then(|t| t.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }
}

/// How raw tags are read.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    pub name: String,
    pub namespaces: Vec<String>,
    pub column_namespaces: Vec<String>,
    pub key_aliases: HashMap<String, String>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::from(&TagConfig::default())
    }
}

impl From<&TagConfig> for AnalyzerOptions {
    fn from(config: &TagConfig) -> Self {
        Self {
            name: config.name.clone(),
            namespaces: config.namespaces.clone(),
            column_namespaces: config.column_namespaces.clone(),
            key_aliases: config.key_aliases.clone(),
        }
    }
}

impl AnalyzerOptions {
    /// Read a single namespace whose bare values are column names.
    pub fn column_only(namespace: &str) -> Self {
        Self {
            name: namespace.to_string(),
            namespaces: vec![namespace.to_string()],
            column_namespaces: vec![namespace.to_string()],
            key_aliases: HashMap::new(),
        }
    }
}

/// Parse a raw field tag.
pub fn parse(raw: &str, options: &AnalyzerOptions) -> Tags {
    let mut tags = Tags::default();
    let mut seen: Vec<&str> = Vec::with_capacity(options.namespaces.len());

    for namespace in &options.namespaces {
        if seen.contains(&namespace.as_str()) {
            continue;
        }
        seen.push(namespace);

        let Some(value) = lookup(raw, namespace) else {
            continue;
        };
        let column_only = options.column_namespaces.iter().any(|n| n == namespace);

        for fragment in value.split([',', ';']).map(str::trim) {
            if fragment.is_empty() {
                continue;
            }
            if let Some(property) = parse_fragment(fragment, column_only, options) {
                tags.set(&options.name, property);
            }
        }
    }

    tags
}

fn parse_fragment(fragment: &str, column_only: bool, options: &AnalyzerOptions) -> Option<TagProperty> {
    if fragment == keys::EXCLUDED {
        return Some(TagProperty::new(keys::EXCLUDED, TRUE));
    }
    if column_only {
        return Some(TagProperty::new(keys::COLUMN, fragment));
    }

    let (key, value) = match fragment.split_once(':') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (fragment, None),
    };
    if key.is_empty() {
        return None;
    }
    let key = options
        .key_aliases
        .get(key)
        .map(String::as_str)
        .unwrap_or(key);

    match value {
        None => Some(TagProperty::new(key, TRUE)),
        Some("") => None,
        Some(value) => Some(TagProperty::new(key, value)),
    }
}

/// Extract the quoted value of `namespace` from a struct tag string.
///
/// Follows the conventional `name:"value" name2:"value2"` layout. Returns
/// `None` when the namespace is absent or the tag is malformed before it.
pub fn lookup(raw: &str, namespace: &str) -> Option<String> {
    let mut rest = raw;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }

        let colon = rest.find(':')?;
        let name = &rest[..colon];
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains('"') {
            return None;
        }
        rest = &rest[colon + 1..];
        rest = rest.strip_prefix('"')?;

        let (value, consumed) = read_quoted(rest)?;
        rest = &rest[consumed..];
        if name == namespace {
            return Some(value);
        }
    }
}

/// Read up to the closing quote, unescaping `\"` and `\\`. Returns the value
/// and the number of bytes consumed including the closing quote.
fn read_quoted(input: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, i + 1)),
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            }
            _ => value.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AnalyzerOptions {
        AnalyzerOptions::default()
    }

    #[test]
    fn test_lookup_multiple_namespaces() {
        let raw = r#"json:"name,omitempty" ll:"column:user_name" db:"user_name""#;
        assert_eq!(lookup(raw, "ll").as_deref(), Some("column:user_name"));
        assert_eq!(lookup(raw, "db").as_deref(), Some("user_name"));
        assert_eq!(lookup(raw, "json").as_deref(), Some("name,omitempty"));
        assert_eq!(lookup(raw, "yaml"), None);
    }

    #[test]
    fn test_lookup_escaped_quote() {
        let raw = r#"ll:"default:\"draft\"""#;
        assert_eq!(lookup(raw, "ll").as_deref(), Some(r#"default:"draft""#));
    }

    #[test]
    fn test_lookup_malformed() {
        assert_eq!(lookup(r#"ll:column"#, "ll"), None);
        assert_eq!(lookup(r#"ll:"column"#, "ll"), None);
        assert_eq!(lookup("", "ll"), None);
    }

    #[test]
    fn test_parse_rich_form() {
        let tags = parse(r#"ll:"column:user_id, pk; default:nextval('users_id_seq')""#, &options());
        let tag = tags.get("lifeline").expect("tag");
        assert_eq!(tag.get(keys::COLUMN), Some("user_id"));
        assert_eq!(tag.get(keys::PRIMARY_KEY), Some(TRUE));
        assert_eq!(tag.get(keys::DEFAULT), Some("nextval('users_id_seq')"));
    }

    #[test]
    fn test_parse_value_with_colon() {
        let tags = parse(r#"ll:"default:'12:00'::time""#, &options());
        assert_eq!(tags.get_by_key("lifeline", keys::DEFAULT), Some("'12:00'::time"));
    }

    #[test]
    fn test_parse_key_aliases() {
        let tags = parse(r#"lifeline:"col:name,rel:owner_id""#, &options());
        assert_eq!(tags.get_by_key("lifeline", keys::COLUMN), Some("name"));
        assert_eq!(tags.get_by_key("lifeline", keys::RELATION), Some("owner_id"));
    }

    #[test]
    fn test_parse_column_namespace() {
        let tags = parse(r#"db:"first_name""#, &options());
        assert_eq!(tags.get_by_key("lifeline", keys::COLUMN), Some("first_name"));
        assert!(!tags.has_key("lifeline", keys::EXCLUDED));
    }

    #[test]
    fn test_parse_excluded() {
        let tags = parse(r#"db:"-""#, &options());
        assert!(tags.has_key("lifeline", keys::EXCLUDED));
        assert_eq!(tags.get_by_key("lifeline", keys::EXCLUDED), Some(TRUE));

        let tags = parse(r#"ll:"-""#, &options());
        assert!(tags.has_key("lifeline", keys::EXCLUDED));
    }

    #[test]
    fn test_parse_merges_namespaces_in_order() {
        let tags = parse(r#"db:"author" ll:"fk:users""#, &options());
        let tag = tags.get("lifeline").expect("tag");
        let keys: Vec<_> = tag.properties().iter().map(TagProperty::key).collect();
        assert_eq!(keys, vec![keys::FOREIGN_KEY, keys::COLUMN]);
        assert_eq!(tags.iter().count(), 1);
    }

    #[test]
    fn test_parse_skips_malformed_fragments() {
        let tags = parse(r#"ll:"column:,:orphan,,pk""#, &options());
        let tag = tags.get("lifeline").expect("tag");
        assert_eq!(tag.properties(), &[TagProperty::new(keys::PRIMARY_KEY, TRUE)]);
    }

    #[test]
    fn test_parse_ignores_unknown_namespaces() {
        let tags = parse(r#"json:"id" yaml:"id""#, &options());
        assert!(tags.is_empty());
        assert!(parse("", &options()).is_empty());
    }

    #[test]
    fn test_column_only_options() {
        let tags = parse(r#"sql:"user_name" ll:"pk""#, &AnalyzerOptions::column_only("sql"));
        assert_eq!(tags.get_by_key("sql", keys::COLUMN), Some("user_name"));
        assert!(!tags.has_key("sql", keys::PRIMARY_KEY));
    }

    #[test]
    fn test_set_appends_to_existing_tag() {
        let mut tags = Tags::default();
        tags.set("lifeline", TagProperty::new("pk", TRUE));
        tags.set("lifeline", TagProperty::new("column", "id"));
        tags.set("other", TagProperty::new("x", "y"));
        assert_eq!(tags.get("lifeline").map(|t| t.properties().len()), Some(2));
        assert_eq!(tags.get_by_key("other", "x"), Some("y"));
    }
}
