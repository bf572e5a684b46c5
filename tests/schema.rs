//! Schema building through the public registry API.

mod common;

use std::any::TypeId;
use std::sync::Arc;

use common::{Article, ArticleTag, Comment, Profile, Tag, User};
use lifeline::{
    ColumnKind, Error, KeyStrategy, KeyType, LifelineConfig, Model, ModelBuilder, Registry,
    RelationKind,
};
use pretty_assertions::assert_eq;
use sea_query::Value;

#[test]
fn test_default_column_names_are_snake_case() {
    let registry = Registry::new();
    let schema = registry.schema::<User>().expect("valid model");

    assert_eq!(schema.columns(), vec!["id", "first_name", "username"]);
    assert_eq!(schema.field("FirstName").map(|f| f.column_name()), Some("first_name"));
    assert_eq!(schema.field("Username").map(|f| f.column_name()), Some("username"));
    assert_eq!(schema.primary_key().column_name(), "id");
    assert_eq!(schema.primary_key().key_type(), KeyType::Integer);
}

#[test]
fn test_relation_kinds_are_inferred() {
    let registry = Registry::new();
    let user = registry.schema::<User>().expect("valid model");
    let article = registry.schema::<Article>().expect("valid model");

    let kinds: Vec<_> = user.relations().map(|r| (r.name(), r.kind())).collect();
    assert_eq!(
        kinds,
        vec![
            ("Profile", RelationKind::OneToOne),
            ("Articles", RelationKind::OneToMany)
        ]
    );

    let author = article.relation("author").expect("inferred");
    assert_eq!(author.kind(), RelationKind::ManyToOne);
    assert_eq!(author.source().column(), "author_id");
    assert!(author.source().is_optional());
    assert_eq!(author.reference().column(), "id");
    assert_eq!(author.target().table_name(), "users");

    let tags = article.relation("tags").expect("inferred");
    assert_eq!(tags.kind(), RelationKind::ManyToMany);
    let through = tags.through().expect("join table");
    assert_eq!(through.table(), "article_tags");
    assert_eq!(through.owner_column(), "article_id");
    assert_eq!(through.target_column(), "tag_id");

    let comments = article.relation("comments").expect("inferred");
    assert_eq!(comments.kind(), RelationKind::OneToMany);
}

#[test]
fn test_dependencies_are_cached_together() {
    let registry = Registry::new();
    let article = registry.schema::<Article>().expect("valid model");

    for type_id in [
        TypeId::of::<User>(),
        TypeId::of::<Profile>(),
        TypeId::of::<Tag>(),
        TypeId::of::<ArticleTag>(),
        TypeId::of::<Comment>(),
    ] {
        assert!(registry.get(type_id).is_some());
    }

    let user = registry.schema::<User>().expect("cached");
    let author = article
        .relation("author")
        .expect("inferred")
        .target_schema(&registry)
        .expect("cached");
    assert!(Arc::ptr_eq(&user, &author));
}

#[test]
fn test_schemas_are_deterministic() {
    let first = Registry::new().schema::<Article>().expect("valid model");
    let second = Registry::new();
    // Build through a different entry point so the cache fills in another order.
    second.schema::<User>().expect("valid model");
    let second = second.schema::<Article>().expect("valid model");
    assert_eq!(*first, *second);
}

#[test]
fn test_soft_delete_key() {
    let registry = Registry::new();
    let comment = registry.schema::<Comment>().expect("valid model");
    let deleted = comment.deleted_key().expect("deleted_at");
    assert_eq!(deleted.column_name(), "deleted_at");
    assert_eq!(deleted.kind(), ColumnKind::DateTime);
    assert!(deleted.is_nullable());
}

#[derive(Clone, Debug, Default)]
struct Keyless {
    name: String,
}

impl Model for Keyless {
    fn table_name() -> &'static str {
        "keyless"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model.column("name", "", |k| &k.name, |k| &mut k.name);
    }
}

#[derive(Clone, Debug, Default)]
struct TwoKeys {
    a: i64,
    b: i64,
}

impl Model for TwoKeys {
    fn table_name() -> &'static str {
        "two_keys"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("a", r#"ll:"pk""#, |t| &t.a, |t| &mut t.a)
            .column("b", r#"lifeline:"pk""#, |t| &t.b, |t| &mut t.b);
    }
}

#[derive(Clone, Debug, Default)]
struct FloatKey {
    id: f64,
}

impl Model for FloatKey {
    fn table_name() -> &'static str {
        "float_keys"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model.column("id", "", |f| &f.id, |f| &mut f.id);
    }
}

#[derive(Clone, Debug, Default)]
struct BareForeignKey {
    id: i64,
    owner_id: i64,
}

impl Model for BareForeignKey {
    fn table_name() -> &'static str {
        "bare_foreign_keys"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |b| &b.id, |b| &mut b.id)
            .column("owner_id", r#"ll:"fk""#, |b| &b.owner_id, |b| &mut b.owner_id);
    }
}

#[test]
fn test_primary_key_errors() {
    let registry = Registry::new();
    assert!(matches!(
        registry.schema::<Keyless>(),
        Err(Error::MissingPrimaryKey { ref model }) if model == "Keyless"
    ));
    match registry.schema::<TwoKeys>() {
        Err(Error::DuplicatePrimaryKey { first, second, .. }) => {
            assert_eq!(first, "a");
            assert_eq!(second, "b");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        registry.schema::<FloatKey>(),
        Err(Error::InvalidPrimaryKeyType { ref kind, .. }) if kind == "float"
    ));
    assert!(matches!(
        registry.schema::<BareForeignKey>(),
        Err(Error::UnresolvableReference { ref field, .. }) if field == "owner_id"
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_configured_primary_key() {
    let mut config = LifelineConfig::default();
    config.schema.primary_key = "name".to_string();
    let registry = Registry::with_config(&config);
    let schema = registry.schema::<Keyless>().expect("name is the key");
    assert_eq!(schema.primary_key().key_type(), KeyType::String);
}

#[derive(Clone, Debug, Default)]
struct Session {
    token: String,
}

impl Model for Session {
    fn table_name() -> &'static str {
        "sessions"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model.column("token", r#"ll:"pk:ulid""#, |s| &s.token, |s| &mut s.token);
    }
}

#[derive(Clone, Debug, Default)]
struct Event {
    id: uuid::Uuid,
}

impl Model for Event {
    fn table_name() -> &'static str {
        "events"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model.column("id", r#"ll:"pk:uuid-v1""#, |e| &e.id, |e| &mut e.id);
    }
}

#[test]
fn test_generated_primary_keys() {
    let registry = Registry::new();

    let session = registry.schema::<Session>().expect("valid model");
    assert_eq!(session.primary_key().strategy(), KeyStrategy::Ulid);
    match session.primary_key().generate() {
        Some(Value::String(Some(token))) => {
            assert_eq!(token.len(), 26);
            assert!(ulid::Ulid::from_string(&token).is_ok());
        }
        other => panic!("unexpected {:?}", other),
    }

    let event = registry.schema::<Event>().expect("valid model");
    assert_eq!(event.primary_key().strategy(), KeyStrategy::UuidV1);
    match event.primary_key().generate() {
        Some(Value::Uuid(Some(id))) => assert_eq!(id.get_version_num(), 1),
        other => panic!("unexpected {:?}", other),
    }

    let user = registry.schema::<User>().expect("valid model");
    assert_eq!(user.primary_key().strategy(), KeyStrategy::Database);
    assert_eq!(user.primary_key().generate(), None);
}
