//! Models shared by the integration tests.
//!
//! Relationships:
//! - User has one Profile (one-to-one) and many Articles (one-to-many)
//! - Article belongs to User through `AuthorID` (many-to-one)
//! - Article has many Tags through ArticleTag (many-to-many)
//! - Article has many Comments, which are soft-deleted
//! - Bucket has many Directories, which have many Files

#![allow(dead_code)]

use chrono::NaiveDateTime;
use lifeline::{Model, ModelBuilder, Nullable, Row};

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: String,
    pub profile: Option<Profile>,
    pub articles: Vec<Article>,
}

impl Model for User {
    fn table_name() -> &'static str {
        "users"
    }

    // Declared with Go-style field names so column names go through the
    // default snake_case conversion; relation paths use these names too.
    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("ID", r#"ll:"pk""#, |u| &u.id, |u| &mut u.id)
            .column("FirstName", "", |u| &u.first_name, |u| &mut u.first_name)
            .column("Username", "", |u| &u.username, |u| &mut u.username)
            .one("Profile", "", |u| &u.profile, |u| &mut u.profile)
            .many("Articles", "", |u| &u.articles, |u| &mut u.articles);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
}

impl Model for Profile {
    fn table_name() -> &'static str {
        "profiles"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |p| &p.id, |p| &mut p.id)
            .column("user_id", r#"ll:"fk:users""#, |p| &p.user_id, |p| &mut p.user_id)
            .column("bio", "", |p| &p.bio, |p| &mut p.bio);
    }
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub author_id: Nullable<i64>,
    pub author: Option<User>,
    pub tags: Vec<Tag>,
    pub comments: Vec<Comment>,
}

impl Model for Article {
    fn table_name() -> &'static str {
        "articles"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |a| &a.id, |a| &mut a.id)
            .column("title", "", |a| &a.title, |a| &mut a.title)
            .column("AuthorID", r#"ll:"fk:users""#, |a| &a.author_id, |a| &mut a.author_id)
            .one("author", "", |a| &a.author, |a| &mut a.author)
            .many_through::<Tag, ArticleTag>("tags", "", |a| &a.tags, |a| &mut a.tags)
            .many("comments", "", |a| &a.comments, |a| &mut a.comments);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Model for Tag {
    fn table_name() -> &'static str {
        "tags"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |t| &t.id, |t| &mut t.id)
            .column("name", "", |t| &t.name, |t| &mut t.name);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArticleTag {
    pub id: i64,
    pub article_id: i64,
    pub tag_id: i64,
}

impl Model for ArticleTag {
    fn table_name() -> &'static str {
        "article_tags"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |j| &j.id, |j| &mut j.id)
            .column("article_id", r#"ll:"fk:articles""#, |j| &j.article_id, |j| &mut j.article_id)
            .column("tag_id", r#"ll:"fk:tags""#, |j| &j.tag_id, |j| &mut j.tag_id);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub body: String,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Model for Comment {
    fn table_name() -> &'static str {
        "comments"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |c| &c.id, |c| &mut c.id)
            .column("article_id", r#"ll:"fk:articles""#, |c| &c.article_id, |c| &mut c.article_id)
            .column("body", "", |c| &c.body, |c| &mut c.body)
            .column("deleted_at", "", |c| &c.deleted_at, |c| &mut c.deleted_at);
    }
}

// ============================================================================
// Storage hierarchy
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bucket {
    pub id: i64,
    pub directories: Vec<Directory>,
}

impl Model for Bucket {
    fn table_name() -> &'static str {
        "buckets"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |b| &b.id, |b| &mut b.id)
            .many("directories", "", |b| &b.directories, |b| &mut b.directories);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Directory {
    pub id: i64,
    pub bucket_id: i64,
    pub files: Vec<File>,
}

impl Model for Directory {
    fn table_name() -> &'static str {
        "directories"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |d| &d.id, |d| &mut d.id)
            .column("bucket_id", r#"ll:"fk:buckets""#, |d| &d.bucket_id, |d| &mut d.bucket_id)
            .many("files", "", |d| &d.files, |d| &mut d.files);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct File {
    pub id: i64,
    pub directory_id: i64,
    pub name: String,
}

impl Model for File {
    fn table_name() -> &'static str {
        "files"
    }

    fn describe(model: &mut ModelBuilder<Self>) {
        model
            .column("id", "", |f| &f.id, |f| &mut f.id)
            .column(
                "directory_id",
                r#"ll:"fk:directories""#,
                |f| &f.directory_id,
                |f| &mut f.directory_id,
            )
            .column("name", "", |f| &f.name, |f| &mut f.name);
    }
}

// ============================================================================
// Rows
// ============================================================================

pub fn user_row(id: i64, first_name: &str, username: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("first_name", first_name)
        .with("username", username)
}

pub fn article(id: i64, author_id: Option<i64>) -> Article {
    Article {
        id,
        title: format!("article {id}"),
        author_id: Nullable::from(author_id),
        ..Default::default()
    }
}
