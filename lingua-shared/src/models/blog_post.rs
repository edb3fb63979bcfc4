/// Blog posts shown on the public site

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const POST_COLUMNS: &str =
    "id, slug, title, excerpt, body, author_id, published, published_at, created_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: Uuid,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBlogPost {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: Uuid,
    /// Publishes immediately when `true`
    pub published: bool,
}

impl BlogPost {
    pub async fn create(pool: &PgPool, data: CreateBlogPost) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO blog_posts (slug, title, excerpt, body, author_id, published, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 THEN NOW() END)
             RETURNING {POST_COLUMNS}"
        );

        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(data.slug)
            .bind(data.title)
            .bind(data.excerpt)
            .bind(data.body)
            .bind(data.author_id)
            .bind(data.published)
            .fetch_one(pool)
            .await
    }

    /// Published posts, newest first
    pub async fn list_published(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE published
             ORDER BY published_at DESC, id DESC"
        );
        sqlx::query_as::<_, BlogPost>(&sql).fetch_all(pool).await
    }

    pub async fn find_published(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = $1 AND published");
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }
}
