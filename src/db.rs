use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row, SqlitePool};

/// A persisted article, deduplicated globally by link. Articles are
/// immutable once stored; `updated_at` is never revised after creation.
///
/// Timestamps are RFC 3339 strings, exactly as stored and served.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub source_slug: String,
    pub source_name: String,
    pub title: String,
    pub summary: String,
    pub link: String,
    pub image_url: Option<String>,
    pub published_at: Option<String>,
    pub categories: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl FromRow<'_, SqliteRow> for Article {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let categories: String = row.try_get("categories")?;
        Ok(Self {
            id: row.try_get("id")?,
            source_slug: row.try_get("source_slug")?,
            source_name: row.try_get("source_name")?,
            title: row.try_get("title")?,
            summary: row.try_get("summary")?,
            link: row.try_get("link")?,
            image_url: row.try_get("image_url")?,
            published_at: row.try_get("published_at")?,
            categories: serde_json::from_str(&categories).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A new article as built by the ingestion coordinator, before it has a
/// row id. Timestamps become RFC 3339 TEXT at insertion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_slug: String,
    pub source_name: String,
    pub title: String,
    pub summary: String,
    pub link: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                source_slug TEXT NOT NULL,
                source_name TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL UNIQUE,
                image_url TEXT,
                published_at TEXT,
                categories TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_published
            ON articles(published_at DESC, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_source
            ON articles(source_slug)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn exists_by_link(&self, link: &str) -> anyhow::Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM articles WHERE link = ?)")
                .bind(link)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists.0)
    }

    /// Insert an article unless its link is already present. Returns
    /// whether a row was written, so a concurrent duplicate shows up as
    /// `false` rather than an error.
    pub async fn insert_article(&self, article: &NewArticle) -> anyhow::Result<bool> {
        let categories = serde_json::to_string(&article.categories)?;

        let result = sqlx::query(
            r#"
            INSERT INTO articles (
                source_slug, source_name, title, summary, link,
                image_url, published_at, categories, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            "#,
        )
        .bind(&article.source_slug)
        .bind(&article.source_name)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.link)
        .bind(&article.image_url)
        .bind(article.published_at.map(|p| p.to_rfc3339()))
        .bind(&categories)
        .bind(article.created_at.to_rfc3339())
        .bind(article.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest-first retrieval: primarily by publish time, with articles
    /// lacking one sorting after dated ones by ingestion recency.
    pub async fn find_articles(
        &self,
        source_slug: Option<&str>,
        limit: i64,
    ) -> anyhow::Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE ?1 IS NULL OR source_slug = ?1
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(source_slug)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn new_article(link: &str, slug: &str) -> NewArticle {
        NewArticle {
            source_slug: slug.to_string(),
            source_name: format!("{} News", slug),
            title: format!("Article at {}", link),
            summary: String::new(),
            link: link.to_string(),
            image_url: None,
            published_at: None,
            categories: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_creation() {
            let db = Database::new("sqlite::memory:").await;
            assert!(db.is_ok());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            let result = db.initialize().await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn test_fresh_database_is_empty() {
            let db = create_test_db().await;
            let articles = db.find_articles(None, 10).await.unwrap();
            assert!(articles.is_empty());
        }
    }

    mod insert_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_new_article() {
            let db = create_test_db().await;

            let inserted = db
                .insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap();
            assert!(inserted);

            let articles = db.find_articles(None, 10).await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].link, "https://example.com/a");
            assert_eq!(articles[0].source_slug, "bbc");
        }

        #[tokio::test]
        async fn test_duplicate_link_is_not_inserted() {
            let db = create_test_db().await;

            assert!(db
                .insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap());
            assert!(!db
                .insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap());

            let articles = db.find_articles(None, 10).await.unwrap();
            assert_eq!(articles.len(), 1);
        }

        #[tokio::test]
        async fn test_dedup_holds_across_sources() {
            let db = create_test_db().await;

            assert!(db
                .insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap());
            // Same story syndicated by a second source: still one row.
            assert!(!db
                .insert_article(&new_article("https://example.com/a", "ap"))
                .await
                .unwrap());

            let articles = db.find_articles(None, 10).await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].source_slug, "bbc");
        }

        #[tokio::test]
        async fn test_exists_by_link() {
            let db = create_test_db().await;

            assert!(!db.exists_by_link("https://example.com/a").await.unwrap());

            db.insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap();

            assert!(db.exists_by_link("https://example.com/a").await.unwrap());
            assert!(!db.exists_by_link("https://example.com/b").await.unwrap());
        }

        #[tokio::test]
        async fn test_categories_round_trip() {
            let db = create_test_db().await;

            let mut article = new_article("https://example.com/a", "bbc");
            article.categories = vec!["World".to_string(), "Politics".to_string()];
            db.insert_article(&article).await.unwrap();

            let articles = db.find_articles(None, 10).await.unwrap();
            assert_eq!(articles[0].categories, vec!["World", "Politics"]);
        }

        #[tokio::test]
        async fn test_optional_fields_absent() {
            let db = create_test_db().await;

            db.insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap();

            let articles = db.find_articles(None, 10).await.unwrap();
            assert!(articles[0].image_url.is_none());
            assert!(articles[0].published_at.is_none());
            assert!(articles[0].categories.is_empty());
            assert_eq!(articles[0].summary, "");
        }
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_filter_by_source_slug() {
            let db = create_test_db().await;

            db.insert_article(&new_article("https://example.com/a", "bbc"))
                .await
                .unwrap();
            db.insert_article(&new_article("https://example.com/b", "ap"))
                .await
                .unwrap();
            db.insert_article(&new_article("https://example.com/c", "bbc"))
                .await
                .unwrap();

            let bbc = db.find_articles(Some("bbc"), 10).await.unwrap();
            assert_eq!(bbc.len(), 2);
            assert!(bbc.iter().all(|a| a.source_slug == "bbc"));

            let unknown = db.find_articles(Some("nope"), 10).await.unwrap();
            assert!(unknown.is_empty());
        }

        #[tokio::test]
        async fn test_limit_applies() {
            let db = create_test_db().await;

            for i in 0..5 {
                db.insert_article(&new_article(&format!("https://example.com/{}", i), "bbc"))
                    .await
                    .unwrap();
            }

            let articles = db.find_articles(None, 3).await.unwrap();
            assert_eq!(articles.len(), 3);
        }

        #[tokio::test]
        async fn test_ordering_published_desc_nulls_last() {
            let db = create_test_db().await;
            let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

            // published T-3, created T-10
            let mut older = new_article("https://example.com/older", "bbc");
            older.published_at = Some(base - chrono::Duration::hours(3));
            older.created_at = base - chrono::Duration::hours(10);
            older.updated_at = older.created_at;

            // published T-1, created T-10
            let mut newer = new_article("https://example.com/newer", "bbc");
            newer.published_at = Some(base - chrono::Duration::hours(1));
            newer.created_at = base - chrono::Duration::hours(10);
            newer.updated_at = newer.created_at;

            // no publish time, created T-5
            let mut undated = new_article("https://example.com/undated", "bbc");
            undated.created_at = base - chrono::Duration::hours(5);
            undated.updated_at = undated.created_at;

            db.insert_article(&older).await.unwrap();
            db.insert_article(&newer).await.unwrap();
            db.insert_article(&undated).await.unwrap();

            let articles = db.find_articles(None, 10).await.unwrap();
            let links: Vec<_> = articles.iter().map(|a| a.link.as_str()).collect();
            assert_eq!(
                links,
                vec![
                    "https://example.com/newer",
                    "https://example.com/older",
                    "https://example.com/undated",
                ]
            );
        }

        #[tokio::test]
        async fn test_undated_articles_tie_break_on_created_at() {
            let db = create_test_db().await;
            let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

            let mut first = new_article("https://example.com/first", "bbc");
            first.created_at = base - chrono::Duration::hours(2);
            first.updated_at = first.created_at;

            let mut second = new_article("https://example.com/second", "bbc");
            second.created_at = base - chrono::Duration::hours(1);
            second.updated_at = second.created_at;

            db.insert_article(&first).await.unwrap();
            db.insert_article(&second).await.unwrap();

            let articles = db.find_articles(None, 10).await.unwrap();
            assert_eq!(articles[0].link, "https://example.com/second");
            assert_eq!(articles[1].link, "https://example.com/first");
        }
    }
}
