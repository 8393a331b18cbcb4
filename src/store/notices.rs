use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    feed::{Change, ChangeFeed},
    model::{self, NewNotice, Notice, NoticeCategory, NoticePatch, Profile},
    PortalError,
};

use super::require_admin;

#[derive(FromRow)]
struct NoticeRow {
    id: String,
    title: String,
    description: String,
    category: String,
    created_at: i64,
    updated_at: i64,
    file_url: Option<String>,
}

impl TryFrom<NoticeRow> for Notice {
    type Error = PortalError;

    fn try_from(row: NoticeRow) -> Result<Self, Self::Error> {
        Ok(Notice {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category.parse()?,
            created_at: model::from_millis(row.created_at)?,
            updated_at: model::from_millis(row.updated_at)?,
            file_url: row.file_url,
        })
    }
}

#[derive(Clone)]
pub struct NoticeRepository {
    db_pool: SqlitePool,
    feed: ChangeFeed,
}

impl NoticeRepository {
    pub fn new(db_pool: SqlitePool, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }

    /// Newest first, optionally narrowed to one category.
    pub async fn list(
        &self,
        filter: Option<NoticeCategory>,
        limit: Option<u32>,
    ) -> Result<Vec<Notice>, PortalError> {
        let category = filter.map(|category| category.as_str());
        let limit = limit.map_or(-1, i64::from);

        let rows: Vec<NoticeRow> = sqlx::query_as(
            "SELECT id,title,description,category,created_at,updated_at,file_url FROM notices \
             WHERE (? IS NULL OR category = ?) \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(category)
        .bind(category)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Notice::try_from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Notice, PortalError> {
        let row: Option<NoticeRow> = sqlx::query_as(
            "SELECT id,title,description,category,created_at,updated_at,file_url FROM notices WHERE id=?",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or_else(|| PortalError::not_found("notice", id))?.try_into()
    }

    pub async fn create(&self, actor: &Profile, notice: NewNotice) -> Result<String, PortalError> {
        require_admin(actor, "create notices")?;

        let id = Uuid::now_v7().to_string();
        let now = model::to_millis(model::now());
        sqlx::query("INSERT INTO notices (id,title,description,category,created_at,updated_at,file_url) VALUES (?,?,?,?,?,?,?)")
            .bind(&id)
            .bind(&notice.title)
            .bind(&notice.description)
            .bind(notice.category.as_str())
            .bind(now)
            .bind(now)
            .bind(&notice.file_url)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(%id, category = %notice.category, "notice created");
        self.feed.emit(Change::Notice { id: id.clone() });
        Ok(id)
    }

    /// Keeps `created_at`; bumps `updated_at`.
    pub async fn update(&self, actor: &Profile, id: &str, patch: NoticePatch) -> Result<(), PortalError> {
        require_admin(actor, "edit notices")?;

        let updated = sqlx::query(
            "UPDATE notices SET \
                title = COALESCE(?, title), \
                description = COALESCE(?, description), \
                category = COALESCE(?, category), \
                file_url = COALESCE(?, file_url), \
                updated_at = ? \
             WHERE id = ?",
        )
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.category.map(|category| category.as_str()))
        .bind(&patch.file_url)
        .bind(model::to_millis(model::now()))
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PortalError::not_found("notice", id));
        }
        tracing::info!(%id, "notice updated");
        self.feed.emit(Change::Notice { id: id.to_owned() });
        Ok(())
    }

    pub async fn delete(&self, actor: &Profile, id: &str) -> Result<(), PortalError> {
        require_admin(actor, "delete notices")?;

        let deleted = sqlx::query("DELETE FROM notices WHERE id=?")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(PortalError::not_found("notice", id));
        }
        tracing::info!(%id, "notice deleted");
        self.feed.emit(Change::Notice { id: id.to_owned() });
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, PortalError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notices")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }
}
