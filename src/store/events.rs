//! Events and their registration ledger.
//!
//! The ledger is a JSON array stored inline on the event row. Adding and
//! removing a student are set operations executed by the database in a
//! single statement, so concurrent registrations from different students
//! never overwrite one another. Where that is not wanted,
//! [`LedgerStrategy::CompareAndRetry`] rewrites the whole array guarded by
//! the row's version counter instead.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    feed::{Change, ChangeFeed},
    model::{self, Event, EventOrder, EventPatch, NewEvent, Profile, RegistrationState},
    PortalError,
};

use super::{require_admin, require_self};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerStrategy {
    /// Set union / difference inside one UPDATE.
    #[default]
    Atomic,
    /// Read, compute, write-if-unchanged; give up after `max_attempts`.
    CompareAndRetry { max_attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerOp {
    Add,
    Remove,
}

impl LedgerOp {
    fn resulting_state(self) -> RegistrationState {
        match self {
            LedgerOp::Add => RegistrationState::Registered,
            LedgerOp::Remove => RegistrationState::Unregistered,
        }
    }

    /// Applies the op to an in-memory ledger. Returns whether it changed.
    fn apply(self, ledger: &mut Vec<String>, student_id: &str) -> bool {
        let present = ledger.iter().any(|id| id == student_id);
        match (self, present) {
            (LedgerOp::Add, false) => {
                ledger.push(student_id.to_owned());
                true
            },
            (LedgerOp::Remove, true) => {
                ledger.retain(|id| id != student_id);
                true
            },
            _ => false,
        }
    }
}

const BACKOFF_BASE_MS: u64 = 5;

#[derive(FromRow)]
struct EventRow {
    id: String,
    name: String,
    description: String,
    date: i64,
    venue: String,
    organizer: String,
    file_url: Option<String>,
    registered_students: String,
}

impl TryFrom<EventRow> for Event {
    type Error = PortalError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            name: row.name,
            description: row.description,
            date: model::from_millis(row.date)?,
            venue: row.venue,
            organizer: row.organizer,
            file_url: row.file_url,
            registered_students: serde_json::from_str(&row.registered_students)?,
        })
    }
}

const EVENT_COLUMNS: &str =
    "id,name,description,date,venue,organizer,file_url,registered_students";

#[derive(Clone)]
pub struct EventRepository {
    db_pool: SqlitePool,
    feed: ChangeFeed,
    strategy: LedgerStrategy,
}

impl EventRepository {
    pub fn new(db_pool: SqlitePool, feed: ChangeFeed, strategy: LedgerStrategy) -> Self {
        Self { db_pool, feed, strategy }
    }

    pub async fn list(&self, order: EventOrder, limit: Option<u32>) -> Result<Vec<Event>, PortalError> {
        let sql = match order {
            EventOrder::Ascending => format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY date ASC, id ASC LIMIT ?"),
            EventOrder::Descending => format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY date DESC, id DESC LIMIT ?"),
        };
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(limit.map_or(-1, i64::from))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Event, PortalError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id=?");
        let row: Option<EventRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        row.ok_or_else(|| PortalError::not_found("event", id))?.try_into()
    }

    /// New events start with an empty ledger.
    pub async fn create(&self, actor: &Profile, event: NewEvent) -> Result<String, PortalError> {
        require_admin(actor, "create events")?;

        let id = Uuid::now_v7().to_string();
        let now = model::to_millis(model::now());
        sqlx::query("INSERT INTO events (id,name,description,date,venue,organizer,file_url,created_at,updated_at,registered_students) VALUES (?,?,?,?,?,?,?,?,?,'[]')")
            .bind(&id)
            .bind(&event.name)
            .bind(&event.description)
            .bind(model::to_millis(event.date))
            .bind(&event.venue)
            .bind(&event.organizer)
            .bind(&event.file_url)
            .bind(now)
            .bind(now)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(%id, name = %event.name, "event created");
        self.feed.emit(Change::Event { id: id.clone() });
        Ok(id)
    }

    /// Rewrites event details. The ledger and version are left alone so an
    /// edit never races with registrations.
    pub async fn update(&self, actor: &Profile, id: &str, patch: EventPatch) -> Result<(), PortalError> {
        require_admin(actor, "edit events")?;

        let updated = sqlx::query(
            "UPDATE events SET \
                name = COALESCE(?, name), \
                description = COALESCE(?, description), \
                date = COALESCE(?, date), \
                venue = COALESCE(?, venue), \
                organizer = COALESCE(?, organizer), \
                file_url = COALESCE(?, file_url), \
                updated_at = ? \
             WHERE id = ?",
        )
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.date.map(model::to_millis))
        .bind(&patch.venue)
        .bind(&patch.organizer)
        .bind(&patch.file_url)
        .bind(model::to_millis(model::now()))
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PortalError::not_found("event", id));
        }
        tracing::info!(%id, "event updated");
        self.feed.emit(Change::Event { id: id.to_owned() });
        Ok(())
    }

    pub async fn delete(&self, actor: &Profile, id: &str) -> Result<(), PortalError> {
        require_admin(actor, "delete events")?;

        let deleted = sqlx::query("DELETE FROM events WHERE id=?")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(PortalError::not_found("event", id));
        }
        tracing::info!(%id, "event deleted");
        self.feed.emit(Change::Event { id: id.to_owned() });
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, PortalError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    pub async fn registration_total(&self) -> Result<i64, PortalError> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(json_array_length(registered_students)), 0) FROM events")
                .fetch_one(&self.db_pool)
                .await?;
        Ok(total)
    }

    pub async fn add_registrant(&self, actor: &Profile, event_id: &str, student_id: &str) -> Result<(), PortalError> {
        self.mutate_ledger(actor, event_id, student_id, LedgerOp::Add).await
    }

    pub async fn remove_registrant(&self, actor: &Profile, event_id: &str, student_id: &str) -> Result<(), PortalError> {
        self.mutate_ledger(actor, event_id, student_id, LedgerOp::Remove).await
    }

    /// Flips the actor's registration based on the ledger as read right now.
    pub async fn toggle_registration(&self, actor: &Profile, event_id: &str) -> Result<RegistrationState, PortalError> {
        let observed = RegistrationState::from_membership(self.get(event_id).await?.is_registered(&actor.uid));
        self.set_registration(actor, event_id, observed.flipped()).await
    }

    async fn mutate_ledger(
        &self,
        actor: &Profile,
        event_id: &str,
        student_id: &str,
        op: LedgerOp,
    ) -> Result<(), PortalError> {
        require_self(actor, student_id)?;

        let changed = match self.strategy {
            LedgerStrategy::Atomic => self.apply_atomic(event_id, student_id, op).await?,
            LedgerStrategy::CompareAndRetry { max_attempts } => {
                self.apply_with_retry(event_id, student_id, op, max_attempts).await?
            },
        };
        if !changed {
            return Ok(());
        }

        tracing::debug!(event_id, student_id, ?op, "ledger updated");
        self.feed.emit(Change::Registration {
            event_id: event_id.to_owned(),
            student_id: student_id.to_owned(),
            state: op.resulting_state(),
        });
        Ok(())
    }

    /// Returns whether the ledger changed.
    async fn apply_atomic(&self, event_id: &str, student_id: &str, op: LedgerOp) -> Result<bool, PortalError> {
        let result = match op {
            LedgerOp::Add => {
                sqlx::query(
                    "UPDATE events SET \
                        registered_students = json_insert(registered_students, '$[#]', ?), \
                        version = version + 1 \
                     WHERE id = ? \
                       AND NOT EXISTS (SELECT 1 FROM json_each(events.registered_students) WHERE value = ?)",
                )
                .bind(student_id)
                .bind(event_id)
                .bind(student_id)
                .execute(&self.db_pool)
                .await?
            },
            LedgerOp::Remove => {
                sqlx::query(
                    "UPDATE events SET \
                        registered_students = ( \
                            SELECT json_group_array(value) FROM json_each(events.registered_students) WHERE value <> ? \
                        ), \
                        version = version + 1 \
                     WHERE id = ? \
                       AND EXISTS (SELECT 1 FROM json_each(events.registered_students) WHERE value = ?)",
                )
                .bind(student_id)
                .bind(event_id)
                .bind(student_id)
                .execute(&self.db_pool)
                .await?
            },
        };

        if result.rows_affected() == 0 {
            // either a no-op on the set or a missing event
            self.ensure_exists(event_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn apply_with_retry(
        &self,
        event_id: &str,
        student_id: &str,
        op: LedgerOp,
        max_attempts: u32,
    ) -> Result<bool, PortalError> {
        let max_attempts = max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let row: Option<(String, i64)> =
                sqlx::query_as("SELECT registered_students,version FROM events WHERE id=?")
                    .bind(event_id)
                    .fetch_optional(&self.db_pool)
                    .await?;
            let Some((stored, version)) = row else {
                return Err(PortalError::not_found("event", event_id));
            };

            let mut ledger: Vec<String> = serde_json::from_str(&stored)?;
            if !op.apply(&mut ledger, student_id) {
                return Ok(false);
            }

            let written = sqlx::query(
                "UPDATE events SET registered_students = ?, version = version + 1 WHERE id = ? AND version = ?",
            )
            .bind(serde_json::to_string(&ledger)?)
            .bind(event_id)
            .bind(version)
            .execute(&self.db_pool)
            .await?;

            if written.rows_affected() == 1 {
                return Ok(true);
            }

            tracing::debug!(event_id, attempt, "ledger write conflict, retrying");
            let jitter = rand::random_range(0..=BACKOFF_BASE_MS * u64::from(attempt));
            tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS + jitter)).await;
        }

        tracing::warn!(event_id, student_id, max_attempts, "ledger retries exhausted");
        Err(PortalError::Conflict { attempts: max_attempts })
    }

    async fn ensure_exists(&self, event_id: &str) -> Result<(), PortalError> {
        let found = sqlx::query("SELECT 1 FROM events WHERE id=?")
            .bind(event_id)
            .fetch_optional(&self.db_pool)
            .await?;
        if found.is_none() {
            return Err(PortalError::not_found("event", event_id));
        }
        Ok(())
    }
}

/// The registration half of the event repository, as seen by views.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Drives the actor's membership to `target` and returns the new state.
    async fn set_registration(
        &self,
        actor: &Profile,
        event_id: &str,
        target: RegistrationState,
    ) -> Result<RegistrationState, PortalError>;
}

#[async_trait]
impl Ledger for EventRepository {
    async fn set_registration(
        &self,
        actor: &Profile,
        event_id: &str,
        target: RegistrationState,
    ) -> Result<RegistrationState, PortalError> {
        match target {
            RegistrationState::Registered => self.add_registrant(actor, event_id, &actor.uid).await?,
            RegistrationState::Unregistered => self.remove_registrant(actor, event_id, &actor.uid).await?,
        }
        Ok(target)
    }
}
