use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};

use crate::{
    CollectionPath, Document, DocumentId, DocumentQuery, Fields, Result, Revision, StoreError,
    store::{DocumentStore, SnapshotStream, WriteOptions},
};

/// Notification channel the `documents` trigger publishes collection paths on.
pub const CHANGE_CHANNEL: &str = "document_changes";

const COLUMNS: &str = "collection, id, fields, revision, created_at, updated_at";

/// PostgreSQL-backed document store implementation.
///
/// Documents live in a single JSONB table; live subscriptions are driven by
/// `LISTEN/NOTIFY` on [`CHANGE_CHANNEL`].
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(PgPool::connect(url).await?))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let fields: Value = row.try_get("fields")?;
        let fields: Fields = serde_json::from_value(fields)?;

        Ok(Document {
            id: DocumentId::new(row.try_get::<String, _>("id")?),
            collection: CollectionPath::new(row.try_get::<String, _>("collection")?),
            fields,
            revision: Revision::new(row.try_get("revision")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Locks the row and checks the expected revision inside `tx`.
    async fn lock_for_write(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        collection: &CollectionPath,
        id: &DocumentId,
        options: WriteOptions,
    ) -> Result<()> {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT revision FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection.as_str())
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        let actual = current
            .map(Revision::new)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.clone(),
                id: id.clone(),
            })?;

        if let Some(expected) = options.expected_revision
            && actual != expected
        {
            return Err(StoreError::ConcurrencyConflict {
                collection: collection.clone(),
                id: id.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

struct Subscription {
    store: PostgresDocumentStore,
    collection: CollectionPath,
    listener: PgListener,
    primed: bool,
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[tracing::instrument(skip(self, fields), fields(collection = %collection))]
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<Document> {
        let id = DocumentId::generate();
        let sql = format!(
            "INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(id.as_str())
            .bind(Value::Object(fields))
            .fetch_one(&self.pool)
            .await?;

        Self::row_to_document(row)
    }

    async fn get(&self, collection: &CollectionPath, id: &DocumentId) -> Result<Option<Document>> {
        let sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2");

        let row = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    #[tracing::instrument(skip(self, fields), fields(collection = %collection, id = %id))]
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        fields: Fields,
        options: WriteOptions,
    ) -> Result<Document> {
        let mut tx = self.pool.begin().await?;
        Self::lock_for_write(&mut tx, collection, id, options).await?;

        let sql = format!(
            r#"
            UPDATE documents
            SET fields = fields || $3, revision = revision + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(id.as_str())
            .bind(Value::Object(fields))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Self::row_to_document(row)
    }

    #[tracing::instrument(skip(self), fields(collection = %collection, id = %id))]
    async fn delete(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        options: WriteOptions,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_for_write(&mut tx, collection, id, options).await?;

        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND fields @> $2 ORDER BY seq ASC"
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .bind(query.collection.as_str())
            .bind(query.filter_object())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn subscribe(&self, collection: &CollectionPath) -> Result<SnapshotStream> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let state = Subscription {
            store: self.clone(),
            collection: collection.clone(),
            listener,
            primed: false,
        };

        let stream = stream::unfold(state, |mut sub| async move {
            if sub.primed {
                loop {
                    match sub.listener.recv().await {
                        Ok(notification) if notification.payload() == sub.collection.as_str() => {
                            break;
                        }
                        Ok(_) => continue,
                        // The listener reconnects on the next recv; report and keep going.
                        Err(e) => return Some((Err(StoreError::Database(e)), sub)),
                    }
                }
            }
            sub.primed = true;

            let snapshot = sub
                .store
                .query(DocumentQuery::collection(sub.collection.clone()))
                .await;
            Some((snapshot, sub))
        });

        Ok(Box::pin(stream))
    }
}
