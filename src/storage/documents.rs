//! Document Persistence
//!
//! Version-stacked artifact documents and their suggestions. Saving an
//! existing document id inserts a new `(id, version)` row; reads resolve to
//! the latest version unless history is asked for explicitly.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use loomchat_core::{ArtifactKind, Suggestion};

use crate::models::ArtifactDocument;
use crate::storage::Database;
use crate::utils::error::AppResult;
use crate::utils::time::now_rfc3339;

/// Persistence seam for finalized artifact documents.
#[async_trait]
pub trait DocumentPersistence: Send + Sync {
    /// Insert one document version. Re-inserting an existing
    /// `(id, version)` pair is an error.
    async fn save_document(&self, document: &ArtifactDocument) -> AppResult<()>;

    /// Latest version of a document, or `None` if the id is unknown.
    async fn get_document_by_id(&self, id: &str) -> AppResult<Option<ArtifactDocument>>;

    /// All versions of a document, oldest first.
    async fn list_versions(&self, id: &str) -> AppResult<Vec<ArtifactDocument>>;

    /// Persist a batch of suggestions.
    async fn save_suggestions(&self, suggestions: &[Suggestion]) -> AppResult<()>;

    /// All stored suggestions for a document.
    async fn get_suggestions(&self, document_id: &str) -> AppResult<Vec<Suggestion>>;
}

/// SQLite-backed document store.
pub struct SqliteDocumentStore {
    database: Database,
}

impl SqliteDocumentStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ArtifactDocument, String)> {
        Ok((
            ArtifactDocument {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                // placeholder, replaced after the kind column is parsed
                kind: ArtifactKind::Text,
                title: row.get(3)?,
                content: row.get(4)?,
                version: row.get::<_, i64>(5)? as u32,
                created_at: row.get(6)?,
            },
            row.get::<_, String>(2)?,
        ))
    }
}

#[async_trait]
impl DocumentPersistence for SqliteDocumentStore {
    async fn save_document(&self, document: &ArtifactDocument) -> AppResult<()> {
        let conn = self.database.get_connection()?;
        conn.execute(
            "INSERT INTO documents (id, version, chat_id, kind, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.id,
                document.version as i64,
                document.chat_id,
                document.kind.as_str(),
                document.title,
                document.content,
                document.created_at,
            ],
        )?;
        Ok(())
    }

    async fn get_document_by_id(&self, id: &str) -> AppResult<Option<ArtifactDocument>> {
        let conn = self.database.get_connection()?;
        let row = conn
            .query_row(
                "SELECT id, chat_id, kind, title, content, version, created_at
                 FROM documents WHERE id = ?1
                 ORDER BY version DESC LIMIT 1",
                params![id],
                Self::row_to_document,
            )
            .optional()?;

        match row {
            Some((mut document, kind)) => {
                document.kind = kind.parse::<ArtifactKind>()?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn list_versions(&self, id: &str) -> AppResult<Vec<ArtifactDocument>> {
        let conn = self.database.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, kind, title, content, version, created_at
             FROM documents WHERE id = ?1
             ORDER BY version ASC",
        )?;
        let rows = stmt.query_map(params![id], Self::row_to_document)?;

        let mut documents = Vec::new();
        for row in rows {
            let (mut document, kind) = row?;
            document.kind = kind.parse::<ArtifactKind>()?;
            documents.push(document);
        }
        Ok(documents)
    }

    async fn save_suggestions(&self, suggestions: &[Suggestion]) -> AppResult<()> {
        let mut conn = self.database.get_connection()?;
        let tx = conn.transaction()?;
        for suggestion in suggestions {
            tx.execute(
                "INSERT INTO suggestions
                 (id, document_id, original_text, suggested_text, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    suggestion.id,
                    suggestion.document_id,
                    suggestion.original_text,
                    suggestion.suggested_text,
                    suggestion.description,
                    now_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_suggestions(&self, document_id: &str) -> AppResult<Vec<Suggestion>> {
        let conn = self.database.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, original_text, suggested_text, description
             FROM suggestions WHERE document_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![document_id], |row| {
            Ok(Suggestion {
                id: row.get(0)?,
                document_id: row.get(1)?,
                original_text: row.get(2)?,
                suggested_text: row.get(3)?,
                description: row.get(4)?,
            })
        })?;

        let mut suggestions = Vec::new();
        for row in rows {
            suggestions.push(row?);
        }
        Ok(suggestions)
    }
}
