//! `events` table operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{clamp_page_size, CursorSigner, Page};
use crate::error::StoreResult;
use crate::models::{Classification, Event, NewEvent};

pub struct EventDao;

impl EventDao {
    pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn list_paginated(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        library_id: Option<Uuid>,
    ) -> StoreResult<Page<Event>> {
        let page_size = clamp_page_size(page_size);
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM events WHERE TRUE");
        if let Some(lib) = library_id {
            qb.push(" AND library_id = ");
            qb.push_bind(lib);
        }
        if let Some(token) = cursor {
            let cur = signer.decode(token)?;
            qb.push(" AND (created_at, id) < (");
            qb.push_bind(cur.created_at);
            qb.push(", ");
            qb.push_bind(cur.id);
            qb.push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(page_size + 1);

        let rows = qb.build_query_as::<Event>().fetch_all(conn).await?;
        Ok(signer.build_page(rows, page_size))
    }

    pub async fn count(conn: &mut PgConnection, library_id: Option<Uuid>) -> StoreResult<i64> {
        let n: i64 = match library_id {
            Some(lib) => {
                sqlx::query_scalar("SELECT count(*) FROM events WHERE library_id = $1")
                    .bind(lib)
                    .fetch_one(conn)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT count(*) FROM events")
                    .fetch_one(conn)
                    .await?
            }
        };
        Ok(n)
    }

    /// Unclassified events for classifier polling, newest first.
    pub async fn list_unclassified(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, Event>(
            "SELECT * FROM events \
             WHERE classification IS NULL \
             ORDER BY created_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Security-bugfix events that have no upstream vuln yet: the
    /// analyzer's poll query.
    pub async fn list_bugfix_without_vuln(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, Event>(
            "SELECT * FROM events e \
             WHERE e.is_bugfix \
               AND NOT EXISTS (SELECT 1 FROM upstream_vulns v WHERE v.event_id = e.id) \
             ORDER BY e.created_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Batch insert, skipping duplicates on (library_id, type, ref).
    ///
    /// Returns the number of rows actually inserted.
    pub async fn batch_create(
        conn: &mut PgConnection,
        library_id: Uuid,
        events: &[NewEvent],
    ) -> StoreResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO events (library_id, type, ref, title, source_url, author, event_at, \
             message, related_issue_ref, related_issue_url, related_pr_ref, related_pr_url, \
             related_commit_sha) ",
        );
        qb.push_values(events, |mut row, ev| {
            row.push_bind(library_id)
                .push_bind(ev.event_type)
                .push_bind(&ev.r#ref)
                .push_bind(&ev.title)
                .push_bind(&ev.source_url)
                .push_bind(&ev.author)
                .push_bind(ev.event_at)
                .push_bind(&ev.message)
                .push_bind(&ev.related_issue_ref)
                .push_bind(&ev.related_issue_url)
                .push_bind(&ev.related_pr_ref)
                .push_bind(&ev.related_pr_url)
                .push_bind(&ev.related_commit_sha);
        });
        qb.push(" ON CONFLICT (library_id, type, ref) DO NOTHING");

        let result = qb.build().execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Write a classification result. The caller supplies the derived
    /// `is_bugfix`; re-running classification overwrites prior values.
    pub async fn update_classification(
        conn: &mut PgConnection,
        id: Uuid,
        classification: Classification,
        confidence: f64,
        is_bugfix: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE events SET \
                classification = $2, confidence = $3, is_bugfix = $4, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(classification)
        .bind(confidence)
        .bind(is_bugfix)
        .execute(conn)
        .await?;
        Ok(())
    }
}
