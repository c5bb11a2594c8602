//! Event lifecycle and classification writes.

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{CursorSigner, Page};
use crate::dao::{EventDao, UpstreamVulnDao};
use crate::error::{StoreError, StoreResult};
use crate::models::{Classification, Event, NewEvent, UpstreamVuln};

/// Event detail with any vulns extracted from it.
#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub related_vulns: Vec<UpstreamVuln>,
}

pub struct EventService;

impl EventService {
    pub async fn get(conn: &mut PgConnection, id: Uuid) -> StoreResult<EventDetail> {
        let event = EventDao::get_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("event not found".into()))?;

        let related_vulns = if event.is_bugfix {
            UpstreamVulnDao::list_by_event(conn, event.id).await?
        } else {
            Vec::new()
        };

        Ok(EventDetail {
            event,
            related_vulns,
        })
    }

    pub async fn list(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        library_id: Option<Uuid>,
    ) -> StoreResult<(Page<Event>, i64)> {
        let page = EventDao::list_paginated(conn, signer, cursor, page_size, library_id).await?;
        let total = EventDao::count(conn, library_id).await?;
        Ok((page, total))
    }

    /// Idempotent batch insert; duplicates on (library_id, type, ref)
    /// leave the row count unchanged.
    pub async fn batch_create(
        conn: &mut PgConnection,
        library_id: Uuid,
        events: &[NewEvent],
    ) -> StoreResult<u64> {
        EventDao::batch_create(conn, library_id, events).await
    }

    pub async fn list_unclassified(conn: &mut PgConnection, limit: i64) -> StoreResult<Vec<Event>> {
        EventDao::list_unclassified(conn, limit).await
    }

    pub async fn list_bugfix_without_vuln(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<Event>> {
        EventDao::list_bugfix_without_vuln(conn, limit).await
    }

    /// Write a classification result.
    ///
    /// Core business rule: `is_bugfix` is derived here: only
    /// `security_bugfix` sets it.
    pub async fn update_classification(
        conn: &mut PgConnection,
        event_id: Uuid,
        classification: Classification,
        confidence: f64,
    ) -> StoreResult<()> {
        EventDao::update_classification(
            conn,
            event_id,
            classification,
            confidence,
            classification.is_bugfix(),
        )
        .await
    }
}
