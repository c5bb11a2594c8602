//! Upstream vulnerability lifecycle.

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{CursorSigner, Page};
use crate::dao::{AnalysisUpdate, ClientVulnDao, UpstreamVulnDao};
use crate::error::{StoreError, StoreResult};
use crate::models::{ClientVuln, UpstreamVuln};

/// Upstream vuln detail with its client impact list.
#[derive(Debug, Serialize)]
pub struct UpstreamVulnDetail {
    pub vuln: UpstreamVuln,
    pub client_impact: Vec<ClientVuln>,
}

pub struct UpstreamVulnService;

impl UpstreamVulnService {
    pub async fn get(conn: &mut PgConnection, id: Uuid) -> StoreResult<UpstreamVulnDetail> {
        let vuln = UpstreamVulnDao::get_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("upstream vulnerability not found".into()))?;
        let client_impact = ClientVulnDao::list_by_upstream_vuln(conn, vuln.id).await?;
        Ok(UpstreamVulnDetail {
            vuln,
            client_impact,
        })
    }

    pub async fn list(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        library_id: Option<Uuid>,
    ) -> StoreResult<(Page<UpstreamVuln>, i64)> {
        let page =
            UpstreamVulnDao::list_paginated(conn, signer, cursor, page_size, library_id).await?;
        let total = UpstreamVulnDao::count(conn, library_id).await?;
        Ok((page, total))
    }

    /// Create the placeholder row (status `analyzing`) before the LLM
    /// call, so a failed analysis never re-queues the source event.
    pub async fn create(
        conn: &mut PgConnection,
        event_id: Uuid,
        library_id: Uuid,
        commit_sha: &str,
    ) -> StoreResult<UpstreamVuln> {
        UpstreamVulnDao::create(conn, event_id, library_id, commit_sha).await
    }

    pub async fn update_analysis(
        conn: &mut PgConnection,
        id: Uuid,
        update: &AnalysisUpdate,
    ) -> StoreResult<()> {
        UpstreamVulnDao::update_analysis(conn, id, update).await
    }

    /// Publish a vuln. Client impact is NOT created here: the impact
    /// matcher polls for published vulns, keeping the stages decoupled
    /// through the store.
    pub async fn publish(conn: &mut PgConnection, id: Uuid) -> StoreResult<()> {
        UpstreamVulnDao::publish(conn, id).await
    }

    pub async fn list_published_without_impact(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<UpstreamVuln>> {
        UpstreamVulnDao::list_published_without_impact(conn, limit).await
    }

    pub async fn set_error(
        conn: &mut PgConnection,
        id: Uuid,
        error_message: &str,
    ) -> StoreResult<()> {
        UpstreamVulnDao::set_error(conn, id, error_message).await
    }
}
