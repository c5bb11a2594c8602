//! Client vulnerability pipeline and customer-facing lifecycle.

use serde::Serialize;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::cursor::{CursorSigner, Page};
use crate::dao::{
    ClientVulnDao, ClientVulnFilters, NewClientVuln, PipelineUpdate, StatusCounts, UpstreamVulnDao,
};
use crate::error::{StoreError, StoreResult};
use crate::models::{ClientStatus, ClientVuln, PipelineStatus, UpstreamVuln};

/// Client vuln detail with its upstream record.
#[derive(Debug, Serialize)]
pub struct ClientVulnDetail {
    pub client_vuln: ClientVuln,
    pub upstream_vuln: Option<UpstreamVuln>,
}

/// Allowed customer-facing transitions. Terminal states (`fixed`,
/// `not_affect`) have no entry; anything else is rejected.
fn allowed_transitions(from: ClientStatus) -> Option<&'static [ClientStatus]> {
    match from {
        ClientStatus::Recorded => Some(&[ClientStatus::Reported]),
        ClientStatus::Reported => Some(&[ClientStatus::Confirmed]),
        ClientStatus::Confirmed => Some(&[ClientStatus::Fixed]),
        ClientStatus::Fixed | ClientStatus::NotAffect => None,
    }
}

pub struct ClientVulnService;

impl ClientVulnService {
    pub async fn get(conn: &mut PgConnection, id: Uuid) -> StoreResult<ClientVulnDetail> {
        let client_vuln = ClientVulnDao::get_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("client vulnerability not found".into()))?;
        let upstream_vuln = UpstreamVulnDao::get_by_id(conn, client_vuln.upstream_vuln_id).await?;
        Ok(ClientVulnDetail {
            client_vuln,
            upstream_vuln,
        })
    }

    pub async fn list(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        cursor: Option<&str>,
        page_size: i64,
        filters: &ClientVulnFilters,
    ) -> StoreResult<(Page<ClientVuln>, i64, StatusCounts)> {
        let page = ClientVulnDao::list_paginated(conn, signer, cursor, page_size, filters).await?;
        let total = ClientVulnDao::count(conn, filters).await?;
        let stats = ClientVulnDao::count_by_status(conn, filters.project_id).await?;
        Ok((page, total, stats))
    }

    pub async fn list_by_project(
        conn: &mut PgConnection,
        signer: &CursorSigner,
        project_id: Uuid,
        cursor: Option<&str>,
        page_size: i64,
    ) -> StoreResult<Page<ClientVuln>> {
        ClientVulnDao::list_by_project(conn, signer, project_id, cursor, page_size).await
    }

    pub async fn get_stats(
        conn: &mut PgConnection,
        project_id: Option<Uuid>,
    ) -> StoreResult<StatusCounts> {
        ClientVulnDao::count_by_status(conn, project_id).await
    }

    /// Create a client vuln (pipeline defaults to `pending`, status
    /// null). Called by the impact matcher for each dependent project;
    /// `None` means the (vuln, project) pair already existed.
    pub async fn create(
        conn: &mut PgConnection,
        new: &NewClientVuln,
    ) -> StoreResult<Option<ClientVuln>> {
        ClientVulnDao::create(conn, new).await
    }

    pub async fn list_pending_pipeline(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<ClientVuln>> {
        ClientVulnDao::list_pending_pipeline(conn, limit).await
    }

    pub async fn list_verified_unnotified(
        conn: &mut PgConnection,
        limit: i64,
    ) -> StoreResult<Vec<ClientVuln>> {
        ClientVulnDao::list_verified_unnotified(conn, limit).await
    }

    pub async fn update_pipeline(
        conn: &mut PgConnection,
        id: Uuid,
        update: PipelineUpdate,
    ) -> StoreResult<()> {
        ClientVulnDao::update_pipeline(conn, id, update).await
    }

    /// Finalize the pipeline from the reachability verdict.
    ///
    /// - affected → pipeline `verified`, status `recorded`
    /// - not affected → pipeline `not_affect`, status `not_affect`
    pub async fn finalize(
        conn: &mut PgConnection,
        id: Uuid,
        is_affected: bool,
    ) -> StoreResult<()> {
        if is_affected {
            ClientVulnDao::finalize(
                conn,
                id,
                PipelineStatus::Verified,
                ClientStatus::Recorded,
                true,
            )
            .await
        } else {
            ClientVulnDao::finalize(
                conn,
                id,
                PipelineStatus::NotAffect,
                ClientStatus::NotAffect,
                false,
            )
            .await
        }
    }

    /// Advance the customer-facing status from maintainer feedback.
    ///
    /// Validates the transition table before writing; only
    /// recorded → reported → confirmed → fixed moves are accepted.
    pub async fn update_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: ClientStatus,
        msg: Option<&str>,
    ) -> StoreResult<()> {
        let cv = ClientVulnDao::get_by_id(conn, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("client vulnerability not found".into()))?;

        let current = cv.status.ok_or_else(|| {
            StoreError::Validation("vulnerability has no customer-facing status yet".into())
        })?;

        let allowed = allowed_transitions(current).ok_or_else(|| {
            StoreError::Validation(format!(
                "cannot transition from terminal status '{}'",
                current.as_str()
            ))
        })?;
        if !allowed.contains(&status) {
            return Err(StoreError::Validation(format!(
                "invalid transition: '{}' -> '{}'",
                current.as_str(),
                status.as_str()
            )));
        }

        ClientVulnDao::update_status(conn, id, status, msg).await
    }

    pub async fn set_report(conn: &mut PgConnection, id: Uuid, report: Value) -> StoreResult<()> {
        ClientVulnDao::set_report(conn, id, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_allowed() {
        assert_eq!(
            allowed_transitions(ClientStatus::Recorded),
            Some(&[ClientStatus::Reported][..])
        );
        assert_eq!(
            allowed_transitions(ClientStatus::Reported),
            Some(&[ClientStatus::Confirmed][..])
        );
        assert_eq!(
            allowed_transitions(ClientStatus::Confirmed),
            Some(&[ClientStatus::Fixed][..])
        );
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(allowed_transitions(ClientStatus::Fixed).is_none());
        assert!(allowed_transitions(ClientStatus::NotAffect).is_none());
    }

    #[test]
    fn skips_are_not_allowed() {
        // recorded -> fixed must not appear in the recorded entry
        let allowed = allowed_transitions(ClientStatus::Recorded).unwrap();
        assert!(!allowed.contains(&ClientStatus::Fixed));
        assert!(!allowed.contains(&ClientStatus::Confirmed));
    }
}
