//! Notification runner: emails maintainers about verified vulns.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgConnection;
use tracing::{error, info};

use store::models::{ClientStatus, ClientVuln};
use store::service::{ClientVulnService, LibraryService, ProjectService, UpstreamVulnService};
use store::PgPool;

use super::mailer::Mailer;
use super::template::render_notification;

/// Per-cycle batch size.
const BATCH_LIMIT: i64 = 20;

pub struct NotificationRunner {
    pool: PgPool,
    mailer: Mailer,
    notify_to: String,
}

impl NotificationRunner {
    #[must_use]
    pub fn new(pool: PgPool, mailer: Mailer, notify_to: String) -> Self {
        Self {
            pool,
            mailer,
            notify_to,
        }
    }

    fn recipient(&self) -> &str {
        if self.notify_to.is_empty() {
            self.mailer.from_addr()
        } else {
            &self.notify_to
        }
    }

    /// Send the notification for one verified client vuln, store the
    /// report record, and advance the status to `reported`.
    pub async fn notify_one(
        &self,
        conn: &mut PgConnection,
        client_vuln: &ClientVuln,
    ) -> Result<()> {
        let upstream = UpstreamVulnService::get(conn, client_vuln.upstream_vuln_id)
            .await
            .context("upstream vuln missing")?
            .vuln;
        let library = LibraryService::get_by_id(conn, upstream.library_id).await?;
        let project = ProjectService::get(conn, client_vuln.project_id).await?;

        let (Some(library), Some(project)) = (library, project) else {
            error!(
                client_vuln_id = %client_vuln.id,
                "library or project missing, skipping notification"
            );
            return Ok(());
        };

        let (subject, html_body) = render_notification(&project, &library, &upstream, client_vuln);
        let to = self.recipient();
        self.mailer.send(to, &subject, &html_body).await?;

        ClientVulnService::set_report(
            conn,
            client_vuln.id,
            json!({
                "type": "email",
                "to": to,
                "subject": subject,
            }),
        )
        .await?;
        ClientVulnService::update_status(conn, client_vuln.id, ClientStatus::Reported, None)
            .await?;

        info!(
            client_vuln_id = %client_vuln.id,
            to,
            severity = upstream.severity.map(|s| s.as_str()).unwrap_or("unknown"),
            "notification sent"
        );
        Ok(())
    }

    /// Poll recorded-but-unreported vulns; each is processed in its own
    /// transaction so a failed send does not block peers. Returns the
    /// number of notifications sent.
    pub async fn run_batch(&self) -> Result<usize> {
        let pending = {
            let mut conn = self.pool.acquire().await?;
            ClientVulnService::list_verified_unnotified(&mut conn, BATCH_LIMIT).await?
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let mut sent = 0;
        for client_vuln in pending {
            let result: Result<()> = async {
                let mut tx = self.pool.begin().await?;
                self.notify_one(&mut tx, &client_vuln).await?;
                tx.commit().await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => sent += 1,
                Err(err) => {
                    error!(client_vuln_id = %client_vuln.id, error = %err, "notification failed");
                }
            }
        }
        Ok(sent)
    }
}
