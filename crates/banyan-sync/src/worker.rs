//! The replication queue worker.
//!
//! Polls the LinkQueue on an interval, groups pending rows by linked-file
//! id, and drains each group in insertion order. Groups run concurrently;
//! a failed delivery releases its row and stops its group until the next
//! pass, preserving per-file ordering under at-least-once delivery.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use banyan_core::defaults::{
    EVENT_BUS_CAPACITY, SYNC_DELIVERY_TIMEOUT_SECS, SYNC_MAX_CONCURRENT_FILES,
    SYNC_POLL_INTERVAL_MS,
};
use banyan_core::{
    format_tag_line, ActivityEnvelope, LinkAction, LinkQueueEntry, LinkRepository, NotePayload,
    NoteRepository, Result,
};
use banyan_db::Database;

use crate::delivery::{DeliveryClient, DeliveryOutcome, HttpDeliveryClient};

/// Configuration for the replication worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of linked-file queues drained concurrently.
    pub max_concurrent_files: usize,
    /// Timeout for one outbound delivery attempt, in seconds.
    pub delivery_timeout_secs: u64,
    /// Whether to process the queue at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: SYNC_POLL_INTERVAL_MS,
            max_concurrent_files: SYNC_MAX_CONCURRENT_FILES,
            delivery_timeout_secs: SYNC_DELIVERY_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SYNC_WORKER_ENABLED` | `true` | Enable/disable queue processing |
    /// | `SYNC_POLL_INTERVAL_MS` | `2000` | Polling interval when queue is empty |
    /// | `SYNC_MAX_CONCURRENT_FILES` | `4` | Linked-file queues drained in parallel |
    /// | `SYNC_DELIVERY_TIMEOUT_SECS` | `30` | Per-attempt delivery timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SYNC_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = std::env::var("SYNC_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SYNC_POLL_INTERVAL_MS);

        let max_concurrent_files = std::env::var("SYNC_MAX_CONCURRENT_FILES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(SYNC_MAX_CONCURRENT_FILES)
            .max(1);

        let delivery_timeout_secs = std::env::var("SYNC_DELIVERY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SYNC_DELIVERY_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            max_concurrent_files,
            delivery_timeout_secs,
            enabled,
        }
    }

    /// Create a new config with a custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the number of linked-file queues drained concurrently.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_files = max.max(1);
        self
    }

    /// Enable or disable queue processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the replication worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
    /// One queue row was delivered and removed.
    Delivered {
        queue_id: i64,
        linked_file_id: i32,
        activity: String,
    },
    /// One delivery attempt failed; the row stays queued.
    DeliveryFailed {
        queue_id: i64,
        linked_file_id: i32,
        error: String,
    },
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| banyan_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Replication worker that drains the LinkQueue.
pub struct SyncWorker {
    db: Database,
    config: WorkerConfig,
    client: Arc<dyn DeliveryClient>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl SyncWorker {
    /// Create a worker with the default HTTP delivery client.
    pub fn new(db: Database, config: WorkerConfig) -> Result<Self> {
        let client = HttpDeliveryClient::new(Duration::from_secs(config.delivery_timeout_secs))?;
        Ok(Self::with_client(db, config, Arc::new(client)))
    }

    /// Create a worker with a custom delivery client (tests).
    pub fn with_client(db: Database, config: WorkerConfig, client: Arc<dyn DeliveryClient>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            db,
            config,
            client,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "sync",
                component = "worker",
                "Replication worker is disabled, not starting"
            );
            return;
        }

        info!(
            subsystem = "sync",
            component = "worker",
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent_files = self.config.max_concurrent_files,
            "Replication worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        // Rows claimed by a previous process that died mid-delivery
        // become retryable again.
        match self.db.links.release_stale().await {
            Ok(0) => {}
            Ok(n) => warn!(
                subsystem = "sync",
                component = "worker",
                result_count = n,
                "Released stale queue claims from a prior run"
            ),
            Err(e) => error!(
                subsystem = "sync",
                component = "worker",
                error = %e,
                "Failed to release stale queue claims"
            ),
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!(
                    subsystem = "sync",
                    component = "worker",
                    "Replication worker received shutdown signal"
                );
                break;
            }

            let drained = match self.drain_once().await {
                Ok(n) => n,
                Err(e) => {
                    error!(
                        subsystem = "sync",
                        component = "worker",
                        error = %e,
                        "Queue pass failed"
                    );
                    0
                }
            };

            if drained == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(
                            subsystem = "sync",
                            component = "worker",
                            "Replication worker received shutdown signal"
                        );
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
    }

    /// One pass over the queue. Returns the number of rows delivered.
    pub async fn drain_once(&self) -> Result<usize> {
        let pending = self.db.links.pending(500).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        // Per-file groups, each drained in id order. BTreeMap keeps the
        // group iteration deterministic.
        let mut groups: BTreeMap<i32, Vec<LinkQueueEntry>> = BTreeMap::new();
        for row in pending {
            groups.entry(row.linked_file_id).or_default().push(row);
        }

        debug!(
            subsystem = "sync",
            component = "worker",
            op = "drain",
            batch_size = groups.len(),
            "Draining linked-file queues"
        );

        let groups: Vec<Vec<LinkQueueEntry>> = groups.into_values().collect();
        let mut delivered = 0usize;

        for chunk in groups.chunks(self.config.max_concurrent_files) {
            let mut tasks = tokio::task::JoinSet::new();
            for group in chunk {
                let db = self.db.clone();
                let client = self.client.clone();
                let event_tx = self.event_tx.clone();
                let group = group.clone();
                tasks.spawn(async move {
                    Self::process_group(db, client, event_tx, group).await
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(n) => delivered += n,
                    Err(e) => error!(
                        subsystem = "sync",
                        component = "worker",
                        error = %e,
                        "Queue group task panicked"
                    ),
                }
            }
        }

        Ok(delivered)
    }

    /// Drain one linked file's rows in order; stop at the first failure.
    async fn process_group(
        db: Database,
        client: Arc<dyn DeliveryClient>,
        event_tx: broadcast::Sender<WorkerEvent>,
        group: Vec<LinkQueueEntry>,
    ) -> usize {
        let mut delivered = 0usize;

        for row in group {
            match Self::process_row(&db, client.as_ref(), &row).await {
                Ok(true) => {
                    delivered += 1;
                    let _ = event_tx.send(WorkerEvent::Delivered {
                        queue_id: row.id,
                        linked_file_id: row.linked_file_id,
                        activity: row.activity.clone(),
                    });
                }
                Ok(false) => {
                    // Undeliverable row dropped (stale config or note
                    // gone); keep draining the group.
                }
                Err(e) => {
                    // Best effort: a row claimed before an internal error
                    // must not stay claimed until the next restart.
                    let _ = db.links.release(row.id).await;
                    let _ = event_tx.send(WorkerEvent::DeliveryFailed {
                        queue_id: row.id,
                        linked_file_id: row.linked_file_id,
                        error: e.to_string(),
                    });
                    // Order within the linked file must hold: leave the
                    // rest of this group for the next pass.
                    break;
                }
            }
        }

        delivered
    }

    /// Deliver one row. Ok(true) = delivered, Ok(false) = dropped as
    /// undeliverable, Err = failed and released for retry.
    async fn process_row(
        db: &Database,
        client: &dyn DeliveryClient,
        row: &LinkQueueEntry,
    ) -> Result<bool> {
        db.links.mark_enqueued(row.id).await?;

        let envelope = match Self::build_envelope(db, row).await? {
            Some(envelope) => envelope,
            None => {
                db.links.complete(row.id).await?;
                db.links
                    .log(
                        "out-drop",
                        &format!(
                            "dropped {} for guid {}: note or link config gone",
                            row.activity, row.link_guid
                        ),
                    )
                    .await?;
                return Ok(false);
            }
        };

        match client.deliver(&row.base_uri, &envelope).await {
            DeliveryOutcome::Accepted => {
                db.links.complete(row.id).await?;
                db.links
                    .log(
                        "out-ok",
                        &format!(
                            "delivered {} for guid {} to {}",
                            row.activity, row.link_guid, row.base_uri
                        ),
                    )
                    .await?;
                Ok(true)
            }
            DeliveryOutcome::Rejected { status, detail } => {
                db.links.release(row.id).await?;
                db.links
                    .log(
                        "out-reject",
                        &format!(
                            "peer {} rejected {} for guid {} ({}): {}",
                            row.base_uri, row.activity, row.link_guid, status, detail
                        ),
                    )
                    .await?;
                Err(banyan_core::Error::Replication(format!(
                    "peer rejected with status {status}"
                )))
            }
            DeliveryOutcome::Failed(reason) => {
                db.links.release(row.id).await?;
                db.links
                    .log(
                        "out-fail",
                        &format!(
                            "delivery of {} for guid {} to {} failed: {}",
                            row.activity, row.link_guid, row.base_uri, reason
                        ),
                    )
                    .await?;
                Err(banyan_core::Error::Replication(reason))
            }
        }
    }

    /// Assemble the wire envelope for a queue row. Returns None when the
    /// row can no longer be delivered (linked file removed, or a
    /// create/edit whose note vanished).
    async fn build_envelope(db: &Database, row: &LinkQueueEntry) -> Result<Option<ActivityEnvelope>> {
        let action = LinkAction::parse(&row.activity)?;

        let linked_file = match db.links.get_linked_file(row.linked_file_id).await {
            Ok(lf) => lf,
            Err(banyan_core::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let note = match action {
            LinkAction::Delete => None,
            _ => {
                let Some(header) = db.notes.get_header_by_guid(row.link_guid).await? else {
                    return Ok(None);
                };
                let content = db.notes.get_content(header.id).await?;
                let tags = db.notes.tags_for_header(header.id).await?;
                let tag_line =
                    format_tag_line(&tags.into_iter().map(|t| t.tag).collect::<Vec<_>>());

                let base_link_guid = if header.is_base() {
                    None
                } else {
                    db.notes.get_header(header.base_note_id).await?.link_guid
                };

                Some(NotePayload {
                    subject: header.subject,
                    author_id: header.author_id,
                    author_name: header.author_name,
                    body: content.body,
                    tag_line,
                    director_message: header.director_message,
                    base_link_guid,
                    created_at: header.created_at,
                    last_edited: header.last_edited,
                })
            }
        };

        Ok(Some(ActivityEnvelope {
            activity: action,
            link_guid: row.link_guid,
            old_link_guid: row.old_link_guid,
            sender_file_name: linked_file.home_file_name,
            secret: row.secret.clone(),
            note,
        }))
    }
}
