//! The producer itself: the three trigger entry points plus dispatch-time
//! fan-out and manual resend.

use std::{sync::Arc, time::Duration};

use aisle_common::{
    email::EmailType,
    ids::{GuestId, WeddingId},
};
use aisle_outbox::{
    AttemptOutcome, NewOutboxRecord, OutboxRecordId, OutboxStatus, OutboxStore, StatusReconciler,
    StatusUpdate,
};
use aisle_queue::{EnqueueOptions, Job, JobId, JobQueue, ReminderJob, ScheduledEmailJob};
use aisle_transport::Transport;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{Guest, GuestDirectory, ProducerError, RenderedEmail, RsvpStatus, TemplateEngine};

const fn default_reminder_max_attempts() -> u32 {
    3
}

const fn default_scheduled_max_attempts() -> u32 {
    3
}

/// Tunables for the producer.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// Delivery attempts granted to each per-guest job.
    #[serde(default = "default_reminder_max_attempts")]
    pub reminder_max_attempts: u32,

    /// Delivery attempts granted to a deferred batch job (the fan-out
    /// itself, not the per-guest deliveries it creates).
    #[serde(default = "default_scheduled_max_attempts")]
    pub scheduled_max_attempts: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            reminder_max_attempts: default_reminder_max_attempts(),
            scheduled_max_attempts: default_scheduled_max_attempts(),
        }
    }
}

/// Everything the producer talks to, injected at construction so tests can
/// substitute in-memory implementations.
#[derive(Debug, Clone)]
pub struct ProducerDeps {
    pub store: Arc<dyn OutboxStore>,
    pub reminder_queue: Arc<dyn JobQueue>,
    pub scheduled_queue: Arc<dyn JobQueue>,
    pub directory: Arc<dyn GuestDirectory>,
    pub templates: Arc<dyn TemplateEngine>,
    pub transport: Arc<dyn Transport>,
    pub reconciler: Arc<dyn StatusReconciler>,
}

/// Per-guest outcome of a producer call.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub guest_id: GuestId,
    /// Present once the outbox row was created, even when a later step
    /// failed.
    pub record_id: Option<OutboxRecordId>,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of a synchronous (inline) send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<SendResult>,
}

/// Result of an asynchronous (queued) send.
#[derive(Debug, Clone)]
pub struct QueueOutcome {
    pub queued: usize,
    pub total: usize,
    pub guest_ids: Vec<GuestId>,
    pub job_ids: Vec<JobId>,
    pub results: Vec<SendResult>,
}

/// Translates user actions into outbox rows plus queued jobs, as one logical
/// unit per guest. The row is created before the job, always.
#[derive(Debug, Clone)]
pub struct JobProducer {
    deps: ProducerDeps,
    config: ProducerConfig,
}

impl JobProducer {
    #[must_use]
    pub fn new(deps: ProducerDeps, config: ProducerConfig) -> Self {
        Self { deps, config }
    }

    /// Send invitations to the given guests, inline.
    ///
    /// Delivery happens within this call, so the per-guest results reflect
    /// the true transport outcome.
    ///
    /// # Errors
    /// `NoGuestsSelected` for an empty selection; directory errors when the
    /// wedding is unknown.
    pub async fn send_invitations(
        &self,
        wedding_id: WeddingId,
        guest_ids: &[GuestId],
    ) -> Result<SendOutcome, ProducerError> {
        if guest_ids.is_empty() {
            return Err(ProducerError::NoGuestsSelected(wedding_id));
        }

        let guests = self
            .deps
            .directory
            .guests_by_id(&wedding_id, guest_ids)
            .await?;
        if guests.is_empty() {
            return Err(ProducerError::NoGuestsSelected(wedding_id));
        }

        let mut results = Vec::with_capacity(guests.len());
        for guest in &guests {
            results.push(self.deliver_invitation_inline(guest).await);
        }

        let sent = results.iter().filter(|r| r.success).count();
        let failed = results.len() - sent;
        info!(
            %wedding_id,
            sent,
            failed,
            "Invitation send completed"
        );

        Ok(SendOutcome {
            sent,
            failed,
            total: results.len(),
            results,
        })
    }

    /// Queue reminder emails.
    ///
    /// With an explicit guest list, those guests are used; without one, the
    /// selection is every guest whose RSVP is still pending, resolved at call
    /// time.
    ///
    /// # Errors
    /// `FeatureDisabled` if reminders are off for this wedding;
    /// `NoGuestsSelected` for an empty resolved selection.
    pub async fn send_reminders(
        &self,
        wedding_id: WeddingId,
        guest_ids: Option<Vec<GuestId>>,
    ) -> Result<QueueOutcome, ProducerError> {
        let config = self.deps.directory.wedding_config(&wedding_id).await?;
        if !config.allows(EmailType::Reminder) {
            return Err(ProducerError::FeatureDisabled {
                wedding_id,
                feature: "reminders",
            });
        }

        let guests = match guest_ids {
            Some(ids) if ids.is_empty() => return Err(ProducerError::NoGuestsSelected(wedding_id)),
            Some(ids) => self.deps.directory.guests_by_id(&wedding_id, &ids).await?,
            None => self
                .deps
                .directory
                .guests(&wedding_id)
                .await?
                .into_iter()
                .filter(|guest| guest.rsvp_status == RsvpStatus::Pending)
                .collect(),
        };
        if guests.is_empty() {
            return Err(ProducerError::NoGuestsSelected(wedding_id));
        }

        let outcome = self.queue_for_guests(&guests, EmailType::Reminder).await;
        info!(
            %wedding_id,
            queued = outcome.queued,
            total = outcome.total,
            "Reminder send queued"
        );

        Ok(outcome)
    }

    /// Schedule a batch send for a future dispatch time.
    ///
    /// Enqueues a single deferred job carrying the guest-id set and email
    /// type. No outbox rows exist until the job fires and fans out, so guest
    /// list membership is evaluated freshly at dispatch time.
    ///
    /// # Errors
    /// `Validation` if `dispatch_at` is not in the future; `FeatureDisabled`
    /// and `NoGuestsSelected` as for reminders.
    pub async fn schedule_email(
        &self,
        wedding_id: WeddingId,
        guest_ids: Vec<GuestId>,
        email_type: EmailType,
        dispatch_at: DateTime<Utc>,
    ) -> Result<JobId, ProducerError> {
        let config = self.deps.directory.wedding_config(&wedding_id).await?;
        if !config.allows(email_type) {
            return Err(ProducerError::FeatureDisabled {
                wedding_id,
                feature: "reminders",
            });
        }

        if guest_ids.is_empty() {
            return Err(ProducerError::NoGuestsSelected(wedding_id));
        }

        let delay: Duration = (dispatch_at - Utc::now()).to_std().map_err(|_| {
            ProducerError::Validation("dispatch time must be in the future".to_string())
        })?;

        let job_id = self
            .deps
            .scheduled_queue
            .enqueue(
                Job::Scheduled(ScheduledEmailJob {
                    wedding_id,
                    guest_ids,
                    email_type,
                }),
                EnqueueOptions::delayed(delay, self.config.scheduled_max_attempts),
            )
            .await?;

        info!(
            %wedding_id,
            %job_id,
            %dispatch_at,
            "Scheduled batch send"
        );

        Ok(job_id)
    }

    /// Expand a fired batch job into per-guest rows and jobs.
    ///
    /// Runs when the deferred job is dispatched: the guest set is resolved
    /// against the guest list as it is now, and removed guests are skipped.
    ///
    /// # Errors
    /// `FeatureDisabled` if the feature was turned off after scheduling;
    /// `NoGuestsSelected` if none of the scheduled guests still exist.
    pub async fn fan_out(&self, job: &ScheduledEmailJob) -> Result<QueueOutcome, ProducerError> {
        let config = self
            .deps
            .directory
            .wedding_config(&job.wedding_id)
            .await?;
        if !config.allows(job.email_type) {
            return Err(ProducerError::FeatureDisabled {
                wedding_id: job.wedding_id,
                feature: "reminders",
            });
        }

        let guests = self
            .deps
            .directory
            .guests_by_id(&job.wedding_id, &job.guest_ids)
            .await?;
        if guests.is_empty() {
            return Err(ProducerError::NoGuestsSelected(job.wedding_id));
        }
        if guests.len() < job.guest_ids.len() {
            info!(
                wedding_id = %job.wedding_id,
                scheduled = job.guest_ids.len(),
                remaining = guests.len(),
                "Some scheduled guests no longer exist, skipping them"
            );
        }

        let outcome = self.queue_for_guests(&guests, job.email_type).await;
        info!(
            wedding_id = %job.wedding_id,
            email_type = %job.email_type,
            queued = outcome.queued,
            "Batch job fanned out"
        );

        Ok(outcome)
    }

    /// Re-enqueue a failed record.
    ///
    /// The record returns to `Pending`; its `attempts` count is preserved as
    /// cumulative history.
    ///
    /// # Errors
    /// `Validation` if the record is not in `Failed`.
    pub async fn resend_failed(&self, record_id: OutboxRecordId) -> Result<JobId, ProducerError> {
        let record = self.deps.store.get(&record_id).await?;
        if record.status != OutboxStatus::Failed {
            return Err(ProducerError::Validation(format!(
                "record {record_id} is not failed, refusing to resend"
            )));
        }

        // Render from the record's recipient snapshot; the guest may have
        // been edited or removed since.
        let snapshot = Guest {
            id: record.guest_id,
            wedding_id: record.wedding_id,
            name: record.to_name.clone(),
            email: record.to_email.clone(),
            rsvp_status: RsvpStatus::Pending,
        };
        let rendered = self.deps.templates.render(record.email_type, &snapshot)?;

        self.deps
            .store
            .update_status(&record_id, StatusUpdate::Resend)
            .await?;

        let job_id = self
            .deps
            .reminder_queue
            .enqueue(
                Job::Reminder(ReminderJob {
                    record_id,
                    html_body: rendered.html_body,
                    text_body: rendered.text_body,
                }),
                EnqueueOptions::immediate(self.config.reminder_max_attempts),
            )
            .await
            .map_err(|source| ProducerError::Enqueue { record_id, source })?;

        info!(%record_id, %job_id, "Failed record re-enqueued");

        Ok(job_id)
    }

    /// Create the row, then the job, for each guest. A queue failure after
    /// row creation is a partial failure: the row stays `Pending`.
    async fn queue_for_guests(&self, guests: &[Guest], email_type: EmailType) -> QueueOutcome {
        let mut results = Vec::with_capacity(guests.len());
        let mut job_ids = Vec::new();

        for guest in guests {
            let (record_id, rendered) = match self.create_record(guest, email_type).await {
                Ok(created) => created,
                Err(e) => {
                    results.push(SendResult {
                        guest_id: guest.id,
                        record_id: None,
                        success: false,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            match self
                .deps
                .reminder_queue
                .enqueue(
                    Job::Reminder(ReminderJob {
                        record_id,
                        html_body: rendered.html_body,
                        text_body: rendered.text_body,
                    }),
                    EnqueueOptions::immediate(self.config.reminder_max_attempts),
                )
                .await
            {
                Ok(job_id) => {
                    job_ids.push(job_id);
                    results.push(SendResult {
                        guest_id: guest.id,
                        record_id: Some(record_id),
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        %record_id,
                        guest_id = %guest.id,
                        error = %e,
                        "Enqueue failed after row creation, row remains pending"
                    );
                    results.push(SendResult {
                        guest_id: guest.id,
                        record_id: Some(record_id),
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let queued = results.iter().filter(|r| r.success).count();
        QueueOutcome {
            queued,
            total: results.len(),
            guest_ids: guests.iter().map(|g| g.id).collect(),
            job_ids,
            results,
        }
    }

    /// One guest's inline invitation: row, transport call, reconciliation.
    async fn deliver_invitation_inline(&self, guest: &Guest) -> SendResult {
        let (record_id, rendered) = match self.create_record(guest, EmailType::Invitation).await {
            Ok(created) => created,
            Err(e) => {
                return SendResult {
                    guest_id: guest.id,
                    record_id: None,
                    success: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let outcome = self
            .deps
            .transport
            .send(
                &guest.email,
                &rendered.subject,
                &rendered.html_body,
                &rendered.text_body,
            )
            .await;

        match outcome {
            Ok(()) => {
                if let Err(e) = self
                    .deps
                    .reconciler
                    .report(&record_id, AttemptOutcome::Sent)
                    .await
                {
                    warn!(
                        %record_id,
                        error = %e,
                        "Email delivered but status write-back failed, record stays pending"
                    );
                }
                SendResult {
                    guest_id: guest.id,
                    record_id: Some(record_id),
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                if let Err(report_err) = self
                    .deps
                    .reconciler
                    .report(&record_id, AttemptOutcome::Failed(e.to_string()))
                    .await
                {
                    warn!(
                        %record_id,
                        error = %report_err,
                        "Failed to record delivery failure"
                    );
                }
                SendResult {
                    guest_id: guest.id,
                    record_id: Some(record_id),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Render and create the outbox row for one guest.
    async fn create_record(
        &self,
        guest: &Guest,
        email_type: EmailType,
    ) -> Result<(OutboxRecordId, RenderedEmail), ProducerError> {
        let rendered = self.deps.templates.render(email_type, guest)?;

        let record_id = self
            .deps
            .store
            .create(NewOutboxRecord {
                wedding_id: guest.wedding_id,
                guest_id: guest.id,
                email_type,
                to_email: guest.email.clone(),
                to_name: guest.name.clone(),
                subject: rendered.subject.clone(),
            })
            .await?;

        Ok((record_id, rendered))
    }
}
