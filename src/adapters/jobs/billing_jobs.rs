//! BillingJobRunner - Periodic sweep and renewal reminder passes.
//!
//! Two independent timers drive the passes; neither shares state with the
//! other. A failing pass is logged and retried on the next tick, so a
//! transient database error never stops the runner.
//!
//! ## Graceful Shutdown
//!
//! The runner listens on a watch channel and returns once `true` is sent.
//! A pass already in progress completes first.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::application::handlers::{
    SendRenewalRemindersCommand, SendRenewalRemindersHandler, SendRenewalRemindersResult,
    SweepExpiredCommand, SweepExpiredHandler,
};
use crate::domain::billing::BillingError;
use crate::domain::foundation::Timestamp;
use crate::ports::SweepReport;

#[derive(Debug, Clone)]
pub struct BillingJobsConfig {
    pub sweep_interval: Duration,
    pub reminder_interval: Duration,
}

impl Default for BillingJobsConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            reminder_interval: Duration::from_secs(3600),
        }
    }
}

pub struct BillingJobRunner {
    sweep: SweepExpiredHandler,
    reminders: SendRenewalRemindersHandler,
    config: BillingJobsConfig,
}

impl BillingJobRunner {
    pub fn new(
        sweep: SweepExpiredHandler,
        reminders: SendRenewalRemindersHandler,
        config: BillingJobsConfig,
    ) -> Self {
        Self {
            sweep,
            reminders,
            config,
        }
    }

    /// Runs both passes on their intervals until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut sweep_tick = time::interval(self.config.sweep_interval);
        let mut reminder_tick = time::interval(self.config.reminder_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        reminder_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            reminder_interval_secs = self.config.reminder_interval.as_secs(),
            "Billing jobs started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Billing jobs stopped");
                        return;
                    }
                }

                _ = sweep_tick.tick() => {
                    if let Err(e) = self.sweep_once(Timestamp::now()).await {
                        tracing::error!(error = %e, "Sweep pass failed");
                    }
                }

                _ = reminder_tick.tick() => {
                    if let Err(e) = self.remind_once(Timestamp::now()).await {
                        tracing::error!(error = %e, "Reminder pass failed");
                    }
                }
            }
        }
    }

    /// Run exactly one sweep pass.
    pub async fn sweep_once(&self, now: Timestamp) -> Result<SweepReport, BillingError> {
        self.sweep.handle(SweepExpiredCommand { now }).await
    }

    /// Run exactly one reminder pass.
    pub async fn remind_once(
        &self,
        now: Timestamp,
    ) -> Result<SendRenewalRemindersResult, BillingError> {
        self.reminders
            .handle(SendRenewalRemindersCommand { now })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::memory::{InMemoryBillingLedger, InMemoryCatalog};
    use crate::adapters::notification::LogRenewalNotifier;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::application::handlers::DraftSettings;
    use crate::domain::billing::{Charge, CurrencyCode, ReminderPolicy};
    use crate::domain::foundation::{CustomerId, PlanId};
    use crate::ports::{BillingLedger, DraftPurpose, NewDraft};

    fn runner(ledger: Arc<InMemoryBillingLedger>, config: BillingJobsConfig) -> BillingJobRunner {
        let catalog = Arc::new(InMemoryCatalog::new());
        BillingJobRunner::new(
            SweepExpiredHandler::new(ledger.clone()),
            SendRenewalRemindersHandler::new(
                catalog,
                ledger,
                Arc::new(MockPaymentGateway::new()),
                Arc::new(LogRenewalNotifier::new()),
                DraftSettings::default(),
                ReminderPolicy::default(),
            ),
            config,
        )
    }

    async fn stale_draft(ledger: &InMemoryBillingLedger, now: Timestamp) {
        let created_at = now.minus_hours(5);
        ledger
            .create_draft(NewDraft {
                customer_id: CustomerId::new(),
                plan_id: PlanId::new(),
                currency: CurrencyCode::new("USD").unwrap(),
                charge: Charge {
                    subtotal: 1000,
                    tax_amount: 100,
                    credit_applied: 0,
                    total_amount: 1100,
                },
                starts_at: created_at,
                ends_at: created_at.add_days(30),
                provider_session_id: "cs_job".to_string(),
                due_at: now.minus_hours(3),
                purpose: DraftPurpose::Subscribe,
                now: created_at,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sweep_once_reports_swept_rows() {
        let ledger = Arc::new(InMemoryBillingLedger::new());
        let now = Timestamp::now();
        stale_draft(&ledger, now).await;

        let jobs = runner(ledger, BillingJobsConfig::default());

        let report = jobs.sweep_once(now).await.unwrap();
        assert_eq!(report.invoices, 1);
        assert!(jobs.sweep_once(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remind_once_with_no_candidates_is_empty() {
        let jobs = runner(
            Arc::new(InMemoryBillingLedger::new()),
            BillingJobsConfig::default(),
        );

        let result = jobs.remind_once(Timestamp::now()).await.unwrap();
        assert!(result.sent.is_empty());
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn run_sweeps_on_first_tick_and_stops_on_shutdown() {
        let ledger = Arc::new(InMemoryBillingLedger::new());
        stale_draft(&ledger, Timestamp::now()).await;
        let jobs = Arc::new(runner(
            ledger.clone(),
            BillingJobsConfig {
                sweep_interval: Duration::from_millis(10),
                reminder_interval: Duration::from_secs(60),
            },
        ));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let jobs = jobs.clone();
            async move { jobs.run(rx).await }
        });
        time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        // Already swept by the runner
        assert!(jobs.sweep_once(Timestamp::now()).await.unwrap().is_empty());
    }
}
