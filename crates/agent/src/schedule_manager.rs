//! Schedule Manager: owns the ordered association list and the
//! authoritative "what's due next" queries.
//!
//! Queried by id only — it never holds a reference back to the Processor
//! or the Signal Bus, breaking the cyclic dependency the design notes flag.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sa_domain::model::{Association, AssociationErrorCode, AssociationStatus};
use sa_domain::trace::AgentEvent;
use tokio::sync::RwLock;

use crate::collaborators::ControlPlaneClient;
use crate::expression::{self, ParsedSchedule};

struct Entry {
    association: Association,
    parsed: Option<ParsedSchedule>,
}

pub struct ScheduleManager {
    /// Server-provided order is preserved: `order` holds ids in the order
    /// the last refresh returned them.
    order: RwLock<Vec<String>>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for ScheduleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleManager {
    pub fn new() -> Self {
        Self {
            order: RwLock::new(Vec::new()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the managed list with `incoming`, reporting each
    /// association's new/unchanged/invalid outcome to `control_plane`.
    /// Never called with a lock held across the reporting RPCs — each
    /// status call happens before the entry is inserted, not while holding
    /// `entries`'s write guard.
    pub async fn refresh(
        &self,
        incoming: Vec<Association>,
        control_plane: &dyn ControlPlaneClient,
    ) {
        let mut seen = std::collections::HashSet::new();
        let mut new_order = Vec::with_capacity(incoming.len());
        let mut built: HashMap<String, Entry> = HashMap::new();

        let previous = self.entries.read().await;

        for mut assoc in incoming {
            if !seen.insert(assoc.association_id.clone()) {
                AgentEvent::AssociationDuplicateDropped {
                    association_id: assoc.association_id.clone(),
                }
                .emit();
                continue;
            }

            let prior = previous.get(&assoc.association_id);
            let unchanged = prior
                .map(|p| p.association.checksum == assoc.checksum)
                .unwrap_or(false);

            if unchanged {
                let prior = prior.unwrap();
                assoc.create_date = prior.association.create_date;
                assoc.next_scheduled_date = prior.association.next_scheduled_date;
                assoc.exclude_from_future_scheduling =
                    prior.association.exclude_from_future_scheduling;
                assoc.legacy_association = prior.association.legacy_association;
                let parsed = prior.parsed.clone();
                AgentEvent::AssociationRefreshed {
                    association_id: assoc.association_id.clone(),
                    unchanged: true,
                }
                .emit();
                new_order.push(assoc.association_id.clone());
                built.insert(assoc.association_id.clone(), Entry {
                    association: assoc,
                    parsed,
                });
                continue;
            }

            AgentEvent::AssociationRefreshed {
                association_id: assoc.association_id.clone(),
                unchanged: false,
            }
            .emit();

            let expr = assoc
                .schedule_expression
                .clone()
                .unwrap_or_else(|| expression::FALLBACK_EXPRESSION.to_string());
            if assoc.schedule_expression.is_none() {
                assoc.legacy_association = true;
                assoc.run_now = true;
            }

            let parsed = match expression::parse(&expr) {
                Ok(p) => {
                    AgentEvent::ScheduleParsed {
                        association_id: assoc.association_id.clone(),
                        expression: expr.clone(),
                    }
                    .emit();
                    Some(p)
                }
                Err(e) => {
                    AgentEvent::ScheduleParseFailed {
                        association_id: assoc.association_id.clone(),
                        expression: expr.clone(),
                        message: e.message.clone(),
                    }
                    .emit();
                    assoc.exclude_from_future_scheduling = true;
                    assoc.detailed_status = Some(AssociationStatus::Failed);
                    assoc.errors.push(e.message.clone());
                    report_status(
                        control_plane,
                        &assoc,
                        AssociationStatus::Failed,
                        AssociationErrorCode::InvalidExpression,
                        &e.message,
                    )
                    .await;
                    None
                }
            };

            if let Some(p) = &parsed {
                if assoc.run_now {
                    assoc.next_scheduled_date = Some(Utc::now());
                } else if assoc.next_scheduled_date.is_none() {
                    let basis = assoc.last_execution_date.unwrap_or_else(Utc::now);
                    assoc.next_scheduled_date = p.next(basis);
                }
            }

            new_order.push(assoc.association_id.clone());
            built.insert(assoc.association_id.clone(), Entry {
                association: assoc,
                parsed,
            });
        }

        drop(previous);
        *self.entries.write().await = built;
        *self.order.write().await = new_order;
    }

    /// The first non-excluded, due association in server-preserved order.
    pub async fn load_next_scheduled_association(&self) -> Option<Association> {
        let now = Utc::now();
        let order = self.order.read().await;
        let entries = self.entries.read().await;
        for id in order.iter() {
            if let Some(entry) = entries.get(id) {
                if entry.association.exclude_from_future_scheduling {
                    continue;
                }
                if let Some(next) = entry.association.next_scheduled_date {
                    if next <= now {
                        return Some(entry.association.clone());
                    }
                }
            }
        }
        None
    }

    /// The minimum non-excluded, non-zero `next_scheduled_date` across the
    /// managed list, or `None` if nothing is scheduled at all.
    pub async fn load_next_scheduled_date(&self) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| !e.association.exclude_from_future_scheduling)
            .filter_map(|e| e.association.next_scheduled_date)
            .min()
    }

    /// One-shot associations (`legacy_association`) are excluded after
    /// firing once; everything else advances via its parsed schedule's
    /// `next()`. Keyed on `legacy_association`, not `run_now` — `run_now`
    /// is local-only and does not survive an unchanged-checksum refresh
    /// (§3's carry-forward list omits it), whereas `legacy_association`
    /// does, so it is the field that stays true from the association's
    /// first fire through to this completion even if a poll cycle landed
    /// in between.
    pub async fn update_next_scheduled_date(&self, association_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(association_id) {
            if entry.association.legacy_association {
                entry.association.exclude_from_future_scheduling = true;
                entry.association.run_now = false;
                return;
            }
            let now = Utc::now();
            entry.association.last_execution_date = Some(now);
            entry.association.next_scheduled_date =
                entry.parsed.as_ref().and_then(|p| p.next(now));
            if entry.association.next_scheduled_date.is_none() {
                entry.association.exclude_from_future_scheduling = true;
            }
        }
    }

    pub async fn mark_completed(&self, association_id: &str) {
        self.exclude(association_id).await;
    }

    pub async fn exclude_from_future_scheduling(&self, association_id: &str) {
        self.exclude(association_id).await;
    }

    async fn exclude(&self, association_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(association_id) {
            entry.association.exclude_from_future_scheduling = true;
        }
    }

    pub async fn get(&self, association_id: &str) -> Option<Association> {
        self.entries
            .read()
            .await
            .get(association_id)
            .map(|e| e.association.clone())
    }

    pub async fn ids(&self) -> std::collections::HashSet<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

async fn report_status(
    control_plane: &dyn ControlPlaneClient,
    assoc: &Association,
    status: AssociationStatus,
    error_code: AssociationErrorCode,
    message: &str,
) {
    let result = control_plane
        .update_instance_association_status(
            &assoc.association_id,
            &assoc.name,
            &assoc.instance_id,
            status,
            error_code,
            Utc::now(),
            message,
            None,
        )
        .await;
    if let Err(e) = result {
        tracing::warn!(association_id = %assoc.association_id, error = %e, "failed to report association status");
    } else {
        AgentEvent::StatusReported {
            association_id: assoc.association_id.clone(),
            status: format!("{status:?}"),
            error_code: format!("{error_code:?}"),
        }
        .emit();
    }
}
