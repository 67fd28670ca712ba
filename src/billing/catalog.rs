//! Plan catalog.
//!
//! Reads and administrative mutations of plans. Every mutation passes
//! through governance: the free plan is locked, plans must validate, plans
//! in use cannot be deleted, and activation respects the active-plan quota
//! through a single atomic store write.

use crate::error::Result;

use super::audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger};
use super::error::BillingError;
use super::governance::{MAX_ACTIVE_PLANS, ensure_mutable};
use super::plans::{FREE_PLAN_ID, Plan, PlanPatch, Plans, sort_by_price};
use super::storage::{PlanFilter, PlanStore, QuotaCheck, SubscriptionStore};
use super::validation::validate_plan;

/// Administrative access to plans.
pub struct PlanCatalog<S, A = NoOpAuditLogger> {
    store: S,
    audit: A,
}

impl<S: PlanStore + SubscriptionStore> PlanCatalog<S> {
    /// Create a new catalog over a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            audit: NoOpAuditLogger,
        }
    }
}

impl<S: PlanStore + SubscriptionStore, A: BillingAuditLogger> PlanCatalog<S, A> {
    /// Replace the audit logger.
    #[must_use]
    pub fn with_audit_logger<L: BillingAuditLogger>(self, audit: L) -> PlanCatalog<S, L> {
        PlanCatalog {
            store: self.store,
            audit,
        }
    }

    /// All plans sorted by price, including the built-in free plan.
    pub async fn list_all(&self) -> Result<Vec<Plan>> {
        let mut plans = with_free_plan(self.store.list_plans(PlanFilter::All).await?);
        sort_by_price(&mut plans);
        Ok(plans)
    }

    /// Purchasable plans sorted by price, ties broken by ID.
    pub async fn list_active(&self) -> Result<Vec<Plan>> {
        let mut plans: Vec<Plan> = with_free_plan(self.store.list_plans(PlanFilter::Active).await?)
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        sort_by_price(&mut plans);
        Ok(plans)
    }

    /// Every plan as a lookup snapshot for classification.
    pub async fn snapshot(&self) -> Result<Plans> {
        Ok(self.list_all().await?.into_iter().collect())
    }

    /// Get a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::PlanNotFound` if no such plan exists.
    pub async fn get_by_id(&self, plan_id: &str) -> Result<Plan> {
        match self.store.get_plan(plan_id).await? {
            Some(plan) => Ok(plan),
            None if plan_id == FREE_PLAN_ID => Ok(Plan::free()),
            None => Err(BillingError::PlanNotFound {
                plan_id: plan_id.to_string(),
            }
            .into()),
        }
    }

    /// Create a plan.
    ///
    /// # Errors
    ///
    /// - `PlanLocked` for the free plan ID
    /// - `Validation` for invalid fields or a duplicate ID
    /// - `PlanQuotaExceeded` if the plan is active and the quota is full
    pub async fn create(&self, plan: Plan) -> Result<Plan> {
        ensure_mutable(&plan.id)?;
        validate_plan(&plan)?;

        if self.store.get_plan(&plan.id).await?.is_some() {
            return Err(BillingError::validation("plan_id", format!("'{}' already exists", plan.id)).into());
        }

        self.save_within_quota(&plan).await?;

        tracing::info!(
            target: "pawpass::billing",
            plan_id = %plan.id,
            price = plan.price,
            is_active = plan.is_active,
            "Plan created"
        );
        self.audit
            .log(BillingAuditEvent::PlanCreated {
                plan_id: plan.id.clone(),
                is_active: plan.is_active,
            })
            .await;

        Ok(plan)
    }

    /// Apply a partial update to a plan.
    ///
    /// # Errors
    ///
    /// - `PlanLocked` for the free plan
    /// - `PlanNotFound` if the plan does not exist
    /// - `Validation` if the patched plan is invalid
    /// - `PlanQuotaExceeded` if the patch activates a plan over quota
    pub async fn update(&self, plan_id: &str, patch: PlanPatch) -> Result<Plan> {
        ensure_mutable(plan_id)?;
        let existing = self.get_by_id(plan_id).await?;

        let updated = patch.apply_to(&existing);
        validate_plan(&updated)?;
        self.save_within_quota(&updated).await?;

        tracing::info!(
            target: "pawpass::billing",
            plan_id = %plan_id,
            "Plan updated"
        );
        self.audit
            .log(BillingAuditEvent::PlanUpdated {
                plan_id: plan_id.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Delete a plan no subscription uses.
    ///
    /// # Errors
    ///
    /// - `PlanLocked` for the free plan
    /// - `PlanNotFound` if the plan does not exist
    /// - `PlanInUse` if a subscription holds or is moving to the plan
    pub async fn delete(&self, plan_id: &str) -> Result<()> {
        ensure_mutable(plan_id)?;
        self.get_by_id(plan_id).await?;

        if self.store.is_plan_referenced(plan_id).await? {
            tracing::warn!(
                target: "pawpass::billing",
                plan_id = %plan_id,
                "Rejected deletion of plan in use"
            );
            return Err(BillingError::PlanInUse {
                plan_id: plan_id.to_string(),
            }
            .into());
        }

        self.store.delete_plan(plan_id).await?;

        tracing::info!(target: "pawpass::billing", plan_id = %plan_id, "Plan deleted");
        self.audit
            .log(BillingAuditEvent::PlanDeleted {
                plan_id: plan_id.to_string(),
            })
            .await;

        Ok(())
    }

    /// Flip whether a plan is purchasable.
    ///
    /// # Errors
    ///
    /// - `PlanLocked` for the free plan
    /// - `PlanNotFound` if the plan does not exist
    /// - `PlanQuotaExceeded` when activating over quota
    pub async fn toggle_active(&self, plan_id: &str) -> Result<Plan> {
        ensure_mutable(plan_id)?;
        let mut plan = self.get_by_id(plan_id).await?;
        plan.is_active = !plan.is_active;

        self.save_within_quota(&plan).await?;

        tracing::info!(
            target: "pawpass::billing",
            plan_id = %plan_id,
            is_active = plan.is_active,
            "Plan activation changed"
        );
        self.audit
            .log(BillingAuditEvent::PlanActivationChanged {
                plan_id: plan_id.to_string(),
                is_active: plan.is_active,
            })
            .await;

        Ok(plan)
    }

    async fn save_within_quota(&self, plan: &Plan) -> Result<()> {
        match self.store.save_plan_within_quota(plan, MAX_ACTIVE_PLANS).await? {
            QuotaCheck::Saved => Ok(()),
            QuotaCheck::Exceeded { active } => {
                tracing::warn!(
                    target: "pawpass::billing",
                    plan_id = %plan.id,
                    active,
                    max = MAX_ACTIVE_PLANS,
                    "Rejected plan activation over quota"
                );
                Err(BillingError::PlanQuotaExceeded {
                    plan_id: plan.id.clone(),
                    active,
                    max: MAX_ACTIVE_PLANS,
                }
                .into())
            }
        }
    }
}

/// Add the built-in free plan when the store does not hold one.
fn with_free_plan(mut plans: Vec<Plan>) -> Vec<Plan> {
    if !plans.iter().any(Plan::is_free) {
        plans.push(Plan::free());
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::storage::memory::InMemoryBillingStore;
    use crate::billing::storage::StoredSubscription;
    use crate::error::PawpassError;
    use crate::testing::{RecordingAuditLogger, fixtures};
    use chrono::Utc;

    fn paid(id: &str, price: i64, is_active: bool) -> Plan {
        Plan::builder(id)
            .name(&format!("{} plan", id))
            .price(price)
            .features(["Walks"])
            .active(is_active)
            .build()
    }

    fn billing_err(err: PawpassError) -> BillingError {
        match err {
            PawpassError::Billing(e) => e,
            other => panic!("expected billing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_active_sorted_by_price() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);

        let active = catalog.list_active().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["free", "bronze", "silver", "gold"]);

        let all = catalog.list_all().await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all.last().unwrap().id, "platinum");
    }

    #[tokio::test]
    async fn test_free_plan_is_built_in() {
        let catalog = PlanCatalog::new(InMemoryBillingStore::new());
        assert_eq!(catalog.get_by_id("free").await.unwrap(), Plan::free());
        assert_eq!(catalog.list_all().await.unwrap(), vec![Plan::free()]);
    }

    #[tokio::test]
    async fn test_create_plan() {
        let logger = RecordingAuditLogger::new();
        let catalog = PlanCatalog::new(InMemoryBillingStore::new()).with_audit_logger(logger.clone());

        let plan = catalog.create(paid("silver", 1000, true)).await.unwrap();
        assert_eq!(catalog.get_by_id("silver").await.unwrap(), plan);
        assert_eq!(
            logger.events(),
            vec![BillingAuditEvent::PlanCreated {
                plan_id: "silver".to_string(),
                is_active: true
            }]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_and_invalid() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);

        let err = billing_err(catalog.create(paid("gold", 2000, false)).await.unwrap_err());
        assert!(matches!(err, BillingError::Validation { ref field, .. } if field == "plan_id"));

        let err = billing_err(catalog.create(paid("ab", 100, false)).await.unwrap_err());
        assert!(matches!(err, BillingError::Validation { ref field, .. } if field == "plan_id"));

        let err = billing_err(catalog.create(paid("cheap", -5, false)).await.unwrap_err());
        assert!(matches!(err, BillingError::Validation { ref field, .. } if field == "price"));
    }

    #[tokio::test]
    async fn test_fourth_active_plan_exceeds_quota() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);
        let before = catalog.list_all().await.unwrap();

        let err = billing_err(catalog.create(paid("diamond", 9000, true)).await.unwrap_err());
        assert_eq!(
            err,
            BillingError::PlanQuotaExceeded {
                plan_id: "diamond".to_string(),
                active: 3,
                max: MAX_ACTIVE_PLANS,
            }
        );
        assert_eq!(catalog.list_all().await.unwrap(), before);

        // Inactive creation is still allowed.
        catalog.create(paid("diamond", 9000, false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_active_respects_quota() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);

        let err = billing_err(catalog.toggle_active("platinum").await.unwrap_err());
        assert!(matches!(err, BillingError::PlanQuotaExceeded { .. }));
        assert!(!catalog.get_by_id("platinum").await.unwrap().is_active);

        let bronze = catalog.toggle_active("bronze").await.unwrap();
        assert!(!bronze.is_active);
        let platinum = catalog.toggle_active("platinum").await.unwrap();
        assert!(platinum.is_active);
    }

    #[tokio::test]
    async fn test_update_applies_patch_and_quota() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);

        let patch = PlanPatch {
            price: Some(2500),
            discount_percentage: Some(10),
            ..PlanPatch::new()
        };
        let gold = catalog.update("gold", patch).await.unwrap();
        assert_eq!(gold.price, 2500);
        assert_eq!(gold.final_price(), 2250);

        let activate = PlanPatch {
            is_active: Some(true),
            ..PlanPatch::new()
        };
        let err = billing_err(catalog.update("platinum", activate).await.unwrap_err());
        assert!(matches!(err, BillingError::PlanQuotaExceeded { .. }));

        let err = billing_err(catalog.update("diamond", PlanPatch::new()).await.unwrap_err());
        assert!(matches!(err, BillingError::PlanNotFound { .. }));
    }

    #[tokio::test]
    async fn test_free_plan_is_immutable() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let catalog = PlanCatalog::new(store);

        let locked = BillingError::PlanLocked {
            plan_id: "free".to_string(),
        };
        let rename = PlanPatch {
            name: Some("Gratis".to_string()),
            ..PlanPatch::new()
        };
        assert_eq!(billing_err(catalog.update("free", rename).await.unwrap_err()), locked);
        assert_eq!(billing_err(catalog.update("free", PlanPatch::new()).await.unwrap_err()), locked);
        assert_eq!(billing_err(catalog.delete("free").await.unwrap_err()), locked);
        assert_eq!(billing_err(catalog.toggle_active("free").await.unwrap_err()), locked);
        assert_eq!(billing_err(catalog.create(Plan::free()).await.unwrap_err()), locked);
    }

    #[tokio::test]
    async fn test_delete_rejects_plan_in_use() {
        let store = InMemoryBillingStore::with_plans(fixtures::tiered_plans());
        let mut sub = StoredSubscription::free_default("user_1", Utc::now());
        sub.plan_id = "silver".to_string();
        store.compare_and_save_subscription("user_1", &sub, 0).await.unwrap();
        let catalog = PlanCatalog::new(store);

        let err = billing_err(catalog.delete("silver").await.unwrap_err());
        assert_eq!(
            err,
            BillingError::PlanInUse {
                plan_id: "silver".to_string()
            }
        );

        catalog.delete("platinum").await.unwrap();
        let err = billing_err(catalog.get_by_id("platinum").await.unwrap_err());
        assert!(matches!(err, BillingError::PlanNotFound { .. }));

        let err = billing_err(catalog.delete("platinum").await.unwrap_err());
        assert!(matches!(err, BillingError::PlanNotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_activations_respect_quota() {
        let store = InMemoryBillingStore::with_plans([
            paid("bronze", 500, true),
            paid("silver", 1000, true),
            paid("gold", 2000, false),
            paid("platinum", 4000, false),
        ]);

        let mut handles = Vec::new();
        for i in 0..6 {
            let catalog = PlanCatalog::new(store.clone());
            handles.push(tokio::spawn(async move {
                catalog.create(paid(&format!("extra_{}", i), 3000 + i, true)).await
            }));
        }
        for plan_id in ["gold", "platinum"] {
            let catalog = PlanCatalog::new(store.clone());
            handles.push(tokio::spawn(async move { catalog.toggle_active(plan_id).await }));
        }

        let mut activated = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(plan) => {
                    assert!(plan.is_active);
                    activated += 1;
                }
                Err(err) => assert!(matches!(
                    billing_err(err),
                    BillingError::PlanQuotaExceeded { .. }
                )),
            }
        }
        assert_eq!(activated, 1);

        let active_paid = PlanCatalog::new(store)
            .list_active()
            .await
            .unwrap()
            .iter()
            .filter(|p| !p.is_free())
            .count();
        assert_eq!(active_paid, MAX_ACTIVE_PLANS);
    }
}
