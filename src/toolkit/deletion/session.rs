use serde::Serialize;
use strum::IntoStaticStr;
use tracing::{debug, info};

use super::manager::DeletionManager;
use super::models::{DeletionPlan, EntityRef, ExecutionResult, ExecutionStatus};
use crate::core::error::{PurgeError, Result};
use crate::core::locks::EntityLock;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Idle,
    Analyzing,
    PlanReady,
    Confirming,
    Executing,
    Completed,
    Failed,
}


/// One deletion dialog: `Idle → Analyzing → PlanReady → Confirming →
/// Executing → Completed | Failed`. The plan lives only as long as the
/// session.
pub struct DeletionSession<'a> {
    manager: &'a DeletionManager,
    target: EntityRef,
    state: SessionState,
    plan: Option<DeletionPlan>,
    result: Option<ExecutionResult>,
    lock: Option<EntityLock>,
}

impl<'a> DeletionSession<'a> {
    pub(crate) fn new(manager: &'a DeletionManager, target: EntityRef) -> Self {
        Self {
            manager,
            target,
            state: SessionState::Idle,
            plan: None,
            result: None,
            lock: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> &EntityRef {
        &self.target
    }

    pub fn plan(&self) -> Option<&DeletionPlan> {
        self.plan.as_ref()
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    /// Re-analysing from `PlanReady` replaces the previous plan.
    pub async fn analyze(&mut self) -> Result<&DeletionPlan> {
        self.ensure_state(&[SessionState::Idle, SessionState::PlanReady], SessionState::Analyzing)?;
        self.transition(SessionState::Analyzing);
        self.plan = None;

        let outcome = self.manager.analyze(&self.target.id, self.target.kind).await;
        match outcome {
            Ok(plan) => {
                self.transition(SessionState::PlanReady);
                Ok(self.plan.insert(plan))
            }
            Err(e) => {
                self.transition(SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Takes the target's advisory lock; a blocked plan never reaches
    /// confirmation.
    pub fn request_confirmation(&mut self) -> Result<()> {
        self.ensure_state(&[SessionState::PlanReady], SessionState::Confirming)?;
        let Some(plan) = self.plan.as_ref() else {
            return Err(self.invalid(SessionState::Confirming));
        };
        if !plan.can_delete {
            return Err(PurgeError::Blocked {
                target: self.target.clone(),
                reason: plan.reason.clone(),
            });
        }

        self.lock = Some(self.manager.locks().try_acquire(&self.target)?);
        self.transition(SessionState::Confirming);
        Ok(())
    }


    pub async fn confirm(&mut self, cascade_empty_groups: bool) -> Result<&ExecutionResult> {
        self.ensure_state(&[SessionState::Confirming], SessionState::Executing)?;
        let Some(plan) = self.plan.take() else {
            return Err(self.invalid(SessionState::Executing));
        };
        self.transition(SessionState::Executing);

        let outcome = self.manager.execute_locked(&plan, cascade_empty_groups).await;
        self.lock = None;

        match outcome {
            Ok(result) => {
                let next = match result.status {
                    ExecutionStatus::Completed => SessionState::Completed,
                    ExecutionStatus::Failed | ExecutionStatus::RolledBack => SessionState::Failed,
                };
                self.transition(next);
                Ok(self.result.insert(result))
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Discards the plan and releases the lock; nothing has been deleted.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_state(
            &[SessionState::Idle, SessionState::PlanReady, SessionState::Confirming],
            SessionState::Idle,
        )?;
        self.plan = None;
        self.lock = None;
        self.transition(SessionState::Idle);
        info!("Deletion of {} cancelled", self.target);
        Ok(())
    }

    fn ensure_state(&self, allowed: &[SessionState], to: SessionState) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(to))
        }
    }

    fn invalid(&self, to: SessionState) -> PurgeError {
        PurgeError::InvalidTransition {
            from: self.state.into(),
            to: to.into(),
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from: &'static str = self.state.into();
        let to_name: &'static str = to.into();
        debug!("Session for {}: {} -> {}", self.target, from, to_name);
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PurgeConfig;
    use crate::db::StoreOp;
    use crate::toolkit::deletion::fixtures;
    use crate::toolkit::deletion::models::EntityKind;

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = fixtures::plant().await;
        let manager = DeletionManager::new(store.clone(), &PurgeConfig::default());
        let mut session = manager.session("E3", EntityKind::Equipment);
        assert_eq!(session.state(), SessionState::Idle);

        let plan = session.analyze().await.unwrap();
        assert_eq!(plan.item_name, "Tour C");
        assert_eq!(session.state(), SessionState::PlanReady);

        session.request_confirmation().unwrap();
        assert_eq!(session.state(), SessionState::Confirming);
        assert!(manager.locks().is_locked(session.target()));

        let result = session.confirm(true).await.unwrap();
        assert!(result.is_success());
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.plan().is_none());
        assert!(!manager.locks().is_locked(session.target()));
        assert_eq!(store.rows("groups").await.len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_before_analysis_is_rejected() {
        let manager = DeletionManager::new(fixtures::plant().await, &PurgeConfig::default());
        let mut session = manager.session("E1", EntityKind::Equipment);

        let err = session.confirm(false).await.unwrap_err();
        assert!(matches!(
            err,
            PurgeError::InvalidTransition { from: "idle", to: "executing" }
        ));
    }

    #[tokio::test]
    async fn test_cancel_releases_lock_and_keeps_data() {
        let store = fixtures::plant().await;
        let manager = DeletionManager::new(store.clone(), &PurgeConfig::default());
        let mut session = manager.session("E1", EntityKind::Equipment);

        session.analyze().await.unwrap();
        session.request_confirmation().unwrap();
        session.cancel().unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.plan().is_none());
        assert!(!manager.locks().is_locked(session.target()));
        assert_eq!(store.rows("equipments").await.len(), 3);
    }

    #[tokio::test]
    async fn test_blocked_plan_cannot_be_confirmed() {
        let manager = DeletionManager::new(fixtures::plant().await, &PurgeConfig::default());
        let mut session = manager.session("P4", EntityKind::Part);

        let plan = session.analyze().await.unwrap();
        assert!(!plan.can_delete);
        assert!(matches!(session.request_confirmation(), Err(PurgeError::Blocked { .. })));
        assert_eq!(session.state(), SessionState::PlanReady);
    }

    #[tokio::test]
    async fn test_second_session_on_same_target_is_locked() {
        let manager = DeletionManager::new(fixtures::plant().await, &PurgeConfig::default());
        let mut first = manager.session("E2", EntityKind::Equipment);
        let mut second = manager.session("E2", EntityKind::Equipment);

        first.analyze().await.unwrap();
        second.analyze().await.unwrap();
        first.request_confirmation().unwrap();
        assert!(matches!(second.request_confirmation(), Err(PurgeError::Locked(_))));
    }

    #[tokio::test]
    async fn test_failed_execution_ends_in_failed_state() {
        let store = fixtures::plant().await;
        let config = PurgeConfig {
            verify_plan_before_execute: false,
            ..PurgeConfig::default()
        };
        let manager = DeletionManager::new(store.clone(), &config);
        let mut session = manager.session("E1", EntityKind::Equipment);

        session.analyze().await.unwrap();
        session.request_confirmation().unwrap();
        store.fail_on("equipments", StoreOp::Delete);

        let result = session.confirm(false).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::RolledBack);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_missing_target_returns_to_idle() {
        let manager = DeletionManager::new(fixtures::plant().await, &PurgeConfig::default());
        let mut session = manager.session("E404", EntityKind::Equipment);
        assert!(session.analyze().await.is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
