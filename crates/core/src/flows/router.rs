use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{
    LeaveCategory, RequestCategory, RequestRecord, ReviewCategory, StepStatus,
};
use crate::domain::role::{Role, StaffLevel};
use crate::flows::states::Decision;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKey {
    StandardLeave(StaffLevel),
    MedicalLeave,
    FacultyReview,
    HodReview,
}

impl RouteKey {
    pub fn new(category: RequestCategory, subject_level: StaffLevel) -> Self {
        match category {
            RequestCategory::Leave(LeaveCategory::Standard) => Self::StandardLeave(subject_level),
            RequestCategory::Leave(LeaveCategory::Medical) => Self::MedicalLeave,
            RequestCategory::Review(ReviewCategory::Faculty) => Self::FacultyReview,
            RequestCategory::Review(ReviewCategory::Hod) => Self::HodReview,
        }
    }

    pub fn for_record(record: &RequestRecord) -> Self {
        Self::new(record.category, record.subject_level)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStage {
    pub role: Role,
    pub allowed: Vec<Decision>,
    /// Approval at this stage must carry a paid/unpaid split.
    pub reconciles: bool,
    /// Stage index a `return` sends the chain back to.
    pub returns_to: Option<usize>,
}

impl RouteStage {
    pub fn new(role: Role, allowed: &[Decision]) -> Self {
        Self { role, allowed: allowed.to_vec(), reconciles: false, returns_to: None }
    }

    pub fn reconciling(mut self) -> Self {
        self.reconciles = true;
        self
    }

    pub fn returning_to(mut self, stage_index: usize) -> Self {
        self.returns_to = Some(stage_index);
        self
    }

    pub fn allows(&self, decision: Decision) -> bool {
        self.allowed.contains(&decision)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub stages: Vec<RouteStage>,
}

impl Route {
    pub fn new(stages: Vec<RouteStage>) -> Self {
        Self { stages }
    }

    pub fn stage(&self, index: usize) -> Option<&RouteStage> {
        self.stages.get(index)
    }

    pub fn first_role(&self) -> Option<Role> {
        self.stages.first().map(|stage| stage.role)
    }

    pub fn terminal_role(&self) -> Option<Role> {
        self.stages.last().map(|stage| stage.role)
    }

    pub fn reconciliation_role(&self) -> Option<Role> {
        self.stages.iter().find(|stage| stage.reconciles).map(|stage| stage.role)
    }

    fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.stages.len()
    }
}

/// Route per category. Adding a workflow means adding an entry here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<RouteKey, Route>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self { routes: BTreeMap::new() }
    }

    pub fn with_route(mut self, key: RouteKey, route: Route) -> Self {
        self.routes.insert(key, route);
        self
    }

    pub fn route(&self, key: RouteKey) -> Option<&Route> {
        self.routes.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        use Decision::{Approve, Finalize, Reject, Return};

        let manager_leave = |role| Route::new(vec![RouteStage::new(role, &[Approve, Reject])]);
        let review = |confirming_role| {
            Route::new(vec![
                RouteStage::new(confirming_role, &[Approve]),
                RouteStage::new(Role::Vc, &[Approve, Return]).returning_to(0),
                RouteStage::new(Role::Hr, &[Finalize, Approve]),
            ])
        };

        Self::empty()
            .with_route(
                RouteKey::StandardLeave(StaffLevel::Department),
                manager_leave(StaffLevel::Department.direct_manager()),
            )
            .with_route(
                RouteKey::StandardLeave(StaffLevel::Faculty),
                manager_leave(StaffLevel::Faculty.direct_manager()),
            )
            .with_route(
                RouteKey::MedicalLeave,
                Route::new(vec![
                    RouteStage::new(Role::Hod, &[Approve, Reject]),
                    RouteStage::new(Role::Vc, &[Approve, Reject]),
                    RouteStage::new(Role::President, &[Approve, Reject]).reconciling(),
                ]),
            )
            .with_route(RouteKey::FacultyReview, review(Role::Hod))
            .with_route(RouteKey::HodReview, review(Role::Dean))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainPosition {
    Active { stage_index: usize },
    Closed,
}

/// Where a decision at a stage sends the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Forward { next_stage: usize },
    Complete,
    Reject,
    Rewind { to_stage: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no route is configured for {0:?}")]
    UnknownRoute(RouteKey),
    #[error("chain step {position} is `{found}` but the route expects `{expected}`")]
    RoleMismatch { position: usize, expected: Role, found: Role },
    #[error("chain step {position} follows a closed chain")]
    StepAfterClose { position: usize },
    #[error("chain step {position} is pending but is not the last step")]
    PendingNotLast { position: usize },
    #[error("chain step {position} was returned from a stage without a return edge")]
    MissingReturnEdge { position: usize },
    #[error("chain has no pending step although the request is still open")]
    Unscheduled,
    #[error("stage {stage_index} does not exist on route {key:?}")]
    UnknownStage { key: RouteKey, stage_index: usize },
    #[error("decision `{decision}` has no edge from stage {stage_index} on route {key:?}")]
    NoEdge { key: RouteKey, stage_index: usize, decision: Decision },
}

#[derive(Clone, Debug, Default)]
pub struct ChainRouter {
    table: RoutingTable,
}

impl ChainRouter {
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn route(&self, key: RouteKey) -> Result<&Route, RoutingError> {
        self.table.route(key).ok_or(RoutingError::UnknownRoute(key))
    }

    pub fn route_for(&self, record: &RequestRecord) -> Result<&Route, RoutingError> {
        self.route(RouteKey::for_record(record))
    }

    pub fn first_role(&self, key: RouteKey) -> Option<Role> {
        self.table.route(key).and_then(Route::first_role)
    }

    pub fn terminal_role(&self, key: RouteKey) -> Option<Role> {
        self.table.route(key).and_then(Route::terminal_role)
    }

    pub fn reconciliation_role(&self, key: RouteKey) -> Option<Role> {
        self.table.route(key).and_then(Route::reconciliation_role)
    }

    /// Replays the recorded chain against the route. Any divergence from
    /// the route is an error, never a repair.
    pub fn position(&self, record: &RequestRecord) -> Result<ChainPosition, RoutingError> {
        let key = RouteKey::for_record(record);
        let route = self.route(key)?;
        let last = record.approval_chain.len().saturating_sub(1);
        let mut stage_index = 0usize;
        let mut closed = false;

        for (position, step) in record.approval_chain.iter().enumerate() {
            if closed {
                return Err(RoutingError::StepAfterClose { position });
            }

            let stage = route
                .stage(stage_index)
                .ok_or(RoutingError::UnknownStage { key, stage_index })?;
            if step.role != stage.role {
                return Err(RoutingError::RoleMismatch {
                    position,
                    expected: stage.role,
                    found: step.role,
                });
            }

            match step.status {
                StepStatus::Pending => {
                    if position != last {
                        return Err(RoutingError::PendingNotLast { position });
                    }
                    return Ok(ChainPosition::Active { stage_index });
                }
                StepStatus::Approved if route.is_last(stage_index) => closed = true,
                StepStatus::Approved => stage_index += 1,
                StepStatus::Rejected => closed = true,
                StepStatus::Returned => {
                    stage_index =
                        stage.returns_to.ok_or(RoutingError::MissingReturnEdge { position })?;
                }
            }
        }

        if closed {
            Ok(ChainPosition::Closed)
        } else {
            Err(RoutingError::Unscheduled)
        }
    }

    /// The stage the chain is waiting on, or `None` once it is closed.
    pub fn active_stage<'a>(
        &'a self,
        record: &RequestRecord,
    ) -> Result<Option<(usize, &'a RouteStage)>, RoutingError> {
        match self.position(record)? {
            ChainPosition::Closed => Ok(None),
            ChainPosition::Active { stage_index } => {
                let key = RouteKey::for_record(record);
                let stage = self
                    .route(key)?
                    .stage(stage_index)
                    .ok_or(RoutingError::UnknownStage { key, stage_index })?;
                Ok(Some((stage_index, stage)))
            }
        }
    }

    /// The role expected to act. `Ok(None)` means the request is finished;
    /// a chain that diverges from its route is an error.
    pub fn try_next_role(&self, record: &RequestRecord) -> Result<Option<Role>, RoutingError> {
        if record.status.is_terminal() {
            return Ok(None);
        }
        Ok(self.active_stage(record)?.map(|(_, stage)| stage.role))
    }

    /// Lenient form of [`ChainRouter::try_next_role`] for filters and
    /// actor checks: a corrupt chain has no valid actor.
    pub fn next_role(&self, record: &RequestRecord) -> Option<Role> {
        self.try_next_role(record).ok().flatten()
    }

    pub fn is_valid_actor(&self, record: &RequestRecord, role: Role) -> bool {
        self.next_role(record) == Some(role)
    }

    pub fn advance(
        &self,
        key: RouteKey,
        stage_index: usize,
        decision: Decision,
    ) -> Result<Advance, RoutingError> {
        let route = self.route(key)?;
        let stage =
            route.stage(stage_index).ok_or(RoutingError::UnknownStage { key, stage_index })?;
        let no_edge = RoutingError::NoEdge { key, stage_index, decision };

        if !stage.allows(decision) {
            return Err(no_edge);
        }

        match decision {
            Decision::Reject => Ok(Advance::Reject),
            Decision::Return => {
                stage.returns_to.map(|to_stage| Advance::Rewind { to_stage }).ok_or(no_edge)
            }
            Decision::Approve | Decision::Finalize if route.is_last(stage_index) => {
                Ok(Advance::Complete)
            }
            Decision::Approve => Ok(Advance::Forward { next_stage: stage_index + 1 }),
            Decision::Finalize => Err(no_edge),
        }
    }
}
