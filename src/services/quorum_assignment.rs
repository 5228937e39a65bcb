//! Hybrid local/global quorum assignment.
//!
//! Selects up to [`QUORUM_SIZE`] validators for a submission and writes one
//! pending evaluation per validator as a single batch. Re-invocation for the
//! same submission only fills slots that are not already held by a pending or
//! completed evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AssignmentRequest, Evaluation, EvaluationStatus, GeoPoint, QuorumAssignment, QuorumComposition,
    QuorumConfig, Validator, ValidatorTier, HYBRID_LOCAL_SLOTS, QUORUM_SIZE,
};
use crate::domain::ports::{
    CandidatePool, CandidateQuery, Clock, EvaluationRepository, ProximitySearch, ValidatorRepository,
};

/// Candidates from one pool, split by tier stratum and ranked within each.
#[derive(Debug, Default)]
pub struct StratifiedCandidates {
    pub senior: Vec<Validator>,
    pub apprentice: Vec<Validator>,
}

impl StratifiedCandidates {
    pub fn len(&self) -> usize {
        self.senior.len() + self.apprentice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take up to `n` validators, journeyman-and-above first.
    pub fn take(&mut self, n: usize) -> Vec<Validator> {
        let from_senior = n.min(self.senior.len());
        let mut picked: Vec<Validator> = self.senior.drain(..from_senior).collect();
        let from_apprentice = (n - picked.len()).min(self.apprentice.len());
        picked.extend(self.apprentice.drain(..from_apprentice));
        picked
    }
}

/// Order candidates by soft affinity, then accuracy, then current load.
///
/// The sort is stable, so a pool pre-sorted by distance keeps distance as the
/// final tiebreaker when `keep_input_order` is set.
pub fn rank_candidates(candidates: &mut [Validator], domain: &str, region: Option<&str>, keep_input_order: bool) {
    if keep_input_order {
        candidates.sort_by(|a, b| b.affinity(domain, region).cmp(&a.affinity(domain, region)));
    } else {
        candidates.sort_by(|a, b| {
            b.affinity(domain, region)
                .cmp(&a.affinity(domain, region))
                .then_with(|| b.f1_score.total_cmp(&a.f1_score))
                .then_with(|| a.daily_evaluation_count.cmp(&b.daily_evaluation_count))
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

pub struct QuorumAssignmentService<V, E>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
{
    validators: Arc<V>,
    evaluations: Arc<E>,
    proximity: Arc<dyn ProximitySearch>,
    clock: Arc<dyn Clock>,
    config: QuorumConfig,
}

impl<V, E> QuorumAssignmentService<V, E>
where
    V: ValidatorRepository,
    E: EvaluationRepository,
{
    pub fn new(
        validators: Arc<V>,
        evaluations: Arc<E>,
        proximity: Arc<dyn ProximitySearch>,
        clock: Arc<dyn Clock>,
        config: QuorumConfig,
    ) -> Self {
        Self { validators, evaluations, proximity, clock, config }
    }

    /// Form (or top up) the quorum for a submission.
    #[instrument(skip(self, request), fields(submission_id = %request.submission_id, scope = request.scope.as_str()))]
    pub async fn assign(&self, request: &AssignmentRequest) -> DomainResult<QuorumAssignment> {
        request.validate().map_err(DomainError::ValidationFailed)?;
        let now = self.clock.now();

        let existing = self.evaluations.list_for_submission(request.submission_id).await?;
        let excluded: Vec<Uuid> = existing.iter().map(|e| e.validator_id).collect();
        let active: Vec<&Evaluation> = existing
            .iter()
            .filter(|e| e.status != EvaluationStatus::Expired)
            .collect();

        let mut members = Vec::with_capacity(QUORUM_SIZE);
        for evaluation in &active {
            if let Some(v) = self.validators.get(evaluation.validator_id).await? {
                members.push(v);
            }
        }

        let needed = QUORUM_SIZE.saturating_sub(active.len());
        if needed == 0 {
            debug!("quorum already full, nothing to assign");
            let expires_at = active.iter().map(|e| e.expires_at).max().unwrap_or(now);
            return Ok(summarize(request.submission_id, &members, Vec::new(), expires_at));
        }

        let existing_local = members.iter().filter(|v| !v.is_global()).count();
        let selected = self.select(request, needed, existing_local, &excluded).await?;

        let expires_at = now + self.config.evaluation_ttl();
        let rows: Vec<Evaluation> = selected
            .iter()
            .map(|v| Evaluation::new(request.submission_id, request.submission_type.clone(), v.id, now, self.config.evaluation_ttl()))
            .collect();

        self.evaluations
            .insert_quorum(&rows, self.config.daily_evaluation_limit, now)
            .await?;

        let newly_assigned: Vec<Uuid> = selected.iter().map(|v| v.id).collect();
        members.extend(selected);
        let assignment = summarize(request.submission_id, &members, newly_assigned, expires_at);

        info!(
            composition = assignment.composition.as_str(),
            tier_fallback = assignment.tier_fallback,
            assigned = assignment.newly_assigned.len(),
            local = assignment.local_validator_ids.len(),
            global = assignment.global_validator_ids.len(),
            "quorum assigned"
        );

        Ok(assignment)
    }

    /// Choose `needed` new validators. Hyperlocal submissions seek local
    /// validators until the quorum holds [`HYBRID_LOCAL_SLOTS`] of them, and
    /// degrade to the global pool when fewer local candidates exist.
    async fn select(
        &self,
        request: &AssignmentRequest,
        needed: usize,
        existing_local: usize,
        excluded: &[Uuid],
    ) -> DomainResult<Vec<Validator>> {
        let mut picked = Vec::with_capacity(needed);
        let mut exclude: Vec<Uuid> = excluded.to_vec();

        let mut local = match request.local_search_point() {
            Some(origin) => {
                let pool = self
                    .stratified(request, CandidatePool::Local, Some(origin), HYBRID_LOCAL_SLOTS + needed, &exclude)
                    .await?;
                if existing_local + pool.len() < HYBRID_LOCAL_SLOTS {
                    warn!(local_candidates = pool.len(), "not enough local validators, degrading to global pool");
                    StratifiedCandidates::default()
                } else {
                    pool
                }
            }
            None => StratifiedCandidates::default(),
        };

        let local_target = HYBRID_LOCAL_SLOTS.saturating_sub(existing_local).min(needed);
        if !local.is_empty() {
            picked.extend(local.take(local_target));
        }
        exclude.extend(picked.iter().map(|v| v.id));

        let global_needed = needed - picked.len();
        let mut global = self
            .stratified(request, CandidatePool::Global, None, global_needed, &exclude)
            .await?;
        picked.extend(global.take(global_needed));

        // No global validator available: fill remaining hybrid slots locally.
        if picked.len() < needed {
            picked.extend(local.take(needed - picked.len()));
        }

        if picked.len() < needed {
            warn!(required = needed, available = picked.len(), "cannot form quorum");
            return Err(DomainError::InsufficientValidators { required: needed, available: picked.len() });
        }

        Ok(picked)
    }

    /// Fetch a pool journeyman-and-above first, falling back to apprentices only
    /// when the senior stratum cannot cover `want`.
    async fn stratified(
        &self,
        request: &AssignmentRequest,
        pool: CandidatePool,
        origin: Option<GeoPoint>,
        want: usize,
        exclude: &[Uuid],
    ) -> DomainResult<StratifiedCandidates> {
        let base = CandidateQuery {
            exclude_agent_id: request.author_agent_id,
            exclude_validator_ids: exclude.to_vec(),
            min_tier: Some(ValidatorTier::Journeyman),
            pool,
            daily_limit: self.config.daily_evaluation_limit,
        };

        let senior = self.within_reach(self.validators.find_candidates(&base).await?, origin);
        let apprentice = if senior.len() < want {
            let all = self
                .validators
                .find_candidates(&CandidateQuery { min_tier: None, ..base })
                .await?;
            let apprentices = all.into_iter().filter(|v| v.tier == ValidatorTier::Apprentice).collect();
            self.within_reach(apprentices, origin)
        } else {
            Vec::new()
        };

        let mut candidates = StratifiedCandidates { senior, apprentice };
        let region = request.region.as_deref();
        let by_distance = origin.is_some();
        rank_candidates(&mut candidates.senior, &request.domain, region, by_distance);
        rank_candidates(&mut candidates.apprentice, &request.domain, region, by_distance);

        debug!(
            pool = ?pool,
            senior = candidates.senior.len(),
            apprentice = candidates.apprentice.len(),
            "candidate pool"
        );
        Ok(candidates)
    }

    fn within_reach(&self, candidates: Vec<Validator>, origin: Option<GeoPoint>) -> Vec<Validator> {
        match origin {
            Some(origin) => self
                .proximity
                .nearest_within_radius(origin, self.config.local_radius_km, candidates),
            None => candidates,
        }
    }
}

fn summarize(
    submission_id: Uuid,
    members: &[Validator],
    newly_assigned: Vec<Uuid>,
    expires_at: DateTime<Utc>,
) -> QuorumAssignment {
    let mut seen = HashSet::new();
    let (mut local, mut global) = (Vec::new(), Vec::new());
    for v in members.iter().filter(|v| seen.insert(v.id)) {
        if v.is_global() {
            global.push(v.id);
        } else {
            local.push(v.id);
        }
    }

    QuorumAssignment {
        submission_id,
        composition: QuorumComposition::from_counts(local.len(), global.len()),
        local_validator_ids: local,
        global_validator_ids: global,
        newly_assigned,
        tier_fallback: members.iter().any(|v| v.tier == ValidatorTier::Apprentice),
        quorum_required: QUORUM_SIZE,
        expires_at,
    }
}
