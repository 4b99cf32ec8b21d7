//! The curation engine.
//!
//! One coordinator task per build runs the fixed stage order
//! load → rank → slice → enrich → reason → research → context → persist,
//! with bounded fan-out inside the enrichment, reasoning, and research
//! stages. Concurrent `curate` calls for the same (company, role)
//! fingerprint observe a single build through the lease table; a cancelled
//! caller detaches without cancelling the build.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use curator_config::CurationConfig;
use curator_enrich::{
    CacheLookup, EnrichOutcome, EnrichmentCache, EnrichmentClient, ResearchClient,
    ResearchHighlight, ResearchOutcome,
};
use curator_reasoning::{
    AgentKind, PROMPT_VERSION, ReasonedVerdict, ReasoningCache, ReasoningEnsemble,
};
use curator_scoring::{ScoredCandidate, rank_candidates};
use curator_talent::{Company, EnrichmentRecord, Role, TalentError, TalentStore};

use crate::context::{ContextInputs, build_context};
use crate::lease::{Acquire, BuildLeases, Fingerprint, LeaseGuard};
use crate::response::{
    BuildOutcome, BuildWarning, FailureKind, ShortlistResponse, decision_confidence,
};
use crate::shortlist::{
    CuratedCandidate, FailureMarker, ShortlistEntry, ShortlistStats, ShortlistStatus,
    ShortlistStore,
};

/// Requested limits are clamped into this range.
const LIMIT_MIN: usize = 1;
const LIMIT_MAX: usize = 50;
/// Back-off before the single store retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);
/// Confidence multiplier for a slice candidate whose enrichment never
/// produced a record.
const UNENRICHED_CONFIDENCE_FACTOR: f32 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    #[error("role not found: {0}")]
    RoleNotFound(String),
    #[error("company not found: {0}")]
    CompanyNotFound(String),
    #[error("curation degraded: {}", .warnings.join("; "))]
    Degraded {
        warnings: Vec<String>,
        /// Rule-ranked candidates computed before the build gave up, so a
        /// caller still has something to act on.
        partial: Vec<CuratedCandidate>,
    },
    #[error("build deadline elapsed")]
    Deadline,
    #[error("transient failure: {0}")]
    Transient(String),
}

#[derive(Debug, Clone)]
pub struct CurateRequest {
    pub company_id: String,
    pub role_id: String,
    /// Defaults to the configured limit; clamped to [1, 50].
    pub limit: Option<usize>,
    /// Bypass the cache read. The build lease is still honoured.
    pub force_refresh: bool,
    /// Per-request opt-out of stale-on-error serving.
    pub allow_stale: bool,
}

impl CurateRequest {
    pub fn new(company_id: impl Into<String>, role_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            role_id: role_id.into(),
            limit: None,
            force_refresh: false,
            allow_stale: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Ready,
    Building,
    Stale,
    Missing,
    Failed,
}

/// Per-role cache status row reported by [`CurationEngine::cache_status`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoleCacheStatus {
    pub role_id: String,
    pub title: String,
    pub status: CacheState,
    pub last_built_at: Option<chrono::DateTime<Utc>>,
    pub expires_at: Option<chrono::DateTime<Utc>>,
}

struct BuildFailure {
    kind: FailureKind,
    reason: String,
    partial: Vec<CuratedCandidate>,
}

impl BuildFailure {
    fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            reason: reason.into(),
            partial: Vec::new(),
        }
    }
}

/// How one slice member's enrichment settled.
struct EnrichedCandidate {
    record: Option<EnrichmentRecord>,
    refused: bool,
    failed: bool,
}

pub struct CurationEngine {
    config: CurationConfig,
    store: Arc<dyn TalentStore>,
    shortlist: Arc<dyn ShortlistStore>,
    enrichment: EnrichmentClient,
    enrichment_cache: EnrichmentCache,
    research: ResearchClient,
    ensemble: ReasoningEnsemble,
    reasoning_cache: ReasoningCache,
    leases: Arc<BuildLeases>,
}

impl CurationEngine {
    pub fn new(
        config: CurationConfig,
        store: Arc<dyn TalentStore>,
        shortlist: Arc<dyn ShortlistStore>,
        enrichment: EnrichmentClient,
        research: ResearchClient,
        ensemble: ReasoningEnsemble,
    ) -> Arc<Self> {
        let enrichment_cache = EnrichmentCache::new(store.clone(), config.enrichment.ttl_days);
        let reasoning_cache = ReasoningCache::new(config.reasoning.cache_ttl_secs);
        let leases = BuildLeases::new(config.shortlist.lease_ttl_secs);
        Arc::new(Self {
            config,
            store,
            shortlist,
            enrichment,
            enrichment_cache,
            research,
            ensemble,
            reasoning_cache,
            leases,
        })
    }

    /// Produce (or serve) the shortlist for one (company, role).
    pub async fn curate(
        self: &Arc<Self>,
        request: CurateRequest,
    ) -> Result<ShortlistResponse, CurationError> {
        let limit = request
            .limit
            .unwrap_or(self.config.engine.default_limit)
            .clamp(LIMIT_MIN, LIMIT_MAX);
        let fingerprint: Fingerprint = (request.company_id.clone(), request.role_id.clone());

        if !request.force_refresh {
            if let Some(entry) = self.read_entry(&fingerprint).await? {
                if entry.is_fresh(Utc::now()) {
                    debug!(
                        company = %fingerprint.0,
                        role = %fingerprint.1,
                        "serving fresh cached shortlist"
                    );
                    return Ok(self.respond(&entry, limit, true, &[], false, false));
                }
            }
            // A recent failure blocks rebuilds until its back-off expires;
            // callers observe the same failure (or the stale entry) instead
            // of piling fresh builds onto a broken upstream.
            if let Ok(Some(marker)) = self
                .shortlist
                .failure(&fingerprint.0, &fingerprint.1)
                .await
            {
                if marker.is_active(Utc::now()) {
                    let kind = if marker.deadline {
                        FailureKind::Deadline
                    } else {
                        FailureKind::Transient
                    };
                    let outcome = BuildOutcome::Failure {
                        kind,
                        reason: marker.reason,
                        partial: Vec::new(),
                    };
                    return self
                        .resolve_outcome(outcome, &fingerprint, limit, request.allow_stale)
                        .await;
                }
            }
        }

        let holder = Uuid::new_v4().to_string();
        let mut rx = match self.leases.acquire(fingerprint.clone(), &holder) {
            Acquire::Acquired(guard) => {
                let rx = guard.subscribe();
                Arc::clone(self).spawn_build(guard);
                rx
            }
            Acquire::Held(rx) => rx,
        };

        let outcome = rx
            .recv()
            .await
            .map_err(|_| CurationError::Transient("build ended without an outcome".to_string()))?;
        self.resolve_outcome(outcome, &fingerprint, limit, request.allow_stale)
            .await
    }

    /// Cache status for every role belonging to the company.
    pub async fn cache_status(
        &self,
        company_id: &str,
    ) -> Result<Vec<RoleCacheStatus>, CurationError> {
        let roles = self
            .with_retry(|| self.store.list_roles(company_id))
            .await
            .map_err(|err| match err {
                TalentError::NotFound(message) => CurationError::CompanyNotFound(message),
                TalentError::Transient(message) => CurationError::Transient(message),
            })?;

        let now = Utc::now();
        let mut statuses = Vec::with_capacity(roles.len());
        for role in roles {
            let fingerprint = (company_id.to_string(), role.id.clone());
            let entry = self.shortlist.get(company_id, &role.id).await.ok().flatten();
            let failure = self
                .shortlist
                .failure(company_id, &role.id)
                .await
                .ok()
                .flatten();

            let status = if self.leases.is_building(&fingerprint) {
                CacheState::Building
            } else if failure.as_ref().is_some_and(|m| m.is_active(now)) {
                CacheState::Failed
            } else if let Some(entry) = &entry {
                if entry.is_fresh(now) {
                    CacheState::Ready
                } else {
                    CacheState::Stale
                }
            } else {
                CacheState::Missing
            };

            statuses.push(RoleCacheStatus {
                role_id: role.id,
                title: role.title,
                status,
                last_built_at: entry.as_ref().map(|e| e.generated_at),
                expires_at: entry.as_ref().map(|e| e.expires_at),
            });
        }
        Ok(statuses)
    }

    // ── caller-side plumbing ─────────────────────────────────────────────────

    async fn resolve_outcome(
        &self,
        outcome: BuildOutcome,
        fingerprint: &Fingerprint,
        limit: usize,
        allow_stale: bool,
    ) -> Result<ShortlistResponse, CurationError> {
        match outcome {
            BuildOutcome::Success {
                entry,
                warnings,
                reasoning_collapsed,
            } => Ok(self.respond(&entry, limit, false, &warnings, reasoning_collapsed, false)),
            BuildOutcome::Failure {
                kind,
                reason,
                partial,
            } => {
                if allow_stale && self.config.shortlist.serve_stale_on_error {
                    if let Ok(Some(entry)) =
                        self.shortlist.get(&fingerprint.0, &fingerprint.1).await
                    {
                        warn!(
                            company = %fingerprint.0,
                            role = %fingerprint.1,
                            %reason,
                            "build failed; serving expired shortlist"
                        );
                        let warning = BuildWarning::StaleServed {
                            deadline: kind == FailureKind::Deadline,
                        };
                        return Ok(self.respond(&entry, limit, true, &[warning], false, true));
                    }
                }
                Err(match kind {
                    FailureKind::RoleNotFound => CurationError::RoleNotFound(reason),
                    FailureKind::CompanyNotFound => CurationError::CompanyNotFound(reason),
                    FailureKind::Degraded => CurationError::Degraded {
                        warnings: vec![reason],
                        partial,
                    },
                    FailureKind::Deadline => CurationError::Deadline,
                    FailureKind::Transient => CurationError::Transient(reason),
                })
            }
        }
    }

    fn respond(
        &self,
        entry: &ShortlistEntry,
        limit: usize,
        from_cache: bool,
        warnings: &[BuildWarning],
        reasoning_collapsed: bool,
        stale: bool,
    ) -> ShortlistResponse {
        let mut candidates = entry.candidates.clone();
        candidates.truncate(limit);
        let warnings: Vec<String> = warnings.iter().map(ToString::to_string).collect();
        let degraded = !warnings.is_empty();
        ShortlistResponse {
            candidates,
            stats: entry.stats,
            from_cache,
            degraded,
            decision_confidence: decision_confidence(
                warnings.is_empty(),
                reasoning_collapsed,
                stale,
            ),
            warnings,
        }
    }

    /// Shortlist cache read with its own deadline and one retry.
    async fn read_entry(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ShortlistEntry>, CurationError> {
        let deadline = Duration::from_secs(self.config.shortlist.cache_read_timeout_secs);
        for attempt in 0..2 {
            match tokio::time::timeout(
                deadline,
                self.shortlist.get(&fingerprint.0, &fingerprint.1),
            )
            .await
            {
                Ok(Ok(entry)) => return Ok(entry),
                Ok(Err(TalentError::NotFound(_))) => return Ok(None),
                Ok(Err(TalentError::Transient(message))) if attempt == 0 => {
                    warn!(%message, "shortlist read failed; retrying once");
                }
                Ok(Err(TalentError::Transient(message))) => {
                    return Err(CurationError::Transient(message));
                }
                Err(_) if attempt == 0 => {
                    warn!("shortlist read timed out; retrying once");
                }
                Err(_) => {
                    return Err(CurationError::Transient(
                        "shortlist read timed out".to_string(),
                    ));
                }
            }
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
        unreachable!("read loop returns within two attempts")
    }

    // ── the build coordinator ────────────────────────────────────────────────

    /// Detach the build from its initiating caller: waiters and the
    /// initiator all observe the outcome over the lease channel, so a
    /// cancelled caller never cancels the build.
    fn spawn_build(self: Arc<Self>, guard: LeaseGuard) {
        tokio::spawn(async move {
            let fingerprint = guard.fingerprint().clone();

            let refresh_task = {
                let leases = self.leases.clone();
                let fingerprint = fingerprint.clone();
                let every =
                    Duration::from_secs(self.config.shortlist.lease_refresh_secs.max(1));
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(every);
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        leases.refresh(&fingerprint);
                    }
                })
            };

            let deadline = Duration::from_secs(self.config.engine.build_deadline_secs);
            let result =
                tokio::time::timeout(deadline, self.build_shortlist(&fingerprint)).await;
            refresh_task.abort();

            let outcome = match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(failure)) => BuildOutcome::Failure {
                    kind: failure.kind,
                    reason: failure.reason,
                    partial: failure.partial,
                },
                Err(_) => BuildOutcome::Failure {
                    kind: FailureKind::Deadline,
                    reason: "build deadline elapsed".to_string(),
                    partial: Vec::new(),
                },
            };

            // NotFound is a caller error, not a build fault: no back-off.
            if let BuildOutcome::Failure { kind, reason, .. } = &outcome {
                if !matches!(
                    kind,
                    FailureKind::RoleNotFound | FailureKind::CompanyNotFound
                ) {
                    let marker = FailureMarker {
                        reason: reason.clone(),
                        deadline: *kind == FailureKind::Deadline,
                        failed_at: Utc::now(),
                        until: Utc::now()
                            + ChronoDuration::seconds(self.config.shortlist.failed_backoff_secs),
                    };
                    if let Err(err) = self
                        .shortlist
                        .mark_failed(&fingerprint.0, &fingerprint.1, marker)
                        .await
                    {
                        warn!(%err, "failed to record build failure marker");
                    }
                }
            }

            guard.complete(outcome);
        });
    }

    async fn build_shortlist(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<BuildOutcome, BuildFailure> {
        let (company_id, role_id) = (fingerprint.0.as_str(), fingerprint.1.as_str());
        let started = std::time::Instant::now();

        let role = self
            .with_retry(|| self.store.get_role(role_id))
            .await
            .map_err(|err| match err {
                TalentError::NotFound(message) => BuildFailure {
                    kind: FailureKind::RoleNotFound,
                    reason: message,
                    partial: Vec::new(),
                },
                TalentError::Transient(message) => BuildFailure::transient(message),
            })?;
        let company = self
            .with_retry(|| self.store.get_company(company_id))
            .await
            .map_err(|err| match err {
                TalentError::NotFound(message) => BuildFailure {
                    kind: FailureKind::CompanyNotFound,
                    reason: message,
                    partial: Vec::new(),
                },
                TalentError::Transient(message) => BuildFailure::transient(message),
            })?;
        let people = self
            .with_retry(|| self.store.list_people(company_id))
            .await
            .map_err(|err| match err {
                TalentError::NotFound(message) => BuildFailure {
                    kind: FailureKind::CompanyNotFound,
                    reason: message,
                    partial: Vec::new(),
                },
                TalentError::Transient(message) => BuildFailure::transient(message),
            })?;

        let today = Utc::now().date_naive();
        let ranked = rank_candidates(&people, &role, &company, today);

        let slice_len = self
            .config
            .enrichment
            .slice_size
            .min(self.config.enrichment.max_per_build)
            .min(ranked.len());
        if slice_len < self.config.reasoning.min_candidates {
            // Not enough candidates to spend reasoning budget on; hand the
            // caller the rule-ranked list instead of nothing.
            return Err(BuildFailure {
                kind: FailureKind::Degraded,
                reason: format!(
                    "only {} candidates available to reason about",
                    slice_len
                ),
                partial: ranked.iter().take(LIMIT_MAX).map(rule_only_candidate).collect(),
            });
        }

        info!(
            company = company_id,
            role = role_id,
            total = ranked.len(),
            slice = slice_len,
            "shortlist build started"
        );

        // Stage: enrichment. Fan-out within the stage; the stage boundary is
        // the join, so no reasoning call starts before every enrichment has
        // settled.
        let slice = &ranked[..slice_len];
        let enriched: Vec<EnrichedCandidate> =
            join_all(slice.iter().map(|cand| self.enrich_candidate(cand))).await;

        // Stage: reasoning.
        let verdicts: Vec<ReasonedVerdict> = join_all(
            slice
                .iter()
                .zip(&enriched)
                .map(|(cand, enr)| self.reason_candidate(cand, enr.record.as_ref(), &role, &company)),
        )
        .await;

        // Merge: final score is the aggregate where the ensemble produced
        // one, the rule score otherwise; the tail keeps its rule score.
        struct Line<'a> {
            scored: &'a ScoredCandidate,
            record: Option<&'a EnrichmentRecord>,
            refused: bool,
            failed: bool,
            verdict: Option<&'a ReasonedVerdict>,
            match_score: f32,
            highlights: Vec<ResearchHighlight>,
        }
        let mut lines: Vec<Line> = ranked
            .iter()
            .enumerate()
            .map(|(index, scored)| {
                let (record, refused, failed, verdict) = if index < slice_len {
                    let enr = &enriched[index];
                    (
                        enr.record.as_ref(),
                        enr.refused,
                        enr.failed,
                        Some(&verdicts[index]),
                    )
                } else {
                    (None, false, false, None)
                };
                let match_score = verdict
                    .and_then(|v| v.aggregate)
                    .unwrap_or(scored.score);
                Line {
                    scored,
                    record,
                    refused,
                    failed,
                    verdict,
                    match_score,
                    highlights: Vec::new(),
                }
            })
            .collect();
        lines.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| b.scored.completeness.total_cmp(&a.scored.completeness))
                .then_with(|| a.scored.person.id.cmp(&b.scored.person.id))
        });

        // Stage: research, over the reasoning-ranked top slice only.
        let mut research_failures = 0usize;
        if self.research.is_enabled() {
            let research_len = self.config.research.slice_size.min(slice_len);
            let targets: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.verdict.is_some())
                .map(|(index, _)| index)
                .take(research_len)
                .collect();
            let outcomes = join_all(
                targets
                    .iter()
                    .map(|&index| self.research.research(&lines[index].scored.person, &role)),
            )
            .await;
            for (&index, outcome) in targets.iter().zip(outcomes) {
                match outcome {
                    ResearchOutcome::Highlights(highlights) => {
                        lines[index].highlights = highlights;
                    }
                    ResearchOutcome::Disabled => {}
                    ResearchOutcome::TimedOut | ResearchOutcome::Failed(_) => {
                        research_failures += 1;
                    }
                }
            }
        }

        // Stage: context building and assembly (CPU-bound).
        let candidates: Vec<CuratedCandidate> = lines
            .iter()
            .take(LIMIT_MAX)
            .map(|line| {
                let Some(verdict) = line.verdict else {
                    // The tail never entered the expensive stages.
                    return rule_only_candidate(line.scored);
                };
                let enriched = line.record.is_some();
                let context = build_context(&ContextInputs {
                    scored: line.scored,
                    verdict: Some(verdict),
                    highlights: &line.highlights,
                    enriched,
                });
                let confidence = if enriched {
                    verdict.confidence
                } else {
                    verdict.confidence * UNENRICHED_CONFIDENCE_FACTOR
                };
                CuratedCandidate {
                    person: line.scored.person.clone(),
                    match_score: line.match_score,
                    confidence,
                    data_completeness: line.scored.completeness,
                    enrichment_sources: context.enrichment.sources.clone(),
                    rule_score: line.scored.score,
                    skill_match: line.scored.skill_match.clone(),
                    reasoning: Some(verdict.clone()),
                    context,
                }
            })
            .collect();

        // Accounting for the warnings list.
        let enrich_failures = enriched.iter().filter(|e| e.failed).count();
        let budget_refusals = enriched.iter().filter(|e| e.refused).count();
        let mut failed_agents: Vec<AgentKind> = Vec::new();
        for verdict in &verdicts {
            for agent in &verdict.failed_agents {
                if !failed_agents.contains(agent) {
                    failed_agents.push(*agent);
                }
            }
        }
        let collapsed_count = verdicts.iter().filter(|v| v.degraded).count();

        let mut warnings = Vec::new();
        if enrich_failures > 0 {
            warnings.push(BuildWarning::Enrichment {
                failures: enrich_failures,
            });
        }
        if budget_refusals > 0 {
            warnings.push(BuildWarning::EnrichmentBudget {
                refused: budget_refusals,
            });
        }
        for agent in AgentKind::ALL {
            if failed_agents.contains(&agent) {
                warnings.push(BuildWarning::ReasoningAgent { agent });
            }
        }
        if collapsed_count > 0 {
            warnings.push(BuildWarning::ReasoningFallback {
                candidates: collapsed_count,
            });
        }
        if research_failures > 0 {
            warnings.push(BuildWarning::Research {
                failures: research_failures,
            });
        }
        let reasoning_collapsed = !verdicts.is_empty() && collapsed_count == verdicts.len();

        let enriched_count = enriched.iter().filter(|e| e.record.is_some()).count();
        let average_score = if candidates.is_empty() {
            0.0
        } else {
            candidates.iter().map(|c| c.match_score).sum::<f32>() / candidates.len() as f32
        };

        let now = Utc::now();
        let entry = ShortlistEntry {
            company_id: company_id.to_string(),
            role_id: role_id.to_string(),
            generated_at: now,
            expires_at: now + ChronoDuration::days(self.config.shortlist.ttl_days),
            candidates,
            stats: ShortlistStats {
                total_searched: people.len(),
                enriched_count,
                average_score,
            },
            status: ShortlistStatus::Ready,
        };

        self.write_entry(&entry).await?;

        info!(
            company = company_id,
            role = role_id,
            candidates = entry.candidates.len(),
            enriched = enriched_count,
            warnings = warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "shortlist build complete"
        );

        Ok(BuildOutcome::Success {
            entry: Arc::new(entry),
            warnings,
            reasoning_collapsed,
        })
    }

    /// Cache-first per-person enrichment. A stale record is kept as a
    /// fallback when the refresh attempt fails.
    async fn enrich_candidate(&self, cand: &ScoredCandidate) -> EnrichedCandidate {
        let lookup = match self.enrichment_cache.lookup(&cand.person.id).await {
            Ok(lookup) => lookup,
            Err(err) => {
                warn!(person = %cand.person.id, %err, "enrichment cache read failed");
                CacheLookup::Absent
            }
        };

        let stale = match lookup {
            CacheLookup::Fresh(record) => {
                return EnrichedCandidate {
                    record: Some(record),
                    refused: false,
                    failed: false,
                };
            }
            CacheLookup::Stale(record) => Some(record),
            CacheLookup::Absent => None,
        };

        match self.enrichment.enrich(&cand.person).await {
            EnrichOutcome::Enriched(record) => {
                if let Err(err) = self.enrichment_cache.store(record.clone()).await {
                    warn!(person = %cand.person.id, %err, "enrichment cache write failed");
                }
                EnrichedCandidate {
                    record: Some(record),
                    refused: false,
                    failed: false,
                }
            }
            EnrichOutcome::NoMatch => EnrichedCandidate {
                record: stale,
                refused: false,
                failed: false,
            },
            EnrichOutcome::Budget => EnrichedCandidate {
                record: stale,
                refused: true,
                failed: false,
            },
            EnrichOutcome::Failed(_) => EnrichedCandidate {
                record: stale,
                refused: false,
                failed: true,
            },
        }
    }

    /// Ensemble pass with the short-window verdict cache in front.
    async fn reason_candidate(
        &self,
        cand: &ScoredCandidate,
        record: Option<&EnrichmentRecord>,
        role: &Role,
        company: &Company,
    ) -> ReasonedVerdict {
        if let Some(cached) = self
            .reasoning_cache
            .get(&cand.person.id, &role.id, PROMPT_VERSION)
        {
            return cached;
        }
        let verdict = self
            .ensemble
            .reason(&cand.person, record, role, company)
            .await;
        self.reasoning_cache
            .put(&cand.person.id, &role.id, PROMPT_VERSION, verdict.clone());
        verdict
    }

    /// Shortlist write with its own deadline and one retry; still-failing
    /// writes are fatal to the build.
    async fn write_entry(&self, entry: &ShortlistEntry) -> Result<(), BuildFailure> {
        let deadline = Duration::from_secs(self.config.shortlist.cache_write_timeout_secs);
        for attempt in 0..2 {
            match tokio::time::timeout(deadline, self.shortlist.put(entry.clone())).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) if attempt == 0 => {
                    warn!(%err, "shortlist write failed; retrying once");
                }
                Ok(Err(err)) => return Err(BuildFailure::transient(err.to_string())),
                Err(_) if attempt == 0 => {
                    warn!("shortlist write timed out; retrying once");
                }
                Err(_) => {
                    return Err(BuildFailure::transient("shortlist write timed out"));
                }
            }
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
        unreachable!("write loop returns within two attempts")
    }

    /// One retry with a short back-off for transient store errors.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, TalentError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TalentError>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(TalentError::NotFound(message)) => Err(TalentError::NotFound(message)),
            Err(TalentError::Transient(message)) => {
                warn!(%message, "store call failed; retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                op().await
            }
        }
    }
}

/// A candidate carried on rule data alone: no verdict, no enrichment, no
/// research. Used for the unsliced tail and for the partial payload of a
/// degraded build.
fn rule_only_candidate(scored: &ScoredCandidate) -> CuratedCandidate {
    let context = build_context(&ContextInputs {
        scored,
        verdict: None,
        highlights: &[],
        enriched: false,
    });
    CuratedCandidate {
        person: scored.person.clone(),
        match_score: scored.score,
        confidence: scored.completeness,
        data_completeness: scored.completeness,
        enrichment_sources: context.enrichment.sources.clone(),
        rule_score: scored.score,
        skill_match: scored.skill_match.clone(),
        reasoning: None,
        context,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
