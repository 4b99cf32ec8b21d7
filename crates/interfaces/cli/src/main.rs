mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use curator_config::CurationConfig;
use curator_engine::{CurateRequest, CurationEngine, MemoryShortlistStore, ShortlistResponse};
use curator_enrich::{
    EnrichmentClient, EnrichmentProvider, PdlProvider, PerplexityProvider, ResearchClient,
    TokenBucket,
};
use curator_reasoning::{OpenRouterClient, ReasoningEnsemble};
use curator_scoring::rank_candidates;
use curator_talent::{EnrichmentRecord, MemoryTalentStore, Person, TalentStore};

#[derive(Debug, Parser)]
#[command(
    name = "curator",
    version,
    about = "Curate ranked candidate shortlists from a talent graph"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config/curator.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build (or serve) the shortlist for a role.
    Curate {
        #[arg(long)]
        company: String,
        #[arg(long)]
        role: String,
        /// Talent graph fixtures (JSON).
        #[arg(long)]
        fixtures: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        /// Bypass the shortlist cache.
        #[arg(long)]
        force: bool,
        /// Fail instead of serving an expired entry when the build fails.
        #[arg(long)]
        no_stale: bool,
        /// Emit the raw response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Report per-role shortlist cache status for a company.
    Status {
        #[arg(long)]
        company: String,
        #[arg(long)]
        fixtures: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Rule-score a role's candidate pool without spending any budget.
    Score {
        #[arg(long)]
        company: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        fixtures: PathBuf,
        #[arg(long, default_value_t = 15)]
        limit: usize,
    },
}

/// Stand-in enrichment provider for runs without a provider key: answers
/// no-match for everyone, so the pipeline degrades honestly instead of
/// pretending to verify records.
struct OfflineEnrichment;

#[async_trait]
impl EnrichmentProvider for OfflineEnrichment {
    async fn enrich(&self, _person: &Person) -> Result<Option<EnrichmentRecord>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = CurationConfig::load_from(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.telemetry.log_level.clone())),
        )
        .init();

    match cli.command {
        Commands::Curate {
            company,
            role,
            fixtures,
            limit,
            force,
            no_stale,
            json,
        } => {
            let store = fixtures::load_store(&fixtures).await?;
            let engine = build_engine(config, store);
            let request = CurateRequest {
                company_id: company,
                role_id: role,
                limit,
                force_refresh: force,
                allow_stale: !no_stale,
            };
            let response = engine
                .curate(request)
                .await
                .context("curation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_shortlist(&response);
            }
        }
        Commands::Status {
            company,
            fixtures,
            json,
        } => {
            let store = fixtures::load_store(&fixtures).await?;
            let engine = build_engine(config, store);
            let statuses = engine
                .cache_status(&company)
                .await
                .context("status query failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else if statuses.is_empty() {
                println!("no roles found for {company}");
            } else {
                for status in statuses {
                    println!(
                        "{:<12} {:<28} {:?}",
                        status.role_id, status.title, status.status
                    );
                }
            }
        }
        Commands::Score {
            company,
            role,
            fixtures,
            limit,
        } => {
            let store = fixtures::load_store(&fixtures).await?;
            run_score(&*store, &company, &role, limit).await?;
        }
    }

    Ok(())
}

fn build_engine(config: CurationConfig, store: Arc<MemoryTalentStore>) -> Arc<CurationEngine> {
    let bucket = Arc::new(TokenBucket::per_minute(config.enrichment.rate_per_minute));
    let enrichment_provider: Arc<dyn EnrichmentProvider> =
        if config.enrichment.api_key.is_empty() {
            tracing::warn!("PDL_API_KEY not set; enrichment runs offline");
            Arc::new(OfflineEnrichment)
        } else {
            Arc::new(PdlProvider::new(config.enrichment.api_key.clone()))
        };
    let enrichment =
        EnrichmentClient::new(enrichment_provider, bucket, config.enrichment.timeout_secs);

    let research = if config.research_active() {
        ResearchClient::new(
            Arc::new(PerplexityProvider::new(config.research.api_key.clone())),
            config.research.timeout_secs,
        )
    } else {
        ResearchClient::disabled()
    };

    let ensemble = ReasoningEnsemble::new(
        Arc::new(OpenRouterClient::new(
            config.reasoning.api_key.clone(),
            config.reasoning.model.clone(),
        )),
        config.reasoning.per_agent_timeout_secs,
    );

    CurationEngine::new(
        config,
        store,
        MemoryShortlistStore::new(),
        enrichment,
        research,
        ensemble,
    )
}

fn print_shortlist(response: &ShortlistResponse) {
    println!(
        "{} candidates (searched {}, enriched {}, avg score {:.1}){}",
        response.candidates.len(),
        response.stats.total_searched,
        response.stats.enriched_count,
        response.stats.average_score,
        if response.from_cache { "  [cached]" } else { "" },
    );
    for (index, candidate) in response.candidates.iter().enumerate() {
        println!(
            "{:>2}. {:<24} score {:>5.1}  confidence {:.2}  sources {}",
            index + 1,
            candidate.person.name,
            candidate.match_score,
            candidate.confidence,
            candidate.enrichment_sources.join("+"),
        );
        for why in &candidate.context.why_consider {
            if let Some(bullet) = why.bullets.first() {
                println!("      {:?} [{:?}]: {bullet}", why.category, why.strength);
            }
        }
    }
    if response.degraded {
        println!(
            "degraded result ({:?} confidence):",
            response.decision_confidence
        );
        for warning in &response.warnings {
            println!("  - {warning}");
        }
    }
}

async fn run_score(
    store: &dyn TalentStore,
    company_id: &str,
    role_id: &str,
    limit: usize,
) -> Result<()> {
    let role = store
        .get_role(role_id)
        .await
        .with_context(|| format!("loading role {role_id}"))?;
    let company = store
        .get_company(company_id)
        .await
        .with_context(|| format!("loading company {company_id}"))?;
    let people = store.list_people(company_id).await?;
    if people.is_empty() {
        bail!("no people recorded for {company_id}");
    }

    let today = chrono::Utc::now().date_naive();
    let ranked = rank_candidates(&people, &role, &company, today);
    for (index, scored) in ranked.iter().take(limit).enumerate() {
        println!(
            "{:>2}. {:<24} {:>5.1}  skills {:>4.1}  exp {:>4.1}  culture {:>4.1}  signals {:>4.1}  matched [{}]",
            index + 1,
            scored.person.name,
            scored.score,
            scored.components.skills,
            scored.components.experience,
            scored.components.culture,
            scored.components.signals,
            scored.skill_match.matched.join(", "),
        );
    }
    Ok(())
}
