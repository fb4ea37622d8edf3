//! Scoped reads with an ordered fallback across endpoints.
//!
//! Every read is total: a missing token, an undecodable token, transport
//! failures and malformed payloads all end in an empty result, never an error.

use crate::config::{ApiConfig, Endpoint};
use crate::fallback::{first_non_empty, Provider};
use crate::normalize::{
    assignee_references, extract_records, owner_references, team_reference, Normalizer,
};
use crate::schema::{EntityKind, Identity, NormalizedEntry, Scope, Target};
use crate::session::SessionContext;
use crate::transport::Transport;
use crate::utils::join_url;
use log::{debug, info, warn};
use serde_json::Value;

/// Which records of an unscoped response belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    Unfiltered,
    Owner(String),
    /// Records tagged with the team, plus the caller's own records. Records
    /// of other members that carry no team reference cannot be attributed
    /// without the team roster and are left out.
    Team { team_id: String, user_id: String },
}

/// One step of a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub url: String,
    pub filter: RecordFilter,
    /// True when the URL asks the server to filter by year. The client-side
    /// year filter still runs, since some backends ignore the parameter.
    pub server_year_filter: bool,
}

impl SourceSpec {
    fn new(url: String, filter: RecordFilter, year: Option<i32>) -> Self {
        match year {
            Some(y) => Self {
                url: format!("{}?year={}", url, y),
                filter,
                server_year_filter: true,
            },
            None => Self {
                url,
                filter,
                server_year_filter: false,
            },
        }
    }

    fn unscoped(url: String, filter: RecordFilter) -> Self {
        Self {
            url,
            filter,
            server_year_filter: false,
        }
    }
}

/// Ordered sources for a read of `collection_url` under `scope`.
///
/// - own: `/my`, `/employee/{id}`, then the whole collection filtered by owner
/// - team: `/team/{id}`, then the whole collection filtered by team
/// - all: the collection with the year parameter, then without it
pub fn source_plan(
    collection_url: &str,
    scope: &Scope,
    identity: &Identity,
    year: Option<i32>,
) -> Vec<SourceSpec> {
    let mut plan = match scope {
        Scope::Own => vec![
            SourceSpec::new(join_url(collection_url, "my"), RecordFilter::Unfiltered, year),
            SourceSpec::new(
                join_url(collection_url, &format!("employee/{}", identity.user_id)),
                RecordFilter::Unfiltered,
                year,
            ),
            SourceSpec::unscoped(
                collection_url.to_string(),
                RecordFilter::Owner(identity.user_id.clone()),
            ),
        ],
        Scope::Team(team_id) => vec![
            SourceSpec::new(
                join_url(collection_url, &format!("team/{}", team_id)),
                RecordFilter::Unfiltered,
                year,
            ),
            SourceSpec::unscoped(
                collection_url.to_string(),
                RecordFilter::Team {
                    team_id: team_id.clone(),
                    user_id: identity.user_id.clone(),
                },
            ),
        ],
        Scope::All => vec![
            SourceSpec::new(collection_url.to_string(), RecordFilter::Unfiltered, year),
            SourceSpec::unscoped(collection_url.to_string(), RecordFilter::Unfiltered),
        ],
    };

    plan.dedup();
    plan
}

/// Keeps raw records whose owner references include `user_id`.
pub fn retain_owned(records: Vec<Value>, user_id: &str, references: fn(&Value) -> Vec<String>) -> Vec<Value> {
    records
        .into_iter()
        .filter(|raw| references(raw).iter().any(|r| r == user_id))
        .collect()
}

/// Keeps raw records tagged with `team_id`, plus those referencing `user_id`.
pub fn retain_team(
    records: Vec<Value>,
    team_id: &str,
    user_id: &str,
    references: fn(&Value) -> Vec<String>,
) -> Vec<Value> {
    records
        .into_iter()
        .filter(|raw| {
            team_reference(raw).as_deref() == Some(team_id)
                || references(raw).iter().any(|r| r == user_id)
        })
        .collect()
}

/// Keeps entries dated in `year`.
pub fn retain_year(entries: Vec<NormalizedEntry>, year: i32) -> Vec<NormalizedEntry> {
    entries.into_iter().filter(|e| e.year() == year).collect()
}

pub fn retain_target_year(targets: Vec<Target>, year: i32) -> Vec<Target> {
    targets.into_iter().filter(|t| t.year == year).collect()
}

fn apply_filter(
    records: Vec<Value>,
    filter: &RecordFilter,
    references: fn(&Value) -> Vec<String>,
) -> Vec<Value> {
    match filter {
        RecordFilter::Unfiltered => records,
        RecordFilter::Owner(user_id) => retain_owned(records, user_id, references),
        RecordFilter::Team { team_id, user_id } => {
            retain_team(records, team_id, user_id, references)
        }
    }
}

pub(crate) fn endpoint_for(kind: EntityKind) -> Endpoint {
    match kind {
        EntityKind::Sale => Endpoint::Sales,
        EntityKind::Order => Endpoint::Orders,
    }
}

/// Client for the dashboard API: scoped reads, performance series and writes.
pub struct PerformanceClient<T> {
    config: ApiConfig,
    transport: T,
    normalizer: Normalizer,
}

impl<T: Transport> PerformanceClient<T> {
    pub fn new(config: ApiConfig, transport: T) -> Self {
        let normalizer = Normalizer::new(config.normalization);
        Self {
            config,
            transport,
            normalizer,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sales or orders visible under `scope`, optionally restricted to one year.
    pub async fn fetch_entity(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        scope: &Scope,
        year: Option<i32>,
    ) -> Vec<NormalizedEntry> {
        let normalizer = self.normalizer;

        self.run_chain(
            session,
            endpoint_for(kind),
            kind.plural(),
            scope,
            year,
            owner_references,
            move |records, year| {
                let entries = normalizer.normalize_entries(&records, kind);
                match year {
                    Some(y) => retain_year(entries, y),
                    None => entries,
                }
            },
        )
        .await
    }

    /// Targets visible under `scope`, optionally restricted to one year.
    pub async fn fetch_targets(
        &self,
        session: &SessionContext,
        scope: &Scope,
        year: Option<i32>,
    ) -> Vec<Target> {
        let normalizer = self.normalizer;

        self.run_chain(
            session,
            Endpoint::Targets,
            "targets",
            scope,
            year,
            assignee_references,
            move |records, year| {
                let targets = normalizer.normalize_targets(&records);
                match year {
                    Some(y) => retain_target_year(targets, y),
                    None => targets,
                }
            },
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_chain<U, F>(
        &self,
        session: &SessionContext,
        endpoint: Endpoint,
        collection_key: &'static str,
        scope: &Scope,
        year: Option<i32>,
        references: fn(&Value) -> Vec<String>,
        finish: F,
    ) -> Vec<U>
    where
        U: Send,
        F: Fn(Vec<Value>, Option<i32>) -> Vec<U> + Sync,
    {
        let Some(token) = session.token() else {
            debug!("No session token, skipping {} read", collection_key);
            return Vec::new();
        };

        let identity = match session.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Cannot read {} without an identity: {}", collection_key, e);
                return Vec::new();
            }
        };

        let collection_url = self.config.endpoint(endpoint);
        let finish = &finish;

        let providers: Vec<Provider<'_, U>> = source_plan(&collection_url, scope, identity, year)
            .into_iter()
            .map(move |source| {
                let label = source.url.clone();
                Provider::new(label, move || async move {
                    let payload = self.transport.get(&source.url, token).await?;
                    let records = extract_records(payload, collection_key)?;
                    let records = apply_filter(records, &source.filter, references);
                    Ok(finish(records, year))
                })
            })
            .collect();

        let outcome = first_non_empty(providers).await;
        match &outcome.source {
            Some(source) => debug!(
                "Read {} {} from {} after {} attempt(s)",
                outcome.items.len(),
                collection_key,
                source,
                outcome.attempts
            ),
            None => info!(
                "No {} available for {:?} after {} attempt(s)",
                collection_key, scope, outcome.attempts
            ),
        }

        outcome.items
    }
}
