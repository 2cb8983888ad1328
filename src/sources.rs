//! External lookups used to enrich leads.
//!
//! `SimulatedSource` produces deterministic data with realistic latency and
//! is the default. `HttpEnrichmentSource` talks to a JSON provider, caching
//! responses and guarding calls with a circuit breaker.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::cache_validator::ValidatedCacheEntry;
use crate::circuit_breaker::{create_lookup_circuit_breaker, LookupCircuitBreaker};
use crate::config::{Config, EnrichmentProvider};
use crate::errors::AppError;
use crate::models::{
    CompanyInfo, CreditCapacity, CreditEstimate, Lead, ProfessionalProfile, PropertyHistory,
    PropertyTransaction, SocialProfiles,
};

/// Identity used as the key for person lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonQuery {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PersonQuery {
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            email: lead.email.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
        }
    }
}

/// A provider of enrichment data. `Ok(None)` means the provider has
/// nothing for the key; `Err` means the lookup itself failed.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn professional_profile(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<ProfessionalProfile>, AppError>;

    async fn company_info(&self, company: &str) -> Result<Option<CompanyInfo>, AppError>;

    async fn property_history(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<PropertyHistory>, AppError>;

    async fn credit_estimate(
        &self,
        email: &str,
        company: Option<&str>,
    ) -> Result<Option<CreditEstimate>, AppError>;

    async fn social_profiles(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<SocialProfiles>, AppError>;
}

/// Build the source selected by `ENRICHMENT_PROVIDER`.
pub fn source_from_config(config: &Config) -> Result<Arc<dyn EnrichmentSource>, AppError> {
    match &config.enrichment_provider {
        EnrichmentProvider::Simulated { latency } => {
            tracing::info!("Using simulated enrichment source (latency: {})", latency);
            Ok(Arc::new(SimulatedSource::new(*latency)))
        }
        EnrichmentProvider::Http { base_url, api_key } => {
            tracing::info!("Using HTTP enrichment source at {}", base_url);
            let source = HttpEnrichmentSource::new(
                base_url.clone(),
                api_key.clone(),
                Duration::from_secs(config.lookup_cache_ttl_secs),
            )?;
            Ok(Arc::new(source))
        }
    }
}

// ============ Simulated ============

/// Artificial latency per lookup, in milliseconds.
const PROFILE_LATENCY_MS: (u64, u64) = (1000, 3000);
const COMPANY_LATENCY_MS: (u64, u64) = (500, 1500);
const PROPERTY_HISTORY_LATENCY_MS: (u64, u64) = (1500, 3500);
const CREDIT_LATENCY_MS: (u64, u64) = (800, 2000);
const SOCIAL_LATENCY_MS: (u64, u64) = (300, 800);

const TITLES: [&str; 6] = [
    "Senior Development Manager",
    "Director of Acquisitions",
    "Founder",
    "Project Coordinator",
    "Real Estate Associate",
    "Chief Operating Officer",
];

const EMPLOYERS: [&str; 4] = [
    "Houston Development Corp",
    "Gulf Coast Builders",
    "Bayou City Holdings",
    "Lone Star Land Partners",
];

const COMPANY_SIZES: [&str; 5] = [
    "1-9 employees",
    "10-99 employees",
    "50-200 employees",
    "100-999 employees",
    "1000+ employees",
];

const REVENUES: [&str; 4] = ["$1M - $5M", "$10M - $50M", "$50M - $100M", "$100M+"];

const TRANSACTION_TYPES: [&str; 4] = ["purchase", "sale", "development", "construction"];

const STREETS: [&str; 5] = ["Main St", "Oak Ave", "Westheimer Rd", "Bellaire Blvd", "Memorial Dr"];

const CREDIT_INDICATORS: [&str; 3] = [
    "Good payment history",
    "Low debt utilization",
    "Long credit history",
];

/// Deterministic stand-in for real providers. The same key always yields
/// the same data.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    latency: bool,
}

impl SimulatedSource {
    pub fn new(latency: bool) -> Self {
        Self { latency }
    }

    async fn pause(&self, seed: &[u8; 32], range: (u64, u64)) {
        if self.latency {
            tokio::time::sleep(simulated_latency(seed, range)).await;
        }
    }
}

fn seed(parts: &[&str]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.trim().to_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn pick<'a>(seed: &[u8; 32], index: usize, choices: &[&'a str]) -> &'a str {
    choices[usize::from(seed[index % 32]) % choices.len()]
}

fn simulated_latency(seed: &[u8; 32], (min, max): (u64, u64)) -> Duration {
    let offset = u64::from(u16::from_be_bytes([seed[30], seed[31]])) % (max - min + 1);
    Duration::from_millis(min + offset)
}

/// "maria-lopez" from the names, or the email's local part when unnamed.
fn handle(person: &PersonQuery, separator: &str) -> Option<String> {
    let names: Vec<String> = [person.first_name.as_deref(), person.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_lowercase().replace(char::is_whitespace, ""))
        .filter(|n| !n.is_empty())
        .collect();

    if !names.is_empty() {
        return Some(names.join(separator));
    }

    person
        .email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_lowercase)
}

fn person_seed(person: &PersonQuery) -> [u8; 32] {
    seed(&[
        &person.email,
        person.first_name.as_deref().unwrap_or(""),
        person.last_name.as_deref().unwrap_or(""),
    ])
}

#[async_trait]
impl EnrichmentSource for SimulatedSource {
    async fn professional_profile(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<ProfessionalProfile>, AppError> {
        let seed = person_seed(person);
        self.pause(&seed, PROFILE_LATENCY_MS).await;

        Ok(Some(ProfessionalProfile {
            title: Some(pick(&seed, 0, &TITLES).to_string()),
            company: Some(pick(&seed, 1, &EMPLOYERS).to_string()),
            industry: Some("Real Estate Development".to_string()),
            location: Some("Houston, TX".to_string()),
            profile_url: handle(person, "-").map(|h| format!("https://linkedin.com/in/{}", h)),
        }))
    }

    async fn company_info(&self, company: &str) -> Result<Option<CompanyInfo>, AppError> {
        let name = company.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let seed = seed(&[name]);
        self.pause(&seed, COMPANY_LATENCY_MS).await;

        let domain: String = name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        Ok(Some(CompanyInfo {
            name: Some(name.to_string()),
            size: Some(pick(&seed, 0, &COMPANY_SIZES).to_string()),
            industry: Some("Real Estate Development".to_string()),
            revenue: Some(pick(&seed, 1, &REVENUES).to_string()),
            website: (!domain.is_empty()).then(|| format!("https://{}.com", domain)),
        }))
    }

    async fn property_history(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<PropertyHistory>, AppError> {
        let seed = person_seed(person);
        self.pause(&seed, PROPERTY_HISTORY_LATENCY_MS).await;

        let count = usize::from(seed[2] % 5);
        let transactions: Vec<PropertyTransaction> = (0..count)
            .map(|i| {
                let base = 3 + i * 4;
                PropertyTransaction {
                    address: format!(
                        "{} {}, Houston, TX",
                        100 + u32::from(seed[base]) * 7,
                        pick(&seed, base + 1, &STREETS)
                    ),
                    date: format!(
                        "{}-{:02}-{:02}",
                        2015 + u32::from(seed[base + 2] % 9),
                        1 + seed[base + 3] % 12,
                        1 + seed[base] % 28
                    ),
                    price: 150_000.0 + f64::from(seed[base + 1]) * 10_000.0,
                    transaction_type: pick(&seed, base + 2, &TRANSACTION_TYPES).to_string(),
                }
            })
            .collect();

        let total_value: f64 = transactions.iter().map(|t| t.price).sum();
        let transaction_count = u32::try_from(transactions.len()).unwrap_or(u32::MAX);

        Ok(Some(PropertyHistory {
            transactions,
            total_value: Some(total_value),
            transaction_count: Some(transaction_count),
        }))
    }

    async fn credit_estimate(
        &self,
        email: &str,
        company: Option<&str>,
    ) -> Result<Option<CreditEstimate>, AppError> {
        let seed = seed(&[email, company.unwrap_or("")]);
        self.pause(&seed, CREDIT_LATENCY_MS).await;

        let capacity = match seed[0] % 3 {
            0 => CreditCapacity::High,
            1 => CreditCapacity::Medium,
            _ => CreditCapacity::Low,
        };

        Ok(Some(CreditEstimate {
            score: Some(750 + u32::from(seed[1]) % 100),
            capacity: Some(capacity),
            indicators: CREDIT_INDICATORS.iter().map(|s| s.to_string()).collect(),
        }))
    }

    async fn social_profiles(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<SocialProfiles>, AppError> {
        let seed = person_seed(person);
        self.pause(&seed, SOCIAL_LATENCY_MS).await;

        let (Some(compact), Some(dotted), Some(underscored)) = (
            handle(person, ""),
            handle(person, "."),
            handle(person, "_"),
        ) else {
            return Ok(None);
        };

        Ok(Some(SocialProfiles {
            twitter: Some(format!("@{}", compact)),
            facebook: Some(format!("https://facebook.com/{}", dotted)),
            instagram: Some(format!("@{}", underscored)),
        }))
    }
}

// ============ HTTP ============

/// JSON enrichment provider.
///
/// Each lookup is `GET {base_url}/{endpoint}` with query parameters and a
/// bearer key. 404 means the provider has no record. Responses (including
/// "no record") are cached with a checksum for the configured TTL.
#[derive(Clone)]
pub struct HttpEnrichmentSource {
    client: Client,
    base_url: String,
    api_key: String,
    cache: Cache<String, String>,
    breaker: LookupCircuitBreaker,
}

impl HttpEnrichmentSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        cache_ttl: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(cache_ttl)
                .build(),
            breaker: create_lookup_circuit_breaker(),
        })
    }

    async fn lookup<T>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Serialize,
    {
        let cache_key = format!(
            "{}?{}",
            endpoint,
            params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&")
        );

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Some(valid) = ValidatedCacheEntry::deserialize_and_validate(&cached) {
                if let Ok(result) = serde_json::from_str::<Option<T>>(&valid) {
                    tracing::debug!("Lookup cache HIT for {}", endpoint);
                    return Ok(result);
                }
            } else {
                tracing::warn!("Lookup cache entry for {} invalid, refetching", endpoint);
            }
        }

        let result = match self.breaker.call(self.fetch::<T>(endpoint, params)).await {
            Ok(result) => result,
            Err(failsafe::Error::Inner(e)) => return Err(e),
            Err(failsafe::Error::Rejected) => {
                return Err(AppError::ExternalApiError(format!(
                    "Enrichment provider circuit open, skipping {}",
                    endpoint
                )))
            }
        };

        let json = serde_json::to_string(&result)?;
        self.cache
            .insert(cache_key, ValidatedCacheEntry::new(json).serialize())
            .await;

        Ok(result)
    }

    async fn fetch<T>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("Enrichment lookup: GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "{} returned status {}: {}",
                endpoint, status, body
            )));
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", endpoint, e))
        })?;

        Ok(Some(parsed))
    }
}

fn person_params(person: &PersonQuery) -> Vec<(&str, &str)> {
    let mut params = vec![("email", person.email.as_str())];
    if let Some(first) = person.first_name.as_deref() {
        params.push(("first_name", first));
    }
    if let Some(last) = person.last_name.as_deref() {
        params.push(("last_name", last));
    }
    params
}

#[async_trait]
impl EnrichmentSource for HttpEnrichmentSource {
    async fn professional_profile(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<ProfessionalProfile>, AppError> {
        self.lookup("professional-profile", &person_params(person)).await
    }

    async fn company_info(&self, company: &str) -> Result<Option<CompanyInfo>, AppError> {
        self.lookup("company", &[("name", company)]).await
    }

    async fn property_history(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<PropertyHistory>, AppError> {
        self.lookup("property-history", &person_params(person)).await
    }

    async fn credit_estimate(
        &self,
        email: &str,
        company: Option<&str>,
    ) -> Result<Option<CreditEstimate>, AppError> {
        let mut params = vec![("email", email)];
        if let Some(company) = company {
            params.push(("company", company));
        }
        self.lookup("credit-estimate", &params).await
    }

    async fn social_profiles(
        &self,
        person: &PersonQuery,
    ) -> Result<Option<SocialProfiles>, AppError> {
        self.lookup("social-profiles", &person_params(person)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> PersonQuery {
        PersonQuery {
            email: "maria@example.com".into(),
            first_name: Some("Maria".into()),
            last_name: Some("Lopez".into()),
        }
    }

    #[test]
    fn test_latency_stays_in_range() {
        for key in ["a", "b", "c", "maria@example.com"] {
            let latency = simulated_latency(&seed(&[key]), SOCIAL_LATENCY_MS);
            assert!(latency >= Duration::from_millis(300));
            assert!(latency <= Duration::from_millis(800));
        }
    }

    #[test]
    fn test_handles() {
        assert_eq!(handle(&person(), "-"), Some("maria-lopez".to_string()));

        let unnamed = PersonQuery {
            email: "Investor@example.com".into(),
            ..Default::default()
        };
        assert_eq!(handle(&unnamed, "."), Some("investor".to_string()));
    }

    #[tokio::test]
    async fn test_simulated_source_is_deterministic() {
        let source = SimulatedSource::new(false);

        let first = source.property_history(&person()).await.unwrap();
        let second = source.property_history(&person()).await.unwrap();
        assert_eq!(first, second);

        let history = first.unwrap();
        let sum: f64 = history.transactions.iter().map(|t| t.price).sum();
        assert_eq!(history.total_value, Some(sum));
        assert_eq!(
            history.transaction_count,
            Some(history.transactions.len() as u32)
        );
    }

    #[tokio::test]
    async fn test_simulated_social_profiles() {
        let source = SimulatedSource::new(false);
        let social = source.social_profiles(&person()).await.unwrap().unwrap();

        assert_eq!(social.twitter.as_deref(), Some("@marialopez"));
        assert_eq!(
            social.facebook.as_deref(),
            Some("https://facebook.com/maria.lopez")
        );
        assert_eq!(social.instagram.as_deref(), Some("@maria_lopez"));
    }

    #[tokio::test]
    async fn test_simulated_company_requires_name() {
        let source = SimulatedSource::new(false);
        assert!(source.company_info("  ").await.unwrap().is_none());

        let info = source.company_info("Acme Land Co").await.unwrap().unwrap();
        assert_eq!(info.website.as_deref(), Some("https://acmelandco.com"));
    }

    #[tokio::test]
    async fn test_simulated_credit_score_range() {
        let source = SimulatedSource::new(false);
        let credit = source
            .credit_estimate("maria@example.com", Some("Acme"))
            .await
            .unwrap()
            .unwrap();

        let score = credit.score.unwrap();
        assert!((750..850).contains(&score));
        assert_eq!(credit.indicators.len(), 3);
    }
}
