use serde::Deserialize;

/// Which enrichment provider backs lead lookups.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum EnrichmentProvider {
    /// Deterministic in-process data; `latency` enables artificial delays.
    Simulated { latency: bool },
    /// JSON provider reached over HTTP.
    Http { base_url: String, api_key: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub enrichment_provider: EnrichmentProvider,
    pub enrichment_queue_capacity: usize,
    pub lookup_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_vars(|key| std::env::var(key).ok())?;

        // Secrets (API key, DB credentials) stay out of the logs.
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database host: {}",
            config.database_host().as_deref().unwrap_or("unknown")
        );
        match &config.enrichment_provider {
            EnrichmentProvider::Simulated { latency } => {
                tracing::debug!("Enrichment provider: simulated (latency: {})", latency)
            }
            EnrichmentProvider::Http { base_url, .. } => {
                tracing::debug!("Enrichment provider: http ({})", base_url)
            }
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Host part of the database URL, without credentials or path.
    pub fn database_host(&self) -> Option<String> {
        url::Url::parse(&self.database_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .filter(|host| !host.is_empty())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DB_URL")
            .or_else(|| var("DATABASE_URL"))
            .ok_or_else(|| anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required"))
            .and_then(|url| {
                if url.trim().is_empty() {
                    anyhow::bail!("DB_URL cannot be empty");
                }
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })?;

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?;

        let db_max_connections = parse_positive(&var, "DB_MAX_CONNECTIONS", 10)?;
        let enrichment_queue_capacity = parse_positive(&var, "ENRICHMENT_QUEUE_CAPACITY", 256)?;
        let lookup_cache_ttl_secs = parse_positive(&var, "LOOKUP_CACHE_TTL_SECS", 3600)?;

        let provider = var("ENRICHMENT_PROVIDER").unwrap_or_else(|| "simulated".to_string());
        let enrichment_provider = match provider.trim().to_ascii_lowercase().as_str() {
            "simulated" => {
                let latency = match var("ENRICHMENT_SIMULATED_LATENCY") {
                    None => true,
                    Some(v) => v.trim().parse::<bool>().map_err(|_| {
                        anyhow::anyhow!("ENRICHMENT_SIMULATED_LATENCY must be true or false")
                    })?,
                };
                EnrichmentProvider::Simulated { latency }
            }
            "http" => {
                let base_url = var("ENRICHMENT_BASE_URL")
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "ENRICHMENT_BASE_URL environment variable required for http provider"
                        )
                    })
                    .and_then(|url| {
                        if !url.starts_with("http://") && !url.starts_with("https://") {
                            anyhow::bail!("ENRICHMENT_BASE_URL must start with http:// or https://");
                        }
                        Ok(url)
                    })?;
                let api_key = var("ENRICHMENT_API_KEY")
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "ENRICHMENT_API_KEY environment variable required for http provider"
                        )
                    })
                    .and_then(|key| {
                        if key.trim().is_empty() {
                            anyhow::bail!("ENRICHMENT_API_KEY cannot be empty");
                        }
                        Ok(key)
                    })?;
                EnrichmentProvider::Http { base_url, api_key }
            }
            other => anyhow::bail!(
                "ENRICHMENT_PROVIDER must be 'simulated' or 'http', got '{}'",
                other
            ),
        };

        Ok(Self {
            database_url,
            port,
            db_max_connections,
            enrichment_provider,
            enrichment_queue_capacity,
            lookup_cache_ttl_secs,
        })
    }
}

fn parse_positive<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => Ok(value),
            _ => anyhow::bail!("{} must be a positive integer", key),
        },
    }
}
