//! Best-effort advisory integration (category suggestion, duplicate
//! detection).
//!
//! The backing provider is consulted only at expense creation time and its
//! answers are annotations, never authoritative. Every failure mode (rate
//! limit, timeout, transport error, exhausted retries) degrades to "no
//! suggestion"; callers never see an error from this module.
//!
//! Outbound calls are serialized with a minimum spacing to respect provider
//! rate limits. A rate-limit signal opens a cooldown window during which all
//! calls short-circuit without contacting the provider. Transient failures
//! are retried with exponential backoff plus jitter, bounded by
//! `max_attempts`.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::Category;

/// Category proposed by the provider for a new expense.
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySuggestion {
    pub category: Category,
    pub confidence: f64,
}

/// Duplicate-detection verdict for a new expense.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub confidence: f64,
    pub reason: String,
}

/// Summary of an existing expense handed to duplicate detection.
#[derive(Clone, Debug, Serialize)]
pub struct DuplicateCandidate {
    pub description: String,
    pub amount_minor: i64,
    pub incurred_on: NaiveDate,
}

#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// The provider signalled a rate limit; open the cooldown window.
    #[error("provider rate limited")]
    RateLimited,
    /// Anything worth retrying: transport errors, timeouts, 5xx.
    #[error("transient provider failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn suggest_category(
        &self,
        description: &str,
        amount_minor: i64,
    ) -> Result<Option<CategorySuggestion>, AdvisoryError>;

    async fn detect_duplicate(
        &self,
        description: &str,
        amount_minor: i64,
        candidates: &[DuplicateCandidate],
    ) -> Result<Option<DuplicateVerdict>, AdvisoryError>;
}

#[derive(Clone, Debug)]
pub struct AdvisoryConfig {
    /// Minimum spacing between outbound provider calls.
    pub min_spacing: Duration,
    /// Cooldown window opened on a rate-limit signal.
    pub cooldown: Duration,
    /// Total attempts per logical call (1 = no retry).
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry, with jitter.
    pub initial_backoff: Duration,
    /// Upper bound on a single provider call.
    pub call_timeout: Duration,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_millis(200),
            cooldown: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct ProviderGate {
    last_call: Option<Instant>,
    cooldown_until: Option<Instant>,
}

/// Wraps an [`AdvisoryProvider`] with throttling, cooldown and retry so a
/// slow or absent provider degrades to `None` rather than failing creation.
pub struct AdvisoryAdapter {
    provider: Box<dyn AdvisoryProvider>,
    config: AdvisoryConfig,
    // Held across the provider call: outbound calls are serialized on
    // purpose, the backing service is rate limited.
    gate: Mutex<ProviderGate>,
}

impl AdvisoryAdapter {
    pub fn new(provider: Box<dyn AdvisoryProvider>, config: AdvisoryConfig) -> Self {
        Self {
            provider,
            config,
            gate: Mutex::new(ProviderGate::default()),
        }
    }

    pub async fn suggest_category(
        &self,
        description: &str,
        amount_minor: i64,
    ) -> Option<CategorySuggestion> {
        self.call("suggest_category", || {
            self.provider.suggest_category(description, amount_minor)
        })
        .await
    }

    pub async fn detect_duplicate(
        &self,
        description: &str,
        amount_minor: i64,
        candidates: &[DuplicateCandidate],
    ) -> Option<DuplicateVerdict> {
        self.call("detect_duplicate", || {
            self.provider
                .detect_duplicate(description, amount_minor, candidates)
        })
        .await
    }

    async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, AdvisoryError>>,
    {
        let mut gate = self.gate.lock().await;

        if let Some(until) = gate.cooldown_until {
            if Instant::now() < until {
                tracing::debug!("advisory {label} skipped: provider cooling down");
                return None;
            }
            gate.cooldown_until = None;
        }

        let mut backoff = self.config.initial_backoff;
        for attempt in 1..=self.config.max_attempts {
            if let Some(last) = gate.last_call {
                let elapsed = last.elapsed();
                if elapsed < self.config.min_spacing {
                    tokio::time::sleep(self.config.min_spacing - elapsed).await;
                }
            }
            gate.last_call = Some(Instant::now());

            let outcome = match tokio::time::timeout(self.config.call_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AdvisoryError::Transient("provider call timed out".to_string())),
            };

            match outcome {
                Ok(value) => return value,
                Err(AdvisoryError::RateLimited) => {
                    gate.cooldown_until = Some(Instant::now() + self.config.cooldown);
                    tracing::warn!(
                        "advisory {label} rate limited, cooling down for {:?}",
                        self.config.cooldown
                    );
                    return None;
                }
                Err(AdvisoryError::Transient(err)) if attempt < self.config.max_attempts => {
                    let jitter_cap = (backoff.as_millis() as u64 / 2).max(1);
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..jitter_cap));
                    tracing::debug!(
                        "advisory {label} attempt {attempt} failed ({err}), retrying in {:?}",
                        backoff + jitter
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(AdvisoryError::Transient(err)) => {
                    tracing::warn!("advisory {label} gave up after {attempt} attempts: {err}");
                    return None;
                }
            }
        }

        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    description: &'a str,
    amount_minor: i64,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    category: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Serialize)]
struct DuplicatesRequest<'a> {
    description: &'a str,
    amount_minor: i64,
    candidates: &'a [DuplicateCandidate],
}

#[derive(Deserialize)]
struct DuplicatesResponse {
    is_duplicate: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

/// JSON-over-HTTP provider (`POST {base}/classify`, `POST {base}/duplicates`).
pub struct HttpAdvisoryProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAdvisoryProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AdvisoryError> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url.trim_end_matches('/')))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AdvisoryError::Transient(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AdvisoryError::RateLimited);
        }
        if !status.is_success() {
            return Err(AdvisoryError::Transient(format!(
                "provider returned {status}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|err| AdvisoryError::Transient(err.to_string()))
    }
}

#[async_trait]
impl AdvisoryProvider for HttpAdvisoryProvider {
    async fn suggest_category(
        &self,
        description: &str,
        amount_minor: i64,
    ) -> Result<Option<CategorySuggestion>, AdvisoryError> {
        let response: ClassifyResponse = self
            .post_json(
                "/classify",
                &ClassifyRequest {
                    description,
                    amount_minor,
                },
            )
            .await?;

        // An answer the engine does not recognize is no answer.
        let category = response
            .category
            .as_deref()
            .and_then(|raw| Category::try_from(raw).ok());
        Ok(category.map(|category| CategorySuggestion {
            category,
            confidence: response.confidence.unwrap_or(0.0),
        }))
    }

    async fn detect_duplicate(
        &self,
        description: &str,
        amount_minor: i64,
        candidates: &[DuplicateCandidate],
    ) -> Result<Option<DuplicateVerdict>, AdvisoryError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let response: DuplicatesResponse = self
            .post_json(
                "/duplicates",
                &DuplicatesRequest {
                    description,
                    amount_minor,
                    candidates,
                },
            )
            .await?;

        Ok(Some(DuplicateVerdict {
            is_duplicate: response.is_duplicate,
            confidence: response.confidence.unwrap_or(0.0),
            reason: response.reason.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedProvider {
        calls: AtomicUsize,
        outcomes: Vec<Result<Option<CategorySuggestion>, AdvisoryError>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<Option<CategorySuggestion>, AdvisoryError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcomes,
            }
        }
    }

    #[async_trait]
    impl AdvisoryProvider for ScriptedProvider {
        async fn suggest_category(
            &self,
            _description: &str,
            _amount_minor: i64,
        ) -> Result<Option<CategorySuggestion>, AdvisoryError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.get(index) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(AdvisoryError::RateLimited)) => Err(AdvisoryError::RateLimited),
                Some(Err(AdvisoryError::Transient(err))) => {
                    Err(AdvisoryError::Transient(err.clone()))
                }
                None => Ok(None),
            }
        }

        async fn detect_duplicate(
            &self,
            _description: &str,
            _amount_minor: i64,
            _candidates: &[DuplicateCandidate],
        ) -> Result<Option<DuplicateVerdict>, AdvisoryError> {
            Ok(None)
        }
    }

    fn fast_config() -> AdvisoryConfig {
        AdvisoryConfig {
            min_spacing: Duration::from_millis(1),
            cooldown: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            call_timeout: Duration::from_millis(200),
        }
    }

    fn suggestion() -> CategorySuggestion {
        CategorySuggestion {
            category: Category::Travel,
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn returns_suggestion_on_success() {
        let adapter = AdvisoryAdapter::new(
            Box::new(ScriptedProvider::new(vec![Ok(Some(suggestion()))])),
            fast_config(),
        );

        let result = adapter.suggest_category("Taxi to airport", 4500).await;
        assert_eq!(result, Some(suggestion()));
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let provider = ScriptedProvider::new(vec![
            Err(AdvisoryError::Transient("boom".to_string())),
            Err(AdvisoryError::Transient("boom".to_string())),
            Ok(Some(suggestion())),
        ]);
        let adapter = AdvisoryAdapter::new(Box::new(provider), fast_config());

        let result = adapter.suggest_category("Taxi", 4500).await;
        assert_eq!(result, Some(suggestion()));
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_none() {
        let provider = ScriptedProvider::new(vec![
            Err(AdvisoryError::Transient("boom".to_string())),
            Err(AdvisoryError::Transient("boom".to_string())),
            Err(AdvisoryError::Transient("boom".to_string())),
        ]);
        let adapter = AdvisoryAdapter::new(Box::new(provider), fast_config());

        assert_eq!(adapter.suggest_category("Taxi", 4500).await, None);
    }

    #[tokio::test]
    async fn rate_limit_opens_cooldown_and_short_circuits() {
        let provider = ScriptedProvider::new(vec![
            Err(AdvisoryError::RateLimited),
            Ok(Some(suggestion())),
        ]);
        let adapter = AdvisoryAdapter::new(Box::new(provider), fast_config());

        assert_eq!(adapter.suggest_category("Taxi", 4500).await, None);
        // Second call must not reach the provider while cooling down.
        assert_eq!(adapter.suggest_category("Taxi", 4500).await, None);

        let gate = adapter.gate.lock().await;
        assert!(gate.cooldown_until.is_some());
    }

    #[tokio::test]
    async fn slow_provider_times_out_to_none() {
        struct SlowProvider;

        #[async_trait]
        impl AdvisoryProvider for SlowProvider {
            async fn suggest_category(
                &self,
                _description: &str,
                _amount_minor: i64,
            ) -> Result<Option<CategorySuggestion>, AdvisoryError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }

            async fn detect_duplicate(
                &self,
                _description: &str,
                _amount_minor: i64,
                _candidates: &[DuplicateCandidate],
            ) -> Result<Option<DuplicateVerdict>, AdvisoryError> {
                Ok(None)
            }
        }

        let config = AdvisoryConfig {
            max_attempts: 1,
            call_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let adapter = AdvisoryAdapter::new(Box::new(SlowProvider), config);

        assert_eq!(adapter.suggest_category("Taxi", 4500).await, None);
    }
}
