//! Question batch generation and the per-generator cache.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use tutor_core::model::QuestionBatch;
use tutor_core::validation;

use crate::Clock;
use crate::error::GenerationError;
use crate::inference::TextGenerator;

/// Prompt asking the model for one batch about `subject`.
#[must_use]
pub fn quiz_prompt(subject: &str) -> String {
    format!(
        r#"Generate 5 multiple choice questions about {subject}.
Format the response as a JSON array with the following structure:
[
  {{
    "id": "1",
    "question": "Question text",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correctOption": 0,
    "explanation": "Explanation of the correct answer",
    "difficulty": "easy",
    "topic": "Short topic label"
  }}
]

Rules:
1. Each question must have exactly 4 options
2. correctOption must be 0-3 (representing A-D)
3. Each question must have a unique explanation
4. Difficulty should be one of: "easy", "medium", "hard"
5. Include 2 easy, 2 medium, and 1 hard question
6. Ensure options are unique and not repeated
7. Vary the position of correct answers (don't make them all A or B)
8. Make questions clear and unambiguous
9. Include the explanation for each answer"#
    )
}

//
// ─── CACHE ─────────────────────────────────────────────────────────────────────
//

/// Size and age limits for cached batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            capacity: 16,
            ttl: Duration::minutes(30),
        }
    }
}

/// Bounded store of validated batches keyed by subject and generation time.
///
/// Oldest entries go first when full; entries older than the TTL are never
/// returned.
#[derive(Debug)]
pub struct QuestionCache {
    policy: CachePolicy,
    entries: VecDeque<CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    subject: String,
    generated_at: DateTime<Utc>,
    batch: QuestionBatch,
}

impl QuestionCache {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: VecDeque::with_capacity(policy.capacity),
        }
    }

    pub fn insert(&mut self, subject: &str, generated_at: DateTime<Utc>, batch: QuestionBatch) {
        if self.policy.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.policy.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(CacheEntry {
            subject: subject.to_string(),
            generated_at,
            batch,
        });
    }

    /// Most recent fresh batch for the subject.
    #[must_use]
    pub fn latest(&self, subject: &str, now: DateTime<Utc>) -> Option<&QuestionBatch> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.subject == subject && now - e.generated_at <= self.policy.ttl)
            .map(|e| &e.batch)
    }

    /// Drop entries past the TTL.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        let ttl = self.policy.ttl;
        self.entries.retain(|e| now - e.generated_at <= ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//
// ─── GENERATOR ─────────────────────────────────────────────────────────────────
//

/// Asks the model for a batch and validates it before handing it out.
pub struct QuestionGenerator {
    clock: Clock,
    model: Arc<dyn TextGenerator>,
    cache: Option<Mutex<QuestionCache>>,
}

impl QuestionGenerator {
    #[must_use]
    pub fn new(clock: Clock, model: Arc<dyn TextGenerator>) -> Self {
        Self {
            clock,
            model,
            cache: None,
        }
    }

    /// Keep every accepted batch in a bounded cache.
    #[must_use]
    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(Mutex::new(QuestionCache::new(policy)));
        self
    }

    /// Generate a fresh, validated batch.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Network` when the model cannot be reached and
    /// `GenerationError::Validation` when its output breaks a batch rule.
    pub async fn generate(&self, subject: &str) -> Result<QuestionBatch, GenerationError> {
        let raw = self.model.generate(&quiz_prompt(subject)).await?;
        let batch = validation::parse_batch(&raw).inspect_err(|err| {
            warn!(subject, error = %err, "rejected question batch");
        })?;
        info!(subject, "generated question batch");

        if let Some(cache) = &self.cache {
            let now = self.clock.now();
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.purge_expired(now);
            cache.insert(subject, now, batch.clone());
        }
        Ok(batch)
    }

    /// Last fresh batch generated for the subject, if caching is enabled.
    #[must_use]
    pub fn cached(&self, subject: &str) -> Option<QuestionBatch> {
        let cache = self
            .cache
            .as_ref()?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache.latest(subject, self.clock.now()).cloned()
    }

    /// Reuse the last fresh batch for the subject, generating only on a miss.
    ///
    /// # Errors
    ///
    /// Same as [`QuestionGenerator::generate`] on a cache miss.
    pub async fn cached_or_generate(&self, subject: &str) -> Result<QuestionBatch, GenerationError> {
        if let Some(batch) = self.cached(subject) {
            debug!(subject, "reusing cached question batch");
            return Ok(batch);
        }
        self.generate(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use async_trait::async_trait;
    use tutor_core::time::fixed_now;
    use tutor_core::validation::ValidationError;

    /// Canned model output: five valid questions about arithmetic.
    const VALID_BATCH: &str = r#"Here you go:
```json
[
  {"id": "1", "question": "1 + 1?", "options": ["1", "2", "3", "4"], "correctOption": 1, "explanation": "One and one make two.", "difficulty": "easy", "topic": "Addition"},
  {"id": "2", "question": "2 * 3?", "options": ["5", "6", "7", "8"], "correctOption": 1, "explanation": "Two threes are six.", "difficulty": "easy", "topic": "Multiplication"},
  {"id": "3", "question": "10 / 4?", "options": ["2", "2.5", "3", "4"], "correctOption": 1, "explanation": "Ten over four is two and a half.", "difficulty": "medium", "topic": "Division"},
  {"id": "4", "question": "3 squared?", "options": ["6", "9", "12", "3"], "correctOption": 1, "explanation": "Three times three.", "difficulty": "medium"},
  {"id": "5", "question": "Derivative of x^2?", "options": ["x", "2x", "x^2", "2"], "correctOption": 1, "explanation": "Power rule.", "difficulty": "hard", "topic": "Calculus"}
]
```"#;

    struct Canned(Result<String, ()>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String, InferenceError> {
            self.0.clone().map_err(|()| InferenceError::EmptyResponse)
        }
    }

    fn generator(reply: Result<String, ()>) -> QuestionGenerator {
        QuestionGenerator::new(Clock::fixed(fixed_now()), Arc::new(Canned(reply)))
    }

    #[tokio::test]
    async fn valid_reply_yields_batch() {
        let batch = generator(Ok(VALID_BATCH.into()))
            .generate("Mathematics")
            .await
            .unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[tokio::test]
    async fn model_failure_is_a_network_error() {
        let err = generator(Err(())).generate("Physics").await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
    }

    #[tokio::test]
    async fn short_batch_is_rejected_by_count() {
        let four = VALID_BATCH.replacen(
            r#"{"id": "5", "question": "Derivative of x^2?", "options": ["x", "2x", "x^2", "2"], "correctOption": 1, "explanation": "Power rule.", "difficulty": "hard", "topic": "Calculus"}"#,
            "",
            1,
        )
        .replace("},\n  \n]", "}\n]");
        let err = generator(Ok(four)).generate("Mathematics").await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Validation(ValidationError::Count { found: Some(4) })
        ));
    }

    #[tokio::test]
    async fn cache_keeps_latest_batch_per_subject() {
        let generator = generator(Ok(VALID_BATCH.into())).with_cache(CachePolicy::default());
        assert!(generator.cached("Mathematics").is_none());
        generator.generate("Mathematics").await.unwrap();
        assert!(generator.cached("Mathematics").is_some());
        assert!(generator.cached("History").is_none());
    }

    struct Counting(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl TextGenerator for Counting {
        async fn generate(&self, _prompt: &str) -> Result<String, InferenceError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(VALID_BATCH.into())
        }
    }

    #[tokio::test]
    async fn retake_reuses_the_cached_batch() {
        let model = Arc::new(Counting(Default::default()));
        let generator = QuestionGenerator::new(Clock::fixed(fixed_now()), model.clone())
            .with_cache(CachePolicy::default());

        let first = generator.cached_or_generate("Mathematics").await.unwrap();
        let again = generator.cached_or_generate("Mathematics").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(model.0.load(std::sync::atomic::Ordering::SeqCst), 1);

        generator.cached_or_generate("History").await.unwrap();
        assert_eq!(model.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn without_a_cache_every_retake_generates() {
        let model = Arc::new(Counting(Default::default()));
        let generator = QuestionGenerator::new(Clock::fixed(fixed_now()), model.clone());
        generator.cached_or_generate("Mathematics").await.unwrap();
        generator.cached_or_generate("Mathematics").await.unwrap();
        assert_eq!(model.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_evicts_oldest_and_expires_by_age() {
        let batch = validation::parse_batch(VALID_BATCH).unwrap();
        let mut cache = QuestionCache::new(CachePolicy {
            capacity: 2,
            ttl: Duration::minutes(10),
        });
        let t0 = fixed_now();
        cache.insert("Physics", t0, batch.clone());
        cache.insert("Biology", t0, batch.clone());
        cache.insert("History", t0, batch);
        assert_eq!(cache.len(), 2);
        assert!(cache.latest("Physics", t0).is_none());
        assert!(cache.latest("History", t0).is_some());

        let later = t0 + Duration::minutes(11);
        assert!(cache.latest("History", later).is_none());
        cache.purge_expired(later);
        assert!(cache.is_empty());
    }

    #[test]
    fn prompt_names_subject_and_mix() {
        let prompt = quiz_prompt("Chemistry");
        assert!(prompt.starts_with("Generate 5 multiple choice questions about Chemistry."));
        assert!(prompt.contains("Include 2 easy, 2 medium, and 1 hard question"));
    }
}
