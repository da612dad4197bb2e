// Memory retriever - similarity search and pattern summaries

//! # Memory Retriever
//!
//! Supplies historical context to the workflow: up to K similar past
//! incidents (TF-IDF cosine similarity over concatenated title+description,
//! last twelve months) and pattern summaries over the last ninety days
//! (temporal concentration, escalation rate, per-category risk, repeat
//! locations).
//!
//! The index is rebuilt lazily and no more than once per hour; between
//! refreshes queries run against the cached vectors.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::persistent::{IncidentRecord, PersistentStore};
use crate::Result;

/// Default minimum similarity for a historical match
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
/// Corpus window for similarity search
const CORPUS_WINDOW_DAYS: i64 = 365;
/// Window for pattern summaries
const PATTERN_WINDOW_DAYS: i64 = 90;
/// Minimum time between index rebuilds
const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// One document in the similarity corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDoc {
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub risk_score: Option<f64>,
    pub requires_human_intervention: bool,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&IncidentRecord> for CorpusDoc {
    fn from(record: &IncidentRecord) -> Self {
        Self {
            incident_id: record.incident_id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            category: record.category.clone(),
            priority: record.priority.clone(),
            risk_score: record.risk_score,
            requires_human_intervention: record.requires_human_intervention,
            location: None,
            created_at: record.created_at,
        }
    }
}

/// A historical incident matched by similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarIncident {
    pub incident_id: String,
    pub title: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    /// Cosine similarity in [0, 1]
    pub similarity_score: f64,
}

/// A detected pattern over recent incidents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentPattern {
    pub pattern_type: String,
    pub description: String,
    pub confidence: f64,
    pub supporting_count: usize,
}

/// Historical context handed to the workflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalContext {
    pub similar_incidents: Vec<SimilarIncident>,
    pub patterns: Vec<IncidentPattern>,
}

struct DocVector {
    doc: CorpusDoc,
    weights: HashMap<String, f64>,
    norm: f64,
}

#[derive(Default)]
struct TfIdfIndex {
    docs: Vec<DocVector>,
    idf: HashMap<String, f64>,
}

/// Similarity search and pattern summarization over historical incidents
pub struct MemoryRetriever {
    store: Option<Arc<PersistentStore>>,
    threshold: f64,
    max_results: usize,
    index: RwLock<TfIdfIndex>,
    corpus: RwLock<Vec<CorpusDoc>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl MemoryRetriever {
    pub fn new(threshold: f64, max_results: usize) -> Self {
        Self {
            store: None,
            threshold,
            max_results,
            index: RwLock::new(TfIdfIndex::default()),
            corpus: RwLock::new(Vec::new()),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn with_store(mut self, store: Arc<PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Rebuild the index from an explicit corpus. Used by tests and by
    /// deployments that feed documents from elsewhere.
    pub fn refresh_from(&self, docs: Vec<CorpusDoc>) {
        let index = build_index(&docs);
        *self.index.write().unwrap() = index;
        *self.corpus.write().unwrap() = docs;
    }

    /// Refresh from the persistent store, throttled to once per hour.
    pub async fn refresh(&self) -> Result<()> {
        let mut last = self.last_refresh.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < REFRESH_INTERVAL {
                return Ok(());
            }
        }
        if let Some(store) = &self.store {
            let since = Utc::now() - chrono::Duration::days(CORPUS_WINDOW_DAYS);
            let records = store.recent_incidents(since).await?;
            let docs: Vec<CorpusDoc> = records.iter().map(CorpusDoc::from).collect();
            debug!(corpus = docs.len(), "similarity index refreshed");
            self.refresh_from(docs);
        }
        *last = Some(Instant::now());
        Ok(())
    }

    /// Find up to K similar historical incidents scoring at or above the
    /// threshold, best match first.
    pub fn find_similar(
        &self,
        title: &str,
        description: &str,
        category: Option<&str>,
    ) -> Vec<SimilarIncident> {
        let index = self.index.read().unwrap();
        let query = vectorize(&format!("{} {}", title, description), &index.idf);
        let query_norm = norm(&query);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut matches: Vec<SimilarIncident> = index
            .docs
            .iter()
            .filter(|doc| match category {
                Some(c) => doc.doc.category.as_deref() == Some(c) || doc.doc.category.is_none(),
                None => true,
            })
            .filter_map(|doc| {
                if doc.norm == 0.0 {
                    return None;
                }
                let score = dot(&query, &doc.weights) / (query_norm * doc.norm);
                if score >= self.threshold {
                    Some(SimilarIncident {
                        incident_id: doc.doc.incident_id.clone(),
                        title: doc.doc.title.clone(),
                        category: doc.doc.category.clone(),
                        priority: doc.doc.priority.clone(),
                        similarity_score: score.min(1.0),
                    })
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(self.max_results);
        matches
    }

    /// Pattern summaries over the last ninety days of corpus documents.
    pub fn patterns(&self, now: DateTime<Utc>) -> Vec<IncidentPattern> {
        let corpus = self.corpus.read().unwrap();
        let cutoff = now - chrono::Duration::days(PATTERN_WINDOW_DAYS);
        let recent: Vec<&CorpusDoc> = corpus.iter().filter(|d| d.created_at >= cutoff).collect();
        let mut patterns = Vec::new();
        if recent.is_empty() {
            return patterns;
        }

        // Temporal: a single weekday carrying >30% of incidents
        if recent.len() >= 5 {
            let mut by_weekday: HashMap<chrono::Weekday, usize> = HashMap::new();
            for doc in &recent {
                *by_weekday.entry(doc.created_at.weekday()).or_default() += 1;
            }
            if let Some((day, count)) = by_weekday.into_iter().max_by_key(|(_, c)| *c) {
                if count as f64 > recent.len() as f64 * 0.3 {
                    patterns.push(IncidentPattern {
                        pattern_type: "temporal".to_string(),
                        description: format!("{} incidents concentrate on {}", count, day),
                        confidence: count as f64 / recent.len() as f64,
                        supporting_count: count,
                    });
                }
            }
        }

        // Escalation: human-intervention rate above 40%
        let interventions = recent.iter().filter(|d| d.requires_human_intervention).count();
        let intervention_rate = interventions as f64 / recent.len() as f64;
        if intervention_rate > 0.4 {
            patterns.push(IncidentPattern {
                pattern_type: "escalation".to_string(),
                description: format!(
                    "{:.0}% of recent incidents required human intervention",
                    intervention_rate * 100.0
                ),
                confidence: intervention_rate,
                supporting_count: interventions,
            });
        }

        // Category risk: categories whose average risk is elevated
        let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
        for doc in &recent {
            if let (Some(category), Some(risk)) = (doc.category.as_deref(), doc.risk_score) {
                let entry = by_category.entry(category).or_default();
                entry.0 += risk;
                entry.1 += 1;
            }
        }
        let mut categories: Vec<_> = by_category.into_iter().collect();
        categories.sort_by_key(|(name, _)| *name);
        for (category, (total, count)) in categories {
            let avg = total / count as f64;
            if avg >= 7.0 && count >= 2 {
                patterns.push(IncidentPattern {
                    pattern_type: "category_risk".to_string(),
                    description: format!(
                        "category {} averages {:.1}/10 risk over {} incidents",
                        category, avg, count
                    ),
                    confidence: (avg / 10.0).min(1.0),
                    supporting_count: count,
                });
            }
        }

        // Location: more than two incidents at the same location
        let mut by_location: HashMap<&str, usize> = HashMap::new();
        for doc in &recent {
            if let Some(location) = doc.location.as_deref() {
                *by_location.entry(location).or_default() += 1;
            }
        }
        let mut locations: Vec<_> = by_location.into_iter().filter(|(_, c)| *c > 2).collect();
        locations.sort_by_key(|(name, _)| *name);
        for (location, count) in locations {
            patterns.push(IncidentPattern {
                pattern_type: "location".to_string(),
                description: format!("{} incidents at {}", count, location),
                confidence: (count as f64 / recent.len() as f64).min(1.0),
                supporting_count: count,
            });
        }

        patterns
    }

    /// Full historical context for a new incident: refresh if due, then
    /// query similar incidents and patterns.
    pub async fn historical_context(
        &self,
        title: &str,
        description: &str,
        category: Option<&str>,
    ) -> Result<HistoricalContext> {
        self.refresh().await?;
        Ok(HistoricalContext {
            similar_incidents: self.find_similar(title, description, category),
            patterns: self.patterns(Utc::now()),
        })
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(String::from)
        .collect()
}

fn build_index(docs: &[CorpusDoc]) -> TfIdfIndex {
    let tokenized: Vec<Vec<String>> = docs
        .iter()
        .map(|d| tokenize(&format!("{} {}", d.title, d.description)))
        .collect();

    let mut document_frequency: HashMap<String, usize> = HashMap::new();
    for tokens in &tokenized {
        let unique: std::collections::HashSet<&String> = tokens.iter().collect();
        for token in unique {
            *document_frequency.entry(token.clone()).or_default() += 1;
        }
    }

    let n = docs.len().max(1) as f64;
    let idf: HashMap<String, f64> = document_frequency
        .into_iter()
        .map(|(token, df)| (token, (n / (1.0 + df as f64)).ln() + 1.0))
        .collect();

    let vectors = docs
        .iter()
        .zip(tokenized)
        .map(|(doc, tokens)| {
            let weights = weigh(&tokens, &idf);
            let norm = norm(&weights);
            DocVector {
                doc: doc.clone(),
                weights,
                norm,
            }
        })
        .collect();

    TfIdfIndex { docs: vectors, idf }
}

fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_default() += 1;
    }
    let total = tokens.len().max(1) as f64;
    counts
        .into_iter()
        .filter_map(|(token, count)| {
            idf.get(token)
                .map(|idf| (token.clone(), (count as f64 / total) * idf))
        })
        .collect()
}

fn vectorize(text: &str, idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    weigh(&tokenize(text), idf)
}

fn dot(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(token, weight)| large.get(token).map(|other| weight * other))
        .sum()
}

fn norm(weights: &HashMap<String, f64>) -> f64 {
    weights.values().map(|w| w * w).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, description: &str, category: &str) -> CorpusDoc {
        CorpusDoc {
            incident_id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: Some(category.to_string()),
            priority: Some("high".to_string()),
            risk_score: Some(6.0),
            requires_human_intervention: false,
            location: None,
            created_at: Utc::now() - chrono::Duration::days(10),
        }
    }

    fn retriever(docs: Vec<CorpusDoc>) -> MemoryRetriever {
        let retriever = MemoryRetriever::new(0.3, 5);
        retriever.refresh_from(docs);
        retriever
    }

    #[test]
    fn near_duplicate_text_scores_highest() {
        let retriever = retriever(vec![
            doc("INC-1", "Keycard cloning at tower", "cloned keycard used on room door after checkout", "guest_access"),
            doc("INC-2", "Phishing email to staff", "staff received phishing email with malware attachment", "cyber_security"),
        ]);
        let matches = retriever.find_similar(
            "Keycard cloning",
            "cloned keycard used on a room door after guest checkout",
            None,
        );
        assert!(!matches.is_empty());
        assert_eq!(matches[0].incident_id, "INC-1");
        assert!(matches[0].similarity_score > 0.5);
        assert!(matches[0].similarity_score <= 1.0);
    }

    #[test]
    fn threshold_filters_unrelated_incidents() {
        let retriever = MemoryRetriever::new(0.7, 5);
        retriever.refresh_from(vec![
            doc("INC-1", "Pool gate left open", "maintenance left the pool gate unsecured overnight", "physical_security"),
        ]);
        let matches = retriever.find_similar(
            "Payment fraud",
            "eight failed transactions on one credit card at the spa POS",
            None,
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn category_filter_restricts_matches() {
        let retriever = retriever(vec![
            doc("INC-1", "Keycard misuse", "keycard used after checkout", "guest_access"),
            doc("INC-2", "Keycard misuse copy", "keycard used after checkout", "physical_security"),
        ]);
        let matches = retriever.find_similar(
            "Keycard misuse",
            "keycard used after checkout",
            Some("guest_access"),
        );
        assert!(matches.iter().all(|m| m.category.as_deref() == Some("guest_access")));
    }

    #[test]
    fn escalation_pattern_flags_high_intervention_rate() {
        let mut docs = Vec::new();
        for i in 0..10 {
            let mut d = doc(&format!("INC-{i}"), "badge issue", "staff badge misuse", "operational_security");
            d.requires_human_intervention = i < 6;
            docs.push(d);
        }
        let retriever = retriever(docs);
        let patterns = retriever.patterns(Utc::now());
        assert!(patterns.iter().any(|p| p.pattern_type == "escalation"));
    }

    #[test]
    fn location_pattern_needs_more_than_two_repeats() {
        let mut docs = Vec::new();
        for i in 0..3 {
            let mut d = doc(&format!("INC-{i}"), "tailgating", "tailgating at service entrance", "physical_security");
            d.location = Some("service_entrance_b".to_string());
            docs.push(d);
        }
        let retriever = retriever(docs);
        let patterns = retriever.patterns(Utc::now());
        assert!(patterns.iter().any(|p| p.pattern_type == "location" && p.supporting_count == 3));
    }

    #[test]
    fn old_incidents_fall_outside_the_pattern_window() {
        let mut stale = doc("INC-old", "old issue", "ancient incident", "guest_access");
        stale.created_at = Utc::now() - chrono::Duration::days(200);
        stale.requires_human_intervention = true;
        let retriever = retriever(vec![stale]);
        assert!(retriever.patterns(Utc::now()).is_empty());
    }
}
