//! Debate memory - persisted debates and related-topic lookup

use convoke_core::similarity::{cosine, term_vector};
use convoke_core::text::truncate_chars;
use convoke_core::{ConvokeConfig, DebateResult, DebateStatistics, RelatedDebate, Result};
use convoke_store::{DebateRecord, RecordStore, WriteOutcome};
use std::sync::Arc;
use tracing::{debug, warn};

/// Minimum topic similarity for a debate to count as related
const MIN_RELEVANCE: f64 = 0.1;

/// Consensus points carried as key insights of a related debate
const INSIGHTS_PER_DEBATE: usize = 3;

/// Upper bound on records scanned for search and statistics
const SCAN_LIMIT: usize = 1000;

pub struct DebateMemory {
    records: Arc<RecordStore<DebateRecord>>,
}

impl DebateMemory {
    pub fn new(records: Arc<RecordStore<DebateRecord>>) -> Self {
        Self { records }
    }

    /// Filesystem-backed memory under the configured debates directory
    pub fn open(config: &ConvokeConfig) -> Self {
        Self::new(Arc::new(RecordStore::open(
            config.debates_dir(),
            config.storage.max_records,
            config.lock_timeout(),
        )))
    }

    pub async fn save(&self, result: &DebateResult) -> Result<WriteOutcome> {
        self.records.save(&DebateRecord::from(result)).await
    }

    pub async fn load(&self, debate_id: &str) -> Result<Option<DebateResult>> {
        Ok(self.records.load(debate_id).await?.map(DebateResult::from))
    }

    /// Most recent debates first
    pub async fn list(&self, limit: usize) -> Result<Vec<DebateRecord>> {
        self.records.list_recent(limit).await
    }

    /// Stored debates whose topic resembles `topic`, most relevant first
    pub async fn find_related(&self, topic: &str, limit: usize) -> Result<Vec<RelatedDebate>> {
        let query = term_vector(topic);
        let mut related: Vec<RelatedDebate> = self
            .records
            .list_recent(SCAN_LIMIT)
            .await?
            .into_iter()
            .filter_map(|record| {
                let relevance = cosine(&query, &term_vector(&record.topic));
                (relevance > MIN_RELEVANCE).then(|| RelatedDebate {
                    debate_id: record.debate_id,
                    topic: record.topic,
                    relevance,
                    key_insights: record
                        .consensus
                        .into_iter()
                        .take(INSIGHTS_PER_DEBATE)
                        .collect(),
                })
            })
            .collect();

        related.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.debate_id.cmp(&b.debate_id))
        });
        related.truncate(limit);
        debug!("Found {} debates related to '{}'", related.len(), topic);
        Ok(related)
    }

    pub async fn statistics(&self) -> Result<DebateStatistics> {
        let records = self.records.list_recent(SCAN_LIMIT).await?;
        if records.is_empty() {
            return Ok(DebateStatistics::default());
        }

        let converged = records.iter().filter(|r| r.converged).count();
        Ok(DebateStatistics {
            total_debates: records.len(),
            total_insights: records.iter().map(|r| r.consensus.len()).sum(),
            convergence_rate: converged as f64 / records.len() as f64,
        })
    }

    /// Summary of up to `max_debates` related debates, cut to `max_chars`
    ///
    /// `None` when nothing related has been stored.
    pub async fn context_summary(
        &self,
        topic: &str,
        max_debates: usize,
        max_chars: usize,
    ) -> Result<Option<String>> {
        let related = self.find_related(topic, max_debates).await?;
        if related.is_empty() {
            return Ok(None);
        }

        let summary = related
            .iter()
            .map(|r| format!("Topic: {}\nKey points: {}", r.topic, r.key_insights.join(", ")))
            .collect::<Vec<_>>()
            .join("\n\n");

        let len = summary.chars().count();
        if len > max_chars {
            warn!("Debate context truncated from {} to {} chars", len, max_chars);
            return Ok(Some(truncate_chars(&summary, max_chars).to_string()));
        }
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoke_core::{DebateRound, DebateStrategy};
    use std::time::Duration;
    use tempfile::TempDir;

    fn memory(dir: &TempDir) -> DebateMemory {
        DebateMemory::new(Arc::new(RecordStore::open(
            dir.path(),
            50,
            Duration::from_millis(200),
        )))
    }

    fn debate(id: &str, topic: &str, consensus: &[&str], converged: bool) -> DebateResult {
        DebateResult {
            debate_id: id.to_string(),
            topic: topic.to_string(),
            strategy: DebateStrategy::Collaborative,
            rounds: vec![DebateRound {
                round_number: 1,
                expert_a: "a".into(),
                expert_b: "b".into(),
                novelty: 1.0,
            }],
            rounds_completed: 1,
            synthesis: "summary".into(),
            consensus: consensus.iter().map(|s| s.to_string()).collect(),
            disagreements: Vec::new(),
            actions: Vec::new(),
            converged,
            elapsed_seconds: 1.5,
        }
    }

    #[tokio::test]
    async fn test_find_related_ranks_and_filters() {
        let dir = TempDir::new().unwrap();
        let memory = memory(&dir);
        memory
            .save(&debate("d1", "database indexing strategies", &["b-trees", "hash", "lsm", "gin"], true))
            .await
            .unwrap();
        memory
            .save(&debate("d2", "database indexing", &["measure first"], false))
            .await
            .unwrap();
        memory
            .save(&debate("d3", "team offsite venues", &["beach"], true))
            .await
            .unwrap();

        let related = memory.find_related("database indexing", 5).await.unwrap();
        let ids: Vec<_> = related.iter().map(|r| r.debate_id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);
        assert!(related[0].relevance > related[1].relevance);
        assert_eq!(related[1].key_insights, vec!["b-trees", "hash", "lsm"]);

        assert_eq!(memory.find_related("database indexing", 1).await.unwrap().len(), 1);
        assert!(memory.find_related("quantum chromodynamics", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics() {
        let dir = TempDir::new().unwrap();
        let memory = memory(&dir);
        assert_eq!(memory.statistics().await.unwrap(), DebateStatistics::default());

        memory.save(&debate("d1", "one", &["x", "y"], true)).await.unwrap();
        memory.save(&debate("d2", "two", &["z"], false)).await.unwrap();

        let stats = memory.statistics().await.unwrap();
        assert_eq!(stats.total_debates, 2);
        assert_eq!(stats.total_insights, 3);
        assert_eq!(stats.convergence_rate, 0.5);
    }

    #[tokio::test]
    async fn test_context_summary_format_and_budget() {
        let dir = TempDir::new().unwrap();
        let memory = memory(&dir);
        assert!(memory.context_summary("caching", 3, 2000).await.unwrap().is_none());

        memory
            .save(&debate("d1", "caching layers", &["use ttl", "avoid stampedes"], true))
            .await
            .unwrap();
        let summary = memory.context_summary("caching layers", 3, 2000).await.unwrap().unwrap();
        assert_eq!(summary, "Topic: caching layers\nKey points: use ttl, avoid stampedes");

        let cut = memory.context_summary("caching layers", 3, 10).await.unwrap().unwrap();
        assert_eq!(cut, "Topic: cac");
    }

    #[tokio::test]
    async fn test_load_round_trips_rounds() {
        let dir = TempDir::new().unwrap();
        let memory = memory(&dir);
        memory.save(&debate("d1", "topic", &[], true)).await.unwrap();

        let loaded = memory.load("d1").await.unwrap().unwrap();
        assert_eq!(loaded.rounds.len(), 1);
        assert!(memory.load("missing").await.unwrap().is_none());
        assert_eq!(memory.list(10).await.unwrap().len(), 1);
    }
}
