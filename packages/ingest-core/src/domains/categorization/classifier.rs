//! Two-pass hybrid classification.
//!
//! Pass 1 scores content against the system category registry with
//! keyword and regex matching; it is synchronous and deterministic.
//! Pass 2 asks a language model for categories, tags, content type,
//! language, and sentiment in JSON mode. The merge weights the model
//! pass higher but never lets either pass push a confidence above 1.0.
//! A model failure degrades to the rule pass alone; it never aborts an
//! ingestion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::registry::SYSTEM_CATEGORIES;
use super::store::CategorizationStore;
use crate::common::TenantId;
use crate::kernel::traits::BaseAi;

/// Merge weights: the model pass is trusted more than the rules.
const CATEGORY_RULE_WEIGHT: f32 = 0.4;
const CATEGORY_AI_WEIGHT: f32 = 0.6;
const TAG_RULE_WEIGHT: f32 = 0.3;
const TAG_AI_WEIGHT: f32 = 0.7;

/// Retention thresholds after merging.
const CATEGORY_KEEP_THRESHOLD: f32 = 0.4;
const TAG_KEEP_THRESHOLD: f32 = 0.3;

const MAX_CATEGORIES: usize = 3;
const MAX_TAGS: usize = 5;
const MAX_ENTITIES: usize = 10;

/// Rule-pass scoring constants.
const KEYWORD_SCORE: f32 = 0.1;
const PATTERN_SCORE: f32 = 0.2;
const PATTERN_MATCH_CAP: usize = 3;
const RULE_KEEP_THRESHOLD: f32 = 0.3;
const RULE_TAG_FACTOR: f32 = 0.8;
const RULE_TAGS_PER_CATEGORY: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    pub name: String,
    pub confidence: f32,
}

/// Final classification attached to a document or page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentClassification {
    pub categories: Vec<ScoredLabel>,
    pub tags: Vec<ScoredLabel>,
    pub content_type: String,
    pub language: String,
    pub sentiment: String,
    pub key_entities: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct PassResults {
    categories: Vec<ScoredLabel>,
    tags: Vec<ScoredLabel>,
    content_type: Option<String>,
    language: Option<String>,
    sentiment: Option<String>,
}

pub struct HybridClassifier {
    ai: Arc<dyn BaseAi>,
    store: Arc<dyn CategorizationStore>,
}

impl HybridClassifier {
    pub fn new(ai: Arc<dyn BaseAi>, store: Arc<dyn CategorizationStore>) -> Self {
        Self { ai, store }
    }

    /// Classify `content`, previewing at most `preview_chars` characters
    /// for the model passes. Never fails: model errors degrade to the
    /// rule pass, and a rule-pass-only result uses safe defaults.
    pub async fn classify(
        &self,
        content: &str,
        tenant_id: TenantId,
        enable_ai: bool,
        preview_chars: usize,
    ) -> DocumentClassification {
        let rule = rule_based_classification(content);
        tracing::debug!(
            tenant_id = %tenant_id,
            rule_categories = rule.categories.len(),
            rule_tags = rule.tags.len(),
            "Rule-based classification completed"
        );

        let preview: String = content.chars().take(preview_chars).collect();

        let ai = if enable_ai {
            match self.model_classification(&preview, tenant_id).await {
                Ok(results) => results,
                Err(err) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        error = %err,
                        "Model classification failed, falling back to rules only"
                    );
                    PassResults::default()
                }
            }
        } else {
            PassResults::default()
        };

        let (categories, tags) = merge_passes(&rule, &ai);

        let key_entities = if enable_ai {
            self.extract_entities(&preview).await
        } else {
            Vec::new()
        };

        DocumentClassification {
            categories,
            tags,
            content_type: ai.content_type.unwrap_or_else(|| "document".to_string()),
            language: ai.language.unwrap_or_else(|| "en".to_string()),
            sentiment: ai.sentiment.unwrap_or_else(|| "neutral".to_string()),
            key_entities,
        }
    }

    async fn model_classification(
        &self,
        preview: &str,
        tenant_id: TenantId,
    ) -> Result<PassResults> {
        let custom_categories = self
            .store
            .tenant_categories(tenant_id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(tenant_id = %tenant_id, error = %err, "Failed to load tenant categories");
                Vec::new()
            });

        let system_names: Vec<&str> = SYSTEM_CATEGORIES.iter().map(|c| c.name).collect();
        let custom_json = serde_json::to_string(&custom_categories).unwrap_or_else(|_| "[]".into());

        let prompt = format!(
            r#"Analyze the following document content and classify it comprehensively:

Custom Categories Available: {custom_json}
System Categories: {system_names:?}

Document Content:
{preview}

Please provide a JSON response with:
{{
    "primary_category": "most likely category from the lists above",
    "categories": [
        {{"name": "category_name", "confidence": 0.95}}
    ],
    "tags": [
        {{"name": "tag_name", "confidence": 0.89}}
    ],
    "content_type": "contract|invoice|report|email|presentation|manual|policy|specification|other",
    "language": "en|es|fr|de|pt|other",
    "sentiment": "positive|negative|neutral",
    "summary": "brief summary of document purpose and key topics"
}}

Guidelines:
- confidence should be between 0.0 and 1.0
- include 1-3 most relevant categories
- include 3-5 relevant tags that describe key topics
- be specific about content_type
- detect document language accurately"#
        );

        let raw = self
            .ai
            .complete_json(
                "You are a document classification expert. Analyze documents and provide \
                 structured categorization data in JSON format. Be accurate and specific.",
                &prompt,
            )
            .await?;

        let value: Value =
            serde_json::from_str(&raw).context("Model returned malformed JSON")?;
        Ok(validate_model_response(&value))
    }

    /// Ask the model for up to ten key entities. Failures yield an empty
    /// list, never an error.
    async fn extract_entities(&self, preview: &str) -> Vec<String> {
        let prompt = format!(
            r#"Extract key entities from this document content. Focus on:
- Company names and organizations
- Person names and roles
- Monetary amounts and financial figures
- Important dates and deadlines
- Product or service names
- Location names
- Technical terms or specifications

Content: {preview}

Return a JSON object with an "entities" array containing the most important entities:
{{"entities": ["entity1", "entity2", "entity3"]}}

Limit to maximum 10 most important entities."#
        );

        let raw = match self
            .ai
            .complete_json(
                "You are an expert at extracting key entities from documents. \
                 Return only the most important and relevant entities.",
                &prompt,
            )
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "Entity extraction failed");
                return Vec::new();
            }
        };

        serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|v| v.get("entities").cloned())
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .map(|mut entities| {
                entities.truncate(MAX_ENTITIES);
                entities
            })
            .unwrap_or_default()
    }
}

/// Pass 1: keyword and regex scoring against the system registry.
fn rule_based_classification(content: &str) -> PassResults {
    let content_lower = content.to_lowercase();
    let word_count = content_lower.split_whitespace().count().max(1);

    let mut results = PassResults::default();

    for category in SYSTEM_CATEGORIES.iter() {
        let mut score = 0.0f32;
        let mut matches = 0usize;

        for keyword in category.keywords {
            if content_lower.contains(keyword) {
                score += KEYWORD_SCORE;
                matches += content_lower.matches(keyword).count();
            }
        }

        for pattern in &category.patterns {
            let pattern_matches = pattern.find_iter(&content_lower).count();
            if pattern_matches > 0 {
                score += PATTERN_SCORE * pattern_matches.min(PATTERN_MATCH_CAP) as f32;
            }
        }

        if matches == 0 {
            continue;
        }

        let keyword_density = matches as f32 / word_count as f32;
        let confidence = (score * (1.0 + keyword_density * 10.0)).min(1.0);

        if confidence > RULE_KEEP_THRESHOLD {
            results.categories.push(ScoredLabel {
                name: category.name.to_string(),
                confidence,
            });

            for keyword in category
                .keywords
                .iter()
                .filter(|kw| content_lower.contains(**kw))
                .take(RULE_TAGS_PER_CATEGORY)
            {
                results.tags.push(ScoredLabel {
                    name: keyword.to_string(),
                    confidence: confidence * RULE_TAG_FACTOR,
                });
            }
        }
    }

    sort_labels(&mut results.categories);
    sort_labels(&mut results.tags);
    results
}

/// Coerce the model's JSON into scored labels, clamping confidences and
/// filling in defaults for missing fields.
fn validate_model_response(value: &Value) -> PassResults {
    fn labels_of(value: Option<&Value>) -> Vec<ScoredLabel> {
        let Some(Value::Array(items)) = value else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?.to_string();
                let confidence = item
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .map(|c| c.clamp(0.0, 1.0) as f32)
                    .unwrap_or(0.5);
                Some(ScoredLabel { name, confidence })
            })
            .collect()
    }

    fn string_of(value: Option<&Value>) -> Option<String> {
        value
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    PassResults {
        categories: labels_of(value.get("categories")),
        tags: labels_of(value.get("tags")),
        content_type: string_of(value.get("content_type")),
        language: string_of(value.get("language")),
        sentiment: string_of(value.get("sentiment")),
    }
}

/// Weighted merge of the two passes.
fn merge_passes(rule: &PassResults, ai: &PassResults) -> (Vec<ScoredLabel>, Vec<ScoredLabel>) {
    let categories = merge_labels(
        &rule.categories,
        &ai.categories,
        CATEGORY_RULE_WEIGHT,
        CATEGORY_AI_WEIGHT,
        CATEGORY_KEEP_THRESHOLD,
        MAX_CATEGORIES,
    );
    let tags = merge_labels(
        &rule.tags,
        &ai.tags,
        TAG_RULE_WEIGHT,
        TAG_AI_WEIGHT,
        TAG_KEEP_THRESHOLD,
        MAX_TAGS,
    );
    (categories, tags)
}

fn merge_labels(
    rule: &[ScoredLabel],
    ai: &[ScoredLabel],
    rule_weight: f32,
    ai_weight: f32,
    threshold: f32,
    limit: usize,
) -> Vec<ScoredLabel> {
    let mut scores: HashMap<String, f32> = HashMap::new();

    for label in rule {
        scores.insert(label.name.clone(), label.confidence * rule_weight);
    }
    for label in ai {
        *scores.entry(label.name.clone()).or_insert(0.0) += label.confidence * ai_weight;
    }

    let mut merged: Vec<ScoredLabel> = scores
        .into_iter()
        .filter(|(_, score)| *score > threshold)
        .map(|(name, score)| ScoredLabel {
            name,
            confidence: score.min(1.0),
        })
        .collect();

    sort_labels(&mut merged);
    merged.truncate(limit);
    merged
}

/// Descending by confidence, name as the deterministic tie-break.
fn sort_labels(labels: &mut [ScoredLabel]) {
    labels.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedAi {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedAi {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl BaseAi for ScriptedAi {
        async fn complete_json(&self, _system: &str, _user: &str) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                anyhow::bail!("no scripted response left")
            }
            responses.remove(0)
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl CategorizationStore for EmptyStore {
        async fn tenant_categories(
            &self,
            _tenant_id: TenantId,
        ) -> Result<Vec<super::super::models::CategorySummary>> {
            Ok(Vec::new())
        }

        async fn get_or_create_category(
            &self,
            _tenant_id: TenantId,
            _name: &str,
            _description: Option<&str>,
            _parent_id: Option<crate::common::CategoryId>,
        ) -> Result<super::super::models::DocumentCategory> {
            unimplemented!()
        }

        async fn get_or_create_tag(
            &self,
            _tenant_id: TenantId,
            _name: &str,
            _tag_type: &str,
        ) -> Result<super::super::models::DocumentTag> {
            unimplemented!()
        }

        async fn save_category_assignment(
            &self,
            _document_id: crate::common::DocumentId,
            _category_id: crate::common::CategoryId,
            _confidence: f32,
            _assigned_by: super::super::models::AssignedBy,
        ) -> Result<()> {
            unimplemented!()
        }

        async fn save_tag_assignment(
            &self,
            _document_id: crate::common::DocumentId,
            _tag_id: crate::common::TagId,
            _confidence: f32,
            _assigned_by: super::super::models::AssignedBy,
        ) -> Result<()> {
            unimplemented!()
        }

        async fn delete_assignments_for_document(
            &self,
            _document_id: crate::common::DocumentId,
        ) -> Result<()> {
            unimplemented!()
        }
    }

    const LEGAL_TEXT: &str = "This agreement is made between the parties. Whereas the \
        parties agree to the terms herein, the contract includes a confidentiality clause \
        and liability provisions under the jurisdiction of the governing law.";

    #[test]
    fn test_rule_pass_detects_legal_content() {
        let results = rule_based_classification(LEGAL_TEXT);
        assert_eq!(results.categories[0].name, "Legal");
        assert!(results.categories[0].confidence > 0.3);
        // Matched keywords become candidate tags at 0.8x.
        let tag = &results.tags[0];
        assert!((tag.confidence - results.categories[0].confidence * 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_rule_pass_ignores_unrelated_content() {
        let results =
            rule_based_classification("The quick brown fox jumps over the lazy dog repeatedly.");
        assert!(results.categories.is_empty());
        assert!(results.tags.is_empty());
    }

    #[test]
    fn test_rule_confidence_capped_at_one() {
        let dense = "contract agreement terms liability clause legal whereas therefore \
            party parties jurisdiction confidentiality nda license copyright"
            .repeat(10);
        let results = rule_based_classification(&dense);
        assert!(results.categories[0].confidence <= 1.0);
    }

    #[test]
    fn test_merge_weights_match_design() {
        // Rule pass: Legal 0.55, Financial 0.52.
        // Model pass: Legal 0.90, Financial 0.40.
        let rule = PassResults {
            categories: vec![
                ScoredLabel { name: "Legal".into(), confidence: 0.55 },
                ScoredLabel { name: "Financial".into(), confidence: 0.52 },
            ],
            ..Default::default()
        };
        let ai = PassResults {
            categories: vec![
                ScoredLabel { name: "Legal".into(), confidence: 0.90 },
                ScoredLabel { name: "Financial".into(), confidence: 0.40 },
            ],
            ..Default::default()
        };

        let (categories, _) = merge_passes(&rule, &ai);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Legal");
        assert!((categories[0].confidence - 0.76).abs() < 1e-6);
        assert_eq!(categories[1].name, "Financial");
        assert!((categories[1].confidence - 0.448).abs() < 1e-6);
    }

    #[test]
    fn test_merge_drops_below_threshold_and_limits() {
        let ai = PassResults {
            categories: (0..6)
                .map(|i| ScoredLabel {
                    name: format!("cat{i}"),
                    confidence: 1.0 - i as f32 * 0.05,
                })
                .collect(),
            tags: vec![ScoredLabel { name: "weak".into(), confidence: 0.1 }],
            ..Default::default()
        };
        let (categories, tags) = merge_passes(&PassResults::default(), &ai);
        assert_eq!(categories.len(), 3);
        // 0.1 * 0.7 = 0.07 < 0.3, dropped.
        assert!(tags.is_empty());
    }

    #[test]
    fn test_validate_clamps_confidences() {
        let value = serde_json::json!({
            "categories": [
                {"name": "Legal", "confidence": 1.7},
                {"name": "Financial", "confidence": -0.2},
                {"name": "NoConfidence"}
            ],
            "tags": [],
            "content_type": "contract",
            "language": "en",
            "sentiment": "neutral"
        });
        let results = validate_model_response(&value);
        assert_eq!(results.categories[0].confidence, 1.0);
        let financial = results.categories.iter().find(|c| c.name == "Financial").unwrap();
        assert_eq!(financial.confidence, 0.0);
        let missing = results
            .categories
            .iter()
            .find(|c| c.name == "NoConfidence")
            .unwrap();
        assert_eq!(missing.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_rules() {
        let ai = ScriptedAi::new(vec![
            Err(anyhow::anyhow!("rate limited")),
            Err(anyhow::anyhow!("rate limited")),
        ]);
        let classifier = HybridClassifier::new(ai, Arc::new(EmptyStore));

        let classification = classifier
            .classify(LEGAL_TEXT, TenantId::new(), true, 2000)
            .await;

        assert_eq!(classification.content_type, "document");
        assert_eq!(classification.language, "en");
        assert_eq!(classification.sentiment, "neutral");
        assert!(classification.key_entities.is_empty());
        assert!(classification.categories.len() <= 3);
    }

    #[tokio::test]
    async fn test_full_hybrid_classification() {
        let classification_json = serde_json::json!({
            "primary_category": "Legal",
            "categories": [{"name": "Legal", "confidence": 0.9}],
            "tags": [{"name": "contract", "confidence": 0.8}],
            "content_type": "contract",
            "language": "en",
            "sentiment": "neutral",
            "summary": "a contract"
        })
        .to_string();
        let entities_json = serde_json::json!({
            "entities": ["Acme Corp", "John Doe"]
        })
        .to_string();

        let ai = ScriptedAi::new(vec![Ok(classification_json), Ok(entities_json)]);
        let classifier = HybridClassifier::new(ai, Arc::new(EmptyStore));

        let classification = classifier
            .classify(LEGAL_TEXT, TenantId::new(), true, 2000)
            .await;

        assert_eq!(classification.categories[0].name, "Legal");
        assert_eq!(classification.content_type, "contract");
        assert_eq!(classification.key_entities, vec!["Acme Corp", "John Doe"]);
        assert!(classification
            .tags
            .iter()
            .any(|t| t.name == "contract"));
    }

    #[tokio::test]
    async fn test_ai_disabled_uses_defaults() {
        let ai = ScriptedAi::new(vec![]);
        let classifier = HybridClassifier::new(ai, Arc::new(EmptyStore));

        let classification = classifier
            .classify(LEGAL_TEXT, TenantId::new(), false, 2000)
            .await;
        assert_eq!(classification.content_type, "document");
        assert!(classification.key_entities.is_empty());
    }
}
