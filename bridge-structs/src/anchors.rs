use crate::{serializable_struct, BridgeError};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

pub const NUM_CATEGORIES: usize = 16;
pub const ANCHORS_PER_CATEGORY: usize = 64;
pub const TOTAL_ANCHORS: usize = NUM_CATEGORIES * ANCHORS_PER_CATEGORY;
pub const DATASET_VERSION: &str = "1.0.0";

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnchorCategory {
    FactualKnowledge,
    LogicalReasoning,
    CreativeExpression,
    EthicalReasoning,
    TechnicalExplanation,
    MathematicalComputation,
    CodeGeneration,
    LanguageTranslation,
    EmotionalIntelligence,
    Summarization,
    QuestionAnswering,
    CommonSense,
    CausalReasoning,
    SpatialReasoning,
    TemporalReasoning,
    AbstractConcepts,
}

impl AnchorCategory {
    /// Every category, in dataset order. Anchor ids are assigned in this order.
    pub const ALL: [AnchorCategory; NUM_CATEGORIES] = [
        AnchorCategory::FactualKnowledge,
        AnchorCategory::LogicalReasoning,
        AnchorCategory::CreativeExpression,
        AnchorCategory::EthicalReasoning,
        AnchorCategory::TechnicalExplanation,
        AnchorCategory::MathematicalComputation,
        AnchorCategory::CodeGeneration,
        AnchorCategory::LanguageTranslation,
        AnchorCategory::EmotionalIntelligence,
        AnchorCategory::Summarization,
        AnchorCategory::QuestionAnswering,
        AnchorCategory::CommonSense,
        AnchorCategory::CausalReasoning,
        AnchorCategory::SpatialReasoning,
        AnchorCategory::TemporalReasoning,
        AnchorCategory::AbstractConcepts,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorCategory::FactualKnowledge => "factual_knowledge",
            AnchorCategory::LogicalReasoning => "logical_reasoning",
            AnchorCategory::CreativeExpression => "creative_expression",
            AnchorCategory::EthicalReasoning => "ethical_reasoning",
            AnchorCategory::TechnicalExplanation => "technical_explanation",
            AnchorCategory::MathematicalComputation => "mathematical_computation",
            AnchorCategory::CodeGeneration => "code_generation",
            AnchorCategory::LanguageTranslation => "language_translation",
            AnchorCategory::EmotionalIntelligence => "emotional_intelligence",
            AnchorCategory::Summarization => "summarization",
            AnchorCategory::QuestionAnswering => "question_answering",
            AnchorCategory::CommonSense => "common_sense",
            AnchorCategory::CausalReasoning => "causal_reasoning",
            AnchorCategory::SpatialReasoning => "spatial_reasoning",
            AnchorCategory::TemporalReasoning => "temporal_reasoning",
            AnchorCategory::AbstractConcepts => "abstract_concepts",
        }
    }

    /// Qualities a reference prompt of this category is meant to exercise.
    pub fn expected_dimensions(self) -> &'static [&'static str] {
        match self {
            AnchorCategory::FactualKnowledge => &["accuracy", "specificity", "verifiability"],
            AnchorCategory::LogicalReasoning => &["validity", "consistency", "inference"],
            AnchorCategory::CreativeExpression => &["originality", "imagery", "fluency"],
            AnchorCategory::EthicalReasoning => &["fairness", "harm_awareness", "nuance"],
            AnchorCategory::TechnicalExplanation => &["clarity", "precision", "depth"],
            AnchorCategory::MathematicalComputation => &["correctness", "rigor", "notation"],
            AnchorCategory::CodeGeneration => &["correctness", "idiom", "structure"],
            AnchorCategory::LanguageTranslation => &["fidelity", "fluency", "register"],
            AnchorCategory::EmotionalIntelligence => &["empathy", "tone", "perspective"],
            AnchorCategory::Summarization => &["coverage", "concision", "salience"],
            AnchorCategory::QuestionAnswering => &["relevance", "completeness", "grounding"],
            AnchorCategory::CommonSense => &["plausibility", "world_knowledge", "pragmatics"],
            AnchorCategory::CausalReasoning => &["cause_effect", "counterfactuals", "mechanism"],
            AnchorCategory::SpatialReasoning => &["orientation", "geometry", "relations"],
            AnchorCategory::TemporalReasoning => &["ordering", "duration", "tense"],
            AnchorCategory::AbstractConcepts => &["abstraction", "analogy", "generalization"],
        }
    }

    fn prompt_stems(self) -> [&'static str; 4] {
        match self {
            AnchorCategory::FactualKnowledge => [
                "State the key facts about {topic}.",
                "When and where did {topic} first become widely known?",
                "List three verifiable properties of {topic}.",
                "Correct the common misconception about {topic}.",
            ],
            AnchorCategory::LogicalReasoning => [
                "If every case of {topic} implies the next, what follows?",
                "Find the flaw in this argument about {topic}.",
                "Derive a conclusion about {topic} from two premises.",
                "Is this syllogism about {topic} valid?",
            ],
            AnchorCategory::CreativeExpression => [
                "Write a short poem about {topic}.",
                "Describe {topic} as if it were a character in a fable.",
                "Invent a metaphor that captures {topic}.",
                "Open a science fiction story with {topic}.",
            ],
            AnchorCategory::EthicalReasoning => [
                "Who is harmed and who benefits from {topic}?",
                "Weigh the competing duties involved in {topic}.",
                "Is it fair to regulate {topic}? Argue both sides.",
                "What would a cautious policy on {topic} look like?",
            ],
            AnchorCategory::TechnicalExplanation => [
                "Explain how {topic} works to an engineer.",
                "Describe the internal components of {topic}.",
                "What are the failure modes of {topic}?",
                "Compare two implementations of {topic}.",
            ],
            AnchorCategory::MathematicalComputation => [
                "Compute the expected value involved in {topic}.",
                "Set up an equation that models {topic}.",
                "Estimate the order of magnitude of {topic}.",
                "Prove a simple bound related to {topic}.",
            ],
            AnchorCategory::CodeGeneration => [
                "Write a function that simulates {topic}.",
                "Design a data structure to represent {topic}.",
                "Write unit tests for a module about {topic}.",
                "Refactor this loop that processes {topic}.",
            ],
            AnchorCategory::LanguageTranslation => [
                "Translate a sentence about {topic} into French.",
                "Render a formal description of {topic} in plain Spanish.",
                "Translate an idiom related to {topic} into German.",
                "Back-translate a Japanese note on {topic}.",
            ],
            AnchorCategory::EmotionalIntelligence => [
                "Comfort someone worried about {topic}.",
                "How might a child feel when learning about {topic}?",
                "Respond kindly to an angry complaint about {topic}.",
                "Describe the mood of a crowd discussing {topic}.",
            ],
            AnchorCategory::Summarization => [
                "Summarize a long report on {topic} in two sentences.",
                "Give the three main points of an article on {topic}.",
                "Condense a meeting transcript about {topic}.",
                "Write an abstract for a paper on {topic}.",
            ],
            AnchorCategory::QuestionAnswering => [
                "What is the main purpose of {topic}?",
                "Why does {topic} matter to most people?",
                "Who would be the best expert to ask about {topic}?",
                "Answer a beginner's question about {topic}.",
            ],
            AnchorCategory::CommonSense => [
                "What happens if you ignore {topic} for a week?",
                "Would you bring {topic} to a picnic? Why?",
                "What is an everyday use of {topic}?",
                "Which is heavier, {topic} or a paperclip?",
            ],
            AnchorCategory::CausalReasoning => [
                "What causes {topic} to change over time?",
                "What would happen without {topic}?",
                "Trace the chain of effects started by {topic}.",
                "Separate correlation from causation in {topic}.",
            ],
            AnchorCategory::SpatialReasoning => [
                "Describe the layout of a room containing {topic}.",
                "How would {topic} look when viewed from above?",
                "Arrange the parts of {topic} from left to right.",
                "Which fits inside which: {topic} or a shoebox?",
            ],
            AnchorCategory::TemporalReasoning => [
                "Order the stages of {topic} chronologically.",
                "How long does {topic} typically take?",
                "What happened before {topic} was understood?",
                "Project how {topic} will evolve over a decade.",
            ],
            AnchorCategory::AbstractConcepts => [
                "What general principle does {topic} illustrate?",
                "Draw an analogy between {topic} and music.",
                "Define the essence of {topic} in one sentence.",
                "How does {topic} relate to the idea of symmetry?",
            ],
        }
    }
}

const PROMPT_TOPICS: [&str; 16] = [
    "photosynthesis",
    "compound interest",
    "the printing press",
    "plate tectonics",
    "vaccination",
    "public libraries",
    "supply chains",
    "the water cycle",
    "electric vehicles",
    "migratory birds",
    "open source software",
    "urban gardens",
    "solar eclipses",
    "the immune system",
    "board games",
    "ocean currents",
];

impl fmt::Display for AnchorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorCategory {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnchorCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BridgeError::InvalidCategory(s.to_string()))
    }
}

/// A categorized reference vector. Fields are read-only once constructed.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemanticAnchor {
    id: u32,
    category: AnchorCategory,
    prompt: String,
    reference_vector: Vec<f32>,
    weight: f64,
    expected_dimensions: Vec<String>,
}

impl SemanticAnchor {
    pub fn new(template: &AnchorTemplate, reference_vector: Vec<f32>) -> Self {
        Self {
            id: template.id,
            category: template.category,
            prompt: template.prompt.clone(),
            reference_vector,
            weight: template.weight,
            expected_dimensions: template.expected_dimensions.clone(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn category(&self) -> AnchorCategory {
        self.category
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reference_vector(&self) -> &[f32] {
        &self.reference_vector
    }

    pub fn expected_dimensions(&self) -> &[String] {
        &self.expected_dimensions
    }
}

serializable_struct! {
    AnchorTemplate {
        id: u32,
        category: AnchorCategory,
        prompt: String,
        weight: f64,
        expected_dimensions: Vec<String>,
    }
}

serializable_struct! {
    CategoryTemplates {
        name: AnchorCategory,
        anchors: Vec<AnchorTemplate>,
    }
}

serializable_struct! {
    AnchorDataset {
        version: String,
        categories: Vec<CategoryTemplates>,
    }
}

impl AnchorDataset {
    /// The canonical dataset: categories in [`AnchorCategory::ALL`] order,
    /// ids `category_index * 64 + n`.
    pub fn builtin() -> Self {
        let categories = AnchorCategory::ALL
            .iter()
            .map(|&category| {
                let stems = category.prompt_stems();
                let expected_dimensions: Vec<String> = category
                    .expected_dimensions()
                    .iter()
                    .map(|d| d.to_string())
                    .collect();
                let anchors = (0..ANCHORS_PER_CATEGORY)
                    .map(|n| {
                        let stem = stems[n % stems.len()];
                        let topic = PROMPT_TOPICS[n / stems.len()];
                        AnchorTemplate {
                            id: (category.index() * ANCHORS_PER_CATEGORY + n) as u32,
                            category,
                            prompt: stem.replace("{topic}", topic),
                            weight: 1.0,
                            expected_dimensions: expected_dimensions.clone(),
                        }
                    })
                    .collect();
                CategoryTemplates {
                    name: category,
                    anchors,
                }
            })
            .collect();
        Self {
            version: DATASET_VERSION.to_string(),
            categories,
        }
    }

    /// Checks the fixed schema: 16 distinct categories of 64 anchors each,
    /// with unique ids and entries filed under their own category.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.categories.len() != NUM_CATEGORIES {
            return Err(BridgeError::InvalidDataset(format!(
                "expected {} categories, found {}",
                NUM_CATEGORIES,
                self.categories.len()
            )));
        }
        let mut seen_categories = HashSet::new();
        let mut seen_ids = HashSet::new();
        for group in self.categories.iter() {
            if !seen_categories.insert(group.name) {
                return Err(BridgeError::InvalidDataset(format!(
                    "category '{}' appears more than once",
                    group.name
                )));
            }
            if group.anchors.len() != ANCHORS_PER_CATEGORY {
                return Err(BridgeError::InvalidDataset(format!(
                    "category '{}' has {} anchors, expected {}",
                    group.name,
                    group.anchors.len(),
                    ANCHORS_PER_CATEGORY
                )));
            }
            for anchor in group.anchors.iter() {
                if anchor.category != group.name {
                    return Err(BridgeError::InvalidDataset(format!(
                        "anchor {} is filed under '{}' but has category '{}'",
                        anchor.id, group.name, anchor.category
                    )));
                }
                if !anchor.weight.is_finite() {
                    return Err(BridgeError::InvalidDataset(format!(
                        "anchor {} has a non-finite weight",
                        anchor.id
                    )));
                }
                if !seen_ids.insert(anchor.id) {
                    return Err(BridgeError::InvalidDataset(format!(
                        "duplicate anchor id {}",
                        anchor.id
                    )));
                }
            }
        }
        Ok(())
    }
}
