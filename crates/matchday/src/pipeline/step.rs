//! Static step descriptors and the linear chain that orders them.

use std::collections::HashSet;

use super::artifact::Artifact;
use super::error::PipelineError;
use super::transforms::{self, TransformFn};

/// How the orchestrator executes a step.
#[derive(Clone, Copy)]
pub enum StepKind {
    /// Fetch raw match data for the run's scopes.
    Extract,
    /// Pure function from declared inputs to declared outputs.
    Transform(TransformFn),
    /// Data quality gate over built artifacts.
    QualityGate,
    /// Schema and row-count validation.
    Validation,
}

impl StepKind {
    pub fn is_gate(&self) -> bool {
        matches!(self, StepKind::QualityGate | StepKind::Validation)
    }
}

impl std::fmt::Debug for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepKind::Extract => "Extract",
            StepKind::Transform(_) => "Transform",
            StepKind::QualityGate => "QualityGate",
            StepKind::Validation => "Validation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub depends_on: Option<&'static str>,
    pub reads: &'static [Artifact],
    pub writes: &'static [Artifact],
    pub kind: StepKind,
}

/// Ordered, validated step chain. Built once and never inferred from names.
#[derive(Debug, Clone)]
pub struct StepChain {
    steps: Vec<StepDescriptor>,
}

impl StepChain {
    /// Validates that ids are unique and each step depends on its predecessor.
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for (pos, step) in steps.iter().enumerate() {
            if !seen.insert(step.id) {
                return Err(PipelineError::InvalidChain(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
            let expected = if pos == 0 { None } else { Some(steps[pos - 1].id) };
            if step.depends_on != expected {
                return Err(PipelineError::InvalidChain(format!(
                    "step '{}' depends on {:?}, expected {:?}",
                    step.id, step.depends_on, expected
                )));
            }
        }
        Ok(Self { steps })
    }

    pub fn standard() -> Self {
        Self {
            steps: standard_steps(),
        }
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: &str) -> Result<usize, PipelineError> {
        self.steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| PipelineError::UnknownStep(id.to_string()))
    }

    /// The contiguous window `[from, to]`; open ends default to the chain ends.
    pub fn window(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<&[StepDescriptor], PipelineError> {
        let start = from.map(|id| self.position(id)).transpose()?.unwrap_or(0);
        let end = to
            .map(|id| self.position(id))
            .transpose()?
            .unwrap_or(self.steps.len().saturating_sub(1));

        if start > end {
            return Err(PipelineError::InvalidWindow {
                from: self.steps[start].id.to_string(),
                to: self.steps[end].id.to_string(),
            });
        }
        Ok(&self.steps[start..=end])
    }

    pub fn predecessor(&self, id: &str) -> Option<&StepDescriptor> {
        self.get(id)
            .and_then(|s| s.depends_on)
            .and_then(|dep| self.get(dep))
    }

    /// The step that writes `artifact`, if any.
    pub fn producer_of(&self, artifact: Artifact) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.writes.contains(&artifact))
    }

    /// Id of the step that writes `artifact`, or `"extract"` for data the
    /// chain only reads (the index and progress table are extraction inputs).
    pub fn producer_id(&self, artifact: Artifact) -> &'static str {
        self.producer_of(artifact)
            .map(|s| s.id)
            .or_else(|| self.steps.first().map(|s| s.id))
            .unwrap_or("extract")
    }
}

fn standard_steps() -> Vec<StepDescriptor> {
    vec![
        StepDescriptor {
            id: "extract",
            label: "extract raw match data",
            depends_on: None,
            reads: &[Artifact::MatchIndex],
            writes: &[Artifact::RawMatches],
            kind: StepKind::Extract,
        },
        StepDescriptor {
            id: "derived",
            label: "player appearances and match scores",
            depends_on: Some("extract"),
            reads: &[Artifact::MatchIndex, Artifact::RawMatches],
            writes: &[
                Artifact::PlayerAppearances,
                Artifact::PlayerAppearancesCsv,
                Artifact::MatchScores,
            ],
            kind: StepKind::Transform(transforms::derived::build),
        },
        StepDescriptor {
            id: "00",
            label: "full match scores",
            depends_on: Some("derived"),
            reads: &[
                Artifact::MatchIndex,
                Artifact::MatchScores,
                Artifact::PlayerAppearances,
            ],
            writes: &[Artifact::MatchScoresFull],
            kind: StepKind::Transform(transforms::scores::build),
        },
        StepDescriptor {
            id: "01",
            label: "team season stats",
            depends_on: Some("00"),
            reads: &[Artifact::MatchIndex, Artifact::MatchScoresFull],
            writes: &[Artifact::TeamSeasonStats],
            kind: StepKind::Transform(transforms::team_stats::build),
        },
        StepDescriptor {
            id: "02",
            label: "match summary",
            depends_on: Some("01"),
            reads: &[
                Artifact::MatchScoresFull,
                Artifact::MatchScores,
                Artifact::PlayerAppearances,
            ],
            writes: &[Artifact::MatchSummary],
            kind: StepKind::Transform(transforms::match_summary::build),
        },
        StepDescriptor {
            id: "03",
            label: "player season stats",
            depends_on: Some("02"),
            reads: &[Artifact::PlayerAppearances],
            writes: &[Artifact::PlayerSeasonStats],
            kind: StepKind::Transform(transforms::player_stats::build_season),
        },
        StepDescriptor {
            id: "04",
            label: "player career stats",
            depends_on: Some("03"),
            reads: &[Artifact::PlayerSeasonStats],
            writes: &[Artifact::PlayerCareerStats],
            kind: StepKind::Transform(transforms::player_stats::build_career),
        },
        StepDescriptor {
            id: "dq",
            label: "data quality gate",
            depends_on: Some("04"),
            reads: &[
                Artifact::MatchIndex,
                Artifact::ExtractionProgress,
                Artifact::PlayerAppearances,
                Artifact::PlayerAppearancesCsv,
                Artifact::MatchScoresFull,
                Artifact::TeamSeasonStats,
                Artifact::MatchSummary,
                Artifact::PlayerSeasonStats,
                Artifact::PlayerCareerStats,
            ],
            writes: &[],
            kind: StepKind::QualityGate,
        },
        StepDescriptor {
            id: "validate",
            label: "schema and row-count validation",
            depends_on: Some("dq"),
            reads: &[
                Artifact::MatchIndex,
                Artifact::ExtractionProgress,
                Artifact::PlayerAppearances,
                Artifact::PlayerAppearancesCsv,
                Artifact::MatchScores,
                Artifact::MatchScoresFull,
                Artifact::TeamSeasonStats,
                Artifact::MatchSummary,
                Artifact::PlayerSeasonStats,
                Artifact::PlayerCareerStats,
            ],
            writes: &[],
            kind: StepKind::Validation,
        },
    ]
}
