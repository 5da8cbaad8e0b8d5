use serde::{Deserialize, Serialize};

/// Phases a migration run moves through, in order (tier phases repeat
/// once per tier). Used both for `ProgressEvent::phase` and as the
/// `(phase, entity)` key progress monotonicity is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Analyzing,
    Exporting,
    Importing,
    ProcessingDeferredFields,
    ProcessingRelationships,
    Complete,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Analyzing => "Analyzing",
            Phase::Exporting => "Exporting",
            Phase::Importing => "Importing",
            Phase::ProcessingDeferredFields => "ProcessingDeferredFields",
            Phase::ProcessingRelationships => "ProcessingRelationships",
            Phase::Complete => "Complete",
            Phase::Error => "Error",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(phase, entity?, relationship?, tierIndex?, current, total,
/// successCount, failureCount, instantRate?, eta?, overall?,
/// errorSamples[])` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub entity: Option<String>,
    pub relationship: Option<String>,
    pub tier_index: Option<usize>,
    pub current: u64,
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub instant_rate: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub overall: bool,
    pub error_samples: Vec<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, current: u64, total: u64) -> Self {
        Self {
            phase,
            entity: None,
            relationship: None,
            tier_index: None,
            current,
            total,
            success_count: 0,
            failure_count: 0,
            instant_rate: None,
            eta_seconds: None,
            overall: false,
            error_samples: Vec::new(),
        }
    }

    pub fn for_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn in_tier(mut self, tier: usize) -> Self {
        self.tier_index = Some(tier);
        self
    }

    pub fn key(&self) -> (Phase, Option<String>) {
        (self.phase, self.entity.clone())
    }
}
