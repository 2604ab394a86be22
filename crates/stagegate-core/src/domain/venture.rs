//! Venture and per-stage state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venture_state::{StageWorkRecord, VentureRecord};

use super::stage::Stage;

/// Lifecycle status of a venture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VentureStatus {
    Active,
    Paused,
    Killed,
    Launched,
}

impl VentureStatus {
    fn parse(s: &str) -> VentureStatus {
        match s {
            "paused" => Self::Paused,
            "killed" => Self::Killed,
            "launched" => Self::Launched,
            _ => Self::Active,
        }
    }
}

/// Status of a single stage for a venture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Completed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Coarse health indicator for a stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageHealth {
    Green,
    Yellow,
    Red,
}

impl StageHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Per-(venture, stage) state, mutated only as a side effect of a
/// successful transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageState {
    pub status: StageStatus,
    pub health: StageHealth,
}

impl StageState {
    /// Parse a stage-work row's status/health strings, defaulting
    /// unknown values to pending/yellow.
    pub fn from_record(record: &StageWorkRecord) -> StageState {
        let status = if record.status == "completed" {
            StageStatus::Completed
        } else {
            StageStatus::Pending
        };
        let health = match record.health.as_str() {
            "green" => StageHealth::Green,
            "red" => StageHealth::Red,
            _ => StageHealth::Yellow,
        };
        StageState { status, health }
    }
}

/// The engine's cached view of a venture.
///
/// Never trusted without a freshness check immediately before a mutating
/// operation — the system of record owns the truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Venture {
    pub venture_id: Uuid,
    pub name: String,
    pub status: VentureStatus,
    pub current_stage: Stage,
}

impl Venture {
    /// Build the cached view from a store row, defaulting an unset stage
    /// to 1.
    pub fn from_record(record: &VentureRecord) -> Venture {
        let current_stage = record
            .current_stage
            .and_then(Stage::new)
            .unwrap_or(Stage::FIRST);
        Venture {
            venture_id: record.venture_id,
            name: record.name.clone(),
            status: VentureStatus::parse(&record.status),
            current_stage,
        }
    }
}

/// Role of a principal acting on a venture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalRole {
    /// The approving human authority; the only role that may commit
    /// stage transitions.
    Chairman,
    /// An autonomous agent that proposes handoffs.
    VentureAgent,
}

impl PrincipalRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chairman => "chairman",
            Self::VentureAgent => "venture_agent",
        }
    }

    pub fn parse(s: &str) -> Option<PrincipalRole> {
        match s {
            "chairman" => Some(Self::Chairman),
            "venture_agent" => Some(Self::VentureAgent),
            _ => None,
        }
    }
}

/// Snapshot summary of a venture's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VentureSummary {
    pub venture_id: Uuid,
    pub name: String,
    pub status: VentureStatus,
    pub current_stage: Stage,
    pub completed_stages: usize,
    pub pending_handoffs: usize,
}
