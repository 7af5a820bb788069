use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// WGS84 point, `lat ∈ [-90, 90]`, `lon ∈ [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn in_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

const RANK_NAMES: [&str; 7] = [
    "private",
    "corporal",
    "sergeant",
    "lieutenant",
    "captain",
    "major",
    "colonel",
];

/// Military rank. Name and value are two views of the same ordinal and
/// cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Private,
    Corporal,
    Sergeant,
    Lieutenant,
    Captain,
    Major,
    Colonel,
}

impl Rank {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        RANK_NAMES[self as usize]
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Rank::Private),
            1 => Some(Rank::Corporal),
            2 => Some(Rank::Sergeant),
            3 => Some(Rank::Lieutenant),
            4 => Some(Rank::Captain),
            5 => Some(Rank::Major),
            6 => Some(Rank::Colonel),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        RANK_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| Rank::from_value(i as u8))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-assigned personnel number: exactly seven ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoldierId(String);

impl SoldierId {
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        if s.len() == 7 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err("soldier id must be exactly 7 digits")
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoldierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soldier {
    pub id: SoldierId,
    pub name: String,
    pub rank: Rank,
    /// Lower-cased tags for things the soldier cannot do.
    pub limitations: BTreeSet<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Soldier {
    pub fn new(
        id: SoldierId,
        name: String,
        rank: Rank,
        limitations: BTreeSet<String>,
        now: Ms,
    ) -> Self {
        Self {
            id,
            name,
            rank,
            limitations,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DutyStatus {
    Unscheduled,
    Scheduled,
    Canceled,
}

impl DutyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DutyStatus::Unscheduled => "unscheduled",
            DutyStatus::Scheduled => "scheduled",
            DutyStatus::Canceled => "canceled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unscheduled" => Some(DutyStatus::Unscheduled),
            "scheduled" => Some(DutyStatus::Scheduled),
            "canceled" => Some(DutyStatus::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: DutyStatus,
    pub at: Ms,
}

/// The caller-supplied portion of a duty, before the engine assigns an
/// id and seeds the lifecycle fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyDraft {
    pub name: String,
    pub description: String,
    pub location: Location,
    pub window: Span,
    pub min_rank: Option<Rank>,
    pub max_rank: Option<Rank>,
    pub constraints: BTreeSet<String>,
    pub soldiers_required: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duty {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub window: Span,
    pub min_rank: Option<Rank>,
    pub max_rank: Option<Rank>,
    /// Tags a soldier's limitations are checked against, stored verbatim.
    pub constraints: BTreeSet<String>,
    pub soldiers_required: u32,
    /// Justice credit attributed to each assigned soldier.
    pub value: f64,
    pub soldiers: BTreeSet<SoldierId>,
    pub status: DutyStatus,
    /// Append-only transition log, seeded with the unscheduled entry.
    pub status_history: Vec<StatusChange>,
    pub created_at: Ms,
    pub updated_at: Ms,
    /// Bumped on every mutation; the optimistic-concurrency check for
    /// the schedule commit.
    pub version: u64,
}

impl Duty {
    pub fn new(id: Ulid, draft: DutyDraft, now: Ms) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            location: draft.location,
            window: draft.window,
            min_rank: draft.min_rank,
            max_rank: draft.max_rank,
            constraints: draft.constraints,
            soldiers_required: draft.soldiers_required,
            value: draft.value,
            soldiers: BTreeSet::new(),
            status: DutyStatus::Unscheduled,
            status_history: vec![StatusChange {
                status: DutyStatus::Unscheduled,
                at: now,
            }],
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// Partial update to a soldier; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoldierPatch {
    pub name: Option<String>,
    pub rank: Option<Rank>,
    pub limitations: Option<Vec<String>>,
}

/// Partial update to an unscheduled duty; `None` fields are left
/// untouched. `start`/`end` are separate so either edge can move alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DutyPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub min_rank: Option<Rank>,
    pub max_rank: Option<Rank>,
    pub constraints: Option<Vec<String>>,
    pub soldiers_required: Option<u32>,
    pub value: Option<f64>,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SoldierCreated {
        id: SoldierId,
        name: String,
        rank: Rank,
        limitations: Vec<String>,
        at: Ms,
    },
    SoldierUpdated {
        id: SoldierId,
        name: Option<String>,
        rank: Option<Rank>,
        limitations: Option<Vec<String>>,
        at: Ms,
    },
    SoldierLimitationsAdded {
        id: SoldierId,
        limitations: Vec<String>,
        at: Ms,
    },
    SoldierDeleted {
        id: SoldierId,
    },
    DutyCreated {
        id: Ulid,
        draft: DutyDraft,
        at: Ms,
    },
    /// Window and bounds are resolved to absolute values before the
    /// event is written, so replay applies them blindly.
    DutyUpdated {
        id: Ulid,
        name: Option<String>,
        description: Option<String>,
        location: Option<Location>,
        window: Option<Span>,
        min_rank: Option<Rank>,
        max_rank: Option<Rank>,
        constraints: Option<Vec<String>>,
        soldiers_required: Option<u32>,
        value: Option<f64>,
        at: Ms,
    },
    DutyConstraintsAdded {
        id: Ulid,
        constraints: Vec<String>,
        at: Ms,
    },
    DutyDeleted {
        id: Ulid,
    },
    DutyScheduled {
        id: Ulid,
        soldiers: Vec<SoldierId>,
        at: Ms,
    },
    DutyCanceled {
        id: Ulid,
        at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JusticeEntry {
    pub soldier_id: SoldierId,
    pub score: f64,
}

/// Per-duty outcome of a batch scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScheduleOutcome {
    Assigned(Vec<SoldierId>),
    Skipped(String),
}
