//! Lifecycle phases and per-system scheduling configuration.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Default priority of a system that never set `PRIORITY`.
pub const DEFAULT_PRIORITY: i32 = 100;

/// One of the five fixed lifecycle stages.
///
/// Declaration order is execution order within a frame lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Phase {
    PreStart,
    Start,
    Loop,
    PostLoop,
    End,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 5] = [
        Phase::PreStart,
        Phase::Start,
        Phase::Loop,
        Phase::PostLoop,
        Phase::End,
    ];

    /// Spelling used in spec files.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreStart => "PRE_START",
            Phase::Start => "START",
            Phase::Loop => "LOOP",
            Phase::PostLoop => "POST_LOOP",
            Phase::End => "END",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or(())
    }
}

/// How a system is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ExecMode {
    /// Called directly from the phase it is scheduled in.
    #[default]
    Single,
    /// Dispatched over a worker pool through a generated wrapper.
    Parallel,
}

impl ExecMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecMode::Single => "SINGLE",
            ExecMode::Parallel => "PARALLEL",
        }
    }
}

impl FromStr for ExecMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE" => Ok(ExecMode::Single),
            "PARALLEL" => Ok(ExecMode::Parallel),
            _ => Err(()),
        }
    }
}

/// Scheduling attributes of a named system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemConfig {
    pub mode: ExecMode,
    /// Lower runs earlier.
    pub priority: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mode: ExecMode::Single,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Ordered system lists for all five phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTable {
    lists: [Vec<String>; 5],
}

impl PhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Systems scheduled in `phase`, in execution order.
    pub fn get(&self, phase: Phase) -> &[String] {
        &self.lists[phase.index()]
    }

    pub fn get_mut(&mut self, phase: Phase) -> &mut Vec<String> {
        &mut self.lists[phase.index()]
    }

    /// Append a system reference to `phase`.
    pub fn push(&mut self, phase: Phase, system: impl Into<String>) {
        self.lists[phase.index()].push(system.into());
    }

    /// Every system name referenced by any phase.
    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.lists.iter().flatten().map(String::as_str)
    }

    /// Stable sort of every phase by `priority`; ties keep declaration order.
    pub fn sort_by_priority(&mut self, priority: impl Fn(&str) -> i32) {
        for list in &mut self.lists {
            list.sort_by_key(|name| priority(name));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }
}
