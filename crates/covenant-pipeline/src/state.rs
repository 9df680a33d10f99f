//! Typestate for one analysis run.
//!
//! `Ingested → Classified → Assessed → Advised`. Each state is immutable to
//! callers; the only way forward is the next stage, which consumes the state
//! and adds exactly one stage output. [`AnalysisState`] can only be built
//! from [`Advised`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use covenant_core::{
    Advisory, AnalysisState, Clause, ClassifiedClause, RiskResult, Stage, StageTransition,
};
use tracing::info;

fn record(
    transitions: &mut Vec<StageTransition>,
    stage: Stage,
    items: usize,
    fallbacks: usize,
    started: Instant,
) {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(stage = %stage, items, fallbacks, elapsed_ms, "stage complete");
    transitions.push(StageTransition {
        stage,
        items,
        fallbacks,
        elapsed_ms,
        completed_at: Utc::now(),
    });
}

/// The document has been segmented into clauses.
#[derive(Debug)]
pub struct Ingested {
    source_path: PathBuf,
    clauses: Vec<Clause>,
    transitions: Vec<StageTransition>,
}

impl Ingested {
    pub(crate) fn new(source_path: PathBuf, clauses: Vec<Clause>, started: Instant) -> Self {
        let mut transitions = Vec::with_capacity(4);
        record(&mut transitions, Stage::Ingested, clauses.len(), 0, started);
        Self {
            source_path,
            clauses,
            transitions,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    pub(crate) fn classified(
        self,
        classified_clauses: Vec<ClassifiedClause>,
        fallbacks: usize,
        started: Instant,
    ) -> Classified {
        let Self {
            source_path,
            clauses,
            mut transitions,
        } = self;
        record(
            &mut transitions,
            Stage::Classified,
            classified_clauses.len(),
            fallbacks,
            started,
        );
        Classified {
            source_path,
            clauses,
            classified_clauses,
            transitions,
        }
    }
}

/// Every clause has a type.
#[derive(Debug)]
pub struct Classified {
    source_path: PathBuf,
    clauses: Vec<Clause>,
    classified_clauses: Vec<ClassifiedClause>,
    transitions: Vec<StageTransition>,
}

impl Classified {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn classified_clauses(&self) -> &[ClassifiedClause] {
        &self.classified_clauses
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    pub(crate) fn assessed(
        self,
        risks: Vec<RiskResult>,
        overall_score: f32,
        fallbacks: usize,
        started: Instant,
    ) -> Assessed {
        let Self {
            source_path,
            clauses,
            classified_clauses,
            mut transitions,
        } = self;
        record(
            &mut transitions,
            Stage::Assessed,
            risks.len(),
            fallbacks,
            started,
        );
        Assessed {
            source_path,
            clauses,
            classified_clauses,
            risks,
            overall_score,
            transitions,
        }
    }
}

/// Every classified clause has a risk result and the aggregate is known.
#[derive(Debug)]
pub struct Assessed {
    source_path: PathBuf,
    clauses: Vec<Clause>,
    classified_clauses: Vec<ClassifiedClause>,
    risks: Vec<RiskResult>,
    overall_score: f32,
    transitions: Vec<StageTransition>,
}

impl Assessed {
    pub fn classified_clauses(&self) -> &[ClassifiedClause] {
        &self.classified_clauses
    }

    pub fn risks(&self) -> &[RiskResult] {
        &self.risks
    }

    pub fn overall_score(&self) -> f32 {
        self.overall_score
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    pub(crate) fn advised(self, advisory: Advisory, fallbacks: usize, started: Instant) -> Advised {
        let Self {
            source_path,
            clauses,
            classified_clauses,
            risks,
            overall_score,
            mut transitions,
        } = self;
        record(&mut transitions, Stage::Advised, 1, fallbacks, started);
        Advised {
            source_path,
            clauses,
            classified_clauses,
            risks,
            overall_score,
            advisory,
            transitions,
        }
    }
}

/// Terminal state.
#[derive(Debug)]
pub struct Advised {
    source_path: PathBuf,
    clauses: Vec<Clause>,
    classified_clauses: Vec<ClassifiedClause>,
    risks: Vec<RiskResult>,
    overall_score: f32,
    advisory: Advisory,
    transitions: Vec<StageTransition>,
}

impl Advised {
    pub fn advisory(&self) -> &Advisory {
        &self.advisory
    }
}

impl From<Advised> for AnalysisState {
    fn from(state: Advised) -> Self {
        AnalysisState {
            source_path: state.source_path,
            clauses: state.clauses,
            classified_clauses: state.classified_clauses,
            risks: state.risks,
            advisory: state.advisory,
            overall_score: state.overall_score,
            transitions: state.transitions,
        }
    }
}
