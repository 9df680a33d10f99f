//! Human-readable report card for an analysis.
//!
//! One header block, a row per clause with its type and risk, then the
//! advisory and the stage audit trail.

use std::fmt::Write;

use covenant_core::AnalysisState;

const PREVIEW_CHARS: usize = 60;

// ── Public API ──

pub fn render_report(state: &AnalysisState) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, state);
    out
}

fn write_report(out: &mut String, state: &AnalysisState) -> std::fmt::Result {
    writeln!(out, "=== {} ===", state.source_path.display())?;
    writeln!(
        out,
        "  {:<26} {:.2} (higher is more compliant)",
        "overall_score", state.overall_score
    )?;
    writeln!(out, "  {:<26} {}", "clauses", state.clauses.len())?;
    writeln!(out, "  {:<26} {}", "fallbacks", state.fallback_count())?;
    writeln!(out)?;

    write_clauses(out, state)?;
    write_advisory(out, state)?;
    write_stages(out, state)
}

// ── Sections ──

fn write_clauses(out: &mut String, state: &AnalysisState) -> std::fmt::Result {
    if state.classified_clauses.is_empty() {
        return Ok(());
    }

    writeln!(out, "Clauses")?;
    for (clause, risk) in state.classified_clauses.iter().zip(&state.risks) {
        writeln!(
            out,
            "  {:<5} {:<20} {:<6} {:<7} {:.2}  p{} {}",
            clause.id(),
            clause.clause_type,
            risk.risk_level,
            risk.status,
            risk.score,
            clause.clause.page,
            clause.clause.section,
        )?;
        writeln!(out, "        {}", preview(clause.text(), PREVIEW_CHARS))?;
        writeln!(out, "        {}: {}", risk.framework, risk.reason)?;
    }
    writeln!(out)
}

fn write_advisory(out: &mut String, state: &AnalysisState) -> std::fmt::Result {
    writeln!(out, "Advisory")?;
    for line in state.advisory.summary.lines() {
        writeln!(out, "  {line}")?;
    }
    if !state.advisory.recommendations.is_empty() {
        writeln!(out, "  Recommendations ({}):", state.advisory.recommendations.len())?;
        for (i, rec) in state.advisory.recommendations.iter().enumerate() {
            writeln!(out, "    {}. {rec}", i + 1)?;
        }
    }
    writeln!(out)
}

fn write_stages(out: &mut String, state: &AnalysisState) -> std::fmt::Result {
    writeln!(out, "Stages")?;
    for t in &state.transitions {
        writeln!(
            out,
            "  {:<12} {:>4} items  {:>3} fallbacks  {:>6} ms",
            t.stage.as_str(),
            t.items,
            t.fallbacks,
            t.elapsed_ms
        )?;
    }
    Ok(())
}

/// First `max` chars of the text on one line, with an ellipsis if cut.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use covenant_core::{
        Advisory, Clause, ClassifiedClause, ComplianceStatus, RiskLevel, RiskResult, Stage,
        StageTransition,
    };

    fn state() -> AnalysisState {
        let clause = Clause::new(
            1,
            "1. Confidentiality. Each party shall keep\nthe terms of this policy confidential.",
            Some(3),
            Some("General"),
        );
        AnalysisState {
            source_path: "policy.txt".into(),
            classified_clauses: vec![ClassifiedClause {
                clause: clause.clone(),
                clause_type: "Confidentiality".into(),
                confidence: 0.9,
            }],
            clauses: vec![clause],
            risks: vec![RiskResult {
                clause_id: "C1".into(),
                risk_level: RiskLevel::Low,
                framework: "IRDAI".into(),
                status: ComplianceStatus::Aligned,
                reason: "standard wording".into(),
                score: 0.8,
            }],
            advisory: Advisory {
                summary: "One clause reviewed.".into(),
                recommendations: vec!["Keep the clause as drafted.".into()],
            },
            overall_score: 0.8,
            transitions: vec![StageTransition {
                stage: Stage::Classified,
                items: 1,
                fallbacks: 0,
                elapsed_ms: 12,
                completed_at: Utc::now(),
            }],
        }
    }

    #[test]
    fn report_has_every_section() {
        let report = render_report(&state());

        assert!(report.starts_with("=== policy.txt ==="));
        assert!(report.contains("overall_score              0.80"));
        assert!(report.contains("C1    Confidentiality      Low    Aligned 0.80  p3 General"));
        assert!(report.contains("IRDAI: standard wording"));
        assert!(report.contains("    1. Keep the clause as drafted."));
        assert!(report.contains("classified"));
    }

    #[test]
    fn preview_flattens_and_cuts() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }
}
