//! Positional comparison of output probabilities between two netlists.
//!
//! Outputs pair up purely by ascending-ID position; this assumes both
//! netlists expose their outputs in the same structural order, not that the
//! IDs match.

use crate::elements::{ElementKind, ElementTable};
use std::fmt::Write;

pub const EPSILON: f64 = 1e-9;

/// Probability snapshot of one paired or unpaired output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputProbs {
    pub id: u32,
    pub prob_0: f64,
    pub prob_1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Divergence {
    /// Positionally paired outputs whose estimates differ by at least epsilon.
    Mismatch { first: OutputProbs, second: OutputProbs },
    /// Output of netlist 1 with no positional partner in netlist 2.
    UnmatchedFirst(OutputProbs),
    /// Output of netlist 2 with no positional partner in netlist 1.
    UnmatchedSecond(OutputProbs),
}

fn outputs_by_id(table: &ElementTable) -> Vec<OutputProbs> {
    // BTreeMap order, so ascending id
    table
        .values()
        .filter(|e| e.kind == ElementKind::Output)
        .map(|e| OutputProbs {
            id: e.id,
            prob_0: e.prob_0,
            prob_1: e.prob_1,
        })
        .collect()
}

/// Compare the two netlists' output sets pairwise by position. Leftover
/// outputs on either side are reported as unmatched, never as an error.
pub fn compare(first: &ElementTable, second: &ElementTable) -> Vec<Divergence> {
    let outputs1 = outputs_by_id(first);
    let outputs2 = outputs_by_id(second);
    let mut divergences = Vec::new();

    let paired = outputs1.len().min(outputs2.len());
    for (a, b) in outputs1.iter().zip(outputs2.iter()) {
        let identical =
            (a.prob_0 - b.prob_0).abs() < EPSILON && (a.prob_1 - b.prob_1).abs() < EPSILON;
        if !identical {
            divergences.push(Divergence::Mismatch {
                first: *a,
                second: *b,
            });
        }
    }
    for a in &outputs1[paired..] {
        divergences.push(Divergence::UnmatchedFirst(*a));
    }
    for b in &outputs2[paired..] {
        divergences.push(Divergence::UnmatchedSecond(*b));
    }
    divergences
}

const RULE: &str =
    "----------------------------------------------------------------------------------------------";

/// Human-readable divergence report.
pub fn render_report(divergences: &[Divergence]) -> String {
    if divergences.is_empty() {
        return "No divergences were found!".to_owned();
    }
    let mut out = String::new();
    for divergence in divergences {
        match divergence {
            Divergence::Mismatch { first, second } => {
                let _ = writeln!(
                    out,
                    "Divergent Output: Output {} from Netlist 1 (Prob 0: {}, Prob 1: {}) \
                     diverges from Output {} from Netlist 2 (Prob 0: {}, Prob 1: {}).",
                    first.id, first.prob_0, first.prob_1, second.id, second.prob_0, second.prob_1
                );
            }
            Divergence::UnmatchedFirst(output) => {
                let _ = writeln!(
                    out,
                    "Unmatched Output: Output {} from Netlist 1 (Prob 0: {}, Prob 1: {}) \
                     has no equivalent in Netlist 2.",
                    output.id, output.prob_0, output.prob_1
                );
            }
            Divergence::UnmatchedSecond(output) => {
                let _ = writeln!(
                    out,
                    "Unmatched Output: Output {} from Netlist 2 (Prob 0: {}, Prob 1: {}) \
                     has no equivalent in Netlist 1.",
                    output.id, output.prob_0, output.prob_1
                );
            }
        }
        let _ = writeln!(out, "{RULE}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::parse_elements;
    use crate::propagate::propagate;

    fn table_with_outputs(header_ids: &[u32]) -> ElementTable {
        let mut text = String::from("1 inpt 1 0\n");
        for id in header_ids {
            text.push_str(&format!("{id} out 0 1\n\t1 \n"));
        }
        let mut table = parse_elements(&text).unwrap();
        propagate(&mut table).unwrap();
        table
    }

    #[test]
    fn identical_probabilities_never_diverge() {
        let a = table_with_outputs(&[10, 11]);
        let b = table_with_outputs(&[10, 11]);
        assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn pairing_is_positional_not_by_id() {
        let a = table_with_outputs(&[10, 11]);
        let b = table_with_outputs(&[10, 12]);
        // same probabilities pairwise by position, differing ids
        assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn difference_of_exactly_epsilon_diverges() {
        let mut a = table_with_outputs(&[10]);
        let mut b = table_with_outputs(&[10]);
        // 2ε − ε is exact in binary floating point
        a.get_mut(&10).unwrap().prob_0 = EPSILON;
        b.get_mut(&10).unwrap().prob_0 = 2.0 * EPSILON;
        let divergences = compare(&a, &b);
        assert_eq!(divergences.len(), 1);
        assert!(matches!(divergences[0], Divergence::Mismatch { .. }));
    }

    #[test]
    fn sub_epsilon_difference_is_identical() {
        let a = table_with_outputs(&[10]);
        let mut b = table_with_outputs(&[10]);
        b.get_mut(&10).unwrap().prob_1 += EPSILON / 2.0;
        assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn length_mismatch_yields_unmatched_entries() {
        let a = table_with_outputs(&[10, 11, 12]);
        let b = table_with_outputs(&[10]);
        let divergences = compare(&a, &b);
        assert_eq!(divergences.len(), 2);
        assert!(divergences
            .iter()
            .all(|d| matches!(d, Divergence::UnmatchedFirst(_))));
        let report = render_report(&divergences);
        assert!(report.contains("has no equivalent in Netlist 2."));
    }

    #[test]
    fn empty_report_message() {
        assert_eq!(render_report(&[]), "No divergences were found!");
    }
}
