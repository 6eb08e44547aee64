//! Enumeration of every source-to-output path and its report rendering.
//!
//! The traversal is a plain depth-first walk back through the connection
//! lists, exponential in the worst case for heavily shared fan-in; that is
//! accepted for the circuit sizes this tool targets.

use crate::elements::{ConnRef, ElementKind, ElementTable};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Every path from `start` back to the primary inputs, as the sequence of
/// connection references visited. A path ends at a primary input; branches
/// that never reach one contribute nothing.
pub fn trace_paths(table: &ElementTable, start: u32) -> Vec<Vec<ConnRef>> {
    let mut all_paths = Vec::new();
    let mut path = Vec::new();
    trace(table, ConnRef::plain(start), &mut path, &mut all_paths);
    all_paths
}

fn trace(table: &ElementTable, current: ConnRef, path: &mut Vec<ConnRef>, all: &mut Vec<Vec<ConnRef>>) {
    let Some(elem) = table.get(&current.target) else {
        return;
    };
    path.push(current);
    if elem.kind == ElementKind::Input {
        all.push(path.clone());
    } else {
        for conn in &elem.connections {
            trace(table, *conn, path, all);
        }
    }
    path.pop();
}

/// Paths for every primary output, keyed by output id.
pub fn find_paths_for_outputs(table: &ElementTable) -> BTreeMap<u32, Vec<Vec<ConnRef>>> {
    table
        .values()
        .filter(|elem| elem.kind == ElementKind::Output)
        .map(|elem| (elem.id, trace_paths(table, elem.id)))
        .collect()
}

/// Render the per-output path listing: each step shows the element's 0/1
/// estimates, carry-tap steps show the carry estimates and a `.2` id.
pub fn render_output_paths(
    table: &ElementTable,
    output_paths: &BTreeMap<u32, Vec<Vec<ConnRef>>>,
) -> String {
    let mut out = String::new();
    for (output_id, paths) in output_paths {
        let _ = writeln!(out, "Output {output_id}:");
        for (i, path) in paths.iter().enumerate() {
            let _ = write!(out, "  Logical Path {}: ", i + 1);
            for (j, step) in path.iter().enumerate() {
                if j > 0 {
                    out.push_str(" <- ");
                }
                let Some(elem) = table.get(&step.target) else {
                    continue;
                };
                let probs = if step.carry_tap {
                    elem.carry_probs()
                } else {
                    elem.probs()
                };
                let _ = write!(out, "{} (0: {}; 1: {})", step, probs.p0, probs.p1);
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::parse_elements;
    use crate::propagate::propagate;

    fn and_table() -> ElementTable {
        let mut table = parse_elements(
            "1 inpt 1 0\n\
             2 inpt 1 0\n\
             3 and 1 2\n\
             \t1 2 \n\
             4 out 0 1\n\
             \t3 \n",
        )
        .unwrap();
        propagate(&mut table).unwrap();
        table
    }

    #[test]
    fn enumerates_all_source_paths() {
        let table = and_table();
        let paths = trace_paths(&table, 4);
        assert_eq!(paths.len(), 2);
        let ids: Vec<Vec<u32>> = paths
            .iter()
            .map(|p| p.iter().map(|c| c.target).collect())
            .collect();
        assert_eq!(ids, vec![vec![4, 3, 1], vec![4, 3, 2]]);
    }

    #[test]
    fn outputs_only_in_path_map() {
        let table = and_table();
        let by_output = find_paths_for_outputs(&table);
        assert_eq!(by_output.keys().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn rendering_chains_steps() {
        let table = and_table();
        let by_output = find_paths_for_outputs(&table);
        let text = render_output_paths(&table, &by_output);
        assert!(text.starts_with("Output 4:\n"));
        assert!(text.contains("  Logical Path 1: 4 (0: 0.4375; 1: 0.0625) <- 3 (0: 0.4375; 1: 0.0625) <- 1 (0: 0.25; 1: 0.25)\n"));
        assert!(text.contains("  Logical Path 2: "));
    }

    #[test]
    fn carry_tap_step_renders_dot_two() {
        let mut table = parse_elements(
            "1 inpt 1 0\n\
             2 inpt 1 0\n\
             3 inpt 1 0\n\
             4 inpt 1 0\n\
             5 sum_sub 2 4\n\
             \t1 2 \n\
             \t3 \n\
             \t4 \n\
             6 out 0 1\n\
             \t5.2 \n",
        )
        .unwrap();
        propagate(&mut table).unwrap();
        let by_output = find_paths_for_outputs(&table);
        let text = render_output_paths(&table, &by_output);
        assert!(text.contains("5.2 (0: "));
    }
}
