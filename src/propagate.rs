//! Fixed-point, dependency-ordered probability propagation.
//!
//! Each pass attempts every still-unresolved element and defers those whose
//! referenced elements have not resolved yet. A pass that resolves nothing
//! while elements remain signals a combinational cycle, which this analysis
//! does not support.

use crate::elements::{
    p_and, p_carry, p_mux, p_not, p_or, p_sum, p_xor, Element, ElementKind, ElementTable, Probs,
    UNRESOLVED,
};
use crate::errors::PipelineError;
use anyhow::{bail, Result};

/// Compute the probabilities of one element from its already-resolved
/// operands. Returns `(output, carry_out)`.
fn evaluate(table: &ElementTable, elem: &Element) -> Result<(Probs, Option<Probs>)> {
    let lookup = |conn: &crate::elements::ConnRef| -> Result<&Element> {
        let Some(target) = table.get(&conn.target) else {
            bail!(PipelineError::Grammar(format!(
                "element {} references unknown element {}",
                elem.id, conn.target
            )));
        };
        Ok(target)
    };
    let conn = |i: usize| -> Result<Probs> {
        let Some(conn) = elem.connections.get(i) else {
            bail!(PipelineError::Grammar(format!(
                "element {} is missing operand {}",
                elem.id, i
            )));
        };
        Ok(lookup(conn)?.probs())
    };
    let sel = |i: usize| -> Result<Probs> {
        let Some(conn) = elem.selectors.get(i) else {
            bail!(PipelineError::Grammar(format!(
                "element {} is missing selector {}",
                elem.id, i
            )));
        };
        Ok(lookup(conn)?.probs())
    };
    match elem.kind {
        ElementKind::Not => Ok((p_not(conn(0)?), None)),
        ElementKind::And => Ok((p_and(conn(0)?, conn(1)?), None)),
        ElementKind::Or => Ok((p_or(conn(0)?, conn(1)?), None)),
        ElementKind::Nand => Ok((p_not(p_and(conn(0)?, conn(1)?)), None)),
        ElementKind::Nor => Ok((p_not(p_or(conn(0)?, conn(1)?)), None)),
        ElementKind::Xor => Ok((p_xor(conn(0)?, conn(1)?), None)),
        ElementKind::Xnor => Ok((p_not(p_xor(conn(0)?, conn(1)?)), None)),
        ElementKind::Mux => Ok((p_mux(conn(0)?, conn(1)?, sel(0)?), None)),
        ElementKind::SumSub => {
            let (a, b, cin) = (conn(0)?, conn(1)?, conn(2)?);
            let op = sel(0)?;
            Ok((p_sum(a, b, cin), Some(p_carry(a, b, cin, op))))
        }
        ElementKind::Output => {
            let Some(conn) = elem.connections.first() else {
                bail!(PipelineError::Grammar(format!(
                    "output {} has no source connection",
                    elem.id
                )));
            };
            let source = lookup(conn)?;
            // an output fed by a sum_sub carry tap copies the carry estimate
            let probs = if source.kind == ElementKind::SumSub && conn.carry_tap {
                source.carry_probs()
            } else {
                source.probs()
            };
            Ok((probs, None))
        }
        ElementKind::Input | ElementKind::Gate => Ok((elem.probs(), None)),
    }
}

/// True when every element this one references has a non-sentinel estimate.
fn dependencies_ready(table: &ElementTable, elem: &Element) -> bool {
    elem.connections
        .iter()
        .chain(elem.selectors.iter())
        .all(|conn| {
            table
                .get(&conn.target)
                .map(|t| t.is_resolved())
                .unwrap_or(true)
        })
}

/// Resolve every element's probabilities in dependency order.
///
/// Terminates in at most as many passes as the longest dependency chain; a
/// cyclic table fails with [`PipelineError::CyclicDependency`].
pub fn propagate(table: &mut ElementTable) -> Result<()> {
    let mut unresolved: Vec<u32> = table
        .values()
        .filter(|e| !e.connections.is_empty() && !e.is_resolved())
        .map(|e| e.id)
        .collect();

    while !unresolved.is_empty() {
        let mut deferred = Vec::new();
        let mut resolved_this_pass = 0usize;
        for id in unresolved {
            let elem = &table[&id];
            if !dependencies_ready(table, elem) {
                deferred.push(id);
                continue;
            }
            let (probs, carry) = evaluate(table, elem)?;
            let elem = table.get_mut(&id).expect("element exists");
            elem.prob_0 = probs.p0;
            elem.prob_1 = probs.p1;
            if let Some(carry) = carry {
                elem.carry_out_prob_0 = carry.p0;
                elem.carry_out_prob_1 = carry.p1;
            }
            resolved_this_pass += 1;
        }
        if resolved_this_pass == 0 && !deferred.is_empty() {
            debug!(
                "propagation stalled with {} unresolved elements",
                deferred.len()
            );
            bail!(PipelineError::CyclicDependency);
        }
        unresolved = deferred;
    }
    Ok(())
}
