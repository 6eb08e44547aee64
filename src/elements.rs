//! Stage-2 element table: the canonical netlist reloaded as probability
//! nodes, plus the closed-form 0/1 probability rules per gate kind.

use crate::errors::PipelineError;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel distinguishing "not yet computed" from a valid probability.
pub const UNRESOLVED: f64 = -1.0;

/// Fixed prior for primary inputs: assumed external activity per logic
/// level, deliberately not summing to 1.
pub const INPUT_PRIOR: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Input,
    Output,
    And,
    Or,
    Xor,
    Xnor,
    Nand,
    Nor,
    Not,
    Mux,
    SumSub,
    Gate,
}

impl FromStr for ElementKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "inpt" => Self::Input,
            "out" => Self::Output,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "xnor" => Self::Xnor,
            "nand" => Self::Nand,
            "nor" => Self::Nor,
            "not" => Self::Not,
            "mux" => Self::Mux,
            "sum_sub" => Self::SumSub,
            "gate" => Self::Gate,
            _ => anyhow::bail!("'{}' is not a netlist element kind.", s),
        })
    }
}

/// Reference to another element. A `.2` fractional suffix on the textual id
/// taps the carry-out of a `sum_sub` producer instead of its main output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnRef {
    pub target: u32,
    pub carry_tap: bool,
}

impl ConnRef {
    pub fn plain(target: u32) -> Self {
        Self {
            target,
            carry_tap: false,
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.split_once('.') {
            Some((int, frac)) => Some(Self {
                target: int.parse().ok()?,
                carry_tap: frac.starts_with('2'),
            }),
            None => Some(Self {
                target: token.parse().ok()?,
                carry_tap: false,
            }),
        }
    }
}

impl fmt::Display for ConnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.carry_tap {
            write!(f, "{}.2", self.target)
        } else {
            write!(f, "{}", self.target)
        }
    }
}

/// Pair of point estimates for observing logic level 0 / 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probs {
    pub p0: f64,
    pub p1: f64,
}

impl Probs {
    pub const fn new(p0: f64, p1: f64) -> Self {
        Self { p0, p1 }
    }
}

pub fn p_not(a: Probs) -> Probs {
    Probs::new(a.p1, a.p0)
}

pub fn p_and(a: Probs, b: Probs) -> Probs {
    Probs::new(a.p0 + b.p0 - a.p0 * b.p0, a.p1 * b.p1)
}

pub fn p_or(a: Probs, b: Probs) -> Probs {
    Probs::new(a.p0 * b.p0, a.p1 + b.p1 - a.p1 * b.p1)
}

pub fn p_xor(a: Probs, b: Probs) -> Probs {
    Probs::new(a.p0 * b.p0 + a.p1 * b.p1, a.p0 * b.p1 + a.p1 * b.p0)
}

/// `(a AND c) OR (b AND NOT c)` composed from the basic rules.
pub fn p_mux(a: Probs, b: Probs, c: Probs) -> Probs {
    p_or(p_and(a, c), p_and(b, p_not(c)))
}

/// Full-adder parity sum over the four minterms, independent of the opcode.
pub fn p_sum(a: Probs, b: Probs, cin: Probs) -> Probs {
    let t1 = p_and(p_and(a, p_not(b)), cin);
    let t2 = p_and(p_and(a, b), cin);
    let t3 = p_and(p_and(p_not(a), p_not(b)), cin);
    let t4 = p_and(p_and(p_not(a), b), cin);
    p_or(p_or(t1, t2), p_or(t3, t4))
}

/// Carry-out of the adder/subtractor; the opcode selects whether operand A
/// enters true or complemented.
pub fn p_carry(a: Probs, b: Probs, cin: Probs, op: Probs) -> Probs {
    let b_cin = p_and(b, cin);
    let t2 = p_and(p_and(p_not(op), a), cin);
    let t3 = p_and(p_and(op, p_not(a)), cin);
    let low = p_or(p_or(b_cin, t2), t3);
    let t4 = p_and(p_and(op, p_not(a)), b);
    let t5 = p_and(p_and(p_not(op), a), b);
    p_or(low, p_or(t4, t5))
}

#[derive(Debug, Clone)]
pub struct Element {
    pub id: u32,
    pub kind: ElementKind,
    pub connections: Vec<ConnRef>,
    pub selectors: Vec<ConnRef>,
    pub prob_0: f64,
    pub prob_1: f64,
    pub carry_out_prob_0: f64,
    pub carry_out_prob_1: f64,
}

impl Element {
    fn new(id: u32, kind: ElementKind) -> Self {
        let (prob_0, prob_1) = match kind {
            ElementKind::Input => (INPUT_PRIOR, INPUT_PRIOR),
            // unknown gates resolve to the neutral estimate right away
            ElementKind::Gate => (1.0, 1.0),
            _ => (UNRESOLVED, UNRESOLVED),
        };
        Self {
            id,
            kind,
            connections: Vec::new(),
            selectors: Vec::new(),
            prob_0,
            prob_1,
            carry_out_prob_0: UNRESOLVED,
            carry_out_prob_1: UNRESOLVED,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.prob_0 != UNRESOLVED && self.prob_1 != UNRESOLVED
    }

    pub fn probs(&self) -> Probs {
        Probs::new(self.prob_0, self.prob_1)
    }

    pub fn carry_probs(&self) -> Probs {
        Probs::new(self.carry_out_prob_0, self.carry_out_prob_1)
    }
}

pub type ElementTable = BTreeMap<u32, Element>;

fn parse_refs(line: &str, into: &mut Vec<ConnRef>) {
    // tokens failing the number grammar are skipped
    into.extend(line.split_whitespace().filter_map(ConnRef::parse));
}

/// Parse the canonical netlist text into the element table.
///
/// Every element starts with `<id> <type> <num_outputs> <num_inputs>`;
/// payload lines depend on the type: none for `inpt`, one connections line
/// plus one selectors line for `mux`, one inputs line plus one carry-in line
/// plus one opcode line for `sum_sub`, and otherwise one line per remaining
/// declared input (`out` counts from 0, gates from 1, line one being the
/// declaration itself), though any gate declaring inputs reads at least one
/// payload line so a single-input gate keeps its fan-in. Lines failing the
/// header grammar are skipped.
pub fn parse_elements(text: &str) -> Result<ElementTable> {
    let mut table = ElementTable::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let header = (|| {
            let id: u32 = words.next()?.parse().ok()?;
            let kind: ElementKind = words.next()?.parse().ok()?;
            let _num_outputs: u32 = words.next()?.parse().ok()?;
            let num_inputs: u32 = words.next()?.parse().ok()?;
            Some((id, kind, num_inputs))
        })();
        let Some((id, kind, num_inputs)) = header else {
            continue;
        };
        let mut elem = Element::new(id, kind);
        match kind {
            ElementKind::Input => {}
            ElementKind::Mux => {
                if let Some(line) = lines.next() {
                    parse_refs(line, &mut elem.connections);
                }
                if let Some(line) = lines.next() {
                    parse_refs(line, &mut elem.selectors);
                }
            }
            ElementKind::SumSub => {
                // operand inputs, then carry-in, then the opcode selector
                if let Some(line) = lines.next() {
                    parse_refs(line, &mut elem.connections);
                }
                if let Some(line) = lines.next() {
                    parse_refs(line, &mut elem.connections);
                }
                if let Some(line) = lines.next() {
                    parse_refs(line, &mut elem.selectors);
                }
            }
            _ => {
                let start = if kind == ElementKind::Output { 0 } else { 1 };
                let mut remaining = num_inputs
                    .saturating_sub(start)
                    .max(u32::from(num_inputs > 0));
                while remaining > 0 {
                    let Some(line) = lines.next() else { break };
                    parse_refs(line, &mut elem.connections);
                    remaining -= 1;
                    if elem.connections.len() as u32 >= num_inputs {
                        break;
                    }
                }
            }
        }
        table.insert(id, elem);
    }
    if table.is_empty() {
        return Err(PipelineError::Grammar("empty element table".to_owned()).into());
    }
    Ok(table)
}
