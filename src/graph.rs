//! Flat circuit graph: parsing of the canonical intermediate text, dual-rail
//! pruning, fan-in/fan-out edge construction and bench-format serialization.
//!
//! Nodes live in an arena addressed by `NodeId`; edges are index lists into
//! the arena, so no ownership cycles exist.

use crate::signal::{base_name, natural_cmp, parse_signal_name};
use crate::type_utils::new_id;
use anyhow::Result;
use fnv::FnvHashMap as HashMap;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Write;

new_id!(NodeId, NodeVec);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Input,
    Output,
    And,
    Or,
    Xor,
    Xnor,
    Nand,
    Nor,
    Not,
    Gate,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "inpt",
            NodeKind::Output => "out",
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::Xor => "xor",
            NodeKind::Xnor => "xnor",
            NodeKind::Nand => "nand",
            NodeKind::Nor => "nor",
            NodeKind::Not => "not",
            NodeKind::Gate => "gate",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Output)
    }
}

/// Map a primitive cell type name to its gate kind. Longer names are tested
/// first so e.g. `XNOR` is never mistaken for `NOR`.
pub fn primitive_kind(cell_type: &str) -> NodeKind {
    const KINDS: &[(&str, NodeKind)] = &[
        ("NAND", NodeKind::Nand),
        ("XNOR", NodeKind::Xnor),
        ("NOR", NodeKind::Nor),
        ("XOR", NodeKind::Xor),
        ("AND", NodeKind::And),
        ("OR", NodeKind::Or),
        ("NOT", NodeKind::Not),
    ];
    for (needle, kind) in KINDS {
        if cell_type.contains(needle) {
            return *kind;
        }
    }
    NodeKind::Gate
}

#[derive(Debug, Clone)]
pub struct CircuitNode {
    /// Canonical ID, assigned only after the full graph is built; 0 until then.
    pub id: u32,
    pub name: String,
    pub kind: NodeKind,
    pub fan_in: Vec<NodeId>,
    pub fan_out: Vec<NodeId>,
    raw_inputs: Vec<String>,
    raw_outputs: Vec<String>,
}

impl CircuitNode {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            id: 0,
            name,
            kind,
            fan_in: Vec::new(),
            fan_out: Vec::new(),
            raw_inputs: Vec::new(),
            raw_outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub nodes: NodeVec<CircuitNode>,
    by_name: BTreeMap<String, NodeId>,
}

/// Sections of the canonical intermediate text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    TopInputs,
    TopOutputs,
    SubHeader,
    SubInputs,
    SubOutputs,
    Gates,
}

/// Per-parse mutable state threaded through the builder instead of living in
/// globals: local-to-global signal substitutions of the block being read and
/// the accumulated signal-to-producer map.
#[derive(Debug, Default)]
struct BuildContext {
    signal_to_source: HashMap<String, NodeId>,
    local_to_global: HashMap<String, String>,
    submodule_outputs: HashMap<String, String>,
}

impl Circuit {
    fn ensure_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.nodes.push(CircuitNode::new(name.to_owned(), kind));
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Parse the canonical intermediate text and build the connected graph.
    pub fn from_intermediate(text: &str) -> Result<Self> {
        let mut circuit = Circuit::default();
        let mut ctx = BuildContext::default();
        let mut section = Section::None;
        let mut block = String::new();
        let mut in_block = false;

        for line in text.lines() {
            if line.starts_with("Instance: ") {
                section = Section::SubHeader;
                ctx.local_to_global.clear();
                ctx.submodule_outputs.clear();
                continue;
            }
            if line.starts_with("inputs:") {
                section = if matches!(section, Section::SubHeader | Section::SubOutputs) {
                    Section::SubInputs
                } else {
                    Section::TopInputs
                };
                continue;
            }
            if line.starts_with("outputs:") {
                section = if matches!(section, Section::SubHeader | Section::SubInputs) {
                    Section::SubOutputs
                } else {
                    Section::TopOutputs
                };
                continue;
            }
            if line.starts_with("// Resolved instance") {
                section = Section::Gates;
            }
            if matches!(section, Section::TopInputs | Section::TopOutputs) && line.is_empty() {
                section = Section::Gates;
                continue;
            }

            match section {
                Section::TopInputs => {
                    if let Some((name, _)) = split_binding(line) {
                        circuit.ensure_node(&base_name(name), NodeKind::Input);
                    }
                }
                Section::TopOutputs => {
                    if let Some((local, global)) = split_binding(line) {
                        let id = circuit.ensure_node(&base_name(local), NodeKind::Output);
                        circuit.nodes[id].raw_inputs.push(global.to_owned());
                    }
                }
                Section::SubInputs => {
                    if let Some((local, global)) = split_binding(line) {
                        ctx.local_to_global
                            .insert(local.to_owned(), global.to_owned());
                    }
                }
                Section::SubOutputs => {
                    if let Some((local, global)) = split_binding(line) {
                        ctx.submodule_outputs
                            .insert(local.to_owned(), global.to_owned());
                    }
                }
                Section::Gates => {
                    if !in_block && line.contains('(') && !line.trim().is_empty() {
                        in_block = true;
                        block.clear();
                        block.push_str(line);
                        block.push('\n');
                    } else if in_block {
                        block.push_str(line);
                        block.push('\n');
                        if line.contains(");") {
                            in_block = false;
                            circuit.absorb_instance(&block, &mut ctx);
                        }
                    }
                }
                Section::None | Section::SubHeader => {}
            }
        }

        circuit.prune_unpaired_rails();
        circuit.connect_edges(&ctx);
        circuit.assign_ids();
        Ok(circuit)
    }

    /// Create the gate node for one primitive instance block and classify
    /// each bound signal as an input or an output of the gate.
    fn absorb_instance(&mut self, block: &str, ctx: &mut BuildContext) {
        let first_line = block.lines().next().unwrap_or("");
        let mut words = first_line.split_whitespace();
        let Some(ty) = words.next() else { return };
        let name = words.next().unwrap_or("");
        let name = name.split('(').next().unwrap_or("").trim();
        if name.is_empty() {
            return;
        }
        let node_id = self.ensure_node(name, primitive_kind(ty));

        for (port, signal) in crate::grammar::port_map(block) {
            if matches!(port.as_str(), "comb" | "comb1" | "comb2") {
                continue;
            }
            if signal.is_empty() || signal.starts_with("dev") {
                continue;
            }
            if let Some(global) = ctx.submodule_outputs.get(&signal) {
                self.nodes[node_id].raw_outputs.push(global.clone());
                ctx.signal_to_source.insert(global.clone(), node_id);
                continue;
            }
            let resolved = ctx
                .local_to_global
                .get(&signal)
                .cloned()
                .unwrap_or(signal);
            if resolved.contains(name) && resolved.starts_with('\\') {
                ctx.signal_to_source.insert(resolved.clone(), node_id);
                self.nodes[node_id].raw_outputs.push(resolved);
            } else {
                let info = parse_signal_name(&resolved);
                if let Some(&source) = self.by_name.get(&info.base_name) {
                    if self.nodes[source].kind == NodeKind::Input {
                        ctx.signal_to_source.insert(resolved.clone(), source);
                    }
                }
                self.nodes[node_id].raw_inputs.push(resolved);
            }
        }
    }

    /// Drop orphan rail halves: a non-vector input signal survives only when
    /// both rails of its base name were observed on the same gate.
    fn prune_unpaired_rails(&mut self) {
        for node in self.nodes.iter_mut() {
            if node.kind.is_primary() {
                continue;
            }
            let mut presence: BTreeMap<String, u8> = BTreeMap::new();
            for signal in &node.raw_inputs {
                let info = parse_signal_name(signal);
                if !info.is_vector_bit {
                    *presence.entry(info.base_name).or_default() |=
                        if info.is_true_rail { 2 } else { 1 };
                }
            }
            node.raw_inputs.retain(|signal| {
                let info = parse_signal_name(signal);
                info.is_vector_bit || presence.get(&info.base_name) == Some(&3)
            });
        }
    }

    /// Insert fan-in/fan-out edges from the retained raw input signals,
    /// skipping duplicates and self-loops.
    fn connect_edges(&mut self, ctx: &BuildContext) {
        let ids: Vec<NodeId> = self.by_name.values().copied().collect();
        for node_id in ids {
            let raw_inputs = std::mem::take(&mut self.nodes[node_id].raw_inputs);
            for signal in &raw_inputs {
                let Some(&source) = ctx.signal_to_source.get(signal) else {
                    continue;
                };
                if source == node_id {
                    continue;
                }
                if !self.nodes[node_id].fan_in.contains(&source) {
                    self.nodes[node_id].fan_in.push(source);
                }
                if !self.nodes[source].fan_out.contains(&node_id) {
                    self.nodes[source].fan_out.push(node_id);
                }
            }
            self.nodes[node_id].raw_inputs = raw_inputs;
        }
    }

    /// Assign sequential IDs: primary inputs first, then gates, then primary
    /// outputs, each partition natural-sorted by node name.
    fn assign_ids(&mut self) {
        let partition = |kind_filter: fn(NodeKind) -> bool, nodes: &NodeVec<CircuitNode>| {
            let mut ids: Vec<NodeId> = nodes
                .indices()
                .filter(|id| kind_filter(nodes[*id].kind))
                .collect();
            ids.sort_by(|a, b| natural_cmp(&nodes[*a].name, &nodes[*b].name));
            ids
        };
        let inputs = partition(|k| k == NodeKind::Input, &self.nodes);
        let gates = partition(|k| !k.is_primary(), &self.nodes);
        let outputs = partition(|k| k == NodeKind::Output, &self.nodes);

        let mut next = 1u32;
        for id in inputs.iter().chain(gates.iter()).chain(outputs.iter()) {
            self.nodes[*id].id = next;
            next += 1;
        }
    }

    fn nodes_in_id_order(&self) -> Vec<NodeId> {
        self.nodes
            .indices()
            .sorted_by_key(|id| self.nodes[*id].id)
            .collect()
    }

    /// Serialize as the bench-style canonical netlist: one header line per
    /// node, and for gates and outputs a tab-indented line of ascending
    /// fan-in IDs.
    pub fn to_bench(&self) -> String {
        let mut out = String::new();
        for node_id in self.nodes_in_id_order() {
            let node = &self.nodes[node_id];
            let fan_out = if node.kind == NodeKind::Output {
                0
            } else {
                node.fan_out.len()
            };
            let _ = writeln!(
                out,
                "{} {} {} {} //{}",
                node.id,
                node.kind.as_str(),
                fan_out,
                node.fan_in.len(),
                node.name
            );
            if node.kind != NodeKind::Input {
                out.push('\t');
                for source in node.fan_in.iter().sorted_by_key(|id| self.nodes[**id].id) {
                    let _ = write!(out, "{} ", self.nodes[*source].id);
                }
                out.push('\n');
            }
        }
        out
    }

    pub fn node_by_name(&self, name: &str) -> Option<&CircuitNode> {
        self.by_name.get(name).map(|id| &self.nodes[*id])
    }
}

fn split_binding(line: &str) -> Option<(&str, &str)> {
    let mut words = line.split_whitespace();
    let name = words.next()?;
    let eq = words.next()?;
    let value = words.next()?;
    (eq == "=").then_some((name, value))
}
