//! Recursive hierarchy flattening down to primitive dual-rail cells, and the
//! canonical intermediate (format A) rendering consumed by the graph builder.

use crate::grammar::{inner_instances, port_map, NetlistSource};
use crate::signal::{natural_cmp, vector_name_cmp};
use anyhow::Result;
use fnv::FnvHashMap as HashMap;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Type prefixes that terminate flattening.
const BASE_CELL_PREFIXES: &[&str] = &[
    "THDR_AND",
    "THDR_OR",
    "THDR_XOR",
    "THDR_XNOR",
    "THDR_NAND",
    "THDR_NOT",
    "THDR_NOR",
];

pub fn is_base_cell(instance_type: &str) -> bool {
    BASE_CELL_PREFIXES
        .iter()
        .any(|prefix| instance_type.starts_with(prefix))
}

/// A primitive instance surviving flattening: its cell type and the rewritten
/// instantiation text with globally resolved signals.
#[derive(Debug, Clone)]
pub struct FlatInstance {
    pub ty: String,
    pub text: String,
}

/// Recursively expand `module_type` under `prefix` (always `|`-terminated),
/// substituting parent port bindings. A module without a definition in the
/// source yields no instances, with a warning.
fn flatten_into(
    src: &NetlistSource,
    module_type: &str,
    prefix: &str,
    parent_bindings: &HashMap<String, String>,
    out: &mut Vec<FlatInstance>,
) {
    let Some(content) = src.module_content(module_type) else {
        warn!("No definition found for module {module_type}; skipping its subtree");
        return;
    };
    let mut instances = inner_instances(&content);
    instances.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    for instance in instances {
        let global_name = format!("{prefix}{}", instance.name);
        let local_ports = port_map(&instance.text);
        let mut bindings = HashMap::default();
        for (port, wire) in &local_ports {
            let resolved = match parent_bindings.get(wire) {
                Some(parent_signal) => parent_signal.clone(),
                None => {
                    // new internal wire: qualify with the hierarchy prefix
                    let wire = wire.strip_prefix('\\').unwrap_or(wire);
                    format!("\\{prefix}{wire}")
                }
            };
            bindings.insert(port.clone(), resolved);
        }
        if is_base_cell(&instance.ty) {
            out.push(render_primitive(&instance.ty, &global_name, &bindings));
        } else {
            flatten_into(src, &instance.ty, &format!("{global_name}|"), &bindings, out);
        }
    }
}

/// Emit a primitive instance with ports in canonical (sorted) order so the
/// intermediate text is reproducible.
fn render_primitive(ty: &str, global_name: &str, bindings: &HashMap<String, String>) -> FlatInstance {
    let sorted: BTreeMap<&String, &String> = bindings.iter().collect();
    let mut text = format!("{ty} {global_name} (\n");
    let last = sorted.len().saturating_sub(1);
    for (i, (port, signal)) in sorted.iter().enumerate() {
        let sep = if i == last { "" } else { "," };
        let _ = writeln!(text, "\t.{port}({signal}){sep}");
    }
    text.push_str(");");
    FlatInstance {
        ty: ty.to_owned(),
        text,
    }
}

/// Flatten the whole design and render the canonical intermediate text:
/// top-module header, sorted `inputs:`/`outputs:` sections, then one
/// `// Resolved instance of <TYPE>` block per primitive.
pub fn flatten_netlist(src: &NetlistSource) -> Result<String> {
    let header = src.top_header()?;
    let output_connections = src.output_connections();

    let mut flattened = Vec::new();
    for instance in src.top_level_instances() {
        if is_base_cell(&instance.ty) {
            flattened.push(FlatInstance {
                ty: instance.ty,
                text: instance.text,
            });
        } else {
            let bindings = port_map(&instance.text)
                .into_iter()
                .collect::<HashMap<_, _>>();
            flatten_into(
                src,
                &instance.ty,
                &format!("{}|", instance.name),
                &bindings,
                &mut flattened,
            );
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Top module: {}", header.module_name);
    out.push_str("inputs:\n");
    for input in &header.inputs {
        let _ = writeln!(out, "{input} = {input}");
    }
    out.push_str("\noutputs:\n");
    let sorted_outputs = output_connections
        .iter()
        .sorted_by(|a, b| vector_name_cmp(a.0, b.0));
    for (output, signal) in sorted_outputs {
        let _ = writeln!(out, "{output} = {signal}");
    }
    out.push('\n');
    for instance in &flattened {
        let _ = writeln!(out, "// Resolved instance of {}", instance.ty);
        let _ = writeln!(out, "{}", instance.text.trim_end());
    }
    Ok(out)
}
