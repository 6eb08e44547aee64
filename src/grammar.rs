//! Line-level recognition of the synthesizer's structural netlist output.
//!
//! This is not a Verilog parser: it recognizes the narrow set of anchors the
//! upstream synthesizer emits (module headers, instance blocks, port
//! bindings, I/O declarations and a handful of fixed marker comments) and
//! silently skips everything else.

use crate::errors::PipelineError;
use crate::signal::natural_cmp;
use anyhow::Result;
use fnv::FnvHashMap as HashMap;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

/// Annotation block that terminates top-level instance extraction.
pub const LOCATION_MARKER: &str = "// Location:";
/// End of the top-module header annotations.
pub const DESIGN_PORTS_MARKER: &str = "// Design Ports Information";
/// Primary-output buffer cell emitted by the synthesizer.
pub const OUTPUT_BUFFER_CELL: &str = "fiftyfivenm_io_obuf";

/// Tagged classification of one trimmed netlist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    ModuleStart(&'a str),
    ModuleEnd,
    IoDecl { output: bool, signals: &'a str },
    InstanceStart { ty: &'a str, name: &'a str },
    PortBinding { port: &'a str, signal: &'a str },
    Wire,
    Assign,
    Comment,
    Blank,
    Other,
}

fn module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"module\s+(\w+)").expect("regex compiles"))
}

fn io_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(input|output)\s+(.*?);").expect("regex compiles"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]+\]").expect("regex compiles"))
}

fn port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s*(\w+)\s*\(\s*([^)]*?)\s*\)").expect("regex compiles"))
}

fn obuf_o_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.o\s*\(\s*([^\s)]+)\s*\)").expect("regex compiles"))
}

fn obuf_i_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.i\s*\(\s*([^\s)]+)\s*\)").expect("regex compiles"))
}

/// Classify a single line. Anything failing every pattern is `Other` and is
/// skipped by all extractors.
pub fn classify(line: &str) -> Token<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Token::Blank;
    }
    if trimmed.starts_with("//") {
        return Token::Comment;
    }
    if trimmed.starts_with("endmodule") {
        return Token::ModuleEnd;
    }
    if trimmed.starts_with("module") {
        if let Some(caps) = module_re().captures(trimmed) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            return Token::ModuleStart(name);
        }
    }
    if trimmed.starts_with("assign") {
        return Token::Assign;
    }
    if trimmed.starts_with("wire") {
        return Token::Wire;
    }
    if let Some((output, signals)) = io_decl(trimmed) {
        return Token::IoDecl { output, signals };
    }
    if trimmed.starts_with('.') {
        if let Some(caps) = port_re().captures(trimmed) {
            let (port, signal) = (caps.get(1), caps.get(2));
            if let (Some(port), Some(signal)) = (port, signal) {
                return Token::PortBinding {
                    port: port.as_str(),
                    signal: signal.as_str(),
                };
            }
        }
        return Token::Other;
    }
    if trimmed.contains('(') {
        if let Some((ty, name)) = instance_header(trimmed) {
            return Token::InstanceStart { ty, name };
        }
    }
    Token::Other
}

fn io_decl(line: &str) -> Option<(bool, &str)> {
    let caps = io_decl_re().captures(line)?;
    let kind = caps.get(1)?;
    let signals = caps.get(2)?;
    Some((kind.as_str() == "output", signals.as_str()))
}

/// Split `<TYPE> <NAME> (` into its type and instance name.
fn instance_header(line: &str) -> Option<(&str, &str)> {
    let mut words = line.split_whitespace();
    let ty = words.next()?;
    let name = words.next().unwrap_or("");
    let name = name.split('(').next().unwrap_or("").trim();
    if ty.is_empty() {
        None
    } else {
        Some((ty, name))
    }
}

/// One instance statement as harvested from the text.
#[derive(Debug, Clone)]
pub struct InstanceText {
    pub name: String,
    pub ty: String,
    pub text: String,
}

/// The top module's identity and declared I/O sets.
#[derive(Debug, Clone)]
pub struct TopHeader {
    pub module_name: String,
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
}

/// Whole netlist file held in memory; every extractor scans this one buffer
/// instead of reopening the file.
#[derive(Debug, Clone)]
pub struct NetlistSource {
    text: String,
}

impl NetlistSource {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { text })
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The `module <name>` ... `endmodule` block, or `None` when the module
    /// is not defined in this file.
    pub fn module_content(&self, module_name: &str) -> Option<String> {
        let mut content = String::new();
        let mut in_module = false;
        for line in self.text.lines() {
            if !in_module {
                if let Token::ModuleStart(name) = classify(line) {
                    if name == module_name {
                        in_module = true;
                        content.push_str(line);
                        content.push('\n');
                    }
                }
            } else {
                content.push_str(line);
                content.push('\n');
                if matches!(classify(line), Token::ModuleEnd) {
                    break;
                }
            }
        }
        if in_module {
            Some(content)
        } else {
            None
        }
    }

    /// Extract the top module's name and I/O declarations. The scan requires
    /// the `` `timescale `` preamble, then the first module header; I/O
    /// declarations are read (with vector ranges stripped) until the design
    /// ports annotation block.
    pub fn top_header(&self) -> Result<TopHeader> {
        let mut found_timescale = false;
        let mut module_name = None;
        let mut header_ended = false;
        let mut inputs = BTreeSet::new();
        let mut outputs = BTreeSet::new();

        for line in self.text.lines() {
            if !found_timescale {
                if line.contains("`timescale") {
                    found_timescale = true;
                }
                continue;
            }
            if module_name.is_none() {
                if let Token::ModuleStart(name) = classify(line) {
                    module_name = Some(name.to_owned());
                }
            }
            if module_name.is_some() && line.contains(");") {
                header_ended = true;
            }
            if header_ended {
                if let Some((output, signals)) = io_decl(line) {
                    let signals = range_re().replace_all(signals, "");
                    for signal in signals.split(',') {
                        let signal: String = signal.split_whitespace().collect();
                        if signal.is_empty() {
                            continue;
                        }
                        if output {
                            outputs.insert(signal);
                        } else {
                            inputs.insert(signal);
                        }
                    }
                }
                if line.contains(DESIGN_PORTS_MARKER) {
                    break;
                }
            }
        }

        match module_name {
            Some(module_name) if found_timescale => Ok(TopHeader {
                module_name,
                inputs,
                outputs,
            }),
            _ => Err(PipelineError::Grammar(
                "no `timescale marker or module header found".to_owned(),
            )
            .into()),
        }
    }

    /// Harvest output-name -> driving-signal pairs from the primary-output
    /// buffer instances.
    pub fn output_connections(&self) -> HashMap<String, String> {
        let mut connections = HashMap::default();
        let mut block = String::new();
        let mut in_block = false;
        for line in self.text.lines() {
            if line.contains(OUTPUT_BUFFER_CELL) {
                in_block = true;
                block.clear();
            }
            if in_block {
                block.push_str(line);
                block.push('\n');
                if line.contains(");") {
                    in_block = false;
                    let output = obuf_o_re().captures(&block).map(|c| c[1].to_owned());
                    let input = obuf_i_re().captures(&block).map(|c| c[1].to_owned());
                    if let (Some(output), Some(input)) = (output, input) {
                        connections.insert(output, input);
                    }
                }
            }
        }
        connections
    }

    /// Extract the top-level instance statements, natural-sorted by instance
    /// name. The scan arms only after the last `wire` declaration followed by
    /// two blank lines, and stops at the location annotation block.
    pub fn top_level_instances(&self) -> Vec<InstanceText> {
        let mut instances = Vec::new();
        let mut found_last_wire = false;
        let mut blank_lines = 0;
        let mut extracting = false;
        let mut ty = String::new();
        let mut name = String::new();
        let mut content = String::new();

        for line in self.text.lines() {
            if line.contains(LOCATION_MARKER) {
                break;
            }
            if !extracting {
                if found_last_wire {
                    if line.trim().is_empty() {
                        blank_lines += 1;
                        if blank_lines >= 2 {
                            extracting = true;
                        }
                    } else {
                        blank_lines = 0;
                    }
                } else if line.contains("wire ") {
                    found_last_wire = true;
                    blank_lines = 0;
                }
                continue;
            }
            if line.contains('(') && ty.is_empty() {
                if let Some((t, n)) = instance_header(line.trim()) {
                    ty = t.to_owned();
                    name = n.to_owned();
                }
            }
            if !line.trim().is_empty() {
                content.push_str(line);
                content.push('\n');
            }
            if line.contains(");") {
                if !name.is_empty() && !ty.is_empty() {
                    instances.push(InstanceText {
                        name: std::mem::take(&mut name),
                        ty: std::mem::take(&mut ty),
                        text: std::mem::take(&mut content),
                    });
                } else {
                    ty.clear();
                    name.clear();
                    content.clear();
                }
            }
        }
        instances.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        instances
    }
}

/// Extract the instance statements inside one module body, in text order.
/// Declarative lines (wires, assigns, comments, the module envelope) are
/// skipped.
pub fn inner_instances(module_content: &str) -> Vec<InstanceText> {
    let mut instances = Vec::new();
    let mut inside = false;
    let mut ty = String::new();
    let mut name = String::new();
    let mut text = String::new();

    for line in module_content.lines() {
        let token = classify(line);
        if matches!(
            token,
            Token::Blank
                | Token::Comment
                | Token::ModuleStart(_)
                | Token::ModuleEnd
                | Token::Assign
                | Token::Wire
        ) {
            continue;
        }
        if !inside {
            if let Token::InstanceStart { ty: t, name: n } = token {
                inside = true;
                ty = t.to_owned();
                name = n.to_owned();
            }
        }
        if inside {
            text.push_str(line);
            text.push('\n');
            if line.contains(");") {
                if !name.is_empty() && !ty.is_empty() {
                    instances.push(InstanceText {
                        name: std::mem::take(&mut name),
                        ty: std::mem::take(&mut ty),
                        text: std::mem::take(&mut text),
                    });
                } else {
                    ty.clear();
                    name.clear();
                    text.clear();
                }
                inside = false;
            }
        }
    }
    instances
}

/// All `.port(signal)` bindings of one instance statement, in text order.
pub fn port_map(instance_text: &str) -> IndexMap<String, String> {
    port_re()
        .captures_iter(instance_text)
        .map(|caps| (caps[1].to_owned(), caps[2].to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = r#"`timescale 1 ps/ 1 ps

module top (
	A_t,
	A_f,
	O);
input 	A_t;
input 	A_f;
output 	O;

// Design Ports Information

wire \A_t~input_o ;
wire \A_f~input_o ;


THDR_AND2 g0 (
	.A1(\A_t~input_o ),
	.A2(\A_f~input_o ),
	.O1(\g0|G0|out~0_combout ));

fiftyfivenm_io_obuf \O~output (
	.i(\g0|G0|out~0_combout ),
	.o(O));

// Location: IOOBUF_X0_Y0
module leaf (P);
input P;
endmodule
"#;

    #[test]
    fn classify_anchors() {
        assert_eq!(classify("module top ("), Token::ModuleStart("top"));
        assert_eq!(classify("endmodule"), Token::ModuleEnd);
        assert_eq!(classify(""), Token::Blank);
        assert_eq!(classify("// comment"), Token::Comment);
        assert_eq!(classify("wire x;"), Token::Wire);
        assert_eq!(classify("assign y = x;"), Token::Assign);
        assert_eq!(
            classify("input 	A_t;"),
            Token::IoDecl {
                output: false,
                signals: "A_t"
            }
        );
        assert_eq!(
            classify("THDR_AND2 g0 ("),
            Token::InstanceStart {
                ty: "THDR_AND2",
                name: "g0"
            }
        );
        assert_eq!(
            classify("	.A1(\\A_t~input_o ),"),
            Token::PortBinding {
                port: "A1",
                signal: "\\A_t~input_o"
            }
        );
    }

    #[test]
    fn top_header_extraction() {
        let src = NetlistSource::from_text(TOY);
        let header = src.top_header().unwrap();
        assert_eq!(header.module_name, "top");
        assert_eq!(
            header.inputs.iter().cloned().collect::<Vec<_>>(),
            vec!["A_f", "A_t"]
        );
        assert_eq!(
            header.outputs.iter().cloned().collect::<Vec<_>>(),
            vec!["O"]
        );
    }

    #[test]
    fn top_header_requires_timescale() {
        let src = NetlistSource::from_text("module top ();\nendmodule\n");
        let err = src.top_header().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Grammar(_))
        ));
    }

    #[test]
    fn output_buffer_harvest() {
        let src = NetlistSource::from_text(TOY);
        let conns = src.output_connections();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns["O"], r"\g0|G0|out~0_combout");
    }

    #[test]
    fn top_level_instance_scan_arms_after_wires() {
        let src = NetlistSource::from_text(TOY);
        let instances = src.top_level_instances();
        // obuf sorts before the gate by name; the module after the location
        // marker is never reached
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().any(|i| i.ty == "THDR_AND2"));
        assert!(instances.iter().any(|i| i.ty == OUTPUT_BUFFER_CELL));
    }

    #[test]
    fn module_content_is_exact_match() {
        let src = NetlistSource::from_text(TOY);
        assert!(src.module_content("leaf").is_some());
        assert!(src.module_content("lea").is_none());
        assert!(src.module_content("missing").is_none());
    }

    #[test]
    fn port_map_keeps_text_order() {
        let map = port_map("THDR_AND2 g0 (\n\t.B1(x),\n\t.A1(y));\n");
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["B1", "A1"]);
        assert_eq!(map["B1"], "x");
    }

    #[test]
    fn multi_line_inner_instances() {
        let body = "module m (a);\nwire w;\nTHDR_OR2 o7 (\n\t.A1(a),\n\t.O1(w));\nendmodule\n";
        let instances = inner_instances(body);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "o7");
        assert_eq!(instances[0].ty, "THDR_OR2");
        assert!(instances[0].text.contains(".A1(a)"));
    }
}
