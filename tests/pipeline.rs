//! End-to-end run over a small synthesized netlist pair: flatten both,
//! propagate probabilities, compare outputs and write every artifact.

use approx::assert_relative_eq;
use railcheck::divergence::{self, Divergence};
use railcheck::paths::render_output_paths;
use railcheck::report::ReportDirs;
use railcheck::{analyze_netlist, flatten_netlist_file, NetlistAnalysis};
use std::fs;
use std::path::Path;

const CLEAN_VO: &str = r#"`timescale 1 ps/ 1 ps

module top (
	A_t,
	A_f,
	B_t,
	B_f,
	O);
input 	A_t;
input 	A_f;
input 	B_t;
input 	B_f;
output 	O;

// Design Ports Information

wire \A_t~input_o ;
wire \B_t~input_o ;


pair u1 (
	.A1(\A_t~input_o ),
	.A2(\A_f~input_o ),
	.B1(\B_t~input_o ),
	.B2(\B_f~input_o ),
	.O1(\u1|g0|G0|out~0_combout ));

fiftyfivenm_io_obuf \O~output (
	.i(\u1|g0|G0|out~0_combout ),
	.o(O));

// Location: IOOBUF_X0_Y0
module pair (A1, A2, B1, B2, O1);
input A1, A2, B1, B2;
output O1;

THDR_AND2 g0 (
	.A1(A1),
	.A2(A2),
	.B1(B1),
	.B2(B2),
	.O1(O1));
endmodule
"#;

const INVERTER_VO: &str = r#"`timescale 1 ps/ 1 ps

module top (
	A_t,
	A_f,
	O);
input 	A_t;
input 	A_f;
output 	O;

// Design Ports Information

wire \A_t~input_o ;


inv u1 (
	.A1(\A_t~input_o ),
	.A2(\A_f~input_o ),
	.O1(\u1|n0|G0|out~0_combout ));

fiftyfivenm_io_obuf \O~output (
	.i(\u1|n0|G0|out~0_combout ),
	.o(O));

// Location: IOOBUF_X0_Y0
module inv (A1, A2, O1);
input A1, A2;
output O1;

THDR_NOT2 n0 (
	.A1(A1),
	.A2(A2),
	.O1(O1));
endmodule
"#;

fn write_netlist(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_owned()
}

fn analyze(dir: &Path, name: &str, contents: &str) -> NetlistAnalysis {
    let path = write_netlist(dir, name, contents);
    let flat = flatten_netlist_file(&path).unwrap();
    analyze_netlist(&flat.bench).unwrap()
}

#[test]
fn flattens_to_canonical_bench() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_netlist(dir.path(), "clean.vo", CLEAN_VO);
    let flat = flatten_netlist_file(&path).unwrap();

    assert!(flat.intermediate.starts_with("Top module: top\n"));
    assert!(flat.intermediate.contains("// Resolved instance of THDR_AND2"));
    let expected = "1 inpt 1 0 //A\n\
2 inpt 1 0 //B\n\
3 and 1 2 //u1|g0\n\
\t1 2 \n\
4 out 0 1 //O\n\
\t3 \n";
    assert_eq!(flat.bench, expected);
}

#[test]
fn propagation_reaches_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let analysis = analyze(dir.path(), "clean.vo", CLEAN_VO);

    let gate = &analysis.elements[&3];
    assert_relative_eq!(gate.prob_1, 0.0625);
    assert_relative_eq!(gate.prob_0, 0.4375);
    let output = &analysis.elements[&4];
    assert_relative_eq!(output.prob_1, 0.0625);
    assert_relative_eq!(output.prob_0, 0.4375);
    // one path per primary input through the single gate
    assert_eq!(analysis.output_paths[&4].len(), 2);
}

#[test]
fn inverter_survives_the_bench_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_netlist(dir.path(), "inv.vo", INVERTER_VO);
    let flat = flatten_netlist_file(&path).unwrap();
    let expected = "1 inpt 1 0 //A\n\
2 not 1 1 //u1|n0\n\
\t1 \n\
3 out 0 1 //O\n\
\t2 \n";
    assert_eq!(flat.bench, expected);

    // a single-input gate must keep its fan-in through the text handoff
    let analysis = analyze_netlist(&flat.bench).unwrap();
    assert_eq!(analysis.elements[&2].connections.len(), 1);
    assert!(analysis.elements.values().all(|e| e.is_resolved()));
    assert_relative_eq!(analysis.elements[&2].prob_0, 0.25);
    assert_relative_eq!(analysis.elements[&2].prob_1, 0.25);
    assert_relative_eq!(analysis.elements[&3].prob_0, 0.25);
    assert_eq!(analysis.output_paths[&3].len(), 1);
}

#[test]
fn identical_netlists_do_not_diverge() {
    let dir = tempfile::tempdir().unwrap();
    let clean = analyze(dir.path(), "clean.vo", CLEAN_VO);
    let same = analyze(dir.path(), "same.vo", CLEAN_VO);

    let divergences = divergence::compare(&clean.elements, &same.elements);
    assert!(divergences.is_empty());
    assert_eq!(
        divergence::render_report(&divergences),
        "No divergences were found!"
    );
}

#[test]
fn swapped_gate_kind_diverges() {
    let dir = tempfile::tempdir().unwrap();
    let clean = analyze(dir.path(), "clean.vo", CLEAN_VO);
    let trojan_vo = CLEAN_VO.replace("THDR_AND2", "THDR_OR2");
    let trojan = analyze(dir.path(), "trojan.vo", &trojan_vo);

    let divergences = divergence::compare(&clean.elements, &trojan.elements);
    assert_eq!(divergences.len(), 1);
    let Divergence::Mismatch { first, second } = &divergences[0] else {
        panic!("expected a mismatch, got {:?}", divergences[0]);
    };
    assert_relative_eq!(first.prob_1, 0.0625);
    assert_relative_eq!(second.prob_1, 0.4375);
    let report = divergence::render_report(&divergences);
    assert!(report.contains("Divergent Output: Output 4 from Netlist 1"));
}

#[test]
fn every_artifact_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let reports = ReportDirs::new(dir.path().join("results"));

    let path = write_netlist(dir.path(), "clean.vo", CLEAN_VO);
    let flat = flatten_netlist_file(&path).unwrap();
    reports
        .write_stage1("clean", &flat.intermediate, &flat.bench)
        .unwrap();
    let analysis = analyze_netlist(&flat.bench).unwrap();
    let listing = render_output_paths(&analysis.elements, &analysis.output_paths);
    reports.write_paths("clean", &listing).unwrap();
    reports.write_transitions("clean", &analysis.elements).unwrap();
    let divergences = divergence::compare(&analysis.elements, &analysis.elements);
    reports
        .write_divergences(&divergence::render_report(&divergences))
        .unwrap();

    let root = reports.root();
    for artifact in [
        "clean_resolved.txt",
        "clean_netlist.txt",
        "Outputs/Output_clean.txt",
        "Table_Transitions/Prob_clean.txt",
        "Divergences/Output_Divergences.txt",
    ] {
        assert!(root.join(artifact).is_file(), "missing {artifact}");
    }
    let listing_text = fs::read_to_string(root.join("Outputs/Output_clean.txt")).unwrap();
    assert!(listing_text.starts_with("Output 4:\n"));
}
