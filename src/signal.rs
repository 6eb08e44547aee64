//! Signal-name classification and the ordering rules shared by both stages.
//!
//! The synthesizer encodes every logical bit as two complementary rails, and
//! vector bits carry their index in brackets. Everything downstream works on
//! the collapsed base name.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Dual-rail/vector metadata of a raw signal name. Derived on the fly, never
/// stored on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    pub base_name: String,
    pub is_true_rail: bool,
    pub is_vector_bit: bool,
}

fn vector_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\(\w+)\[\d+\]~input_o").expect("regex compiles"))
}

fn dual_rail_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\(\w+)_([tf])~input_o").expect("regex compiles"))
}

fn gate_output_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.*)\|G([01])\|out~\d+_combout").expect("regex compiles"))
}

fn vector_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)\[(\d+)\]$").expect("regex compiles"))
}

fn rail_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)_[tf]$").expect("regex compiles"))
}

/// Classify a raw signal name, trying the patterns in precedence order:
/// vectorized primary input, dual-rail primary input, dual-rail gate output,
/// then the untagged fallback.
///
/// Dual-rail primary inputs are flagged as vector bits so that the pruning
/// pass never drops them: they are already disambiguated at the input buffer.
pub fn parse_signal_name(signal: &str) -> SignalInfo {
    if let Some(caps) = vector_input_re().captures(signal) {
        return SignalInfo {
            base_name: caps[1].to_owned(),
            is_true_rail: false,
            is_vector_bit: true,
        };
    }
    if let Some(caps) = dual_rail_input_re().captures(signal) {
        return SignalInfo {
            base_name: caps[1].to_owned(),
            is_true_rail: &caps[2] == "t",
            is_vector_bit: true,
        };
    }
    if let Some(caps) = gate_output_re().captures(signal) {
        return SignalInfo {
            base_name: caps[1].to_owned(),
            is_true_rail: &caps[2] == "1",
            is_vector_bit: false,
        };
    }
    SignalInfo {
        base_name: signal.to_owned(),
        is_true_rail: false,
        is_vector_bit: false,
    }
}

/// Collapse a port name to the one logical bit it represents: consecutive
/// vector indices pair up (`[0]`,`[1]` -> `0`; `[2]`,`[3]` -> `1`) and a
/// trailing `_t`/`_f` rail suffix is stripped.
pub fn base_name(signal: &str) -> String {
    if let Some(caps) = vector_index_re().captures(signal) {
        if let Ok(index) = caps[2].parse::<u32>() {
            return format!("{}{}", &caps[1], index / 2);
        }
    }
    if let Some(caps) = rail_suffix_re().captures(signal) {
        return caps[1].to_owned();
    }
    signal.to_owned()
}

/// Split an identifier into its alphabetic prefix and trailing numeric
/// suffix; identifiers without a numeric suffix sort as -1.
pub fn split_natural(s: &str) -> (&str, i64) {
    let tail = s.len() - s.bytes().rev().take_while(u8::is_ascii_digit).count();
    if tail < s.len() {
        if let Ok(n) = s[tail..].parse::<i64>() {
            return (&s[..tail], n);
        }
    }
    (s, -1)
}

/// Natural-sort comparator: alphabetic prefix lexicographically, then numeric
/// suffix numerically. Used for instance ordering and ID assignment so that
/// the output is reproducible regardless of source-text order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (pa, na) = split_natural(a);
    let (pb, nb) = split_natural(b);
    pa.cmp(pb).then(na.cmp(&nb))
}

/// Ordering for primary-output names: bracketed vector base first, then the
/// bit index; non-vector names compare as index -1.
pub fn vector_name_cmp(a: &str, b: &str) -> Ordering {
    fn parts(s: &str) -> (&str, i64) {
        if let Some(caps) = vector_index_re().captures(s) {
            if let Ok(n) = caps[2].parse::<i64>() {
                let base = caps.get(1).map(|m| m.as_str()).unwrap_or(s);
                return (base, n);
            }
        }
        (s, -1)
    }
    let (ba, ia) = parts(a);
    let (bb, ib) = parts(b);
    ba.cmp(bb).then(ia.cmp(&ib))
}
