use std::collections::HashSet;
use std::fmt::Write as _;
use crate::{CausalGraph, LV};

#[derive(Debug, Clone, Copy)]
#[allow(unused)]
pub enum DotColor {
    Red, Green, Blue, Grey, Black
}

impl DotColor {
    fn as_str(&self) -> &'static str {
        match self {
            DotColor::Red => "red",
            DotColor::Green => "\"#98ea79\"",
            DotColor::Blue => "\"#84a7e8\"",
            DotColor::Grey => "\"#eeeeee\"",
            DotColor::Black => "black",
        }
    }
}

impl CausalGraph {
    /// Render the change DAG in graphviz's dot format. Each change is labelled with its actor,
    /// sequence number and a short hash. Merges get their own point node.
    pub fn to_dot_graph(&self) -> String {
        let mut merges_touched = HashSet::new();

        fn key_for_parents(p: &[LV]) -> String {
            p.iter().map(|t| format!("{t}"))
                .collect::<Vec<_>>().join("0")
        }

        // Writing into a String can't fail.
        let mut out = String::new();
        out.push_str("strict digraph {\n");
        out.push_str("\trankdir=\"BT\"\n");
        out.push_str("\tlabelloc=\"t\"\n");
        out.push_str("\tnode [shape=box style=filled]\n");
        out.push_str("\tedge [color=\"#333333\" dir=none]\n");

        let _ = writeln!(&mut out, "\tROOT [fillcolor={} label=<ROOT>]", DotColor::Red.as_str());
        for (lv, entry) in self.entries.iter().enumerate() {
            let parent_item = match entry.parents.len() {
                0 => "ROOT".to_string(),
                1 => format!("{}", entry.parents[0]),
                _ => {
                    let key = format!("m{}", key_for_parents(entry.parents.as_ref()));
                    if merges_touched.insert(key.clone()) {
                        // Emit the merge item.
                        let _ = writeln!(&mut out, "\t{key} [fillcolor={} label=\"\" shape=point]", DotColor::Blue.as_str());
                        for &p in entry.parents.iter() {
                            let _ = writeln!(&mut out, "\t{key} -> {} [color={}]", p, DotColor::Blue.as_str());
                        }
                    }

                    key
                }
            };

            let actor = self.actor_of(lv).to_hex_string();
            let hash = entry.hash.to_string();
            let _ = writeln!(&mut out, "\t{} [fillcolor={} label=<{}:{} ({})>]",
                lv, DotColor::Grey.as_str(), &actor[..8], entry.seq, &hash[..8]);
            let _ = writeln!(&mut out, "\t{} -> {}", lv, parent_item);
        }

        out.push_str("}\n");

        out
    }
}
