use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::{PackageAttr, SuiteAttr};

/// Validate every suite's dependency declarations before execution.
///
/// Dependencies are expressed over priority groups within one suite;
/// cross-suite references are not supported, so a priority named by
/// `depends`/`on_success`/`on_failure` must exist among the suite's own
/// methods, must not be the method's own priority, and the resulting graph
/// must be acyclic.
///
/// # Errors
///
/// Returns a human-readable description of the first problem found.
pub fn validate(packages: &[PackageAttr]) -> Result<(), String> {
    for pkg in packages {
        for suite in &pkg.suites {
            validate_suite(&pkg.name, suite)?;
        }
    }
    Ok(())
}

fn validate_suite(package: &str, suite: &SuiteAttr) -> Result<(), String> {
    let known: BTreeSet<u32> = suite.methods.iter().map(|m| m.prio).collect();

    let mut graph: DiGraph<u32, ()> = DiGraph::new();
    let mut nodes: HashMap<u32, NodeIndex> = HashMap::new();
    for prio in &known {
        nodes.insert(*prio, graph.add_node(*prio));
    }

    for method in &suite.methods {
        let declared = method
            .depends
            .iter()
            .chain(&method.on_success)
            .chain(&method.on_failure);
        for dep in declared {
            if !known.contains(dep) {
                return Err(format!(
                    "method '{}' in suite '{package}/{}' depends on unknown priority {dep}",
                    method.name, suite.name
                ));
            }
            if *dep == method.prio {
                return Err(format!(
                    "method '{}' in suite '{package}/{}' depends on its own priority {dep}",
                    method.name, suite.name
                ));
            }
            // Edge from the dependent group to the prerequisite group.
            if let (Some(&from), Some(&to)) = (nodes.get(&method.prio), nodes.get(dep)) {
                graph.add_edge(from, to, ());
            }
        }
    }

    toposort(&graph, None).map_err(|e| {
        let prio = graph[e.node_id()];
        format!(
            "dependency cycle in suite '{package}/{}' involving priority {prio}",
            suite.name
        )
    })?;
    Ok(())
}
