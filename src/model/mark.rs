use crate::model::PackageAttr;

/// Sort the whole hierarchy into execution order and assign ids.
///
/// Packages sort by name, suites and methods by `(prio, name)`. Suite and
/// method ids are assigned monotonically (from 1) in the final traversal
/// order, so ids reflect execution order rather than discovery order.
pub fn sort_and_mark(packages: &mut [PackageAttr]) {
    packages.sort_by(|a, b| a.name.cmp(&b.name));

    let mut next_suite_id = 1u32;
    let mut next_method_id = 1u32;
    for pkg in packages.iter_mut() {
        pkg.suites
            .sort_by(|a, b| a.prio.cmp(&b.prio).then_with(|| a.name.cmp(&b.name)));
        for suite in &mut pkg.suites {
            suite.suite_id = next_suite_id;
            next_suite_id += 1;
            suite
                .methods
                .sort_by(|a, b| a.prio.cmp(&b.prio).then_with(|| a.name.cmp(&b.name)));
            for method in &mut suite.methods {
                method.method_id = next_method_id;
                next_method_id += 1;
            }
        }
    }
}

/// Total number of method invocation units in the hierarchy.
///
/// One unit is one method per suite-cycle per package-cycle; repetitions
/// inside a single method call are one unit. This is the denominator of
/// the progress tracker.
pub fn total_invocations(packages: &[PackageAttr], only_once: bool) -> u64 {
    packages
        .iter()
        .map(|pkg| {
            u64::from(pkg.cycles(only_once))
                * pkg
                    .suites
                    .iter()
                    .map(|suite| {
                        u64::from(suite.cycles(only_once)) * suite.methods.len() as u64
                    })
                    .sum::<u64>()
        })
        .sum()
}
