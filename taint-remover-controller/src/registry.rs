use taint_remover_crds::v1alpha1::taintremover::{TaintRemover, TaintSpec};

/// Builds the effective removal set from every declared source: sources in
/// listing order, taints in declared order. The first occurrence of a
/// (key, effect) identity wins; later duplicates are dropped. An empty
/// result means there is nothing to do.
pub(crate) fn removal_set(removers: &[TaintRemover]) -> Vec<TaintSpec> {
    let mut set: Vec<TaintSpec> = Vec::new();
    for remover in removers {
        for taint in &remover.spec.taints {
            if set.iter().any(|seen| seen.same_identity(taint)) {
                continue;
            }
            set.push(taint.clone());
        }
    }
    set
}
