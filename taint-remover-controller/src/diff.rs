use k8s_openapi::api::core::v1::Taint;
use taint_remover_crds::v1alpha1::taintremover::TaintSpec;

/// Computes the taints left on a node after stripping every removal entry.
/// Matching is keyed on (key, effect) and never on value. The flag reports
/// whether membership changed; re-running on the result reports false, so a
/// pass over an already-clean node is a no-op.
pub(crate) fn remaining_taints(current: &[Taint], removal: &[TaintSpec]) -> (Vec<Taint>, bool) {
    let mut remaining = current.to_vec();
    let mut changed = false;
    for spec in removal {
        let before = remaining.len();
        remaining.retain(|taint| !spec.matches(taint));
        changed = changed || remaining.len() < before;
    }
    (remaining, changed)
}
