//! Inlining of subexpression calls (`\g<name>`).
//!
//! Every call depends on the group it calls, and every capture group depends on the calls inside
//! it. Processing that graph in topological order means a group is only copied once all calls
//! inside it have been replaced. Whatever is left over lies on a cycle.

use std::collections::{BTreeMap, HashMap, VecDeque};

use super::{NodeId, NodeKind, RegexAst};
use crate::error::{RegexError, Result};

pub fn expand_subexpression_calls(ast: &mut RegexAst) -> Result<()> {
    let calls: Vec<(NodeId, u32)> = ast
        .preorder()
        .into_iter()
        .filter_map(|id| match ast.node(id).kind {
            NodeKind::SubexpressionCall { group, .. } => Some((id, group)),
            _ => None,
        })
        .collect();
    if calls.is_empty() {
        return Ok(());
    }
    let groups = ast.capture_groups();

    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut in_degree: BTreeMap<NodeId, usize> = BTreeMap::new();
    for &group in groups.values() {
        in_degree.insert(group, 0);
    }
    for &(call, target) in &calls {
        let group = *groups.get(&target).ok_or_else(|| {
            RegexError::unsupported(format!("call to undefined group {}", target))
        })?;
        *in_degree.entry(call).or_insert(0) += 1;
        dependents.entry(group).or_default().push(call);
        for enclosing in ast.enclosing_captures(call) {
            *in_degree.entry(enclosing).or_insert(0) += 1;
            dependents.entry(call).or_default().push(enclosing);
        }
    }

    let mut ready: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut processed = 0;
    let targets: HashMap<NodeId, NodeId> = calls
        .iter()
        .filter_map(|&(call, target)| groups.get(&target).map(|&g| (call, g)))
        .collect();
    while let Some(id) = ready.pop_front() {
        processed += 1;
        if let Some(&group) = targets.get(&id) {
            inline_call(ast, id, group);
        }
        for dependent in dependents.remove(&id).unwrap_or_default() {
            if let Some(d) = in_degree.get_mut(&dependent) {
                *d -= 1;
                if *d == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }
    if processed < in_degree.len() {
        return Err(RegexError::unsupported(
            "recursive subexpression calls are not supported",
        ));
    }
    Ok(())
}

/// Replaces `call` with a copy of `group`, carrying the call's quantifier.
fn inline_call(ast: &mut RegexAst, call: NodeId, group: NodeId) {
    let parent = ast.node(call).parent;
    let quantifier = ast.node(call).quantifier;
    log::debug!("inlining call node {} with group node {}", call, group);
    let copy = ast.deep_copy(group, parent);
    ast.node_mut(copy).quantifier = quantifier;
    if let Some(parent) = parent {
        for t in ast.sequence_mut(parent).iter_mut() {
            if *t == call {
                *t = copy;
            }
        }
    }
}
