use tracing::warn;

use crate::action::{Action, BranchTarget};

const PLACEHOLDER: &str = "L";

fn find_target(actions: &[Action], i: usize, target_pos: i64) -> BranchTarget {
    let origin = &actions[i];
    if target_pos <= origin.pos as i64 {
        return (0..=i)
            .rev()
            .find(|&j| actions[j].pos as i64 == target_pos)
            .map_or(BranchTarget::Unresolved, BranchTarget::Resolved);
    }

    let upper = actions.len();
    if let Some(j) = (i + 1..upper).find(|&j| actions[j].pos as i64 == target_pos) {
        return BranchTarget::Resolved(j);
    }
    // The forward scan stopped at `upper`; only a jump to the end of the
    // action just before it counts as leaving the block.
    if actions[upper - 1].end() as i64 == target_pos {
        BranchTarget::EndOfBlock
    } else {
        BranchTarget::Unresolved
    }
}

// The count is per resolved branch, not per label; the end-of-block label is
// numbered after it.
pub fn resolve(actions: &mut [Action]) -> u32 {
    for a in actions.iter_mut() {
        a.label = None;
        if let Some(b) = a.branch_mut() {
            b.target = BranchTarget::Unresolved;
        }
    }

    let mut label_count = 0;
    for i in 0..actions.len() {
        let Some(offset) = actions[i].branch().map(|b| b.offset) else {
            continue;
        };
        let origin = &actions[i];
        let target_pos =
            origin.pos as i64 + origin.header_len() as i64 + origin.length as i64 + offset as i64;
        let target = find_target(actions, i, target_pos);

        match target {
            BranchTarget::Resolved(j) => {
                label_count += 1;
                if actions[j].label.is_none() {
                    actions[j].label = Some(PLACEHOLDER.to_string());
                }
            }
            BranchTarget::EndOfBlock => {}
            BranchTarget::Unresolved => {
                warn!(pos = actions[i].pos, offset, target_pos, "branch target is not an action boundary");
            }
        }
        if let Some(b) = actions[i].branch_mut() {
            b.target = target;
        }
    }

    let mut next = 1;
    for a in actions.iter_mut() {
        if a.label.is_some() {
            a.label = Some(format!("{PLACEHOLDER}{next}"));
            next += 1;
        }
    }

    label_count
}
