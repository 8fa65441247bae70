//! `DuiStrategy`: buckets operations into delete/update/insert groups and
//! rewrites the log in that order, eliminating false "link already
//! exists" conflicts when two profiles swap ownership of a link (spec.md
//! §4.5, §8 property 6). Grounded on the reordering pass described in
//! `uberdot/interpreters.py`'s `DUIStrategyInterpreter`.

use crate::difflog::{DiffLog, Operation};

fn bucket(op: &Operation) -> u8 {
    match op {
        // Deletes first.
        Operation::RemoveLink { .. } | Operation::RemoveProfile { .. } => 0,
        // Then everything that mutates state/filesystem without a clean
        // delete/insert shape.
        Operation::UpdateLink { .. }
        | Operation::UpdateTracked { .. }
        | Operation::UpdateProfile { .. }
        | Operation::UpdateProperty { .. }
        | Operation::TrackLink { .. }
        | Operation::UntrackLink { .. }
        | Operation::RestoreLink { .. } => 1,
        // Inserts last.
        Operation::AddLink { .. } | Operation::AddProfile { .. } => 2,
        Operation::Info { .. } | Operation::Start | Operation::Fin => 1,
    }
}

/// Rewrite `log` as delete -> update -> insert, preserving relative order
/// within each bucket (a stable sort).
pub fn reorder(log: &DiffLog) -> DiffLog {
    let mut ops: Vec<Operation> = log.operations.clone();
    ops.sort_by_key(bucket);
    DiffLog { operations: ops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkDescriptor, Owner};
    use std::path::PathBuf;

    fn link(path: &str) -> LinkDescriptor {
        LinkDescriptor::symbolic(
            PathBuf::from(path),
            PathBuf::from("/repo/x"),
            Owner::inherit(),
            None,
            false,
            None,
        )
    }

    #[test]
    fn removes_come_before_adds() {
        let mut log = DiffLog::new();
        log.add_link("a", link("/home/u/.new"));
        log.remove_link("a", link("/home/u/.old"));

        let reordered = reorder(&log);
        let first_kind = reordered.operations[0].kind_name();
        assert!(first_kind == "remove_l" || first_kind == "untrack_l");
        assert_eq!(reordered.operations.last().unwrap().kind_name(), "add_l");
    }

    #[test]
    fn swap_resolves_without_losing_operations() {
        // Two profiles swap ownership of the same path: profile A removes
        // it, profile B adds it. DUI must put the remove before the add.
        let mut log = DiffLog::new();
        log.add_link("b", link("/home/u/foo"));
        log.remove_link("a", link("/home/u/foo"));

        let reordered = reorder(&log);
        assert_eq!(reordered.operations.len(), log.operations.len());
        let remove_idx = reordered
            .operations
            .iter()
            .position(|op| matches!(op, Operation::RemoveLink { .. } | Operation::UntrackLink { .. }))
            .unwrap();
        let add_idx = reordered
            .operations
            .iter()
            .position(|op| matches!(op, Operation::AddLink { .. }))
            .unwrap();
        assert!(remove_idx < add_idx);
    }
}
