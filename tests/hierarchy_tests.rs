//! Integration tests for the materialized-path hierarchies.
//!
//! These tests exercise tasks, departments and checklist items against an
//! in-memory SQLite database.

use taskplan::db::Database;
use taskplan::error::ErrorCode;
use taskplan::types::{NewTask, NodeId, Task, ViolationKind};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn create_project(db: &Database) -> NodeId {
    db.create_project("Test project")
        .expect("Failed to create project")
        .id
}

fn root(db: &Database, project_id: NodeId, title: &str) -> Task {
    db.create_task(NewTask::new(title).in_project(project_id))
        .expect("Failed to create root task")
}

fn child(db: &Database, parent_id: NodeId, title: &str) -> Task {
    db.create_task(NewTask::new(title).under(parent_id))
        .expect("Failed to create child task")
}

fn path_of(db: &Database, id: NodeId) -> String {
    db.get_task(id).unwrap().unwrap().tree.path.to_string()
}

mod create_tests {
    use super::*;

    #[test]
    fn root_task_path_is_its_id() {
        let db = setup_db();
        let project = create_project(&db);

        let task = root(&db, project, "Root");

        assert_eq!(task.tree.path.to_string(), task.id.to_string());
        assert_eq!(task.tree.depth, 0);
        assert_eq!(task.tree.parent_id, None);
        assert_eq!(task.tree.position, 0);
        assert_eq!(task.project_id, project);
    }

    #[test]
    fn child_path_extends_parent_path() {
        let db = setup_db();
        let project = create_project(&db);
        let parent = root(&db, project, "Parent");

        let first = child(&db, parent.id, "First");
        let second = child(&db, parent.id, "Second");
        let grandchild = child(&db, first.id, "Grandchild");

        assert_eq!(first.tree.path.to_string(), format!("{}.{}", parent.id, first.id));
        assert_eq!(
            grandchild.tree.path.to_string(),
            format!("{}.{}.{}", parent.id, first.id, grandchild.id)
        );
        assert_eq!(grandchild.tree.depth, 2);
        assert_eq!(first.tree.position, 0);
        assert_eq!(second.tree.position, 1);
        assert_eq!(first.project_id, project);
    }

    #[test]
    fn explicit_position_shifts_siblings() {
        let db = setup_db();
        let project = create_project(&db);
        let parent = root(&db, project, "Parent");
        let a = child(&db, parent.id, "A");
        let b = child(&db, parent.id, "B");

        let mut input = NewTask::new("Front").under(parent.id);
        input.position = Some(0);
        let front = db.create_task(input).unwrap();

        let ids: Vec<NodeId> = db.task_children(parent.id).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![front.id, a.id, b.id]);
        let positions: Vec<i64> = db
            .task_children(parent.id)
            .unwrap()
            .iter()
            .map(|t| t.tree.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let db = setup_db();
        let err = db.create_task(NewTask::new("Orphan").under(999)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "task not found: 999");
    }

    #[test]
    fn soft_deleted_parent_is_not_found() {
        let db = setup_db();
        let project = create_project(&db);
        let parent = root(&db, project, "Parent");
        db.soft_delete_task(parent.id).unwrap();

        let err = db.create_task(NewTask::new("Child").under(parent.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn root_without_project_is_rejected() {
        let db = setup_db();
        let err = db.create_task(NewTask::new("Loose")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.field.as_deref(), Some("project_id"));
    }

    #[test]
    fn child_in_other_project_is_rejected() {
        let db = setup_db();
        let p1 = create_project(&db);
        let p2 = create_project(&db);
        let parent = root(&db, p1, "Parent");

        let err = db
            .create_task(NewTask::new("Child").under(parent.id).in_project(p2))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn empty_title_is_rejected() {
        let db = setup_db();
        let project = create_project(&db);
        let err = db.create_task(NewTask::new("   ").in_project(project)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.field.as_deref(), Some("title"));
    }
}

mod move_tests {
    use super::*;

    #[test]
    fn move_rewrites_every_descendant() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");
        let b = child(&db, a.id, "B");
        let c = child(&db, b.id, "C");
        let d = child(&db, c.id, "D");
        let target = root(&db, project, "Target");
        let target_child = child(&db, target.id, "Target child");

        let moved = db.move_task(b.id, Some(target_child.id)).unwrap();

        assert_eq!(
            moved.tree.path.to_string(),
            format!("{}.{}.{}", target.id, target_child.id, b.id)
        );
        assert_eq!(moved.tree.depth, 2);
        assert_eq!(moved.tree.parent_id, Some(target_child.id));

        let c_after = db.get_task(c.id).unwrap().unwrap();
        let d_after = db.get_task(d.id).unwrap().unwrap();
        assert_eq!(
            c_after.tree.path.to_string(),
            format!("{}.{}.{}.{}", target.id, target_child.id, b.id, c.id)
        );
        // Depth shifts by the moved node's depth delta (+1).
        assert_eq!(c_after.tree.depth, c.tree.depth + 1);
        assert_eq!(d_after.tree.depth, d.tree.depth + 1);
        assert!(d_after.tree.path.to_string().ends_with(&format!("{}.{}", c.id, d.id)));

        assert!(db.task_children(a.id).unwrap().is_empty());
        assert!(db.verify_task_hierarchy().unwrap().is_empty());
    }

    #[test]
    fn move_to_root() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");
        let b = child(&db, a.id, "B");
        let c = child(&db, b.id, "C");

        let moved = db.move_task(b.id, None).unwrap();

        assert_eq!(moved.tree.path.to_string(), b.id.to_string());
        assert_eq!(moved.tree.depth, 0);
        assert_eq!(moved.tree.position, 1);
        assert_eq!(path_of(&db, c.id), format!("{}.{}", b.id, c.id));
    }

    #[test]
    fn moved_node_is_appended_last() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");
        child(&db, a.id, "A1");
        child(&db, a.id, "A2");
        let loose = root(&db, project, "Loose");

        let moved = db.move_task(loose.id, Some(a.id)).unwrap();
        assert_eq!(moved.tree.position, 2);
        assert_eq!(db.task_children(a.id).unwrap().last().unwrap().id, loose.id);
    }

    #[test]
    fn move_under_itself_conflicts() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");

        let err = db.move_task(a.id, Some(a.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.message, format!("cannot move task {} under itself", a.id));
    }

    #[test]
    fn move_under_descendant_conflicts_and_leaves_tree_intact() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");
        let b = child(&db, a.id, "B");
        let c = child(&db, b.id, "C");

        let err = db.move_task(a.id, Some(c.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(
            err.message,
            format!("cannot move task {} under its own descendant {}", a.id, c.id)
        );

        assert_eq!(path_of(&db, a.id), a.tree.path.to_string());
        assert_eq!(path_of(&db, c.id), c.tree.path.to_string());
        assert!(db.verify_task_hierarchy().unwrap().is_empty());
    }

    #[test]
    fn move_to_same_parent_is_a_no_op() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");
        let b = child(&db, a.id, "B");
        child(&db, a.id, "C");

        let moved = db.move_task(b.id, Some(a.id)).unwrap();
        assert_eq!(moved.tree.position, 0);
        assert_eq!(moved.tree.path, b.tree.path);
    }

    #[test]
    fn move_across_projects_is_rejected() {
        let db = setup_db();
        let p1 = create_project(&db);
        let p2 = create_project(&db);
        let a = root(&db, p1, "A");
        let b = root(&db, p2, "B");

        let err = db.move_task(a.id, Some(b.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn move_missing_nodes_is_not_found() {
        let db = setup_db();
        let project = create_project(&db);
        let a = root(&db, project, "A");

        assert_eq!(db.move_task(999, None).unwrap_err().code, ErrorCode::NotFound);
        assert_eq!(
            db.move_task(a.id, Some(999)).unwrap_err().code,
            ErrorCode::NotFound
        );
    }

    #[test]
    fn prefix_checks_are_segment_aware() {
        let db = setup_db();
        let project = create_project(&db);
        let mut tasks = Vec::new();
        for i in 1..=121 {
            tasks.push(root(&db, project, &format!("T{}", i)));
        }
        let t12 = tasks.iter().find(|t| t.id == 12).expect("task 12");
        let t120 = tasks.iter().find(|t| t.id == 120).expect("task 120");
        db.move_task(121, Some(t120.id)).unwrap();
        assert_eq!(path_of(&db, 121), "120.121");

        assert!(db.task_descendants(t12.id).unwrap().is_empty());
        // 120 is not below 12, so both directions are legal moves.
        db.move_task(t12.id, Some(121)).unwrap();
        assert_eq!(path_of(&db, 12), "120.121.12");
        let ancestors: Vec<NodeId> = db.task_ancestors(12).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ancestors, vec![120, 121]);
    }
}

mod query_tests {
    use super::*;

    #[test]
    fn descendants_are_in_pre_order() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let b = child(&db, r.id, "B");
        let a1 = child(&db, a.id, "A1");
        let b1 = child(&db, b.id, "B1");

        let ids: Vec<NodeId> = db.task_descendants(r.id).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, a1.id, b.id, b1.id]);
    }

    #[test]
    fn ancestors_are_root_first() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let a1 = child(&db, a.id, "A1");

        let ids: Vec<NodeId> = db.task_ancestors(a1.id).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![r.id, a.id]);
        assert!(db.task_ancestors(r.id).unwrap().is_empty());
    }

    #[test]
    fn reorder_keeps_positions_dense() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let b = child(&db, r.id, "B");
        let c = child(&db, r.id, "C");

        db.reorder_task(c.id, 0).unwrap();
        let children = db.task_children(r.id).unwrap();
        let ids: Vec<NodeId> = children.iter().map(|t| t.id).collect();
        let positions: Vec<i64> = children.iter().map(|t| t.tree.position).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
        assert_eq!(positions, vec![0, 1, 2]);

        // Out-of-range positions clamp to the end.
        db.reorder_task(c.id, 99).unwrap();
        let ids: Vec<NodeId> = db.task_children(r.id).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn task_tree_nests_children() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        child(&db, a.id, "A1");
        child(&db, r.id, "B");
        root(&db, project, "Other root");

        let tree = db.task_tree(r.id).unwrap();
        assert_eq!(tree.task.id, r.id);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].task.id, a.id);
        assert_eq!(tree.children[0].children.len(), 1);

        let forest = db.project_task_tree(project).unwrap();
        assert_eq!(forest.len(), 2);
    }
}

mod delete_tests {
    use super::*;

    #[test]
    fn delete_removes_whole_subtree() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let a1 = child(&db, a.id, "A1");
        let b = child(&db, r.id, "B");

        let removed = db.delete_task(a.id).unwrap();
        assert_eq!(removed, 2);
        assert!(db.get_task(a.id).unwrap().is_none());
        assert!(db.get_task(a1.id).unwrap().is_none());
        assert!(db.get_task(b.id).unwrap().is_some());
        assert!(db.verify_task_hierarchy().unwrap().is_empty());
    }

    #[test]
    fn soft_delete_hides_subtree() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let a1 = child(&db, a.id, "A1");

        assert_eq!(db.soft_delete_task(a.id).unwrap(), 2);

        let stored = db.get_task(a1.id).unwrap().unwrap();
        assert!(stored.deleted_at.is_some());
        assert!(db.task_children(r.id).unwrap().is_empty());
        assert!(db.task_tree(r.id).unwrap().children.is_empty());
        assert_eq!(db.task_descendants(a.id).unwrap_err().code, ErrorCode::NotFound);
    }
}

mod verify_tests {
    use super::*;

    #[test]
    fn verify_reports_corrupted_rows() {
        let db = setup_db();
        let project = create_project(&db);
        let r = root(&db, project, "R");
        let a = child(&db, r.id, "A");
        let b = child(&db, r.id, "B");

        db.with_conn(|conn| {
            conn.execute("UPDATE tasks SET depth = 5 WHERE id = ?1", [a.id])?;
            conn.execute("UPDATE tasks SET path = '42' WHERE id = ?1", [b.id])?;
            Ok(())
        })
        .unwrap();

        let violations = db.verify_task_hierarchy().unwrap();
        assert!(violations.iter().any(|v| v.node_id == a.id
            && v.kind == ViolationKind::DepthMismatch { stored: 5, expected: 1 }));
        assert!(violations.iter().any(|v| v.node_id == b.id
            && matches!(v.kind, ViolationKind::PathMismatch { .. })));
    }
}

mod department_tests {
    use super::*;

    #[test]
    fn department_tree_moves_and_deletes() {
        let db = setup_db();
        let company = db.create_department("Company", None).unwrap();
        let eng = db.create_department("Engineering", Some(company.id)).unwrap();
        let platform = db.create_department("Platform", Some(eng.id)).unwrap();
        let sales = db.create_department("Sales", None).unwrap();

        assert_eq!(
            platform.tree.path.to_string(),
            format!("{}.{}.{}", company.id, eng.id, platform.id)
        );

        db.move_department(eng.id, Some(sales.id)).unwrap();
        let platform = db.get_department(platform.id).unwrap().unwrap();
        assert_eq!(
            platform.tree.path.to_string(),
            format!("{}.{}.{}", sales.id, eng.id, platform.id)
        );

        let err = db.move_department(sales.id, Some(platform.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        let ancestors: Vec<NodeId> = db
            .department_ancestors(platform.id)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ancestors, vec![sales.id, eng.id]);

        assert_eq!(db.delete_department(sales.id).unwrap(), 3);
        let roots: Vec<NodeId> = db.root_departments().unwrap().iter().map(|d| d.id).collect();
        assert_eq!(roots, vec![company.id]);
        assert!(db.verify_department_hierarchy().unwrap().is_empty());
    }
}

mod checklist_tests {
    use super::*;

    #[test]
    fn checklist_nests_within_a_task() {
        let db = setup_db();
        let project = create_project(&db);
        let task = root(&db, project, "Release");

        let docs = db.create_checklist_item(task.id, "Docs", None).unwrap();
        let api = db.create_checklist_item(task.id, "API docs", Some(docs.id)).unwrap();
        db.create_checklist_item(task.id, "Changelog", None).unwrap();

        assert_eq!(api.tree.path.to_string(), format!("{}.{}", docs.id, api.id));
        assert_eq!(api.task_id, task.id);
        assert_eq!(db.task_checklist(task.id).unwrap().len(), 2);
        assert_eq!(db.checklist_descendants(docs.id).unwrap().len(), 1);

        db.set_checklist_item_checked(api.id, true).unwrap();
        let progress = db.checklist_progress(task.id).unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.checked, 1);
    }

    #[test]
    fn checklist_items_stay_within_their_task() {
        let db = setup_db();
        let project = create_project(&db);
        let t1 = root(&db, project, "T1");
        let t2 = root(&db, project, "T2");
        let item1 = db.create_checklist_item(t1.id, "One", None).unwrap();
        let item2 = db.create_checklist_item(t2.id, "Two", None).unwrap();

        let err = db.move_checklist_item(item1.id, Some(item2.id)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = db
            .create_checklist_item(t1.id, "Cross", Some(item2.id))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn deleting_task_drops_its_checklist() {
        let db = setup_db();
        let project = create_project(&db);
        let task = root(&db, project, "Task");
        let item = db.create_checklist_item(task.id, "Item", None).unwrap();

        db.delete_task(task.id).unwrap();
        assert!(db.get_checklist_item(item.id).unwrap().is_none());
    }
}
