use organo_core::db::open_db_in_memory;
use organo_core::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use organo_core::{
    ChangeType, EmployeeSnapshot, HierarchyService, NewEmployee, ValidationError, VersionAction,
    VersionError, VersionPatch, VersionService, VersionStatus,
};
use rusqlite::Connection;
use serde_json::json;

struct Chart {
    engineering: i64,
    commercial: i64,
    root: i64,
    mid: i64,
    leaf: i64,
}

// root <- mid <- leaf
fn seed_chart(conn: &Connection) -> Chart {
    let org = SqliteOrgRepository::try_new(conn).unwrap();
    let engineering = org.create_sector("ENG", "Engenharia", None).unwrap().id;
    let commercial = org.create_sector("COM", "Comercial", None).unwrap().id;
    let level = org.create_level(1, "Analista", 1).unwrap().id;

    let hierarchy = HierarchyService::try_new(conn).unwrap();
    let root = hierarchy
        .create_employee(&NewEmployee::new("Ana", "Diretora", engineering, level))
        .unwrap()
        .id;
    let mid = hierarchy
        .create_employee(&NewEmployee::new("Bruno", "Gerente", engineering, level).with_supervisor(root))
        .unwrap()
        .id;
    let leaf = hierarchy
        .create_employee(&NewEmployee::new("Carla", "Engenheira", engineering, level).with_supervisor(mid))
        .unwrap()
        .id;
    Chart {
        engineering,
        commercial,
        root,
        mid,
        leaf,
    }
}

fn record_mut(snapshot: &mut [EmployeeSnapshot], id: i64) -> &mut EmployeeSnapshot {
    snapshot.iter_mut().find(|record| record.id == id).unwrap()
}

fn edited_snapshot(
    service: &VersionService<'_>,
    version_id: i64,
    edit: impl FnOnce(&mut Vec<EmployeeSnapshot>),
) -> VersionPatch {
    let mut snapshot = service.get_version(version_id).unwrap().snapshot;
    edit(&mut snapshot);
    VersionPatch {
        snapshot: Some(snapshot),
        ..VersionPatch::default()
    }
}

#[test]
fn create_captures_live_chart_as_draft() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();

    let version = service.create_version("  Reorg 2026 ", Some("Q1")).unwrap();
    assert_eq!(version.name, "Reorg 2026");
    assert_eq!(version.status, VersionStatus::Draft);
    assert_eq!(version.snapshot.len(), 3);
    assert!(version.changes_summary.is_empty());
    assert_eq!(version.approved_at, None);
    let leaf = version
        .snapshot
        .iter()
        .find(|record| record.id == chart.leaf)
        .unwrap();
    assert_eq!(leaf.supervisor_id, Some(chart.mid));
    assert_eq!(version.snapshot, service.current_snapshot().unwrap());

    let err = service.create_version("   ", None).unwrap_err();
    assert!(matches!(err, VersionError::InvalidName));
}

#[test]
fn edit_records_hierarchy_and_data_changes() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        let leaf = record_mut(snapshot, chart.leaf);
        leaf.supervisor_id = Some(chart.root);
        leaf.role_title = "Coordenadora".to_string();
        leaf.sector_id = chart.commercial;
        // Not part of the diffed fields.
        record_mut(snapshot, chart.mid).phone = Some("555-0100".to_string());
    });
    let edited = service.edit_version(draft.id, &patch).unwrap();

    let summary = &edited.changes_summary;
    assert_eq!(summary.total_changes, 3);
    assert_eq!(summary.hierarchy_changes.len(), 1);
    let moved = &summary.hierarchy_changes[0];
    assert_eq!(moved.employee_id, chart.leaf);
    assert_eq!(moved.employee_name, "Carla");
    assert_eq!(moved.change_type, ChangeType::Hierarchy);
    assert_eq!(moved.field.as_deref(), Some("superior_id"));
    assert_eq!(moved.old_value, json!(chart.mid));
    assert_eq!(moved.new_value, json!(chart.root));

    let fields: Vec<&str> = summary
        .data_changes
        .iter()
        .filter_map(|change| change.field.as_deref())
        .collect();
    assert_eq!(fields, vec!["cargo", "setor_id"]);
    assert_eq!(summary.data_changes[1].old_value, json!(chart.engineering));

    // Editing does not touch live rows.
    let live = service.current_snapshot().unwrap();
    assert_eq!(
        live.iter()
            .find(|record| record.id == chart.leaf)
            .unwrap()
            .supervisor_id,
        Some(chart.mid)
    );
    assert_eq!(service.diff_against_live(draft.id).unwrap(), *summary);
}

#[test]
fn edit_diffs_against_live_state_at_edit_time() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    HierarchyService::try_new(&conn)
        .unwrap()
        .set_supervisor(chart.leaf, Some(chart.root))
        .unwrap();

    let patch = edited_snapshot(&service, draft.id, |_| {});
    let edited = service.edit_version(draft.id, &patch).unwrap();

    let summary = &edited.changes_summary;
    assert_eq!(summary.total_changes, 1);
    let change = &summary.hierarchy_changes[0];
    assert_eq!(change.employee_id, chart.leaf);
    assert_eq!(change.old_value, json!(chart.root));
    assert_eq!(change.new_value, json!(chart.mid));
}

#[test]
fn repeated_record_is_summarized_as_approval_applies_it() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        let unchanged = record_mut(snapshot, chart.leaf).clone();
        record_mut(snapshot, chart.leaf).supervisor_id = Some(chart.root);
        snapshot.push(unchanged);
    });
    let edited = service.edit_version(draft.id, &patch).unwrap();
    assert_eq!(edited.changes_summary.total_changes, 0);

    service.approve_version(draft.id).unwrap();
    let leaf = HierarchyService::try_new(&conn)
        .unwrap()
        .get_employee(chart.leaf)
        .unwrap();
    assert_eq!(leaf.supervisor_id, Some(chart.mid));
}

#[test]
fn edit_rejects_record_failing_field_rules() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        record_mut(snapshot, chart.mid).name = "  ".to_string();
    });
    let err = service.edit_version(draft.id, &patch).unwrap_err();
    assert!(matches!(
        err,
        VersionError::InvalidRecord {
            employee_id,
            source: ValidationError::BlankField("name"),
        } if employee_id == chart.mid
    ));

    let stored = service.get_version(draft.id).unwrap();
    assert_eq!(stored.snapshot, service.current_snapshot().unwrap());
    assert!(stored.changes_summary.is_empty());
}

#[test]
fn edit_without_snapshot_keeps_summary() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        record_mut(snapshot, chart.mid).name = "Bruno Lima".to_string();
    });
    service.edit_version(draft.id, &patch).unwrap();

    let renamed = service
        .edit_version(
            draft.id,
            &VersionPatch {
                name: Some("Reorg final".to_string()),
                description: Some(Some("aprovada em comite".to_string())),
                ..VersionPatch::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Reorg final");
    assert_eq!(renamed.description.as_deref(), Some("aprovada em comite"));
    assert_eq!(renamed.changes_summary.total_changes, 1);
    assert_eq!(renamed.changes_summary.data_changes[0].employee_name, "Bruno Lima");
}

#[test]
fn approve_replays_snapshot_onto_live_rows() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Reorg", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        let leaf = record_mut(snapshot, chart.leaf);
        leaf.supervisor_id = Some(chart.root);
        leaf.name = "Carla Souza".to_string();
        snapshot.push(EmployeeSnapshot {
            id: 9_999,
            ..snapshot[0].clone()
        });
    });
    service.edit_version(draft.id, &patch).unwrap();

    let approved = service.approve_version(draft.id).unwrap();
    assert_eq!(approved.status, VersionStatus::Approved);
    assert!(approved.approved_at.is_some());

    let hierarchy = HierarchyService::try_new(&conn).unwrap();
    let leaf = hierarchy.get_employee(chart.leaf).unwrap();
    assert_eq!(leaf.supervisor_id, Some(chart.root));
    assert_eq!(leaf.name, "Carla Souza");
    assert!(hierarchy.get_employee(9_999).is_err());
    assert_eq!(hierarchy.verify_hierarchy().unwrap(), None);

    let err = service.approve_version(draft.id).unwrap_err();
    assert!(matches!(
        err,
        VersionError::InvalidTransition {
            status: VersionStatus::Approved,
            action: VersionAction::Approve,
            ..
        }
    ));
}

#[test]
fn approve_rejects_cyclic_snapshot_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let chart = seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let draft = service.create_version("Ciclo", None).unwrap();

    let patch = edited_snapshot(&service, draft.id, |snapshot| {
        record_mut(snapshot, chart.root).supervisor_id = Some(chart.leaf);
        record_mut(snapshot, chart.mid).name = "Renomeado".to_string();
    });
    service.edit_version(draft.id, &patch).unwrap();

    let err = service.approve_version(draft.id).unwrap_err();
    match err {
        VersionError::ReplayWouldCreateCycle { version_id, cycle } => {
            assert_eq!(version_id, draft.id);
            assert_eq!(cycle.len(), 3);
            assert!(cycle.contains(&chart.root));
        }
        other => panic!("unexpected error: {other}"),
    }

    let hierarchy = HierarchyService::try_new(&conn).unwrap();
    assert_eq!(hierarchy.get_employee(chart.root).unwrap().supervisor_id, None);
    assert_eq!(hierarchy.get_employee(chart.mid).unwrap().name, "Bruno");
    assert_eq!(
        service.get_version(draft.id).unwrap().status,
        VersionStatus::Draft
    );
}

#[test]
fn only_drafts_move_through_the_workflow() {
    let conn = open_db_in_memory().unwrap();
    seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();

    let archived = service.create_version("Antiga", None).unwrap();
    let archived = service.archive_version(archived.id).unwrap();
    assert_eq!(archived.status, VersionStatus::Archived);
    assert_eq!(archived.approved_at, None);

    for err in [
        service
            .edit_version(archived.id, &VersionPatch::default())
            .unwrap_err(),
        service.approve_version(archived.id).unwrap_err(),
        service.archive_version(archived.id).unwrap_err(),
        service.delete_version(archived.id).unwrap_err(),
    ] {
        assert!(matches!(
            err,
            VersionError::InvalidTransition {
                status: VersionStatus::Archived,
                ..
            }
        ));
    }

    let draft = service.create_version("Descartavel", None).unwrap();
    service.delete_version(draft.id).unwrap();
    assert!(matches!(
        service.get_version(draft.id).unwrap_err(),
        VersionError::NotFound(_)
    ));
    assert!(matches!(
        service.delete_version(draft.id).unwrap_err(),
        VersionError::NotFound(_)
    ));

    let listed = service.list_versions().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, archived.id);
    assert_eq!(listed[0].changes_count, 0);
}

#[test]
fn approved_version_rejects_archive_delete_and_edit() {
    let conn = open_db_in_memory().unwrap();
    seed_chart(&conn);
    let service = VersionService::try_new(&conn).unwrap();
    let version = service.create_version("Oficial", None).unwrap();
    service.approve_version(version.id).unwrap();

    let attempts = [
        (
            VersionAction::Edit,
            service
                .edit_version(version.id, &VersionPatch::default())
                .unwrap_err(),
        ),
        (
            VersionAction::Archive,
            service.archive_version(version.id).unwrap_err(),
        ),
        (
            VersionAction::Delete,
            service.delete_version(version.id).unwrap_err(),
        ),
    ];
    for (expected, err) in attempts {
        assert!(
            matches!(
                err,
                VersionError::InvalidTransition {
                    status: VersionStatus::Approved,
                    action,
                    ..
                } if action == expected
            ),
            "{expected:?}"
        );
    }
    assert_eq!(
        service.get_version(version.id).unwrap().status,
        VersionStatus::Approved
    );
}
