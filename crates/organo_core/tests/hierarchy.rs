use organo_core::db::open_db_in_memory;
use organo_core::repo::employee_repo::EmployeeListQuery;
use organo_core::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use organo_core::{EmployeePatch, HierarchyError, HierarchyService, NewEmployee};
use rusqlite::Connection;

struct Org {
    engineering: i64,
    commercial: i64,
    director: i64,
    manager: i64,
    structures: i64,
}

fn seed_org(conn: &Connection) -> Org {
    let org = SqliteOrgRepository::try_new(conn).unwrap();
    let engineering = org.create_sector("ENG", "Engenharia", None).unwrap().id;
    let commercial = org.create_sector("COM", "Comercial", None).unwrap().id;
    let director = org.create_level(1, "Diretoria", 1).unwrap().id;
    let manager = org.create_level(2, "Gerencia", 2).unwrap().id;
    let structures = org.create_sub_sector(engineering, "Estruturas").unwrap().id;
    Org {
        engineering,
        commercial,
        director,
        manager,
        structures,
    }
}

// 1 <- 2 <- 3, 1 <- 4
fn seed_chain(service: &HierarchyService<'_>, org: &Org) -> [i64; 4] {
    let root = service
        .create_employee(&NewEmployee::new("Ana", "Diretora", org.engineering, org.director))
        .unwrap()
        .id;
    let mid = service
        .create_employee(
            &NewEmployee::new("Bruno", "Gerente", org.engineering, org.manager).with_supervisor(root),
        )
        .unwrap()
        .id;
    let leaf = service
        .create_employee(
            &NewEmployee::new("Carla", "Engenheira", org.engineering, org.manager)
                .with_supervisor(mid),
        )
        .unwrap()
        .id;
    let side = service
        .create_employee(
            &NewEmployee::new("Davi", "Vendedor", org.commercial, org.manager).with_supervisor(root),
        )
        .unwrap()
        .id;
    [root, mid, leaf, side]
}

#[test]
fn create_rejects_unknown_supervisor_and_sector() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();

    let err = service
        .create_employee(
            &NewEmployee::new("Ana", "Diretora", org.engineering, org.director).with_supervisor(42),
        )
        .unwrap_err();
    assert!(matches!(err, HierarchyError::SupervisorNotFound(42)));

    let err = service
        .create_employee(&NewEmployee::new("Ana", "Diretora", 999, org.director))
        .unwrap_err();
    assert!(matches!(err, HierarchyError::SectorNotFound(999)));
}

#[test]
fn self_supervision_is_rejected_as_cycle() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, ..] = seed_chain(&service, &org);

    let err = service.set_supervisor(root, Some(root)).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::CycleDetected {
            employee_id,
            supervisor_id,
        } if employee_id == root && supervisor_id == root
    ));
    assert_eq!(service.get_employee(root).unwrap().supervisor_id, None);
}

#[test]
fn moving_ancestor_under_descendant_is_rejected_and_leaves_state() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, mid, leaf, _] = seed_chain(&service, &org);

    assert!(service.would_create_cycle(root, Some(leaf)).unwrap());
    let err = service.set_supervisor(root, Some(leaf)).unwrap_err();
    assert!(matches!(err, HierarchyError::CycleDetected { .. }));
    let err = service.set_supervisor(mid, Some(leaf)).unwrap_err();
    assert!(matches!(err, HierarchyError::CycleDetected { .. }));

    assert_eq!(service.get_employee(root).unwrap().supervisor_id, None);
    assert_eq!(service.get_employee(mid).unwrap().supervisor_id, Some(root));
    assert_eq!(service.verify_hierarchy().unwrap(), None);
}

#[test]
fn lateral_move_and_clear_are_accepted() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, mid, leaf, side] = seed_chain(&service, &org);

    let moved = service.set_supervisor(leaf, Some(side)).unwrap();
    assert_eq!(moved.supervisor_id, Some(side));

    let cleared = service.set_supervisor(mid, None).unwrap();
    assert_eq!(cleared.supervisor_id, None);

    let reports: Vec<i64> = service
        .list_subordinates(root)
        .unwrap()
        .into_iter()
        .map(|employee| employee.id)
        .collect();
    assert_eq!(reports, vec![side]);
}

#[test]
fn update_validates_sub_sector_membership() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [_, _, _, side] = seed_chain(&service, &org);

    let patch = EmployeePatch {
        sub_sector_id: Some(Some(org.structures)),
        ..EmployeePatch::default()
    };
    let err = service.update_employee(side, &patch).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::SubSectorNotInSector { sector_id, .. } if sector_id == org.commercial
    ));

    let patch = EmployeePatch {
        sector_id: Some(org.engineering),
        sub_sector_id: Some(Some(org.structures)),
        ..EmployeePatch::default()
    };
    let updated = service.update_employee(side, &patch).unwrap();
    assert_eq!(updated.sector_id, org.engineering);
    assert_eq!(updated.sub_sector_id, Some(org.structures));
}

#[test]
fn update_rejects_invalid_email_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, ..] = seed_chain(&service, &org);

    let patch = EmployeePatch {
        name: Some("Ana Maria".to_string()),
        email: Some(Some("not-an-email".to_string())),
        ..EmployeePatch::default()
    };
    let err = service.update_employee(root, &patch).unwrap_err();
    assert!(matches!(err, HierarchyError::InvalidInput(_)));
    assert_eq!(service.get_employee(root).unwrap().name, "Ana");
}

#[test]
fn delete_is_blocked_while_reports_exist() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, _, leaf, _] = seed_chain(&service, &org);

    let err = service.delete_employee(root).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::HasSubordinates { count: 2, .. }
    ));

    service.delete_employee(leaf).unwrap();
    assert!(matches!(
        service.get_employee(leaf).unwrap_err(),
        HierarchyError::EmployeeNotFound(_)
    ));
}

#[test]
fn list_filters_by_sector() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [_, _, _, side] = seed_chain(&service, &org);

    let commercial = service
        .list_employees(&EmployeeListQuery {
            sector_id: Some(org.commercial),
            ..EmployeeListQuery::default()
        })
        .unwrap();
    assert_eq!(commercial.len(), 1);
    assert_eq!(commercial[0].id, side);
    assert_eq!(
        service
            .list_employees(&EmployeeListQuery::default())
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn verify_hierarchy_reports_stored_cycle() {
    let conn = open_db_in_memory().unwrap();
    let org = seed_org(&conn);
    let service = HierarchyService::try_new(&conn).unwrap();
    let [root, mid, ..] = seed_chain(&service, &org);

    conn.execute(
        "UPDATE employees SET supervisor_id = ?1 WHERE id = ?2;",
        [mid, root],
    )
    .unwrap();

    let cycle = service.verify_hierarchy().unwrap().unwrap();
    assert_eq!(cycle, vec![root, mid]);
}
