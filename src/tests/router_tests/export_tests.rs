use crate::tests::utils::{body_json, body_string, header, test_app, TestApp};
use serde_json::{json, Value};

fn seed(app: &TestApp) -> Vec<Value> {
    let rows = [
        ("X/1", "Community hall design", "Ward Office, Pokhara", "2099-01-10"),
        ("X/2", "School block design", "Education Office", "2099-02-10"),
        ("X/3", "Hospital master plan", "Health Office", "2099-03-10"),
    ];
    rows.iter()
        .map(|(ifb, title, org, deadline)| {
            let resp = app.post(
                "/tenders",
                &json!({
                    "ifb_no": ifb,
                    "title": title,
                    "organization": org,
                    "deadline": deadline,
                    "procurement_type": "works",
                    "notice_date": "2025-01-05",
                    "province": "Gandaki",
                }),
            );
            assert_eq!(resp.status(), 201);
            body_json(resp)
        })
        .collect()
}

fn mark(app: &TestApp, t: &Value) {
    let uri = format!("/tenders/{}/relevant", t["id"].as_str().unwrap());
    assert_eq!(app.post(&uri, &json!({ "marked": true })).status(), 200);
}

#[test]
fn csv_defaults_to_relevant_records_and_default_columns() {
    let app = test_app();
    let seeded = seed(&app);
    mark(&app, &seeded[0]);

    let resp = app.get("/export/csv");
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "Content-Type").starts_with("text/csv"));
    let disposition = header(&resp, "Content-Disposition");
    assert!(disposition.starts_with("attachment; filename=\"tenders_export_"));
    assert!(disposition.ends_with(".csv\""));

    let text = body_string(resp);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "ifb_no,title,organization,deadline,days_left,procurement_type,notice_date,province,source"
    );
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("X/1,Community hall design,\"Ward Office, Pokhara\",2099-01-10T00:00:00.000Z,"));
    assert!(lines[1].ends_with(",works,2025-01-05T00:00:00.000Z,Gandaki,Manual"));
}

#[test]
fn csv_scope_columns_sort_and_summary_come_from_the_query() {
    let app = test_app();
    seed(&app);

    let resp = app.get("/export/csv?scope=all&columns=ifb_no,organization&sort_by=organization&include_summary=true");
    assert_eq!(resp.status(), 200);
    let text = body_string(resp);
    assert!(text.starts_with(
        "ifb_no,organization\nX/2,Education Office\nX/3,Health Office\nX/1,\"Ward Office, Pokhara\"\n\n\
         Summary\nTotal Tenders,3\nRelevant Tenders,0\nUrgent Tenders,0\nAverage Days Left,"
    ));
}

#[test]
fn filtered_and_selected_scopes() {
    let app = test_app();
    let seeded = seed(&app);

    let text = body_string(app.get("/export/csv?scope=filtered&keyword=school&columns=ifb_no"));
    assert_eq!(text, "ifb_no\nX/2");

    let uri = format!(
        "/export/csv?ids={},{}&columns=ifb_no",
        seeded[2]["id"].as_str().unwrap(),
        seeded[0]["id"].as_str().unwrap()
    );
    let text = body_string(app.get(&uri));
    assert_eq!(text, "ifb_no\nX/1\nX/3");
}

#[test]
fn export_preconditions_are_bad_requests() {
    let app = test_app();
    seed(&app);

    // nothing marked relevant
    let resp = app.get("/export/csv");
    assert_eq!(resp.status(), 400);
    let body = body_json(resp);
    assert_eq!(body["error"], "export");
    assert_eq!(body["message"], "Export failed: No tenders to export");

    let resp = app.get("/export/csv?scope=all&columns=");
    assert_eq!(resp.status(), 400);
    assert_eq!(
        body_json(resp)["message"],
        "Export failed: Please select at least one column"
    );

    assert_eq!(app.get("/export/xlsx?scope=all&columns=").status(), 400);
    assert_eq!(app.get("/export/csv?scope=everything").status(), 400);
    assert_eq!(app.get("/export/csv?scope=all&columns=colour").status(), 400);
}

#[test]
fn xlsx_download_is_a_workbook() {
    let app = test_app();
    seed(&app);

    let resp = app.get("/export/xlsx?scope=all");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        header(&resp, "Content-Type"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert!(header(&resp, "Content-Disposition").ends_with(".xlsx\""));
}

#[test]
fn backup_round_trips_through_import() {
    let app = test_app();
    let seeded = seed(&app);
    mark(&app, &seeded[1]);

    let resp = app.get("/export/backup");
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "Content-Disposition").contains("tender_backup_"));
    let text = body_string(resp);
    let backup: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(backup["total_tenders"], 3);
    assert_eq!(backup["relevant_tenders"], 1);

    // everything is already present
    let resp = app.send(http::Method::POST, "/import/backup", &text);
    assert_eq!(body_json(resp), json!({ "imported": 0, "skipped": 3 }));

    let resp = app.send(http::Method::DELETE, "/tenders", "");
    assert_eq!(resp.status(), 200);
    let resp = app.send(http::Method::POST, "/import/backup", &text);
    assert_eq!(body_json(resp), json!({ "imported": 3, "skipped": 0 }));

    // ids, timestamps and every other field come back as exported
    let restored = body_json(app.get("/tenders"));
    let restored = restored.as_array().unwrap();
    let exported = backup["tenders"].as_array().unwrap();
    assert_eq!(restored.len(), exported.len());
    for (got, want) in restored.iter().zip(exported) {
        assert_eq!(got, want, "restored {}", want["ifb_no"]);
    }
    assert_eq!(restored[0]["id"], seeded[0]["id"]);

    let list = body_json(app.get("/tenders?relevant=true"));
    assert_eq!(list.as_array().unwrap()[0]["ifb_no"], "X/2");

    let resp = app.send(http::Method::POST, "/import/backup", "[]");
    assert_eq!(resp.status(), 400);
}

#[test]
fn import_skips_ifb_numbers_that_differ_only_by_padding() {
    let app = test_app();
    seed(&app);
    let text = body_string(app.get("/export/backup"));
    let mut backup: Value = serde_json::from_str(&text).unwrap();
    backup["tenders"][0]["id"] = json!("fresh-id");
    backup["tenders"][0]["ifb_no"] = json!("  X/1 ");
    backup["tenders"].as_array_mut().unwrap().truncate(1);

    let resp = app.send(http::Method::POST, "/import/backup", &backup.to_string());
    assert_eq!(body_json(resp), json!({ "imported": 0, "skipped": 1 }));
}

#[test]
fn empty_store_has_no_backup() {
    let app = test_app();
    assert_eq!(app.get("/export/backup").status(), 400);
}

#[test]
fn stats_report_download() {
    let app = test_app();
    seed(&app);

    let resp = app.get("/export/stats?mode=all");
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "Content-Type").starts_with("text/plain"));
    assert!(header(&resp, "Content-Disposition").contains("tender_statistics_"));

    let text = body_string(resp);
    assert!(text.starts_with("TENDER MANAGEMENT STATISTICS\n"));
    assert!(text.contains("\nMode: All Tenders\n"));
    assert!(text.contains("\nTotal Tenders: 3\n"));
    assert!(text.contains("\nPROVINCES\nGandaki: 3\n"));
}
