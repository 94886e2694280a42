use crate::db::scrapes::{end_scrape_run, start_scrape_run, RunCounters};
use crate::tests::utils::{body_json, test_app};
use http::Method;
use serde_json::json;
use std::sync::atomic::Ordering;

#[test]
fn presets_save_list_and_delete() {
    let app = test_app();

    let resp = app.post(
        "/presets",
        &json!({ "name": "Urgent halls", "filter": { "keyword": "hall", "days_left_max": 5 } }),
    );
    assert_eq!(resp.status(), 201);
    let saved = body_json(resp);
    assert_eq!(saved["filter"]["keyword"], "hall");

    let dup = app.post("/presets", &json!({ "name": "Urgent halls" }));
    assert_eq!(dup.status(), 422);
    assert!(body_json(dup)["fields"]["name"].is_string());

    let list = body_json(app.get("/presets"));
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["filter"]["days_left_max"], 5);

    let uri = format!("/presets/{}", saved["id"].as_str().unwrap());
    assert_eq!(app.send(Method::DELETE, &uri, "").status(), 200);
    assert_eq!(app.send(Method::DELETE, &uri, "").status(), 404);
    assert!(body_json(app.get("/presets")).as_array().unwrap().is_empty());
}

#[test]
fn mutations_and_exports_are_audited_newest_first() {
    let app = test_app();
    let resp = app.post(
        "/tenders",
        &json!({
            "ifb_no": "AU/1",
            "title": "Hall design",
            "organization": "Ward Office",
            "deadline": "2099-01-10",
            "notice_date": "2025-01-05",
        }),
    );
    let created = body_json(resp);
    let uri = format!("/tenders/{}/relevant", created["id"].as_str().unwrap());
    app.post(&uri, &json!({ "marked": true }));
    assert_eq!(app.get("/export/csv").status(), 200);

    let entries = body_json(app.get("/audit"));
    let actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action_type"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["export_csv", "mark_relevant", "insert"]);
    assert_eq!(entries[0]["tender_count"], 1);
    assert_eq!(entries[2]["details"]["ifb_no"], "AU/1");

    let limited = body_json(app.get("/audit?limit=1"));
    assert_eq!(limited.as_array().unwrap().len(), 1);
    assert_eq!(app.get("/audit?limit=lots").status(), 400);
}

#[test]
fn committed_change_succeeds_when_audit_write_fails() {
    let app = test_app();
    app.db
        .with_conn(|conn| Ok(conn.execute("DROP TABLE audit_log", [])?))
        .unwrap();

    let resp = app.post(
        "/tenders",
        &json!({
            "ifb_no": "AU/2",
            "title": "Ward hall",
            "organization": "Ward Office",
            "deadline": "2099-01-10",
            "notice_date": "2025-01-05",
        }),
    );
    assert_eq!(resp.status(), 201);
    let listed = body_json(app.get("/tenders"));
    assert_eq!(listed[0]["ifb_no"], "AU/2");
}

#[test]
fn scrape_status_follows_recorded_runs() {
    let app = test_app();

    let status = body_json(app.get("/scrape/status"));
    assert_eq!(status["status"], "idle");
    assert_eq!(status["running"], false);

    let counters = RunCounters {
        pages_fetched: 1,
        tenders_found: 20,
        tenders_added: 2,
        duplicates_skipped: 10,
        non_relevant_skipped: 8,
    };
    app.db
        .with_conn(|conn| {
            let id = start_scrape_run(conn, "Bolpatra", 1_000)?;
            end_scrape_run(conn, id, 2_000, &counters, true, None)
        })
        .unwrap();

    let status = body_json(app.get("/scrape/status"));
    assert_eq!(status["status"], "completed");
    assert_eq!(status["last_run"]["tenders_added"], 2);

    let runs = body_json(app.get("/scrape/runs"));
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["success"], true);
}

#[test]
fn second_scrape_is_refused_while_one_runs() {
    let app = test_app();
    app.state.scrape_flag().store(true, Ordering::SeqCst);

    let resp = app.send(Method::POST, "/scrape", "");
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp)["message"], "Bad Request: A scrape is already running");
}
