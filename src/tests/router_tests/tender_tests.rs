use crate::tests::utils::{body_json, counting_app, test_app, TestApp};
use http::Method;
use serde_json::{json, Value};

fn form(ifb: &str, title: &str, deadline: &str) -> Value {
    json!({
        "ifb_no": ifb,
        "title": title,
        "organization": "Ward 5 Office",
        "deadline": deadline,
        "procurement_type": "services ncb",
        "notice_date": "2025-01-05",
        "province": "Bagmati",
        "source": "Manual",
    })
}

fn create(app: &TestApp, ifb: &str, title: &str, deadline: &str) -> Value {
    let resp = app.post("/tenders", &form(ifb, title, deadline));
    assert_eq!(resp.status(), 201);
    body_json(resp)
}

#[test]
fn health_reports_ok() {
    let app = test_app();
    let resp = app.get("/health");
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["status"], "ok");
}

#[test]
fn unknown_route_is_json_not_found() {
    let app = test_app();
    let resp = app.get("/nope");
    assert_eq!(resp.status(), 404);
    assert_eq!(body_json(resp)["error"], "not_found");
}

#[test]
fn manual_entry_is_listed_with_days_left() {
    let app = test_app();
    let created = create(&app, "IFB/1", "Hall design", "2099-01-10");
    assert_eq!(created["source"], "Manual");
    assert_eq!(created["marked_relevant"], false);

    let list = body_json(app.get("/tenders"));
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["ifb_no"], "IFB/1");
    assert!(list[0]["days_left"].as_i64().unwrap() > 0);
}

#[test]
fn invalid_form_is_rejected_without_touching_the_store() {
    let (app, store) = counting_app();
    let resp = app.post("/tenders", &json!({ "title": "  " }));
    assert_eq!(resp.status(), 422);

    let body = body_json(resp);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["fields"]["ifb_no"], "IFB No is required");
    assert_eq!(body["fields"]["title"], "Title is required");
    assert_eq!(body["fields"]["organization"], "Organization is required");
    assert_eq!(body["fields"]["deadline"], "Deadline is required");
    assert_eq!(body["fields"]["notice_date"], "Notice date is required");
    assert_eq!(store.calls(), 0);
}

#[test]
fn duplicate_ifb_is_a_field_error() {
    let app = test_app();
    create(&app, "IFB/9", "Hall design", "2099-01-10");

    let resp = app.post("/tenders", &form("IFB/9", "Another hall", "2099-02-10"));
    assert_eq!(resp.status(), 422);
    assert_eq!(
        body_json(resp)["fields"]["ifb_no"],
        "This IFB No already exists in the database"
    );
}

#[test]
fn duplicate_check_covers_records_not_yet_loaded() {
    let app = test_app();
    let first = app.post("/tenders", &form("IFB/3", "School design", "2099-01-10"));
    assert_eq!(first.status(), 201);
    // the collection forgets it; the store still has it
    app.state.collection().unwrap().clear();

    let resp = app.post("/tenders", &form("IFB/3", "School design", "2099-01-10"));
    assert_eq!(resp.status(), 422);
}

#[test]
fn query_filters_narrow_the_listing() {
    let app = test_app();
    create(&app, "KMC/1", "Community hall design", "2099-01-10");
    create(&app, "KMC/2", "School block design", "2099-02-10");
    create(&app, "PKR/3", "Hospital master plan", "2099-03-10");

    let list = body_json(app.get("/tenders?keyword=HALL"));
    assert_eq!(list.as_array().unwrap().len(), 1);

    let list = body_json(app.get("/tenders?keyword=kmc"));
    assert_eq!(list.as_array().unwrap().len(), 2);

    let list = body_json(app.get("/tenders?date_from=2099-02-01&date_to=2099-03-10"));
    let ifbs: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["ifb_no"].as_str().unwrap())
        .collect();
    assert_eq!(ifbs, vec!["KMC/2", "PKR/3"]);

    let list = body_json(app.get("/tenders?province=Gandaki"));
    assert!(list.as_array().unwrap().is_empty());

    let resp = app.get("/tenders?province=Atlantis");
    assert_eq!(resp.status(), 400);
}

#[test]
fn marking_relevant_changes_the_relevant_listing() {
    let app = test_app();
    let a = create(&app, "A/1", "Hall design", "2099-01-10");
    create(&app, "A/2", "School design", "2099-01-11");

    let uri = format!("/tenders/{}/relevant", a["id"].as_str().unwrap());
    let resp = app.post(&uri, &json!({ "marked": true }));
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp)["marked_relevant"], true);

    let list = body_json(app.get("/tenders?relevant=true"));
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["ifb_no"], "A/1");

    let stats = body_json(app.get("/stats?mode=relevant"));
    assert_eq!(stats["total_tenders"], 1);
}

#[test]
fn patch_updates_fields_and_rejects_empty_patches() {
    let app = test_app();
    let a = create(&app, "P/1", "Hall design", "2099-01-10");
    let uri = format!("/tenders/{}", a["id"].as_str().unwrap());

    let resp = app.send(Method::PATCH, &uri, r#"{"title":"Hall design phase 2","province":null}"#);
    assert_eq!(resp.status(), 200);
    let updated = body_json(resp);
    assert_eq!(updated["title"], "Hall design phase 2");
    assert_eq!(updated["province"], Value::Null);

    let resp = app.send(Method::PATCH, &uri, "{}");
    assert_eq!(resp.status(), 400);

    let fetched = body_json(app.get(&uri));
    assert_eq!(fetched["title"], "Hall design phase 2");
    assert_eq!(app.get("/tenders/missing").status(), 404);
}

#[test]
fn missing_record_is_not_found_and_noted() {
    let app = test_app();
    let resp = app.send(Method::PATCH, "/tenders/missing", r#"{"title":"x"}"#);
    assert_eq!(resp.status(), 404);
    assert!(app.state.collection().unwrap().last_error().is_some());
}

#[test]
fn malformed_json_is_a_bad_request() {
    let app = test_app();
    let resp = app.send(Method::POST, "/tenders", "{not json");
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp)["error"], "bad_request");
}

#[test]
fn delete_many_then_delete_all() {
    let app = test_app();
    let a = create(&app, "D/1", "Hall design", "2099-01-10");
    create(&app, "D/2", "School design", "2099-01-11");
    create(&app, "D/3", "Office design", "2099-01-12");

    let resp = app.post("/tenders/delete", &json!({ "ids": [a["id"]] }));
    assert_eq!(body_json(resp)["deleted"], 1);
    assert_eq!(app.state.collection().unwrap().records().len(), 2);

    let resp = app.post("/tenders/delete", &json!({ "ids": [] }));
    assert_eq!(resp.status(), 400);

    let resp = app.send(Method::DELETE, "/tenders", "");
    assert_eq!(body_json(resp)["deleted"], 2);
    assert!(body_json(app.get("/tenders")).as_array().unwrap().is_empty());
}

#[test]
fn stats_summarize_the_store() {
    let app = test_app();
    create(&app, "S/1", "Hall design", "2099-01-10");
    create(&app, "S/2", "Hall survey", "2099-01-11");

    let stats = body_json(app.get("/stats"));
    assert_eq!(stats["total_tenders"], 2);
    assert_eq!(stats["relevant_tenders"], 0);
    assert_eq!(stats["keyword_counts"][0]["keyword"], "hall");
    assert_eq!(stats["keyword_counts"][0]["count"], 2);
    assert_eq!(stats["relevant_percentage"], 0);
    assert_eq!(stats["bucket_totals"][4]["bucket"], "30+ days");
    assert_eq!(stats["bucket_totals"][4]["count"], 2);

    assert_eq!(app.get("/stats?mode=weekly").status(), 400);
}
