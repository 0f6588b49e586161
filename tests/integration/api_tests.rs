use chrono::{Duration, Utc};
use circulation_server::models::member::Role;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::common::{librarian_token, token, TestServer};

async fn check_out(srv: &TestServer, bearer: &str, body: Value) -> reqwest::Response {
    srv.client
        .post(srv.url("/loans"))
        .bearer_auth(bearer)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn check_in(srv: &TestServer, bearer: &str, loan_id: i64) -> reqwest::Response {
    srv.client
        .post(srv.url(&format!("/loans/{}/return", loan_id)))
        .bearer_auth(bearer)
        .send()
        .await
        .unwrap()
}

async fn get_json(srv: &TestServer, bearer: &str, path: &str) -> Value {
    let res = srv.client.get(srv.url(path)).bearer_auth(bearer).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK, "GET {}", path);
    res.json().await.unwrap()
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_is_public_but_catalog_requires_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let ready = get_json(&srv, &librarian_token(), "/ready").await;
    assert_eq!(ready["storage"], "memory");

    let res = srv.client.get(srv.url("/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/items"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_last_copy_goes_to_one_borrower_only() {
    let srv = TestServer::spawn().await;
    let item = srv.create_item("isbn-last", 1).await;
    let item_id = item["id"].as_i64().unwrap();
    assert_eq!(item["available_copies"], 1);

    let ann = srv.register("Ann", "ann@example.org", "member").await;
    let bob = srv.register("Bob", "bob@example.org", "member").await;

    let res = check_out(&srv, &token(ann, Role::Member), json!({ "item_id": item_id })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["loan"]["borrower_id"], ann);
    assert_eq!(body["loan"]["status"], "active");
    assert!(body["loan"]["returned_at"].is_null());
    assert!(body["message"].as_str().unwrap().starts_with("Item borrowed successfully"));
    let loan_id = body["loan"]["id"].as_i64().unwrap();

    let res = check_out(&srv, &token(bob, Role::Member), json!({ "item_id": item_id })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "ItemNotAvailable");

    let item = get_json(&srv, &librarian_token(), &format!("/items/{}", item_id)).await;
    assert_eq!(item["available_copies"], 0);

    let res = check_in(&srv, &librarian_token(), loan_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["loan"]["status"], "returned");
    assert!(body["loan"]["returned_at"].is_string());

    let res = check_in(&srv, &librarian_token(), loan_id).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "AlreadyReturned");

    let item = get_json(&srv, &librarian_token(), &format!("/items/{}", item_id)).await;
    assert_eq!(item["available_copies"], 1);

    let res = check_out(&srv, &token(bob, Role::Member), json!({ "item_id": item_id })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_concurrent_check_outs_never_oversell() {
    let srv = TestServer::spawn().await;
    let item = srv.create_item("isbn-race", 3).await;
    let item_id = item["id"].as_i64().unwrap();
    let borrower = srv.register("Racer", "racer@example.org", "member").await;

    let mut requests = Vec::new();
    for _ in 0..8 {
        let client = srv.client.clone();
        let url = srv.url("/loans");
        let bearer = librarian_token();
        requests.push(tokio::spawn(async move {
            client
                .post(url)
                .bearer_auth(bearer)
                .json(&json!({ "item_id": item_id, "borrower_id": borrower }))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let mut created = 0;
    let mut refused = 0;
    for request in requests {
        match request.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => refused += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 3);
    assert_eq!(refused, 5);

    let item = get_json(&srv, &librarian_token(), &format!("/items/{}", item_id)).await;
    assert_eq!(item["available_copies"], 0);
}

#[tokio::test]
async fn test_role_gates() {
    let srv = TestServer::spawn().await;
    let item = srv.create_item("isbn-gate", 2).await;
    let item_id = item["id"].as_i64().unwrap();
    let ann = srv.register("Ann", "ann@example.org", "member").await;
    let bob = srv.register("Bob", "bob@example.org", "member").await;
    let ann_token = token(ann, Role::Member);

    // Members borrow only for themselves
    let res = check_out(&srv, &ann_token, json!({ "item_id": item_id, "borrower_id": bob })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = check_out(&srv, &librarian_token(), json!({ "item_id": item_id, "borrower_id": bob })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let bob_loan: Value = res.json().await.unwrap();
    let bob_loan_id = bob_loan["loan"]["id"].as_i64().unwrap();

    // Check-in is a librarian operation
    let res = check_in(&srv, &ann_token, bob_loan_id).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Another borrower's loans stay private
    let res = srv
        .client
        .get(srv.url(&format!("/loans/{}", bob_loan_id)))
        .bearer_auth(&ann_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .get(srv.url(&format!("/loans?borrower_id={}", bob)))
        .bearer_auth(&ann_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let own = get_json(&srv, &ann_token, "/loans").await;
    assert!(own.as_array().unwrap().is_empty());

    for path in ["/members", "/members/overdue", "/stats"] {
        let res = srv.client.get(srv.url(path)).bearer_auth(&ann_token).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "GET {}", path);
    }

    let res = srv
        .client
        .post(srv.url("/items"))
        .bearer_auth(&ann_token)
        .json(&json!({ "title": "T", "author": "A", "identifier": "x", "total_copies": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_item_reports_every_field() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/items"))
        .bearer_auth(librarian_token())
        .json(&json!({
            "title": "  ",
            "author": "Someone",
            "identifier": "isbn-bad",
            "total_copies": -1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "BadValue");
    let fields: Vec<&str> = err["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"total_copies"));

    let res = srv
        .client
        .post(srv.url("/items"))
        .bearer_auth(librarian_token())
        .json(&json!({
            "title": "Emma",
            "author": "Jane Austen",
            "identifier": "isbn-emma",
            "total_copies": 2,
            "available_copies": 3,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["details"][0]["field"], "available_copies");

    srv.create_item("isbn-dup", 1).await;
    let res = srv
        .client
        .post(srv.url("/items"))
        .bearer_auth(librarian_token())
        .json(&json!({ "title": "T", "author": "A", "identifier": "ISBN-DUP", "total_copies": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_item_and_borrower_are_not_found() {
    let srv = TestServer::spawn().await;
    let item = srv.create_item("isbn-nf", 1).await;
    let borrower = srv.register("Ann", "ann@example.org", "member").await;

    let res = check_out(&srv, &librarian_token(), json!({ "item_id": 4242, "borrower_id": borrower })).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = check_out(&srv, &librarian_token(), json!({ "item_id": item["id"], "borrower_id": 4242 })).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = check_in(&srv, &librarian_token(), 4242).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let item = get_json(&srv, &librarian_token(), &format!("/items/{}", item["id"])).await;
    assert_eq!(item["available_copies"], 1);
}

#[tokio::test]
async fn test_search_and_item_filters() {
    let srv = TestServer::spawn().await;
    let lent = srv.create_item("isbn-lent", 1).await;
    let shelf = srv.create_item("isbn-shelf", 2).await;
    let borrower = srv.register("Ann", "ann@example.org", "member").await;

    let due_today = Utc::now().date_naive().and_hms_opt(23, 59, 59).unwrap().and_utc();
    let res = check_out(
        &srv,
        &librarian_token(),
        json!({ "item_id": lent["id"], "borrower_id": borrower, "due_at": due_today }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let lib = librarian_token();
    assert_eq!(ids(&get_json(&srv, &lib, "/items?filter=available").await), vec![shelf["id"].as_i64().unwrap()]);
    assert_eq!(ids(&get_json(&srv, &lib, "/items?filter=borrowed").await), vec![lent["id"].as_i64().unwrap()]);
    assert_eq!(ids(&get_json(&srv, &lib, "/items?filter=due_today").await), vec![lent["id"].as_i64().unwrap()]);

    let found = get_json(&srv, &lib, "/items?search=TITLE%20ISBN-SH").await;
    assert_eq!(ids(&found), vec![shelf["id"].as_i64().unwrap()]);
    assert_eq!(get_json(&srv, &lib, "/items?search=austen").await.as_array().unwrap().len(), 2);
    assert!(get_json(&srv, &lib, "/items?search=tolstoy").await.as_array().unwrap().is_empty());

    let loans = get_json(&srv, &lib, "/loans?filter=due_today").await;
    assert_eq!(loans.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_overdue_loans_grouped_by_borrower() {
    let srv = TestServer::spawn().await;
    let first = srv.create_item("isbn-od-1", 1).await;
    let second = srv.create_item("isbn-od-2", 1).await;
    let third = srv.create_item("isbn-od-3", 1).await;
    let late = srv.register("Late", "late@example.org", "member").await;
    let punctual = srv.register("Punctual", "punctual@example.org", "member").await;
    let lib = librarian_token();

    let past = Utc::now() - Duration::days(3);
    for item in [&first, &second] {
        let res = check_out(&srv, &lib, json!({ "item_id": item["id"], "borrower_id": late, "due_at": past })).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    let res = check_out(&srv, &lib, json!({ "item_id": third["id"], "borrower_id": punctual })).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let overdue = get_json(&srv, &lib, "/loans?filter=overdue").await;
    assert_eq!(overdue.as_array().unwrap().len(), 2);
    assert!(overdue.as_array().unwrap().iter().all(|l| l["status"] == "overdue"));

    let grouped = get_json(&srv, &lib, "/members/overdue").await;
    let grouped = grouped.as_array().unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0]["borrower"]["id"], late);
    assert_eq!(grouped[0]["loans"].as_array().unwrap().len(), 2);

    let late_view = get_json(&srv, &token(late, Role::Member), "/loans?filter=overdue").await;
    assert_eq!(late_view.as_array().unwrap().len(), 2);

    let stats = get_json(&srv, &lib, "/stats").await;
    assert_eq!(stats["items"], 3);
    assert_eq!(stats["active_loans"], 3);
    assert_eq!(stats["overdue_loans"], 2);
    assert_eq!(stats["available_copies"], 0);
}

#[tokio::test]
async fn test_update_and_delete_respect_loans() {
    let srv = TestServer::spawn().await;
    let item = srv.create_item("isbn-edit", 2).await;
    let item_id = item["id"].as_i64().unwrap();
    let borrower = srv.register("Ann", "ann@example.org", "member").await;
    let lib = librarian_token();

    let res = check_out(&srv, &lib, json!({ "item_id": item_id, "borrower_id": borrower })).await;
    let loan: Value = res.json().await.unwrap();
    let loan_id = loan["loan"]["id"].as_i64().unwrap();

    let res = srv
        .client
        .put(srv.url(&format!("/items/{}", item_id)))
        .bearer_auth(&lib)
        .json(&json!({ "title": "Persuasion" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "Persuasion");
    assert_eq!(updated["available_copies"], 1);

    let res = srv
        .client
        .put(srv.url(&format!("/items/{}", item_id)))
        .bearer_auth(&lib)
        .json(&json!({ "total_copies": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv.client.delete(srv.url(&format!("/items/{}", item_id))).bearer_auth(&lib).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    assert_eq!(check_in(&srv, &lib, loan_id).await.status(), StatusCode::OK);

    let res = srv.client.delete(srv.url(&format!("/items/{}", item_id))).bearer_auth(&lib).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = srv.client.get(srv.url(&format!("/items/{}", item_id))).bearer_auth(&lib).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_active_holders_of_one_item() {
    let srv = TestServer::spawn().await;
    let wanted = srv.create_item("isbn-holders", 3).await;
    let other = srv.create_item("isbn-other", 1).await;
    let ann = srv.register("Ann", "ann@example.org", "member").await;
    let bob = srv.register("Bob", "bob@example.org", "member").await;
    let lib = librarian_token();

    let mut ann_loan = 0;
    for borrower in [ann, bob] {
        let res = check_out(&srv, &lib, json!({ "item_id": wanted["id"], "borrower_id": borrower })).await;
        let body: Value = res.json().await.unwrap();
        if borrower == ann {
            ann_loan = body["loan"]["id"].as_i64().unwrap();
        }
    }
    let res = check_out(&srv, &lib, json!({ "item_id": other["id"], "borrower_id": ann })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(check_in(&srv, &lib, ann_loan).await.status(), StatusCode::OK);

    let path = format!("/loans?item_id={}&filter=active", wanted["id"]);
    let holders = get_json(&srv, &lib, &path).await;
    let holders = holders.as_array().unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0]["borrower_id"], bob);
    assert_eq!(holders[0]["item_id"], wanted["id"]);

    let all = get_json(&srv, &lib, &format!("/loans?item_id={}", wanted["id"])).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let res = srv
        .client
        .get(srv.url(&path))
        .bearer_auth(token(bob, Role::Member))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_input_uses_error_body() {
    let srv = TestServer::spawn().await;
    let lib = librarian_token();

    let res = srv
        .client
        .get(srv.url("/items?filter=bogus"))
        .bearer_auth(&lib)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "BadValue");
    assert_eq!(err["details"][0]["field"], "query");

    let res = srv
        .client
        .post(srv.url("/items"))
        .bearer_auth(&lib)
        .json(&json!({ "title": "Emma", "author": "Jane Austen", "identifier": "isbn-emma" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "BadValue");
    assert_eq!(err["details"][0]["field"], "total_copies");

    let res = srv
        .client
        .post(srv.url("/loans"))
        .bearer_auth(&lib)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "BadValue");
}
