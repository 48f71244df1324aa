// This file is part of the terraform-provider-edge project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use terraform_provider_edge::connection::transport::TransportSettings;
use terraform_provider_edge::connection::ScdnClient;
use terraform_provider_edge::service::scdn_cache::{Business, CacheConf, CacheRuleRequest};
use terraform_provider_edge::service::scdn_cache_operate::CleanRequest;
use terraform_provider_edge::service::{ScdnCacheOperateService, ScdnCacheService};
use terraform_provider_edge::Error;

const DOMAIN: Business<'static> = Business {
    business_id: 12,
    business_type: "domain",
};

#[derive(Clone, Default)]
struct Mock {
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn start(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn client(addr: SocketAddr) -> ScdnClient {
    ScdnClient::new(TransportSettings {
        base_url: format!("http://{addr}/"),
        access_key: "ak".into(),
        secret_key: "sk".into(),
        timeout: Duration::from_secs(5),
        retry_count: 0,
    })
    .unwrap()
}

#[derive(Deserialize)]
struct BusinessQuery {
    business_id: i64,
    business_type: String,
    page: i64,
    page_size: i64,
}

async fn list_rules(Query(query): Query<BusinessQuery>) -> impl IntoResponse {
    if query.business_id != 12 || query.business_type != "domain" {
        return Json(json!({"status": {"code": 0, "message": "business does not exist"}}));
    }
    assert_eq!(query.page_size, 100);
    // Smaller pages than requested, the client must keep going until `total`
    let list = match query.page {
        1 => json!([
            {"id": 5, "name": "images", "expr": "$uri ~ \"\\.png$\"", "status": "on", "weight": 2,
             "conf": {"nocache": false, "cache_rule": {"cachetime": 3600}}},
            {"id": 9, "name": "api", "status": "off", "weight": 1, "conf": {"nocache": true}},
        ]),
        2 => json!([
            {"id": 11, "name": "fonts", "status": "on", "weight": 3, "conf": {"nocache": false}},
        ]),
        _ => json!([]),
    };
    Json(json!({
        "status": {"code": 1, "message": "success"},
        "data": {"total": 3, "list": list},
    }))
}

async fn add_rule(State(mock): State<Mock>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    mock.bodies.lock().unwrap().push(body);
    Json(json!({"status": {"code": 1, "message": "success"}, "data": {"id": 17}}))
}

async fn sort_rules(State(mock): State<Mock>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    mock.bodies.lock().unwrap().push(body);
    Json(json!({"status": {"code": 1, "message": "success"}}))
}

async fn delete_rule() -> impl IntoResponse {
    Json(json!({"status": {"code": 0, "message": "Rule does not exist"}}))
}

async fn clean(State(mock): State<Mock>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    mock.bodies.lock().unwrap().push(body);
    Json(json!({"status": {"code": 1, "message": "success"}, "data": {"task_id": "t-77"}}))
}

async fn task() -> impl IntoResponse {
    Json(json!({
        "status": {"code": 1, "message": "success"},
        "data": {"task_id": "t-77", "status": "completed", "progress": 100},
    }))
}

fn router(mock: Mock) -> Router {
    Router::new()
        .route("/api/v5/scdn/cache/rules", get(list_rules))
        .route("/api/v5/scdn/cache/rule", post(add_rule).delete(delete_rule))
        .route("/api/v5/scdn/cache/rules/sort", put(sort_rules))
        .route("/api/v5/scdn/cache/clean", post(clean))
        .route("/api/v5/scdn/cache/task", get(task))
        .with_state(mock)
}

#[tokio::test]
async fn rules_are_listed_and_found() {
    let addr = start(router(Mock::default())).await;
    let scdn = client(addr);
    let service = ScdnCacheService::new(&scdn);

    let rules = service.list_rules(DOMAIN).await.unwrap();
    let ids: Vec<_> = rules.iter().map(|rule| rule.id).collect();
    assert_eq!(ids, vec![5, 9, 11]);
    assert_eq!(service.get_rule(DOMAIN, 11).await.unwrap().name, "fonts");
    let rule = service.get_rule(DOMAIN, 5).await.unwrap();
    assert_eq!(rule.name, "images");
    assert_eq!(rule.conf.cache_rule.map(|c| c.cachetime), Some(3600));
    assert!(service.get_rule(DOMAIN, 6).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unknown_business_is_not_found() {
    let addr = start(router(Mock::default())).await;
    let scdn = client(addr);
    let err = ScdnCacheService::new(&scdn)
        .list_rules(Business {
            business_id: 3,
            business_type: "tpl",
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(ref message) if message == "business does not exist"));
}

#[tokio::test]
async fn rule_is_added_and_sorted() {
    let mock = Mock::default();
    let addr = start(router(mock.clone())).await;
    let scdn = client(addr);
    let service = ScdnCacheService::new(&scdn);

    let conf = CacheConf {
        nocache: true,
        ..Default::default()
    };
    let id = service
        .add_rule(&CacheRuleRequest {
            business: DOMAIN,
            id: None,
            name: "api",
            remark: "",
            expr: "$uri ~ \"^/api\"",
            conf: &conf,
        })
        .await
        .unwrap();
    assert_eq!(id, 17);
    service.sort_rules(DOMAIN, &[17, 5, 9]).await.unwrap();

    let bodies = mock.bodies.lock().unwrap();
    assert_eq!(bodies[0]["business_type"], "domain");
    assert_eq!(bodies[0]["conf"], json!({"nocache": true}));
    assert!(bodies[0].get("remark").is_none());
    assert_eq!(
        bodies[1],
        json!({"business_id": 12, "business_type": "domain", "ids": [17, 5, 9]})
    );
}

#[tokio::test]
async fn deleted_rule_is_not_found() {
    let addr = start(router(Mock::default())).await;
    let scdn = client(addr);
    let err = ScdnCacheService::new(&scdn)
        .delete_rule(DOMAIN, 5)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn clean_task_is_submitted() {
    let mock = Mock::default();
    let addr = start(router(mock.clone())).await;
    let scdn = client(addr);
    let service = ScdnCacheOperateService::new(&scdn);

    let dirs = vec!["https://www.example.com/static/".to_owned()];
    let task_id = service
        .clean(&CleanRequest {
            protocol: "https",
            wildcard: true,
            urls: &[],
            dirs: &dirs,
        })
        .await
        .unwrap();
    assert_eq!(task_id, "t-77");
    assert_eq!(
        mock.bodies.lock().unwrap()[0],
        json!({"protocol": "https", "wildcard": true, "dirs": ["https://www.example.com/static/"]})
    );

    let task = service.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, "completed");
    assert_eq!(task.progress, 100);
}
