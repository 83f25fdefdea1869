use crate::calc::ResultRecord;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params.get(key).and_then(|v| v.as_f64()).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("missing numeric {}", key),
            None,
        )
    })
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let language = match required_str(req, "language") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Score and time are stored as given; range checks belong to the quiz
    // front end.
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let time_seconds = match required_f64(req, "timeSeconds") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut record = match db::result_find_by_username(conn, &username) {
        Ok(Some(r)) => r,
        Ok(None) => ResultRecord::new(username.clone()),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    record.apply_entry(&language, score, time_seconds);

    match db::result_save(conn, &record) {
        Ok(()) => ok(&req.id, json!({ "record": record })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::result_find_by_username(conn, &username) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.save" => Some(handle_save(state, req)),
        "results.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
