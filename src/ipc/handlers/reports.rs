use crate::calc;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn load_snapshots(
    conn: &Connection,
    req: &Request,
) -> Result<(Vec<calc::ResultRecord>, Vec<calc::Account>), serde_json::Value> {
    let records = db::result_list_all(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let accounts = db::account_list_all(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok((records, accounts))
}

fn handle_leaderboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let language = match required_str(req, "language") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let (records, accounts) = match load_snapshots(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rows = calc::build_leaderboard(&records, &accounts, &language);
    ok(&req.id, json!({ "language": language, "rows": rows }))
}

fn handle_overall(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (records, accounts) = match load_snapshots(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let students = calc::build_overall_standings(&records, &accounts);
    ok(&req.id, json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "leaderboard.get" => Some(handle_leaderboard(state, req)),
        "overall.get" => Some(handle_overall(state, req)),
        _ => None,
    }
}
