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

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fullname = match required_str(req, "fullname") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_no = match required_str(req, "studentNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::account_username_taken(conn, &username) {
        Ok(true) => {
            return err(
                &req.id,
                "conflict",
                "username already registered",
                Some(json!({ "username": username })),
            )
        }
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let new = db::NewAccount {
        fullname,
        username,
        password,
        student_no,
        birth_date: optional_str(req, "birthDate"),
        source_of_truth: optional_str(req, "sourceOfTruth"),
    };
    match db::account_create(conn, &new) {
        Ok(account) => ok(&req.id, json!({ "accountId": account.id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // A failed lookup is a regular result, not an error; the front end
    // decides how to present it.
    match db::account_find_by_credentials(conn, &username, &password) {
        Ok(account) => ok(
            &req.id,
            json!({
                "authenticated": account.is_some(),
                "account": account,
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_reset_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_no = match required_str(req, "studentNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let new_password = match required_str(req, "newPassword") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::account_update_password(conn, &student_no, &new_password) {
        Ok(account) => ok(
            &req.id,
            json!({
                "updated": account.is_some(),
                "account": account,
            }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match db::account_list_fullnames(conn) {
        Ok(names) => {
            let accounts: Vec<serde_json::Value> = names
                .into_iter()
                .map(|fullname| json!({ "fullname": fullname }))
                .collect();
            ok(&req.id, json!({ "accounts": accounts }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "accounts.register" => Some(handle_register(state, req)),
        "accounts.login" => Some(handle_login(state, req)),
        "accounts.resetPassword" => Some(handle_reset_password(state, req)),
        "accounts.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
