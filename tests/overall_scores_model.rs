use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_codequizd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn codequizd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn student<'a>(students: &'a [serde_json::Value], name: &str) -> &'a serde_json::Value {
    students
        .iter()
        .find(|s| s.get("name").and_then(|v| v.as_str()) == Some(name))
        .unwrap_or_else(|| panic!("student {} missing", name))
}

#[test]
fn overall_standing_derives_total_status_areas_and_level() {
    let workspace = temp_dir("codequiz-overall");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.register",
        json!({
            "fullname": "Jane Doe",
            "username": "jdoe",
            "password": "pw",
            "studentNo": "TUP-0001"
        }),
    );

    // jdoe: 10 + 4 + 8 = 22 -> Fail, BASIC, css below the improvement bar.
    for (i, (lang, score)) in [("html", 10.0), ("css", 4.0), ("js", 8.0)].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("j{}", i),
            "results.save",
            json!({ "username": "jdoe", "language": lang, "score": score, "timeSeconds": 20 }),
        );
    }
    // ace: 60 + 50 = 110 -> Pass, EXPERT, nothing to improve.
    for (i, (lang, score)) in [("html", 60.0), ("css", 50.0)].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("a{}", i),
            "results.save",
            json!({ "username": "ace", "language": lang, "score": score, "timeSeconds": 20 }),
        );
    }

    let overall = request_ok(&mut stdin, &mut reader, "ov", "overall.get", json!({}));
    let students = overall
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students");
    assert_eq!(students.len(), 2);

    let jdoe = student(students, "Jane Doe");
    assert_eq!(jdoe.get("totalScore").and_then(|v| v.as_f64()), Some(22.0));
    assert_eq!(jdoe.get("status").and_then(|v| v.as_str()), Some("Fail"));
    assert_eq!(
        jdoe.get("skillLevel").and_then(|v| v.as_str()),
        Some("BASIC")
    );
    assert_eq!(
        jdoe.get("areasForImprovement").and_then(|v| v.as_array()),
        Some(&vec![json!("CSS")])
    );
    let scores = jdoe.get("scores").expect("scores");
    assert_eq!(scores.get("html").and_then(|v| v.as_f64()), Some(10.0));
    assert_eq!(scores.get("css").and_then(|v| v.as_f64()), Some(4.0));
    assert_eq!(scores.get("js").and_then(|v| v.as_f64()), Some(8.0));

    // No account for "ace": raw username stands in for the fullname.
    let ace = student(students, "ace");
    assert_eq!(ace.get("totalScore").and_then(|v| v.as_f64()), Some(110.0));
    assert_eq!(ace.get("status").and_then(|v| v.as_str()), Some("Pass"));
    assert_eq!(
        ace.get("skillLevel").and_then(|v| v.as_str()),
        Some("EXPERT")
    );
    assert_eq!(
        ace.get("areasForImprovement")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn overall_standing_boundary_totals_classify_consistently() {
    let workspace = temp_dir("codequiz-overall-bands");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let cases = [
        ("u49", 49.0, "Fail", "BASIC"),
        ("u50", 50.0, "Pass", "MODERATE"),
        ("u70", 70.0, "Pass", "MODERATE"),
        ("u71", 71.0, "Pass", "ADVANCE"),
        ("u105", 105.0, "Pass", "ADVANCE"),
        ("u106", 106.0, "Pass", "EXPERT"),
    ];
    for (i, (user, score, _, _)) in cases.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "results.save",
            json!({ "username": user, "language": "html", "score": score, "timeSeconds": 30 }),
        );
    }

    let overall = request_ok(&mut stdin, &mut reader, "ov", "overall.get", json!({}));
    let students = overall
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students");

    for (user, _, status, level) in &cases {
        let s = student(students, user);
        assert_eq!(
            s.get("status").and_then(|v| v.as_str()),
            Some(*status),
            "status for {}",
            user
        );
        assert_eq!(
            s.get("skillLevel").and_then(|v| v.as_str()),
            Some(*level),
            "skill level for {}",
            user
        );
    }

    let _ = std::fs::remove_dir_all(workspace);
}
