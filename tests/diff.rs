use std::io::Write;
use std::process::{Command, Stdio};

const PATCH: &str = "\
diff --git a/src/a.c b/src/a.c
--- a/src/a.c
+++ b/src/a.c
@@ -3 +3 @@
-a
+b
@@ -40 +40 @@
-c
+d
";

fn run(format: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(["diff", "--format", format])
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(PATCH.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "strata diff failed: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn diff_reports_proximity_per_file() {
    let json: serde_json::Value = serde_json::from_str(&run("json")).unwrap();
    assert_eq!(json["src/a.c"], 37);
}

#[test]
fn diff_text_lists_each_file() {
    let text = run("text");
    assert!(text.starts_with("src/a.c"));
    assert!(text.trim_end().ends_with("37"));
}
