//! CLI integration tests for unravel.
//!
//! These tests run the unravel binary against the JSON program fixtures in
//! `tests/fixtures`.

use std::process::{Command, Output};

/// Get the path to the unravel binary.
fn unravel_bin() -> String {
    env!("CARGO_BIN_EXE_unravel").to_string()
}

/// Get the path to a test fixture.
fn fixture_path(name: &str) -> String {
    format!("tests/fixtures/{}", name)
}

/// Run unravel with the given arguments.
fn run_unravel(args: &[&str]) -> Output {
    Command::new(unravel_bin())
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute unravel")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help() {
    let output = run_unravel(&["--help"]);
    assert!(output.status.success(), "unravel --help should succeed");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("decompile"), "Help should list decompile");
    assert!(stdout.contains("passes"), "Help should list passes");
}

#[test]
fn test_passes_standard() {
    let output = run_unravel(&["passes"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    for name in ["condition-fusion", "stack-slots", "canary-guard"] {
        let line = stdout
            .lines()
            .find(|l| l.starts_with(name))
            .unwrap_or_else(|| panic!("missing {} in:\n{}", name, stdout));
        assert!(line.contains("yes"), "{} should be enabled: {}", name, line);
    }
}

#[test]
fn test_passes_basic_level() {
    let output = run_unravel(&["passes", "--level", "basic"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    let enabled = |name: &str| {
        stdout
            .lines()
            .find(|l| l.starts_with(name))
            .map(|l| l.contains(" yes "))
            .unwrap()
    };
    assert!(enabled("condition-fusion"));
    assert!(!enabled("stack-slots"));
    assert!(!enabled("canary-guard"));
}

// =============================================================================
// Decompile Command Tests
// =============================================================================

#[test]
fn test_decompile_all_functions() {
    let output = run_unravel(&["decompile", &fixture_path("program.json")]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);

    assert!(stdout.contains("function classify {"));
    assert!(stdout.contains("function count_down {"));
    // Functions are separated by a blank line, in input order.
    assert!(stdout.find("classify").unwrap() < stdout.find("count_down").unwrap());
    assert!(stdout.contains("}\n\nfunction count_down {"));
}

#[test]
fn test_decompile_single_function() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "count_down",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let expected = "\
function count_down {
    int32_t var1;  // [rbp - 0x4]

    0x2000: var1 = 0xa
    loop {
        0x2004: var1 -= 0x1
        # 0x2008: cmp [rbp - 0x4], 0x0
        # 0x200c: jne 0x2004
        if var1 != 0x0  goto 0x2004
    }
    # exit
    0x2010: ret
}
";
    assert_eq!(stdout_of(&output), expected);
}

#[test]
fn test_decompile_else_if_chain() {
    let output = run_unravel(&["decompile", &fixture_path("program.json"), "-f", "classify"]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);

    assert!(stdout.contains("    if var2 < 0x0 {\n"));
    assert!(stdout.contains("    else if var2 == 0x0 {\n"));
    assert!(stdout.contains("    } else {\n        0x102c: var3 = 0x1\n"));
    assert!(stdout.contains("if (rax ^= fs:[0x28]) != 0 {"));
    assert!(stdout.contains("call 0x401030 <__stack_chk_fail@plt>"));
}

#[test]
fn test_canary_store_only_by_default() {
    let output = run_unravel(&["decompile", &fixture_path("program.json"), "-f", "classify"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("int64_t var1;  // [rbp - 0x8]"));
    assert!(!stdout.contains("_canary"));
}

#[test]
fn test_canary_loads_flag() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "classify",
        "--canary-loads",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("int64_t var1_canary;  // [rbp - 0x8]"));
    assert!(stdout.contains("0x100c: var1_canary = rax"));
    assert!(stdout.contains("0x1030: rax = var1_canary"));
}

#[test]
fn test_canary_window_too_small() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "classify",
        "--canary-loads",
        "--canary-window",
        "2",
    ]);
    assert!(output.status.success());
    assert!(!stdout_of(&output).contains("_canary"));
}

#[test]
fn test_no_comments() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "--no-comments",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(!stdout.lines().any(|l| l.trim_start().starts_with('#')));
    assert!(stdout.contains("if var1 != 0x0  goto 0x2004"));
}

#[test]
fn test_disable_fusion() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "count_down",
        "--disable",
        "fusion",
        "--no-comments",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("0x2008: cmp var1, 0x0"));
    assert!(stdout.contains("if !=  goto 0x2004"));
}

#[test]
fn test_level_none_keeps_raw_operands() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "count_down",
        "--level",
        "none",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.starts_with("function count_down {\n    0x2000: [rbp - 0x4] = 0xa\n"));
}

#[test]
fn test_slot_prefix() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "count_down",
        "--slot-prefix",
        "local_",
    ]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("0x2000: local_1 = 0xa"));
}

#[test]
fn test_color_output() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "-f",
        "count_down",
        "--color",
    ]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("\x1b[31m0x2004\x1b[0m: var1 -= 0x1"));
    assert!(stdout.contains("goto \x1b[31m0x2004\x1b[0m"));
}

#[test]
fn test_json_report() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "--json",
        "--canary-loads",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);

    let classify = &reports[0];
    assert_eq!(classify["name"], "classify");
    assert_eq!(
        classify["fused"],
        serde_json::json!(["0x1014", "0x1020", "0x1034"])
    );
    assert_eq!(classify["slots"][0]["name"], "var1_canary");
    assert_eq!(classify["slots"][0]["displacement"], -8);
    assert_eq!(classify["slots"][1]["size"], 4);
    assert_eq!(classify["canary"]["call"], "0x103c");
    assert_eq!(classify["canary"]["store"], "0x1030");
    assert!(classify["text"].as_str().unwrap().starts_with("function classify {"));

    let count_down = &reports[1];
    assert!(count_down["canary"].is_null());
    assert_eq!(count_down["slots"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_missing_file() {
    let output = run_unravel(&["decompile", "tests/fixtures/does_not_exist.json"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to read program"));
}

#[test]
fn test_unknown_function() {
    let output = run_unravel(&["decompile", &fixture_path("program.json"), "-f", "nope"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Function not found: nope"));
}

#[test]
fn test_tree_out_of_range() {
    let output = run_unravel(&["decompile", &fixture_path("out_of_range.json")]);
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("Invalid tree in function broken"), "{}", stderr);
}

#[test]
fn test_unordered_instructions() {
    let output = run_unravel(&["decompile", &fixture_path("unordered.json")]);
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("Invalid instructions in function shuffled"), "{}", stderr);
    assert!(stderr.contains("instruction at 0x3000 listed after 0x3004"), "{}", stderr);
}

#[test]
fn test_unknown_pass() {
    let output = run_unravel(&[
        "decompile",
        &fixture_path("program.json"),
        "--disable",
        "inlining",
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("unknown pass 'inlining'"));
}
