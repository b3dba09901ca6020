//! FileCheck-style tests for test IR files.
//!
//! Each file under `tests/ir` carries its own RUN and CHECK directives; this
//! suite runs them through the pipeline and validates the rendered output.

use irpipe::test_ir::{TestRunner, TestSpec};
use std::fs;
use std::path::{Path, PathBuf};

fn ir_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("ir")
}

/// Discovers all .ir files in a directory recursively
fn discover_ir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(discover_ir_files(&path));
            } else if path.extension().and_then(|s| s.to_str()) == Some("ir") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn run_file(path: &Path) -> Result<(), String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let spec = TestSpec::parse(&contents)?;
    TestRunner::new(false).run_test(&spec)
}

/// Test helper that runs one file through FileCheck validation
fn run_filecheck_test(file: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = ir_dir().join(file);
    run_file(&path).unwrap_or_else(|e| panic!("Test {} failed: {}", file, e));
}

#[test]
fn test_sharing_filecheck() {
    run_filecheck_test("sharing.ir");
}

#[test]
fn test_single_use_filecheck() {
    run_filecheck_test("single_use.ir");
}

#[test]
fn test_dead_code_filecheck() {
    run_filecheck_test("dead_code.ir");
}

#[test]
fn test_labels_filecheck() {
    run_filecheck_test("labels.ir");
}

#[test]
fn test_missing_label_filecheck() {
    run_filecheck_test("missing_label.ir");
}

#[test]
fn test_inline_body_filecheck() {
    run_filecheck_test("inline_body.ir");
}

#[test]
fn test_inline_debug_filecheck() {
    run_filecheck_test("inline_debug.ir");
}

#[test]
fn test_inline_calls_filecheck() {
    run_filecheck_test("inline_calls.ir");
}

#[test]
fn test_inline_stack_filecheck() {
    run_filecheck_test("inline_stack.ir");
}

#[test]
fn test_cells_filecheck() {
    run_filecheck_test("cells.ir");
}

/// Every file in the directory, including ones without a dedicated test.
#[test]
fn test_all_ir_files() {
    let _ = env_logger::builder().is_test(true).try_init();
    let files = discover_ir_files(&ir_dir());
    assert!(!files.is_empty(), "no .ir files found in {}", ir_dir().display());

    let failures: Vec<String> = files
        .iter()
        .filter_map(|path| run_file(path).err().map(|e| format!("{}: {}", path.display(), e)))
        .collect();

    assert!(failures.is_empty(), "failing files:\n{}", failures.join("\n"));
}
