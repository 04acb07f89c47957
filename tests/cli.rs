mod common;

use common::{write_model, write_npy_corpus, write_safetensors_corpus, write_stats};
use std::path::Path;
use std::process::{Command, Output};

fn melvc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_melvc"))
        .args(args)
        .output()
        .expect("run melvc")
}

fn path(p: &Path) -> &str {
    p.to_str().expect("utf-8 path")
}

#[test]
fn inspect_lists_utterances_with_frames() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_npy_corpus(dir.path(), &[("b", 7), ("a", 3)]);

    let output = melvc(&["inspect", "--dumpdir", path(dir.path()), "--format", "npy"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a\t3\nb\t7\n");
}

#[test]
fn inspect_parallel_applies_threshold() {
    let src = tempfile::tempdir().expect("tempdir");
    let trg = tempfile::tempdir().expect("tempdir");
    write_safetensors_corpus(src.path(), &[("a", 3), ("b", 7)]);
    write_safetensors_corpus(trg.path(), &[("a", 4), ("b", 9)]);

    let output = melvc(&[
        "inspect",
        "--dumpdir",
        path(src.path()),
        "--trg-dumpdir",
        path(trg.path()),
        "--threshold",
        "3",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "b\t7\t9\n");
}

#[test]
fn inspect_fails_on_id_mismatch() {
    let src = tempfile::tempdir().expect("tempdir");
    let trg = tempfile::tempdir().expect("tempdir");
    write_npy_corpus(src.path(), &[("a", 3), ("b", 3)]);
    write_npy_corpus(trg.path(), &[("a", 3), ("c", 3)]);

    let output = melvc(&[
        "inspect",
        "--dumpdir",
        path(src.path()),
        "--trg-dumpdir",
        path(trg.path()),
        "--format",
        "npy",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(r#"only in source {"b"}"#), "{stderr}");
}

#[test]
fn decode_requires_exactly_one_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let outdir = dir.path().join("results");
    let output = melvc(&[
        "decode",
        "--checkpoint",
        "exp/checkpoint.safetensors",
        "--trg-stats",
        "stats.safetensors",
        "--outdir",
        path(&outdir),
        "--scp",
        "feats.scp",
        "--dumpdir",
        "dump",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Please specify either --dumpdir or --feats-scp."),
        "{stderr}"
    );
    assert!(!outdir.exists());
}

#[test]
fn decode_runs_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dump = dir.path().join("dump");
    write_safetensors_corpus(&dump, &[("u1", 4)]);
    let checkpoint = write_model(&dir.path().join("exp"), "");
    let stats = dir.path().join("stats.safetensors");
    write_stats(&stats);
    let outdir = dir.path().join("results");

    let output = melvc(&[
        "decode",
        "--dumpdir",
        path(&dump),
        "--checkpoint",
        path(&checkpoint),
        "--trg-stats",
        path(&stats),
        "--outdir",
        path(&outdir),
        "--no-progress",
        "--verbose",
        "1",
        "--perf",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{stderr}");
    assert!(stderr.contains("The number of features to be decoded = 1."), "{stderr}");
    assert!(stderr.contains("inference speed ="), "{stderr}");
    assert!(stderr.contains("model.inference"), "{stderr}");
    assert!(outdir.join("feats").join("u1.safetensors").exists());
    assert!(outdir.join("outs").join("u1.png").exists());
}
