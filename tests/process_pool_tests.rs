use crossbeam_channel::bounded;
use porewatch::engine::{ComputePool, PoolError, ProcessPool};
use porewatch::utils::prepare_output_dir;
use porewatch::{Batch, BatchOutcome, Collaborators, Config, run};
use std::fs;
use std::path::{Path, PathBuf};
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn worker_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_porewatch"))
}

fn input_with(root: &Path, files: &[&str]) -> PathBuf {
    let input = root.join("input");
    for f in files {
        let path = input.join(f);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("data for {f}")).unwrap();
    }
    fs::create_dir_all(&input).unwrap();
    input
}

// --- ProcessPool ---

#[test]
fn test_worker_process_answers_batches() {
    let tmp = tempfile::tempdir().unwrap();
    let input = input_with(tmp.path(), &["r1.fast5", "r2.fast5"]);
    let pool = ProcessPool::spawn(&worker_bin(), 2).unwrap();
    assert_eq!(pool.live_workers(), 2);

    let config = Arc::new(Config {
        input_dir: input.canonicalize().unwrap(),
        ..Default::default()
    });
    let (tx, rx) = bounded(2);
    for (id, file) in ["r1.fast5", "r2.fast5"].iter().enumerate() {
        let tx = tx.clone();
        pool.submit(
            Batch {
                id: id as u64,
                files: vec![file.to_string()],
            },
            Arc::clone(&config),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
    }
    for _ in 0..2 {
        let outcome = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        match outcome {
            Ok(BatchOutcome::Completed { results }) => {
                assert_eq!(results.len(), 1);
                assert!(results[0].status.is_okay());
                assert!(results[0].fields.contains_key("blake3"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

#[test]
fn test_terminated_pool_fails_submissions() {
    let pool = ProcessPool::spawn(&worker_bin(), 1).unwrap();
    pool.terminate_all();
    let (tx, rx) = bounded(1);
    pool.submit(
        Batch {
            id: 0,
            files: vec!["x.fast5".into()],
        },
        Arc::new(Config::default()),
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    );
    let outcome = rx.recv_timeout(Duration::from_secs(30)).unwrap();
    assert!(matches!(outcome, Err(PoolError::Terminated)));
}

// --- full session on worker processes ---

#[test]
fn test_run_with_worker_processes_and_writers() {
    let tmp = tempfile::tempdir().unwrap();
    let input = input_with(
        tmp.path(),
        &["barcode01/r1.fast5", "barcode01/r2.fast5", "barcode02/r3.fast5", "r4.fast5"],
    );
    let config = Config {
        input_dir: input,
        output_dir: tmp.path().join("out"),
        chunk_size: 2,
        parallel: 2,
        quiet: true,
        classify: true,
        link_raw: true,
        dump_parts: true,
        worker_program: Some(worker_bin()),
        ..Default::default()
    }
    .normalized();
    prepare_output_dir(&config, false).unwrap();

    let collaborators = Collaborators::standard(&config).unwrap();
    let summary = run(&config, collaborators).expect("complete run");
    assert_eq!(summary.total, 4);
    assert_eq!(summary.by_label.get("barcode01"), Some(&2));
    assert_eq!(summary.by_label.get("unclassified"), Some(&1));

    let out = &config.output_dir;
    let records = fs::read_to_string(out.join("records.jsonl")).unwrap();
    assert_eq!(records.lines().count(), 4);
    let table = fs::read_to_string(out.join("summary.tsv")).unwrap();
    assert_eq!(table.lines().count(), 5);
    assert!(out.join("raw/barcode01/r1.fast5").exists());
    assert!(out.join("raw/unclassified/r4.fast5").exists());

    let inventory: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("parts/inventory.json")).unwrap())
            .unwrap();
    assert_eq!(inventory["reads"].as_object().unwrap().len(), 4);
    assert_eq!(inventory["parts"].as_array().unwrap().len(), 2);
}

// --- CLI ---

#[test]
fn test_cli_run_and_refuses_non_empty_output() {
    let tmp = tempfile::tempdir().unwrap();
    let input = input_with(tmp.path(), &["r1.fast5"]);
    let output = tmp.path().join("out");

    let status = Command::new(worker_bin())
        .current_dir(tmp.path())
        .args(["run", "-q", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(output.join("records.jsonl").exists());

    // Second run into the same directory needs --yes.
    let status = Command::new(worker_bin())
        .current_dir(tmp.path())
        .args(["run", "-q", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert!(!status.success());

    let status = Command::new(worker_bin())
        .current_dir(tmp.path())
        .args(["run", "-q", "-y", "--no-records", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(!output.join("records.jsonl").exists());
    assert!(output.join("summary.tsv").exists());
}

#[cfg(unix)]
#[test]
fn test_cli_live_mode_announces_and_stops_on_interrupt() {
    let tmp = tempfile::tempdir().unwrap();
    let input = input_with(tmp.path(), &["r1.fast5"]);
    let output = tmp.path().join("out");

    let mut child = Command::new(worker_bin())
        .current_dir(tmp.path())
        .args(["run", "--batch-chunk", "1", "--live-analysis-delay", "0", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--live")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut seen = Vec::new();
    let mut line = String::new();
    while stdout.read_line(&mut line).unwrap() > 0 {
        seen.push(line.trim().to_string());
        line.clear();
        if seen.last().is_some_and(|l| l.contains("Press Ctrl-C")) {
            break;
        }
    }
    assert!(seen.iter().any(|l| l.contains("Processing *.fast5 files")));
    assert!(seen.iter().any(|l| l.contains("Entering LIVE mode.")));

    let records = output.join("records.jsonl");
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        let written = fs::read_to_string(&records).unwrap_or_default();
        if written.lines().count() == 1 {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());
    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    assert!(child.wait().unwrap().success());
    assert!(rest.contains("Finished."));
}
