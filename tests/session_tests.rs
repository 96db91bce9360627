use porewatch::pipeline::Session;
use porewatch::{Batch, FileResult};

fn okay(name: &str) -> FileResult {
    FileResult::okay(name, name.trim_end_matches(".fast5"))
}

fn complete(session: &mut Session, batch: &Batch) {
    session.batch_started();
    session.settle_batch(batch.id);
    let results: Vec<FileResult> = batch.files.iter().map(|f| okay(f)).collect();
    let fresh = session.merge_results(batch.id, results);
    session.results_written(fresh.len() as u64);
}

// --- queue / flush ---

#[test]
fn test_queue_flushes_at_chunk_size() {
    let mut session = Session::new(2);
    assert!(session.queue("f1.fast5".into()).is_none());
    let batch = session.queue("f2.fast5".into()).expect("full batch");
    assert_eq!(batch.id, 0);
    assert_eq!(batch.files, vec!["f1.fast5", "f2.fast5"]);
    assert_eq!(session.pending_len(), 0);
    assert_eq!(session.reads_found(), 2);
    assert_eq!(session.reads_queued(), 2);
    assert!(session.counters_consistent());
}

#[test]
fn test_flush_empty_is_noop() {
    let mut session = Session::new(4);
    assert!(session.flush().is_none());
    assert_eq!(session.next_batch_id(), 0);
}

#[test]
fn test_flush_after_stop_is_noop() {
    let mut session = Session::new(4);
    session.queue("f1.fast5".into());
    assert!(session.stop());
    assert!(session.flush().is_none());
    assert_eq!(session.next_batch_id(), 0);
}

#[test]
fn test_batch_ids_increase_by_one() {
    let mut session = Session::new(1);
    let ids: Vec<u64> = ["a", "b", "c"]
        .iter()
        .filter_map(|f| session.queue(format!("{f}.fast5")))
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn test_empty_after_filter_batch_still_consumes_id() {
    let mut session = Session::new(1);
    let first = session.queue("f1.fast5".into()).expect("batch");
    complete(&mut session, &first);

    // Already done: dropped at flush, its id is not reused.
    assert!(session.queue("f1.fast5".into()).is_none());
    assert_eq!(session.next_batch_id(), 2);
    let next = session.queue("f2.fast5".into()).expect("batch");
    assert_eq!(next.id, 2);
}

// --- dedup ---

#[test]
fn test_duplicate_in_same_buffer_is_dropped() {
    let mut session = Session::new(3);
    session.queue("f1.fast5".into());
    session.queue("f1.fast5".into());
    let batch = session.queue("f2.fast5".into()).expect("batch");
    assert_eq!(batch.files, vec!["f1.fast5", "f2.fast5"]);
    assert_eq!(session.reads_found(), 2);
    assert_eq!(session.reads_queued(), 2);
    assert_eq!(session.duplicates_canceled(), 1);
    assert!(session.counters_consistent());
}

#[test]
fn test_duplicate_of_in_flight_file_is_dropped() {
    let mut session = Session::new(1);
    let first = session.queue("f1.fast5".into()).expect("batch");
    session.batch_started();
    assert!(session.queue("f1.fast5".into()).is_none());
    assert_eq!(session.reads_found(), 1);
    assert_eq!(session.reads_queued(), 1);

    session.settle_batch(first.id);
    let fresh = session.merge_results(first.id, vec![okay("f1.fast5")]);
    session.results_written(fresh.len() as u64);
    assert_eq!(session.reads_processed(), 1);
    assert_eq!(session.reads_queued(), 0);
    assert!(session.counters_consistent());
}

#[test]
fn test_merge_drops_results_already_done() {
    let mut session = Session::new(1);
    let first = session.queue("f1.fast5".into()).expect("batch");
    complete(&mut session, &first);

    // A late duplicate result (e.g. a batch raced past the flush-time check).
    session.queue("f9.fast5".into());
    let fresh = session.merge_results(7, vec![okay("f1.fast5")]);
    assert!(fresh.is_empty());
    assert_eq!(session.duplicates_canceled(), 1);
    assert!(session.counters_consistent());
}

#[test]
fn test_files_done_only_gets_okay_results() {
    let mut session = Session::new(2);
    session.queue("f1.fast5".into());
    let batch = session.queue("f2.fast5".into()).expect("batch");
    session.batch_started();
    session.settle_batch(batch.id);
    let fresh = session.merge_results(
        batch.id,
        vec![okay("f1.fast5"), FileResult::disappeared("f2.fast5")],
    );
    assert_eq!(fresh.len(), 2);
    session.results_written(fresh.len() as u64);

    assert!(session.is_done("f1.fast5"));
    assert!(!session.is_done("f2.fast5"));
    assert_eq!(session.reads_processed(), 2);
    assert_eq!(session.reads_queued(), 0);
    assert!(session.counters_consistent());
}

#[test]
fn test_live_queue_ignores_done_files() {
    let mut session = Session::new(1);
    let first = session.queue("f1.fast5".into()).expect("batch");
    complete(&mut session, &first);
    assert!(session.queue_live("f1.fast5".into()).is_none());
    assert_eq!(session.reads_found(), 1);
    assert_eq!(session.discovered(), 1);
}

// --- stop / drain ---

#[test]
fn test_stop_is_idempotent() {
    let mut session = Session::new(1);
    assert!(session.is_running());
    assert!(session.stop());
    assert!(!session.stop());
    assert!(!session.is_running());
}

#[test]
fn test_drained_and_complete_after_scan() {
    let mut session = Session::new(2);
    session.queue("f1.fast5".into());
    session.queue("f2.fast5".into());
    session.queue("f3.fast5".into());
    assert!(!session.is_drained());
    session.mark_scan_finished();
    let last = session.flush().expect("final partial batch");
    assert_eq!(last.id, 1);
    assert_eq!(last.files, vec!["f3.fast5"]);

    complete(&mut session, &Batch { id: 0, files: vec!["f1.fast5".into(), "f2.fast5".into()] });
    complete(&mut session, &last);
    assert!(session.is_drained());
    assert!(session.is_complete());
    assert_eq!(session.reads_found(), 3);
    assert_eq!(session.reads_processed(), 3);
}

// --- watchdog ---

#[test]
fn test_watchdog_forces_flush_after_threshold() {
    let mut session = Session::new(10);
    session.queue_live("f1.fast5".into());
    for _ in 0..3 {
        assert!(session.watchdog_tick(3).is_none());
    }
    let batch = session.watchdog_tick(3).expect("forced flush");
    assert_eq!(batch.files, vec!["f1.fast5"]);
}

#[test]
fn test_watchdog_resets_on_live_queue() {
    let mut session = Session::new(10);
    session.queue_live("f1.fast5".into());
    session.watchdog_tick(2);
    session.watchdog_tick(2);
    session.queue_live("f2.fast5".into());
    assert!(session.watchdog_tick(2).is_none());
    assert!(session.watchdog_tick(2).is_none());
    assert!(session.watchdog_tick(2).is_some());
}

#[test]
fn test_watchdog_idle_without_queued_reads() {
    let mut session = Session::new(10);
    for _ in 0..50 {
        assert!(session.watchdog_tick(1).is_none());
    }
    assert_eq!(session.next_batch_id(), 0);
}
