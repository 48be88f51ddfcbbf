//! Integration tests for the directory store.

use kvdir_core::{
    decode_block_key, DirectoryConfig, DirError, DirectoryStore, FileRecord, OutputCommitPolicy,
    BLOCKS_DB, INDEX_DB,
};
use kvdir_engine::{DatabaseConfig, EngineError, Environment};
use proptest::prelude::*;

fn open_dir(env: &Environment, block_size: u32) -> DirectoryStore {
    DirectoryStore::open(env, DirectoryConfig::new().block_size(block_size)).unwrap()
}

fn write_file(dir: &mut DirectoryStore, name: &str, content: &[u8]) {
    let mut out = dir.create_output(name).unwrap();
    out.write_bytes(content).unwrap();
    out.close().unwrap();
}

fn read_file(dir: &DirectoryStore, name: &str) -> Vec<u8> {
    let mut input = dir.open_input(name).unwrap();
    let mut buf = vec![0u8; input.length() as usize];
    input.read_bytes(&mut buf).unwrap();
    buf
}

/// Asserts the no-orphans invariant over the raw committed store: every
/// block belongs to a record that covers its sequence number, and every
/// record's declared blocks exist.
fn assert_no_orphans(env: &Environment) {
    let index = env.open_database(INDEX_DB, &DatabaseConfig::default()).unwrap();
    let blocks = env.open_database(BLOCKS_DB, &DatabaseConfig::default()).unwrap();

    let mut records = std::collections::HashMap::new();
    for key in index.keys(None).unwrap() {
        let name = String::from_utf8(key.clone()).unwrap();
        let raw = index.get(&key, None).unwrap().unwrap();
        let record = FileRecord::decode(&raw).unwrap();
        assert!(record.is_consistent(), "inconsistent record for {name}");
        records.insert(name, record);
    }

    let mut seen = std::collections::HashMap::<String, Vec<u32>>::new();
    for key in blocks.keys(None).unwrap() {
        let (name, seq) = decode_block_key(&key).unwrap();
        let record = records
            .get(&name)
            .unwrap_or_else(|| panic!("orphan block {seq} for {name}"));
        assert!(seq < record.block_count, "block {seq} beyond record of {name}");
        seen.entry(name).or_default().push(seq);
    }

    for (name, record) in &records {
        let mut seqs = seen.remove(name).unwrap_or_default();
        seqs.sort_unstable();
        let expected: Vec<u32> = (0..record.block_count).collect();
        assert_eq!(seqs, expected, "missing blocks for {name}");
    }
}

#[test]
fn round_trip_single_buffer() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 16);

    let content: Vec<u8> = (0..100u16).map(|i| (i % 251) as u8).collect();
    write_file(&mut dir, "data.bin", &content);

    assert_eq!(read_file(&dir, "data.bin"), content);
    assert_no_orphans(&env);
}

#[test]
fn round_trip_byte_by_byte() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    let content: Vec<u8> = (0..50u8).collect();
    let mut out = dir.create_output("bytes.bin").unwrap();
    for &b in &content {
        out.write_byte(b).unwrap();
    }
    out.close().unwrap();

    let mut input = dir.open_input("bytes.bin").unwrap();
    assert_eq!(input.length(), 50);
    let mut read = Vec::new();
    for _ in 0..50 {
        read.push(input.read_byte().unwrap());
    }
    assert_eq!(read, content);
    assert!(matches!(input.read_byte(), Err(DirError::EndOfFile { .. })));
}

#[test]
fn round_trip_exact_block_multiple() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 16);

    let content = vec![7u8; 48];
    write_file(&mut dir, "exact.bin", &content);
    assert_eq!(read_file(&dir, "exact.bin"), content);
    assert_no_orphans(&env);
}

#[test]
fn empty_file() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 16);

    let out = dir.create_output("empty").unwrap();
    out.close().unwrap();

    let mut input = dir.open_input("empty").unwrap();
    assert_eq!(input.length(), 0);
    assert!(matches!(input.read_byte(), Err(DirError::EndOfFile { .. })));
    assert_no_orphans(&env);
}

#[test]
fn seek_and_partial_reads() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    let content: Vec<u8> = (0..64u8).collect();
    write_file(&mut dir, "seek.bin", &content);

    let mut input = dir.open_input("seek.bin").unwrap();
    input.seek(30);
    let mut buf = [0u8; 10];
    input.read_bytes(&mut buf).unwrap();
    assert_eq!(&buf, &content[30..40]);
    assert_eq!(input.position(), 40);

    // Seeking past the end is allowed; the read fails.
    input.seek(100);
    assert!(matches!(input.read_byte(), Err(DirError::EndOfFile { .. })));

    // Reading more than remains fails without moving the cursor.
    input.seek(60);
    let mut buf = [0u8; 10];
    assert!(matches!(
        input.read_bytes(&mut buf),
        Err(DirError::EndOfFile { .. })
    ));
    assert_eq!(input.position(), 60);
}

#[test]
fn open_input_missing_file() {
    let env = Environment::new();
    let dir = open_dir(&env, 16);
    assert!(matches!(
        dir.open_input("nope"),
        Err(DirError::FileNotFound { .. })
    ));
}

#[test]
fn input_snapshot_survives_rewrite() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "f", &[1u8; 24]);

    let input = dir.open_input("f").unwrap();
    let before = input.length();

    // Rewrite under a second handle; the open channel keeps its view.
    let mut other = open_dir(&env, 8);
    write_file(&mut other, "f", &[2u8; 4]);

    assert_eq!(input.length(), before);
}

#[test]
fn atomic_create_engine_failure_mid_write() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    env.fail_after_puts(1);
    let mut out = dir.create_output("doomed").unwrap();
    let result = out.write_bytes(&[0u8; 32]);
    assert!(matches!(
        result,
        Err(DirError::Engine(EngineError::InjectedFault { .. }))
    ));
    // Dropping the unclosed channel aborts the transaction it began.
    drop(out);
    assert!(!dir.txn_active());

    assert!(dir.list_files().unwrap().is_empty());
    let blocks = env.open_database(BLOCKS_DB, &DatabaseConfig::default()).unwrap();
    assert!(blocks.keys(None).unwrap().is_empty());
    assert_no_orphans(&env);
}

#[test]
fn atomic_delete_removes_record_and_blocks() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "gone.bin", &[9u8; 40]);

    dir.delete_file("gone.bin").unwrap();

    assert!(matches!(
        dir.open_input("gone.bin"),
        Err(DirError::FileNotFound { .. })
    ));
    assert!(dir.list_files().unwrap().is_empty());
    let blocks = env.open_database(BLOCKS_DB, &DatabaseConfig::default()).unwrap();
    assert!(blocks.keys(None).unwrap().is_empty());
}

#[test]
fn delete_missing_file_is_idempotent() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "keep", b"content");

    dir.delete_file("nothing-here").unwrap();

    assert_eq!(dir.list_files().unwrap(), vec!["keep".to_string()]);
    assert!(!dir.txn_active());
    assert_no_orphans(&env);
}

#[test]
fn recreate_leaves_no_stale_blocks() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    // Old content spans 5 blocks, new content 1 block.
    write_file(&mut dir, "a.dat", &[b'x'; 40]);
    dir.delete_file("a.dat").unwrap();
    write_file(&mut dir, "a.dat", &[b'y'; 5]);

    assert_eq!(read_file(&dir, "a.dat"), vec![b'y'; 5]);
    assert_no_orphans(&env);
}

#[test]
fn overwrite_without_delete_leaves_no_stale_blocks() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    write_file(&mut dir, "a.dat", &[b'x'; 40]);
    write_file(&mut dir, "a.dat", &[b'y'; 5]);

    assert_eq!(read_file(&dir, "a.dat"), vec![b'y'; 5]);
    assert_no_orphans(&env);
}

#[test]
fn dropped_channel_aborts_its_own_transaction() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    // Two full blocks reach the block store before the channel is
    // abandoned without close.
    let mut out = dir.create_output("abandoned").unwrap();
    out.write_bytes(&[1u8; 20]).unwrap();
    drop(out);

    assert!(!dir.txn_active());
    assert_eq!(dir.stale_transaction_aborts(), 1);

    // The next create must not inherit and commit the abandoned writes.
    write_file(&mut dir, "kept", b"data");
    assert_eq!(dir.list_files().unwrap(), vec!["kept".to_string()]);

    let blocks = env.open_database(BLOCKS_DB, &DatabaseConfig::default()).unwrap();
    for key in blocks.keys(None).unwrap() {
        let (name, _) = decode_block_key(&key).unwrap();
        assert_eq!(name, "kept");
    }
    assert_no_orphans(&env);
}

#[test]
fn dropped_channel_leaves_caller_transaction_open() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    dir.begin_txn().unwrap();
    let mut out = dir.create_output("partial").unwrap();
    out.write_bytes(&[2u8; 20]).unwrap();
    drop(out);

    // A caller-managed transaction is the caller's to finish.
    assert!(dir.txn_active());
    assert_eq!(dir.stale_transaction_aborts(), 0);
    dir.abort_txn().unwrap();
    assert!(dir.list_files().unwrap().is_empty());
    assert_no_orphans(&env);
}

#[test]
fn zero_length_read_is_always_ok() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "f", &[3u8; 10]);

    let mut input = dir.open_input("f").unwrap();
    input.read_bytes(&mut []).unwrap();

    // Even with the cursor past the recorded length.
    input.seek(50);
    input.read_bytes(&mut []).unwrap();
    assert_eq!(input.position(), 50);
}

#[test]
fn overlong_name_is_rejected_not_panicked() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    let name = "x".repeat(usize::from(u16::MAX) + 1);
    assert!(matches!(
        dir.create_output(&name),
        Err(DirError::NameTooLong { .. })
    ));
    // No transaction or state is left behind by the rejection.
    assert!(!dir.txn_active());
    assert!(dir.list_files().unwrap().is_empty());
}

#[test]
fn list_files_reflects_committed_state() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "committed", b"x");

    dir.begin_txn().unwrap();
    let mut out = dir.create_output("pending").unwrap();
    out.write_bytes(b"y").unwrap();
    out.close().unwrap();

    // The pending create is invisible until the caller commits.
    assert_eq!(dir.list_files().unwrap(), vec!["committed".to_string()]);

    dir.commit_txn().unwrap();
    assert_eq!(
        dir.list_files().unwrap(),
        vec!["committed".to_string(), "pending".to_string()]
    );
}

#[test]
fn caller_transaction_batches_files_atomically() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    dir.begin_txn().unwrap();
    write_file(&mut dir, "one", b"1");
    write_file(&mut dir, "two", b"2");
    write_file(&mut dir, "three", b"3");
    assert!(dir.txn_active());
    assert!(dir.list_files().unwrap().is_empty());

    dir.commit_txn().unwrap();
    assert_eq!(dir.list_files().unwrap().len(), 3);
    assert_no_orphans(&env);
}

#[test]
fn caller_transaction_abort_discards_batch() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "keep", b"k");

    dir.begin_txn().unwrap();
    write_file(&mut dir, "drop1", b"x");
    dir.delete_file("keep").unwrap();
    dir.abort_txn().unwrap();

    assert_eq!(dir.list_files().unwrap(), vec!["keep".to_string()]);
    assert_eq!(read_file(&dir, "keep"), b"k".to_vec());
    assert_no_orphans(&env);
}

#[test]
fn delete_within_caller_transaction_defers_commit() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "f", &[1u8; 20]);

    dir.begin_txn().unwrap();
    dir.delete_file("f").unwrap();
    assert!(dir.txn_active(), "delete must not commit a caller transaction");
    assert_eq!(dir.list_files().unwrap(), vec!["f".to_string()]);

    dir.commit_txn().unwrap();
    assert!(dir.list_files().unwrap().is_empty());
}

#[test]
fn always_commit_policy_reproduces_legacy_close() {
    let env = Environment::new();
    let mut dir = DirectoryStore::open(
        &env,
        DirectoryConfig::new()
            .block_size(8)
            .commit_policy(OutputCommitPolicy::Always),
    )
    .unwrap();

    dir.begin_txn().unwrap();
    write_file(&mut dir, "f", b"data");

    // Legacy behaviour: output close committed the caller's transaction.
    assert!(!dir.txn_active());
    assert_eq!(dir.list_files().unwrap(), vec!["f".to_string()]);
}

#[test]
fn second_begin_aborts_stale_transaction() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    dir.begin_txn().unwrap();
    write_file(&mut dir, "lost", b"x");

    dir.begin_txn().unwrap();
    assert_eq!(dir.stale_transaction_aborts(), 1);
    dir.commit_txn().unwrap();

    // The first transaction's file went with it.
    assert!(dir.list_files().unwrap().is_empty());
}

#[test]
fn close_aborts_open_transaction_and_is_terminal() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    dir.begin_txn().unwrap();
    write_file(&mut dir, "pending", b"x");
    dir.close();

    assert_eq!(dir.stale_transaction_aborts(), 1);
    assert!(!dir.is_healthy());
    assert!(matches!(dir.list_files(), Err(DirError::Closed)));
    assert!(matches!(dir.open_input("pending"), Err(DirError::Closed)));
    assert!(matches!(dir.delete_file("pending"), Err(DirError::Closed)));
    assert!(matches!(dir.create_output("x"), Err(DirError::Closed)));
    assert!(matches!(dir.begin_txn(), Err(DirError::Closed)));

    // Close is idempotent and never commits on the caller's behalf.
    dir.close();
    let fresh = open_dir(&env, 8);
    assert!(fresh.list_files().unwrap().is_empty());
}

#[test]
fn close_does_not_close_environment() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "f", b"x");
    dir.close();

    assert!(env.is_open());
    let again = open_dir(&env, 8);
    assert_eq!(read_file(&again, "f"), b"x".to_vec());
}

#[test]
fn corrupt_index_record_is_detected() {
    let env = Environment::new();
    let dir = open_dir(&env, 8);

    let index = env.open_database(INDEX_DB, &DatabaseConfig::default()).unwrap();
    index.put(b"bad", b"junk", None).unwrap();

    assert!(matches!(
        dir.open_input("bad"),
        Err(DirError::Corruption { .. })
    ));
}

#[test]
fn missing_block_is_detected_not_tolerated() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);
    write_file(&mut dir, "holey", &[5u8; 24]);

    // Remove the middle block behind the directory's back.
    let blocks = env.open_database(BLOCKS_DB, &DatabaseConfig::default()).unwrap();
    blocks
        .delete(&kvdir_core::block_key("holey", 1), None)
        .unwrap();

    let mut input = dir.open_input("holey").unwrap();
    let mut buf = vec![0u8; 24];
    assert!(matches!(
        input.read_bytes(&mut buf),
        Err(DirError::Corruption { .. })
    ));
}

#[test]
fn invariant_holds_across_mixed_operations() {
    let env = Environment::new();
    let mut dir = open_dir(&env, 8);

    write_file(&mut dir, "a", &[1u8; 30]);
    write_file(&mut dir, "b", &[2u8; 8]);
    dir.delete_file("a").unwrap();
    write_file(&mut dir, "c", &[3u8; 17]);
    write_file(&mut dir, "b", &[4u8; 100]);
    dir.delete_file("missing").unwrap();
    dir.delete_file("c").unwrap();
    write_file(&mut dir, "a", &[5u8; 1]);

    assert_eq!(
        dir.list_files().unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(read_file(&dir, "a"), vec![5u8; 1]);
    assert_eq!(read_file(&dir, "b"), vec![4u8; 100]);
    assert_no_orphans(&env);
}

proptest! {
    #[test]
    fn round_trip_random_content(
        content in proptest::collection::vec(any::<u8>(), 0..600),
        block_size in 1u32..48,
    ) {
        let env = Environment::new();
        let mut dir = open_dir(&env, block_size);
        write_file(&mut dir, "random.bin", &content);

        let mut input = dir.open_input("random.bin").unwrap();
        prop_assert_eq!(input.length(), content.len() as u64);
        let mut buf = vec![0u8; content.len()];
        input.read_bytes(&mut buf).unwrap();
        prop_assert_eq!(buf, content);
        assert_no_orphans(&env);
    }
}
