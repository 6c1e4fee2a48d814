use pkg_datastream::{DataStreamError, Session};

mod common;

use common::{archiver::FakeArchiver, media::DataStream, FixedSpace, RecordedEvents};

#[test]
fn packages_across_volumes() {
    // Volume layout:
    //
    //   1: header, META, A1, A2
    //   2: A3, B1
    //   3: B2
    //   4: C1
    let volumes = DataStream::new(&["A 3 0 2 1", "B 2 0 1 1", "C 1 0 0 1"])
        .part(1, "A", 1)
        .part(1, "A", 2)
        .part(2, "A", 3)
        .part(2, "B", 1)
        .part(3, "B", 2)
        .part(4, "C", 1)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let events = RecordedEvents::default();
    let target = tempfile::tempdir().unwrap();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .event_handler(events.clone())
        .space_probe(FixedSpace(1000))
        .metadata_dir(volumes.dir.path().join("meta"))
        .alias("tape")
        .build();

    session.init(&device, &["all"], None).unwrap();
    assert_eq!(session.volume_count(), 4);

    let mut totals = Vec::new();
    for name in ["A", "B", "C"] {
        let parts = session.find_package(&device, name).unwrap();
        for index in 1..=parts {
            session.get_part(index, target.path()).unwrap();
        }

        totals.push(session.counters().total_parts_read);
    }

    assert_eq!(totals, [3, 5, 6]);
    assert_eq!(medium.prompts(), [2, 2, 3, 4]);
    assert_eq!(session.counters().volume_number, 4);

    assert_eq!(
        archiver.log(),
        [
            "extract META",
            "extract PART A 1",
            "extract PART A 2",
            "extract PART A 3",
            "skip PART A 3",
            "extract PART B 1",
            "extract PART B 2",
            "extract PART C 1",
        ]
    );

    let requests: Vec<_> = events
        .take()
        .into_iter()
        .filter(|e| e.starts_with("Insert"))
        .collect();

    assert_eq!(
        requests,
        [
            "Insert volume 2 of 4 into tape",
            "Insert volume 2 of 4 into tape",
            "Insert volume 3 of 4 into tape",
            "Insert volume 4 of 4 into tape",
        ]
    );

    for file in ["A.1", "A.2", "A.3", "B.1", "B.2", "C.1"] {
        assert!(target.path().join(file).exists(), "{file}");
    }
}

#[test]
fn recover_from_end_of_volume() {
    // The table of contents does not declare the volume counts.
    let volumes = DataStream::new(&["A 2 0", "B 1 0"])
        .part(1, "A", 1)
        .part(1, "A", 2)
        .part(2, "B", 1)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let events = RecordedEvents::default();
    let target = tempfile::tempdir().unwrap();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .event_handler(events.clone())
        .metadata_dir(volumes.dir.path().join("meta"))
        .alias("tape")
        .build();

    session.find_package(&device, "B").unwrap();
    assert_eq!(session.volume_count(), 1);

    session.get_part(1, target.path()).unwrap();

    assert_eq!(medium.prompts(), [2]);
    assert_eq!(
        archiver.log(),
        [
            "extract META",
            "skip PART A 1",
            "skip PART A 2",
            "extract <eof>",
            "extract PART B 1",
        ]
    );

    let counters = session.counters();
    assert_eq!(counters.volume_number, 2);
    assert_eq!(counters.volume_count, 2);
    assert_eq!(counters.volume_parts_read, 1);
    assert_eq!(counters.total_parts_read, 3);

    // The volume count grows with the unexpected volume.
    let requests: Vec<_> = events
        .take()
        .into_iter()
        .filter(|e| e.starts_with("Insert"))
        .collect();

    assert_eq!(requests, ["Insert volume 2 of 2 into tape"]);
}

#[test]
fn recover_while_skipping_leftover() {
    // The second volume in the drive is blank. The real one comes next.
    let volumes = DataStream::new(&["A 2 0 1 1", "B 1 0 1"])
        .part(1, "A", 1)
        .empty_volume(2)
        .part(3, "A", 2)
        .part(3, "B", 1)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let target = tempfile::tempdir().unwrap();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .metadata_dir(volumes.dir.path().join("meta"))
        .build();

    assert_eq!(session.find_package(&device, "B").unwrap(), 1);

    // One request for the volume of B, and one to recover.
    assert_eq!(medium.prompts(), [2, 3]);
    assert_eq!(session.counters().total_parts_read, 2);

    session.get_part(1, target.path()).unwrap();

    assert_eq!(
        archiver.log(),
        [
            "extract META",
            "skip <eof>",
            "skip PART A 2",
            "extract PART B 1",
        ]
    );

    let counters = session.counters();
    assert_eq!(counters.total_parts_read, 3);
    assert_eq!(counters.parts_read, 1);
    assert!(target.path().join("B.1").exists());
}

#[test]
fn second_skip_failure_is_fatal() {
    let volumes = DataStream::new(&["A 2 0 1 1", "B 1 0 1"])
        .part(1, "A", 1)
        .empty_volume(3)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .metadata_dir(volumes.dir.path().join("meta"))
        .build();

    assert!(matches!(
        session.find_package(&device, "B"),
        Err(DataStreamError::SubprocessFailure(_))
    ));

    // No new volume after the recovery fails.
    assert_eq!(medium.prompts(), [2, 3]);
    assert_eq!(archiver.log(), ["extract META", "skip <eof>", "skip <eof>"]);
}

#[test]
fn second_failure_is_fatal() {
    let volumes = DataStream::new(&["A 2 0", "B 1 0"])
        .part(1, "A", 1)
        .part(1, "A", 2)
        .empty_volume(2)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let target = tempfile::tempdir().unwrap();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .metadata_dir(volumes.dir.path().join("meta"))
        .build();

    session.find_package(&device, "B").unwrap();

    assert!(matches!(
        session.get_part(1, target.path()),
        Err(DataStreamError::SubprocessFailure(_))
    ));

    // Only one new volume for each part.
    assert_eq!(medium.prompts(), [2]);
    assert_eq!(session.counters().parts_read, 0);
    assert!(archiver.log().ends_with(&["extract <eof>".to_owned(), "extract <eof>".to_owned()]));
}

#[test]
fn failure_after_progress_is_fatal() {
    // The table of contents declares 3 parts, but the volume has only 2.
    let volumes = DataStream::new(&["A 3 0"])
        .part(1, "A", 1)
        .part(1, "A", 2)
        .part(2, "A", 3)
        .write();

    let archiver = FakeArchiver::default();
    let medium = volumes.medium();
    let target = tempfile::tempdir().unwrap();
    let device = volumes.device();

    let mut session = Session::builder()
        .archiver(archiver.clone())
        .medium(medium.clone())
        .metadata_dir(volumes.dir.path().join("meta"))
        .build();

    session.find_package(&device, "A").unwrap();
    session.get_part(1, target.path()).unwrap();
    session.get_part(2, target.path()).unwrap();

    match session.get_part(3, target.path()) {
        Err(DataStreamError::SubprocessFailure(output)) => {
            assert_eq!(output.status, Some(1));
            assert_eq!(output.diagnostics, "premature end of archive");
        }

        other => panic!("unexpected result: {other:?}"),
    }

    assert!(medium.prompts().is_empty());
}
