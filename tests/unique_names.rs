#![allow(clippy::unwrap_used, missing_docs)]

use std::collections::HashSet;
use std::convert::Infallible;
use std::future::{Ready, ready};

use spfs::fs::unique::{DEFAULT_MAX_ATTEMPTS, UniqueNameError, UniqueNamer, WriteTarget};
use spfs::path::RemotePath;

/// An existence check backed by a fixed set of rendered paths.
fn taken(names: &[&str]) -> impl FnMut(RemotePath) -> Ready<Result<bool, Infallible>> {
    let names: HashSet<String> = names.iter().map(|&name| name.to_owned()).collect();
    move |path| ready(Ok(names.contains(&path.render())))
}

async fn resolve(dest: &str, unique: bool, existing: &[&str]) -> WriteTarget {
    UniqueNamer::default()
        .resolve(&RemotePath::new(dest), unique, taken(existing))
        .await
        .unwrap()
}

#[tokio::test]
async fn free_destination_is_used_as_is() {
    let target = resolve("docs/report.txt", true, &["docs/other.txt"]).await;
    assert_eq!(target.path.render(), "docs/report.txt");
    assert!(!target.exists);
}

#[tokio::test]
async fn taken_destination_is_overwritten_without_unique() {
    let target = resolve("report.txt", false, &["report.txt", "report.1.txt"]).await;
    assert_eq!(target.path.render(), "report.txt");
    assert!(target.exists, "the write must be an update");
}

#[tokio::test]
async fn numbered_candidate_keeps_the_extension() {
    let target = resolve("report.txt", true, &["report.txt", "report.1.txt"]).await;
    assert_eq!(target.path.render(), "report.2.txt");
    assert!(!target.exists);
}

#[tokio::test]
async fn name_without_extension_gets_a_numbered_suffix() {
    let target = resolve("report", true, &["report", "report.1"]).await;
    assert_eq!(target.path.render(), "report.2");
}

#[tokio::test]
async fn only_the_last_extension_moves() {
    let target = resolve("backup.tar.gz", true, &["backup.tar.gz"]).await;
    assert_eq!(target.path.render(), "backup.tar.1.gz");
}

#[tokio::test]
async fn candidates_stay_in_the_destination_folder() {
    let target = resolve(
        "/docs/2024/report.txt",
        true,
        &["docs/2024/report.txt", "report.1.txt"],
    )
    .await;
    assert_eq!(target.path.render(), "docs/2024/report.1.txt");
}

#[tokio::test]
async fn single_segment_destination_resolves_under_root() {
    let target = resolve("a", true, &["a"]).await;
    assert_eq!(target.path, RemotePath::new("a").parent().child("a.1"));
    assert_eq!(target.path.size(), 1);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let existing = ["f.txt", "f.1.txt", "f.2.txt", "f.3.txt"];
    let err = UniqueNamer::new(3)
        .resolve(&RemotePath::new("f.txt"), true, taken(&existing))
        .await
        .unwrap_err();
    match err {
        UniqueNameError::Exhausted { path, attempts } => {
            assert_eq!(path.render(), "f.txt");
            assert_eq!(attempts, 3);
        }
        UniqueNameError::Probe(never) => match never {},
    }
    assert_eq!(UniqueNamer::default().max_attempts(), DEFAULT_MAX_ATTEMPTS);
}

#[tokio::test]
async fn probe_failure_is_fatal() {
    let mut probes = 0;
    let err = UniqueNamer::default()
        .resolve(&RemotePath::new("f.txt"), true, |_| {
            probes += 1;
            ready(if probes == 1 {
                Ok(true)
            } else {
                Err("lookup failed")
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UniqueNameError::Probe("lookup failed")));
    assert_eq!(probes, 2, "no probes after the first failure");
}
