use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tarpost::archive;
use tarpost::client::TransferClient;
use tarpost::error::Error;
use tarpost::filter::FileFilter;
use tarpost::logger::NoopLogger;
use tarpost::server::TransferServer;

fn start_server() -> String {
    let server = TransferServer::bind("127.0.0.1:0", Arc::new(NoopLogger)).unwrap();
    let port = server.port();
    thread::spawn(move || server.run());
    format!("http://127.0.0.1:{port}/")
}

fn client(url: &str) -> TransferClient {
    TransferClient::new(url, Arc::new(NoopLogger))
}

fn no_filter() -> FileFilter {
    FileFilter::new(None).unwrap()
}

fn sample_tree(root: &Path) {
    fs::create_dir_all(root.join("sub/deeper")).unwrap();
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("sub/b.log"), "xyz").unwrap();
    fs::write(root.join("sub/deeper/c.txt"), "abc").unwrap();
}

#[test]
fn directory_upload_and_download_round_trip() {
    let url = start_server();
    let client = client(&url);

    let local = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    sample_tree(&src);

    let remote = remote_root.path().join("tree");
    client
        .upload(&src, remote.to_str().unwrap(), &no_filter())
        .unwrap();

    assert_eq!(fs::read(remote.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(remote.join("sub/b.log")).unwrap(), b"xyz");
    assert_eq!(fs::read(remote.join("sub/deeper/c.txt")).unwrap(), b"abc");

    let back = local.path().join("back");
    client
        .download(remote.to_str().unwrap(), &back, &no_filter())
        .unwrap();
    assert_eq!(fs::read(back.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(back.join("sub/deeper/c.txt")).unwrap(), b"abc");
}

#[test]
fn filtered_upload_sends_only_matching_files() {
    let url = start_server();
    let client = client(&url);

    let local = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    sample_tree(&src);

    let remote = remote_root.path().join("filtered");
    let filter = FileFilter::new(Some("*.txt")).unwrap();
    client
        .upload(&src, remote.to_str().unwrap(), &filter)
        .unwrap();

    assert_eq!(fs::read(remote.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(remote.join("sub/deeper/c.txt")).unwrap(), b"abc");
    assert!(!remote.join("sub/b.log").exists());
}

#[test]
fn filtered_download_applies_server_side() {
    let url = start_server();
    let client = client(&url);

    let local = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    let remote = remote_root.path().join("tree");
    sample_tree(&remote);

    let back = local.path().join("back");
    let filter = FileFilter::new(Some("*.log")).unwrap();
    client
        .download(remote.to_str().unwrap(), &back, &filter)
        .unwrap();

    assert_eq!(fs::read(back.join("sub/b.log")).unwrap(), b"xyz");
    assert!(!back.join("a.txt").exists());
}

#[test]
fn single_file_upload_and_download_are_raw_bytes() {
    let url = start_server();
    let client = client(&url);

    let local = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    let src_file = local.path().join("payload.bin");
    fs::write(&src_file, b"raw bytes here").unwrap();

    let remote = remote_root.path().join("stored/payload.bin");
    client
        .upload(&src_file, remote.to_str().unwrap(), &no_filter())
        .unwrap();
    assert_eq!(fs::read(&remote).unwrap(), b"raw bytes here");

    let back = local.path().join("fetched/copy.bin");
    client
        .download(remote.to_str().unwrap(), &back, &no_filter())
        .unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"raw bytes here");
}

#[test]
fn uploading_a_missing_local_path_fails_before_any_request() {
    // No server at all; the preflight must fire first
    let client = client("http://127.0.0.1:1/");
    let err = client
        .upload(Path::new("/definitely/not/here"), "/tmp/x", &no_filter())
        .unwrap_err();
    assert!(matches!(err, Error::MissingPath(_)));
}

#[test]
fn remote_delete_honors_the_filter() {
    let url = start_server();
    let client = client(&url);

    let remote_root = tempfile::tempdir().unwrap();
    let remote = remote_root.path().join("tree");
    sample_tree(&remote);

    let filter = FileFilter::new(Some("*.txt")).unwrap();
    client.delete(remote.to_str().unwrap(), &filter).unwrap();
    assert!(!remote.join("a.txt").exists());
    assert!(remote.join("sub/b.log").exists());
    assert!(remote.join("sub").is_dir());

    client.delete(remote.to_str().unwrap(), &no_filter()).unwrap();
    assert!(!remote.exists());
}

#[test]
fn remote_move_and_stat() {
    let url = start_server();
    let client = client(&url);

    let remote_root = tempfile::tempdir().unwrap();
    let old = remote_root.path().join("old.txt");
    let new = remote_root.path().join("new.txt");
    fs::write(&old, "contents").unwrap();

    client
        .rename(old.to_str().unwrap(), new.to_str().unwrap())
        .unwrap();
    assert!(!old.exists());
    assert_eq!(fs::read(&new).unwrap(), b"contents");

    let stat = client.stat(new.to_str().unwrap()).unwrap();
    assert!(stat.exists);
    assert!(!stat.is_dir);

    let stat = client.stat(old.to_str().unwrap()).unwrap();
    assert!(!stat.exists);

    let stat = client.stat(remote_root.path().to_str().unwrap()).unwrap();
    assert!(stat.exists);
    assert!(stat.is_dir);
}

#[test]
fn server_errors_carry_status_and_body_text() {
    let url = start_server();
    let client = client(&url);

    let err = client
        .delete("/no/such/path/anywhere", &no_filter())
        .unwrap_err();
    match err {
        Error::Server { status, body } => {
            assert_eq!(status, 500);
            assert!(!body.is_empty(), "body text is surfaced verbatim");
        }
        other => panic!("expected server error, got {other}"),
    }
}

#[test]
fn bad_request_parameters_answer_400() {
    let url = start_server();
    let response = reqwest::blocking::Client::new()
        .post(&url)
        .body("ignored")
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[test]
fn truncated_directory_upload_is_rejected_by_the_server() {
    let url = start_server();

    let local = tempfile::tempdir().unwrap();
    let remote_root = tempfile::tempdir().unwrap();
    let src = local.path().join("src");
    sample_tree(&src);

    // Encode without the end marker: every byte arrives, the transfer is
    // still logically incomplete
    let mut encoded = Vec::new();
    archive::write_directory_tree(&mut encoded, &src, &no_filter(), false).unwrap();

    let remote = remote_root.path().join("dest");
    let response = reqwest::blocking::Client::new()
        .post(&url)
        .query(&[("dir", remote.to_str().unwrap())])
        .body(encoded)
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    assert!(response.text().unwrap().contains("incomplete"));
}

#[test]
fn download_of_a_missing_remote_path_fails() {
    let url = start_server();
    let client = client(&url);
    let local = tempfile::tempdir().unwrap();

    let err = client
        .download(
            "/no/such/remote",
            &local.path().join("out"),
            &no_filter(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::MissingPath(_)));
}
