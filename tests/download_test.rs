mod helpers;

use web_session::{Error, RequestOptions, Session};

use helpers::{
    closed_port_url, file_content, gzip_content, start_server, CHUNKED_PIECES,
    CHUNKED_PIECE_SIZE, FILE_SIZE, GZIP_PLAIN_SIZE,
};

#[tokio::test]
async fn test_download_with_content_length() {
    let base = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.bin");
    let session = Session::default();

    let download = session
        .download_file(&format!("{}/file", base), &path, 4096, RequestOptions::new())
        .await
        .unwrap();

    assert!(download.succeeded());
    assert_eq!(download.path, path);
    assert_eq!(download.bytes_written, FILE_SIZE as u64);
    assert_eq!(download.content_length, FILE_SIZE as u64);
    assert_eq!(std::fs::read(&path).unwrap(), file_content(FILE_SIZE));
}

#[tokio::test]
async fn test_download_chunked_has_no_content_length() {
    let base = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunked.bin");
    let session = Session::default();
    let size = CHUNKED_PIECES * CHUNKED_PIECE_SIZE;

    let download = session
        .download_file(&format!("{}/chunked", base), &path, 4096, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(download.path, path);
    assert_eq!(download.bytes_written, size as u64);
    assert_eq!(download.content_length, 0);
    assert_eq!(std::fs::read(&path).unwrap(), file_content(size));
}

#[tokio::test]
async fn test_download_compressed_keeps_announced_length() {
    let base = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gzip.bin");
    let session = Session::default();

    let download = session
        .download_file(&format!("{}/gzip", base), &path, 16, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(download.content_length, gzip_content().len() as u64);
    assert_eq!(download.bytes_written, GZIP_PLAIN_SIZE as u64);
    assert!(download.content_length < download.bytes_written);
    assert_eq!(std::fs::read(&path).unwrap(), file_content(GZIP_PLAIN_SIZE));
}

#[tokio::test]
async fn test_download_odd_chunk_size() {
    let base = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.bin");
    let session = Session::default();

    let download = session
        .download_file(&format!("{}/file", base), &path, 7, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(download.bytes_written, FILE_SIZE as u64);
    assert_eq!(std::fs::read(&path).unwrap(), file_content(FILE_SIZE));
}

#[tokio::test]
async fn test_download_transport_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.bin");
    let session = Session::default();

    let download = session
        .download_file(&closed_port_url("/file"), &path, 4096, RequestOptions::new())
        .await
        .unwrap();

    assert!(!download.succeeded());
    assert!(download.path.as_os_str().is_empty());
    assert_eq!(download.bytes_written, 0);
    assert_eq!(download.content_length, 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_download_refuses_existing_file() {
    let base = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.bin");
    std::fs::write(&path, b"keep me").unwrap();
    let session = Session::default();

    let err = session
        .download_file(&format!("{}/file", base), &path, 4096, RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
}
