use std::fs;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use bookworm::crawl::{CheckpointStore, RotatingSink};
use bookworm::fetch::{FetchError, PageFetcher};
use bookworm::{
    crawl, AppendSink, BlockStyle, CrawlError, CrawlOptions, FetchEngine, Fetchers,
    FileCheckpoint, HttpFetcher,
};

struct Server {
    base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn page(path: &str) -> Option<String> {
    let body = match path {
        "/read/1" => r#"<!doctype html>
<html><body>
  <h1> Chapter 1 </h1>
  <div data-container>First line.

Second line.</div>
  <a data-next-chapter-link href="/read/2">Next</a>
</body></html>"#,
        "/read/2" => r#"<!doctype html>
<html><body>
  <h1>Chapter 2</h1>
  <main data-reader-content><div class="node-doc">
    <p>Para one.</p>
    <p>   </p>
    <p>Para two.</p>
  </div></main>
  <a class="ty_a0 ty_cm" href="/read/1">Prev</a>
  <a class="ty_a0 ty_cm" href="/read/3">Next</a>
</body></html>"#,
        "/read/3" => r#"<!doctype html>
<html><body>
  <h1>Chapter 3</h1>
  <div data-container>The end.</div>
</body></html>"#,
        "/broken" => r#"<!doctype html>
<html><body><p>No title here.</p></body></html>"#,
        _ => return None,
    };
    Some(body.to_string())
}

fn spawn_novel_server() -> Server {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());
    let hits = Arc::new(Mutex::new(Vec::new()));
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let seen = Arc::clone(&hits);
    let handle = thread::spawn(move || loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }
        let request = match server.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(_) => break,
        };
        let path = request.url().to_string();
        seen.lock().unwrap().push(path.clone());
        let response = match page(&path) {
            Some(body) => tiny_http::Response::from_string(body).with_header(
                "Content-Type: text/html; charset=utf-8"
                    .parse::<tiny_http::Header>()
                    .unwrap(),
            ),
            None => tiny_http::Response::from_string("not found").with_status_code(404),
        };
        let _ = request.respond(response);
    });

    Server {
        base_url,
        hits,
        shutdown: shutdown_tx,
        handle: Some(handle),
    }
}

/// Rendered engine stand-in; these tests only use the cheap path.
struct NoBrowser;

impl PageFetcher for NoBrowser {
    fn name(&self) -> &'static str {
        "no-browser"
    }

    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Browser {
            url: url.to_string(),
            reason: "browser disabled in tests".to_string(),
        })
    }
}

/// Fails one URL with a 503 and forwards every other request to the wrapped fetcher.
struct FailOn<'a> {
    inner: &'a mut HttpFetcher,
    url: String,
}

impl PageFetcher for FailOn<'_> {
    fn name(&self) -> &'static str {
        "fail-on"
    }

    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        if url == self.url {
            return Err(FetchError::HttpStatus {
                status: 503,
                url: url.to_string(),
            });
        }
        self.inner.fetch(url)
    }
}

fn cheap_options(every: u32) -> CrawlOptions {
    CrawlOptions {
        engine: FetchEngine::Cheap,
        delay: Duration::ZERO,
        checkpoint_every: every,
    }
}

#[test]
fn crawls_three_chapters_over_http_and_marks_completion() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out").join("novel.txt");
    let cp_path = dir.path().join(".current_url.txt");

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
    let mut checkpoint = FileCheckpoint::new(&cp_path);

    let summary = crawl(
        &format!("{}/read/1", server.base_url),
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(1),
        None,
    )
    .unwrap();

    assert_eq!(summary.chapters, 3);
    assert_eq!(summary.resumed_from, None);
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(
        text,
        "\n--------------------\nChapter 1\n\nFirst line.\nSecond line.\
         \n--------------------\nChapter 2\n\nPara one.\nPara two.\
         \n--------------------\nChapter 3\n\nThe end."
    );
    assert_eq!(fs::read_to_string(&cp_path).unwrap(), "");
    assert_eq!(checkpoint.load().unwrap(), None);
    assert_eq!(
        *server.hits.lock().unwrap(),
        vec!["/read/1", "/read/2", "/read/3"]
    );
}

#[test]
fn resumes_from_checkpoint_without_refetching_earlier_chapters() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("novel.txt");
    let cp_path = dir.path().join("cp.txt");
    fs::write(&out, "\n--------------------\nChapter 1\n\nalready here").unwrap();
    fs::write(&cp_path, format!("{}/read/3\n", server.base_url)).unwrap();

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
    let mut checkpoint = FileCheckpoint::new(&cp_path);

    let summary = crawl(
        &format!("{}/read/1", server.base_url),
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(1),
        None,
    )
    .unwrap();

    assert_eq!(summary.chapters, 1);
    assert_eq!(
        summary.resumed_from,
        Some(format!("{}/read/3", server.base_url))
    );
    assert_eq!(*server.hits.lock().unwrap(), vec!["/read/3"]);
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("\n--------------------\nChapter 1\n\nalready here"));
    assert!(text.ends_with("\n--------------------\nChapter 3\n\nThe end."));
}

#[test]
fn http_error_status_aborts_with_the_url() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("novel.txt");
    let cp_path = dir.path().join("cp.txt");
    let url = format!("{}/read/404", server.base_url);

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
    let mut checkpoint = FileCheckpoint::new(&cp_path);

    let err = crawl(
        &url,
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(1),
        None,
    )
    .unwrap_err();

    match err {
        CrawlError::Fetch {
            url: failed,
            source: FetchError::HttpStatus { status, .. },
        } => {
            assert_eq!(failed, url);
            assert_eq!(status, 404);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read_to_string(&out).unwrap(), "");
    assert!(!cp_path.exists());
}

#[test]
fn page_without_title_aborts_and_keeps_previous_checkpoint() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("novel.txt");
    let cp_path = dir.path().join("cp.txt");
    let broken = format!("{}/broken", server.base_url);
    fs::write(&cp_path, &broken).unwrap();

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
    let mut checkpoint = FileCheckpoint::new(&cp_path);

    let err = crawl(
        &format!("{}/read/1", server.base_url),
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(1),
        None,
    )
    .unwrap_err();

    assert!(matches!(err, CrawlError::Extraction { ref url } if *url == broken));
    assert_eq!(fs::read_to_string(&cp_path).unwrap(), broken);
}

#[test]
fn split_crawl_rotates_files_and_saves_checkpoint_every_n() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("novel");
    let cp_path = dir.path().join("cp.txt");

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    let mut sink = RotatingSink::new(&base, 2, BlockStyle::Underlined);
    let mut checkpoint = FileCheckpoint::new(&cp_path);
    let saved_after: std::cell::RefCell<Vec<(u32, String)>> = Default::default();
    let progress = |n: u32, _: &bookworm::ChapterRecord| {
        let value = fs::read_to_string(&cp_path).unwrap_or_default();
        saved_after.borrow_mut().push((n, value));
    };

    crawl(
        &format!("{}/read/1", server.base_url),
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(2),
        Some(&progress),
    )
    .unwrap();

    let first = fs::read_to_string(dir.path().join("novel__chapter-1.txt")).unwrap();
    assert_eq!(
        first,
        "Chapter 1\n=========\nFirst line.\nSecond line.\n\n\n\
         Chapter 2\n=========\nPara one.\nPara two.\n\n\n"
    );
    let second = fs::read_to_string(dir.path().join("novel__chapter-3.txt")).unwrap();
    assert_eq!(second, "Chapter 3\n=========\nThe end.\n\n\n");

    let saved = saved_after.into_inner();
    assert_eq!(saved[0], (1, String::new()));
    assert_eq!(saved[1], (2, format!("{}/read/3", server.base_url)));
    assert_eq!(saved[2], (3, String::new()));
}

#[test]
fn rerun_after_abort_continues_at_the_failed_chapter_without_duplicates() {
    let server = spawn_novel_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("novel.txt");
    let cp_path = dir.path().join("cp.txt");
    let start = format!("{}/read/1", server.base_url);
    let third = format!("{}/read/3", server.base_url);

    let mut http = HttpFetcher::new().unwrap();
    let mut browser = NoBrowser;
    {
        let mut flaky = FailOn {
            inner: &mut http,
            url: third.clone(),
        };
        let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
        let mut checkpoint = FileCheckpoint::new(&cp_path);
        let err = crawl(
            &start,
            &mut Fetchers {
                cheap: &mut flaky,
                rendered: &mut browser,
            },
            &mut sink,
            &mut checkpoint,
            &cheap_options(1),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CrawlError::Fetch { ref url, .. } if *url == third));
    }
    assert_eq!(fs::read_to_string(&cp_path).unwrap(), third);
    server.hits.lock().unwrap().clear();

    let mut sink = AppendSink::open(&out, BlockStyle::Separator).unwrap();
    let mut checkpoint = FileCheckpoint::new(&cp_path);
    let summary = crawl(
        &start,
        &mut Fetchers {
            cheap: &mut http,
            rendered: &mut browser,
        },
        &mut sink,
        &mut checkpoint,
        &cheap_options(1),
        None,
    )
    .unwrap();

    assert_eq!(summary.chapters, 1);
    assert_eq!(summary.resumed_from.as_deref(), Some(third.as_str()));
    assert_eq!(server.hits.lock().unwrap().first().map(String::as_str), Some("/read/3"));
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text.matches("\nChapter 1\n").count(), 1);
    assert_eq!(text.matches("\nChapter 2\n").count(), 1);
    assert_eq!(text.matches("\nChapter 3\n").count(), 1);
    assert_eq!(fs::read_to_string(&cp_path).unwrap(), "");
}
