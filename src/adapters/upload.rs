//! Asset upload over HTTP.
//!
//! `GET /` serves a one-file form, `POST /upload` streams the body (raw,
//! or the first part of a `multipart/form-data` body) to [`ASSET_PATH`],
//! replacing any previous asset. The body is never held in RAM: it moves
//! from the socket to flash in small chunks.
//!
//! On the device [`EspUpload`] registers both routes on `EspHttpServer`.
//! Requests run in the server task; their outcome reaches
//! [`UploadPort::poll`] through a channel. On the host [`SimUpload`] takes
//! submitted bodies and runs them through the same [`receive`] path.
//!
//! Replies: 200 stored, 400 malformed, 413 over the size limit or out of
//! flash, 500 other storage errors. Unknown routes get the server's 404.

use std::future::Future;
use std::io::{self, Read};
use std::pin::pin;
use std::sync::mpsc::{self, TryRecvError};
use std::task::{Context, Poll, Waker};

use log::{debug, warn};

use crate::app::ports::{ASSET_PATH, FilesystemPort, FsError, UploadError, UploadEvent};

pub const FORM: &str = "<!doctype html><html><body><h3>TREX asset upload</h3>\
<form method=\"POST\" action=\"/upload\" enctype=\"multipart/form-data\">\
<input type=\"file\" name=\"asset\"><input type=\"submit\" value=\"Upload\">\
</form></body></html>";

/// Bytes read from the socket per step.
const FEED_CHUNK_LEN: usize = 512;

// ───────────────────────────────────────────────────────────────
// Request handling
// ───────────────────────────────────────────────────────────────

/// Status and plain-text body answered to one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub message: String,
}

impl Reply {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}

fn rejected(status: u16, message: &str, error: UploadError) -> (Reply, UploadEvent) {
    debug!("upload: rejected ({}): {}", status, error);
    (Reply::new(status, message), UploadEvent::Rejected(error))
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..19)
        .is_some_and(|t| t.eq_ignore_ascii_case("multipart/form-data"))
}

/// Store one `POST /upload` body of `content_len` bytes at [`ASSET_PATH`].
pub fn receive<R: Read>(
    fs: &mut dyn FilesystemPort,
    max_bytes: u64,
    content_type: Option<&str>,
    content_len: Option<u64>,
    body: R,
) -> (Reply, UploadEvent) {
    let Some(len) = content_len else {
        return rejected(400, "missing Content-Length", UploadError::BadRequest);
    };
    if len > max_bytes {
        return rejected(413, "too large", UploadError::TooLarge);
    }
    let body = ExactBody::new(body, len);

    let written = match content_type.filter(|ct| is_multipart(ct)) {
        Some(ct) => {
            let Ok(boundary) = multer::parse_boundary(ct) else {
                return rejected(400, "bad multipart boundary", UploadError::BadRequest);
            };
            match FirstPart::open(body, boundary) {
                Ok(mut part) => fs.write_from(ASSET_PATH, &mut part),
                Err(e) => return rejected(400, "bad multipart body", e),
            }
        }
        None => {
            let mut body = body;
            fs.write_from(ASSET_PATH, &mut body)
        }
    };

    match written {
        Ok(bytes) => (
            Reply::new(200, format!("stored {} bytes", bytes)),
            UploadEvent::Stored {
                path: ASSET_PATH.to_string(),
                bytes,
            },
        ),
        Err(FsError::SourceFailed) => rejected(400, "bad body", UploadError::BadRequest),
        Err(FsError::NoSpace) => rejected(413, "no space", FsError::NoSpace.into()),
        Err(e) => {
            warn!("upload: write failed: {}", e);
            rejected(500, "write failed", e.into())
        }
    }
}

/// Reads exactly `remaining` bytes; ending early is an error.
struct ExactBody<R> {
    inner: R,
    remaining: u64,
}

impl<R> ExactBody<R> {
    fn new(inner: R, remaining: u64) -> Self {
        Self { inner, remaining }
    }
}

impl<R: Read> Read for ExactBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf
            .len()
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

// ───────────────────────────────────────────────────────────────
// Multipart
// ───────────────────────────────────────────────────────────────

type Feed = mpsc::Sender<io::Result<Vec<u8>>>;

/// Poll `fut` to completion on this thread. Whenever the parser waits for
/// input, one chunk of `body` goes into its stream. `None` if it still
/// waits after `body` has ended.
fn pump<F: Future, R: Read>(fut: F, body: &mut R, feed: &mut Option<Feed>) -> Option<F::Output> {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return Some(out);
        }
        let tx = feed.as_ref()?;
        let mut chunk = vec![0u8; FEED_CHUNK_LEN];
        match body.read(&mut chunk) {
            Ok(0) => *feed = None,
            Ok(n) => {
                chunk.truncate(n);
                if tx.send(Ok(chunk)).is_err() {
                    *feed = None;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(Err(e));
                *feed = None;
            }
        }
    }
}

/// Content of the first part of a multipart body, as a blocking reader.
pub struct FirstPart<R> {
    body: R,
    feed: Option<Feed>,
    _multipart: multer::Multipart<'static>,
    field: Option<multer::Field<'static>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl<R: Read> FirstPart<R> {
    pub fn open(mut body: R, boundary: String) -> Result<Self, UploadError> {
        let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>();
        let stream = futures_lite::stream::poll_fn(move |_| match rx.try_recv() {
            Ok(item) => Poll::Ready(Some(item)),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Ready(None),
        });
        let mut multipart = multer::Multipart::new(stream, boundary);
        let mut feed = Some(tx);

        let field = match pump(multipart.next_field(), &mut body, &mut feed) {
            Some(Ok(Some(field))) => field,
            Some(Err(e)) => {
                debug!("upload: multipart: {}", e);
                return Err(UploadError::BadRequest);
            }
            _ => return Err(UploadError::BadRequest),
        };
        debug!("upload: part {:?} ({:?})", field.name(), field.file_name());

        Ok(Self {
            body,
            feed,
            _multipart: multipart,
            field: Some(field),
            chunk: Vec::new(),
            pos: 0,
        })
    }
}

impl<R: Read> Read for FirstPart<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            let Some(field) = self.field.as_mut() else {
                return Ok(0);
            };
            match pump(field.chunk(), &mut self.body, &mut self.feed) {
                Some(Ok(Some(bytes))) => {
                    self.chunk = bytes.to_vec();
                    self.pos = 0;
                }
                Some(Ok(None)) => {
                    self.field = None;
                    return Ok(0);
                }
                Some(Err(e)) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                None => return Err(io::ErrorKind::UnexpectedEof.into()),
            }
        }
        let n = out.len().min(self.chunk.len() - self.pos);
        out[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ───────────────────────────────────────────────────────────────
// Device server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspUpload;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::mpsc::{self, Receiver};

    use esp_idf_svc::http::server::{Configuration, EspHttpServer};
    use esp_idf_svc::http::{Headers, Method};
    use esp_idf_svc::io::Write as _;
    use log::info;

    use super::{FORM, receive};
    use crate::adapters::fs::StdFs;
    use crate::app::ports::{FilesystemPort, UploadEvent, UploadPort};
    use crate::error::InitError;

    /// Server task stack; the multipart parser needs more than the default.
    const SERVER_STACK: usize = 10 * 1024;

    /// Blocking `std::io::Read` over a request body.
    struct Body<'a, T>(&'a mut T);

    impl<T: esp_idf_svc::io::Read> std::io::Read for Body<'_, T> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0
                .read(buf)
                .map_err(|e| std::io::Error::other(format!("{:?}", e)))
        }
    }

    pub struct EspUpload {
        server: Option<EspHttpServer<'static>>,
        fs: StdFs,
        max_bytes: u64,
        events: Option<Receiver<UploadEvent>>,
    }

    impl EspUpload {
        /// Uploads land on `fs`; bodies over `max_bytes` get 413.
        pub fn new(fs: StdFs, max_bytes: u64) -> Self {
            Self {
                server: None,
                fs,
                max_bytes,
                events: None,
            }
        }
    }

    impl UploadPort for EspUpload {
        fn begin(&mut self, port: u16) -> Result<(), InitError> {
            let config = Configuration {
                http_port: port,
                stack_size: SERVER_STACK,
                ..Default::default()
            };
            let mut server =
                EspHttpServer::new(&config).map_err(|_| InitError::Listener("upload"))?;

            server
                .fn_handler("/", Method::Get, |req| {
                    req.into_ok_response()?.write_all(FORM.as_bytes())
                })
                .map_err(|_| InitError::Listener("upload"))?;

            let (tx, rx) = mpsc::channel();
            let fs = self.fs.clone();
            let max_bytes = self.max_bytes;
            server
                .fn_handler("/upload", Method::Post, move |mut req| {
                    let content_type = req.content_type().map(str::to_owned);
                    let content_len = req.content_len();
                    let mut fs = fs.clone();
                    let (reply, event) = receive(
                        &mut fs,
                        max_bytes,
                        content_type.as_deref(),
                        content_len,
                        Body(&mut req),
                    );
                    let _ = tx.send(event);
                    req.into_response(
                        reply.status,
                        Some(reply.reason()),
                        &[("Content-Type", "text/plain")],
                    )?
                    .write_all(reply.message.as_bytes())
                })
                .map_err(|_| InitError::Listener("upload"))?;

            info!("upload: HTTP server on port {}", port);
            self.server = Some(server);
            self.events = Some(rx);
            Ok(())
        }

        fn poll(&mut self) -> Option<UploadEvent> {
            self.events.as_ref()?.try_recv().ok()
        }

        fn fs(&mut self) -> &mut dyn FilesystemPort {
            &mut self.fs
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimUpload;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::collections::VecDeque;

    use super::{Reply, receive};
    use crate::app::ports::{FilesystemPort, UploadEvent, UploadPort};
    use crate::error::InitError;

    struct Request {
        content_type: Option<String>,
        content_len: Option<u64>,
        body: Vec<u8>,
    }

    /// In-process upload service: tests queue `POST /upload` bodies and
    /// read back the replies.
    pub struct SimUpload {
        fs: Box<dyn FilesystemPort>,
        max_bytes: u64,
        port: Option<u16>,
        queued: VecDeque<Request>,
        replies: Vec<Reply>,
    }

    impl SimUpload {
        pub fn new(fs: Box<dyn FilesystemPort>, max_bytes: u64) -> Self {
            Self {
                fs,
                max_bytes,
                port: None,
                queued: VecDeque::new(),
                replies: Vec::new(),
            }
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        /// Queue a request whose declared length may differ from `body`.
        pub fn submit(&mut self, content_type: Option<&str>, content_len: Option<u64>, body: &[u8]) {
            self.queued.push_back(Request {
                content_type: content_type.map(str::to_owned),
                content_len,
                body: body.to_vec(),
            });
        }

        pub fn replies(&self) -> &[Reply] {
            &self.replies
        }
    }

    impl UploadPort for SimUpload {
        fn begin(&mut self, port: u16) -> Result<(), InitError> {
            self.port = Some(port);
            Ok(())
        }

        fn poll(&mut self) -> Option<UploadEvent> {
            self.port?;
            let req = self.queued.pop_front()?;
            let (reply, event) = receive(
                self.fs.as_mut(),
                self.max_bytes,
                req.content_type.as_deref(),
                req.content_len,
                req.body.as_slice(),
            );
            self.replies.push(reply);
            Some(event)
        }

        fn fs(&mut self) -> &mut dyn FilesystemPort {
            self.fs.as_mut()
        }
    }
}
