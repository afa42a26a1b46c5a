use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rustix::event::{poll, PollFd, PollFlags};
use tempfile::TempDir;

use crate::remote::RemoteStore;
use crate::wire::{self, Reply, Request};

mod clipboard;

use state::State;

/// How long clients wait for replies of the test server.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub dir: TempDir,
    pub listener: UnixListener,
    path: PathBuf,
}

impl TestServer {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("shared-clipboard-rs-test")
            .tempdir()
            .unwrap();
        let path = dir.path().join("clipboard");
        let listener = UnixListener::bind(&path).unwrap();
        listener.set_nonblocking(true).unwrap();

        TestServer {
            dir,
            listener,
            path,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Connects a client; the connection is served once the server runs.
    pub fn connect(&self) -> RemoteStore {
        let stream = UnixStream::connect(&self.path).unwrap();
        RemoteStore::from_stream(stream, REPLY_TIMEOUT)
    }

    pub fn run(self, state: State) -> Arc<Mutex<State>> {
        let state = Arc::new(Mutex::new(state));
        self.run_mutex(state.clone());
        state
    }

    pub fn run_mutex(self, state: Arc<Mutex<State>>) {
        thread::spawn(move || self.run_internal(state));
    }

    fn run_internal(self, state: Arc<Mutex<State>>) {
        let mut waiting_for_first_client = true;
        let client_counter = Arc::new(AtomicUsize::new(0));
        let mut next_id = 0;

        while client_counter.load(SeqCst) > 0 || waiting_for_first_client {
            // Wake up now and then to notice that every client is gone.
            let mut fds = [PollFd::new(&self.listener, PollFlags::IN)];
            match poll(&mut fds, 50) {
                Ok(0) => continue,
                Ok(_) => (),
                Err(rustix::io::Errno::INTR) => continue,
                Err(err) => panic!("poll failed: {err}"),
            }

            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => panic!("accept failed: {err}"),
            };
            stream.set_nonblocking(false).unwrap();

            waiting_for_first_client = false;
            client_counter.fetch_add(1, SeqCst);
            next_id += 1;

            let id = next_id;
            let state = state.clone();
            let client_counter = client_counter.clone();
            thread::spawn(move || {
                serve_client(id, stream, &state);
                state.lock().unwrap().disconnect(id);
                client_counter.fetch_sub(1, SeqCst);
            });
        }
    }
}

fn serve_client(id: usize, mut stream: UnixStream, state: &Mutex<State>) {
    while let Ok(Some(body)) = wire::read_frame(&mut stream) {
        let reply = match Request::decode(&body) {
            Ok(request) => state.lock().unwrap().handle(id, request),
            Err(_) => Reply::Error(wire::Status::InvalidParameter),
        };

        let mut body = Vec::new();
        reply.encode(&mut body);
        if wire::write_frame(&mut stream, &body).is_err() {
            break;
        }
    }
}
