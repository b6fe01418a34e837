//! Line-delimited JSON transport to the external media engine
//!
//! The engine is a long-lived child process reachable over a Unix
//! domain socket, one JSON object per line in each direction. A single
//! write failure is retried once against a freshly reconnected socket
//! before being treated as fatal, since the engine can drop an idle
//! connection without the process itself dying.

use crate::error::{CoreError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// A connection to the media engine's control socket
pub struct EngineIpc {
    socket_path: std::path::PathBuf,
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl EngineIpc {
    /// Connect to `socket_path`, waiting up to `timeout` for it to appear
    ///
    /// The engine binary is started by the caller; this only waits for
    /// the socket file itself to appear.
    pub fn connect(socket_path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match UnixStream::connect(socket_path) {
                Ok(stream) => {
                    let reader = BufReader::new(stream.try_clone()?);
                    return Ok(Self {
                        socket_path: socket_path.to_path_buf(),
                        stream,
                        reader,
                    });
                }
                Err(e) if std::time::Instant::now() < deadline => {
                    log::debug!("engine socket not ready yet: {e}");
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(CoreError::EngineUnavailable(format!(
                        "socket never appeared at {:?}: {e}",
                        socket_path
                    )))
                }
            }
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        let stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| CoreError::EngineIpc(format!("reconnect failed: {e}")))?;
        self.reader = BufReader::new(stream.try_clone()?);
        self.stream = stream;
        Ok(())
    }

    /// Send one request and read the matching one-line JSON reply
    ///
    /// Retries exactly once, against a freshly reconnected socket, if
    /// the first attempt fails at either the write or the read.
    pub fn request<Req: Serialize, Resp: DeserializeOwned>(&mut self, req: &Req) -> Result<Resp> {
        match self.send_and_read(req) {
            Ok(resp) => Ok(resp),
            Err(first_err) => {
                log::warn!("engine IPC attempt failed, retrying once: {first_err}");
                self.reconnect()?;
                self.send_and_read(req)
            }
        }
    }

    fn send_and_read<Req: Serialize, Resp: DeserializeOwned>(&mut self, req: &Req) -> Result<Resp> {
        let mut line = serde_json::to_vec(req).map_err(|e| CoreError::EngineIpc(e.to_string()))?;
        line.push(b'\n');
        self.stream
            .write_all(&line)
            .map_err(|e| CoreError::EngineIpc(format!("write: {e}")))?;

        let mut reply = String::new();
        let n = self
            .reader
            .read_line(&mut reply)
            .map_err(|e| CoreError::EngineIpc(format!("read: {e}")))?;
        if n == 0 {
            return Err(CoreError::EngineIpc("engine closed the connection".into()));
        }
        serde_json::from_str(reply.trim_end())
            .map_err(|e| CoreError::EngineIpc(format!("malformed reply: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::os::unix::net::UnixListener;

    #[derive(Serialize)]
    struct Ping {
        cmd: &'static str,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Pong {
        ok: bool,
    }

    #[test]
    fn round_trips_one_request() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("engine.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.contains("ping"));
            stream.write_all(b"{\"ok\":true}\n").unwrap();
        });

        let mut ipc = EngineIpc::connect(&socket_path, Duration::from_secs(1)).unwrap();
        let resp: Pong = ipc.request(&Ping { cmd: "ping" }).unwrap();
        assert_eq!(resp, Pong { ok: true });

        server.join().unwrap();
    }
}
