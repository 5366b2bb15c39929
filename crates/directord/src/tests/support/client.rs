//! Blocking line-oriented client used to drive a running server.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::{Value, json};

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Client holding one connection open across several exchanges.
pub struct TestClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    /// Connects to `address`.
    pub fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).expect("connect to server");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone client stream"));
        Self {
            writer: stream,
            reader,
        }
    }

    /// Writes raw bytes without adding a terminator.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).expect("write to server");
        self.writer.flush().expect("flush to server");
    }

    /// Writes `line` followed by a newline.
    pub fn send_line(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes());
    }

    /// Reads and parses the next response line.
    pub fn read_response(&mut self) -> Value {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).expect("read response");
        assert!(read > 0, "server closed the connection before responding");
        serde_json::from_str(line.trim_end()).expect("response is valid JSON")
    }

    /// Sends `{"type": request_type, "data": data}` and waits for the answer.
    pub fn request(&mut self, request_type: &str, data: Value) -> Value {
        self.send_line(&json!({ "type": request_type, "data": data }).to_string());
        self.read_response()
    }
}
