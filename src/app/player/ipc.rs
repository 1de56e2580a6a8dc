use std::path::{Path, PathBuf};

use serde_json::{Value, json};

#[cfg(unix)]
use std::io::{BufRead, BufReader, Write};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::time::Duration;

/// Client side of mpv's `--input-ipc-server` JSON protocol.
///
/// The socket only appears once mpv has started, so connecting is retried on every
/// query until it succeeds. Failures are never fatal: a query just yields `None`.
pub(crate) struct MpvIpc {
    path: PathBuf,
    #[cfg(unix)]
    conn: Option<BufReader<UnixStream>>,
    next_request_id: u64,
}

impl MpvIpc {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            #[cfg(unix)]
            conn: None,
            next_request_id: 1,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn get_f64(&mut self, property: &str) -> Option<f64> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let request = property_request(property, request_id);
        self.roundtrip(&request, request_id)
    }

    #[cfg(unix)]
    fn roundtrip(&mut self, request: &str, request_id: u64) -> Option<f64> {
        if self.conn.is_none() {
            let stream = UnixStream::connect(&self.path).ok()?;
            stream
                .set_read_timeout(Some(Duration::from_millis(200)))
                .ok()?;
            self.conn = Some(BufReader::new(stream));
        }
        let conn = self.conn.as_mut()?;

        if conn.get_mut().write_all(request.as_bytes()).is_err() {
            self.conn = None;
            return None;
        }

        // mpv interleaves event lines with replies; skip until ours shows up.
        let mut line = String::new();
        for _ in 0..32 {
            line.clear();
            match conn.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    self.conn = None;
                    return None;
                }
                Ok(_) => {
                    if let Some(reply) = parse_property_reply(&line, request_id) {
                        return reply;
                    }
                }
            }
        }
        None
    }

    #[cfg(not(unix))]
    fn roundtrip(&mut self, _request: &str, _request_id: u64) -> Option<f64> {
        None
    }
}

impl Drop for MpvIpc {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub(crate) fn property_request(property: &str, request_id: u64) -> String {
    let mut request = json!({
        "command": ["get_property", property],
        "request_id": request_id,
    })
    .to_string();
    request.push('\n');
    request
}

/// `None` when the line is not the reply to `request_id`; `Some(None)` when it is but
/// carries no numeric value (e.g. `property unavailable` before playback starts).
pub(crate) fn parse_property_reply(line: &str, request_id: u64) -> Option<Option<f64>> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    if value.get("request_id").and_then(Value::as_u64) != Some(request_id) {
        return None;
    }
    if value.get("error").and_then(Value::as_str) != Some("success") {
        return Some(None);
    }
    Some(value.get("data").and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_request_is_one_json_line() {
        let request = property_request("time-pos", 7);
        assert!(request.ends_with('\n'));
        let value: Value = serde_json::from_str(request.trim()).expect("valid json");
        assert_eq!(value["command"], json!(["get_property", "time-pos"]));
        assert_eq!(value["request_id"], json!(7));
    }

    #[test]
    fn reply_parsing_matches_request_id_and_skips_events() {
        assert_eq!(
            parse_property_reply(r#"{"data":42.5,"error":"success","request_id":3}"#, 3),
            Some(Some(42.5))
        );
        assert_eq!(parse_property_reply(r#"{"event":"playback-restart"}"#, 3), None);
        assert_eq!(
            parse_property_reply(r#"{"data":1.0,"error":"success","request_id":2}"#, 3),
            None
        );
        assert_eq!(
            parse_property_reply(r#"{"error":"property unavailable","request_id":3}"#, 3),
            Some(None)
        );
        assert_eq!(parse_property_reply("not json", 3), None);
    }

    #[cfg(unix)]
    #[test]
    fn queries_a_listening_socket() {
        use std::os::unix::net::UnixListener;

        let path = std::env::temp_dir()
            .join(format!("aniplay-ipc-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind socket");
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            reader.read_line(&mut request).expect("read request");
            let stream = reader.get_mut();
            stream
                .write_all(b"{\"event\":\"file-loaded\"}\n")
                .expect("write event");
            stream
                .write_all(b"{\"data\":1440.0,\"error\":\"success\",\"request_id\":1}\n")
                .expect("write reply");
        });

        let mut ipc = MpvIpc::new(path.clone());
        assert_eq!(ipc.get_f64("duration"), Some(1440.0));
        server.join().expect("server thread");
        drop(ipc);
        assert!(!path.exists());
    }
}
