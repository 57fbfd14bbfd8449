#![allow(dead_code)]

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub struct ParsedResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: serde_json::Value,
        pub raw_body: String,
    }

    impl ParsedResponse {
        /// Case-insensitive header lookup.
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Write a raw request and read until the declared body has arrived.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if is_complete(&buf) {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn is_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= head_end + 4 + content_length
    }

    pub fn get(addr: &SocketAddr, target: &str) -> ParsedResponse {
        request(addr, "GET", target, &[])
    }

    pub fn request(
        addr: &SocketAddr,
        method: &str,
        target: &str,
        headers: &[(&str, &str)],
    ) -> ParsedResponse {
        let mut req = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n");
        for (k, v) in headers {
            req.push_str(&format!("{k}: {v}\r\n"));
        }
        req.push_str("\r\n");
        parse_response(&send_request(addr, &req))
    }

    pub fn parse_response(resp: &str) -> ParsedResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        ParsedResponse {
            status,
            headers,
            body: serde_json::from_str(body).unwrap_or_default(),
            raw_body: body.to_string(),
        }
    }
}

pub mod upstream {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Canned upstream: answers each request target from a fixed table,
    /// 404 for anything else, and records every target it saw.
    pub struct MockUpstream {
        pub addr: SocketAddr,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl MockUpstream {
        pub fn start(replies: Vec<(&str, u16, &str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let table: Vec<(String, u16, String)> = replies
                .into_iter()
                .map(|(t, s, b)| (t.to_string(), s, b.to_string()))
                .collect();
            let recorded = Arc::clone(&seen);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { continue };
                    let Some(target) = read_target(&mut stream) else {
                        continue;
                    };
                    recorded.lock().unwrap().push(target.clone());
                    let (status, body) = table
                        .iter()
                        .find(|(t, _, _)| *t == target)
                        .map(|(_, s, b)| (*s, b.as_str()))
                        .unwrap_or((404, "Not Found"));
                    let reply = format!(
                        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(reply.as_bytes());
                }
            });
            Self { addr, seen }
        }

        pub fn base_url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn read_target(stream: &mut TcpStream) -> Option<String> {
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .ok()?;
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut tmp).ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&tmp[..n]);
        }
        let text = String::from_utf8_lossy(&buf);
        text.lines()
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .map(str::to_string)
    }

    /// Accepts connections and never answers.
    pub fn silent_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        addr
    }

    /// An address nothing listens on.
    pub fn unreachable_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }
}

pub mod test_server {
    use lookup_proxy::config::ServiceConfig;
    use lookup_proxy::registry::build_service;
    use lookup_proxy::server::{HttpServer, ServerHandle};
    use std::net::{SocketAddr, TcpListener};
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x10000);
        });
    }

    /// A running service, stopped on drop.
    pub struct TestServer {
        handle: Option<ServerHandle>,
        pub addr: SocketAddr,
    }

    impl TestServer {
        pub fn start(config: &ServiceConfig) -> Self {
            setup_may_runtime();
            let service = build_service(config).unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let handle = HttpServer(service).start(addr).unwrap();
            handle.wait_ready().unwrap();
            Self {
                handle: Some(handle),
                addr,
            }
        }

        /// Service whose lookups point at `base` (a mock upstream).
        pub fn with_upstream(base: &str) -> Self {
            Self::start(&config_for(base))
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }

    /// Defaults with both lookups aimed at `base`.
    pub fn config_for(base: &str) -> ServiceConfig {
        let mut config = ServiceConfig::with_defaults();
        config.http.handler_workers = 2;
        config.upstream.timeout_ms = 2000;
        config.lookups.pokemon.url_template = Some(format!("{base}/pokemon/{{name}}"));
        config.lookups.book.url_template = Some(format!(
            "{base}/books?bibkeys=ISBN:{{isbn}}&format=json&jscmd=data"
        ));
        config
    }
}
