use crate::error::{Error, Result};
use crate::static_files::StaticFiles;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, error, warn};

/// Loopback static file server over the preview directory.
pub struct Preview {
    server: Server,
    files: StaticFiles,
}

impl Preview {
    /// Bind `127.0.0.1:port`; port `0` picks a free one.
    pub fn bind(dir: &Path, port: u16) -> Result<Self> {
        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| Error::from(io::Error::new(io::ErrorKind::AddrNotAvailable, e.to_string())))?;
        Ok(Self {
            server,
            files: StaticFiles::new(dir),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.server
            .server_addr()
            .to_ip()
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    /// Serve requests until the server is unblocked.
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            self.respond(request);
        }
    }

    /// Make [`Preview::run`] return.
    pub fn shutdown(&self) {
        self.server.unblock();
    }

    fn respond(&self, request: Request) {
        let url = request.url().to_string();
        let outcome = match self.files.load(&url) {
            Ok((bytes, content_type)) => {
                debug!(url = %url, bytes = bytes.len(), "preview hit");
                let mut response = Response::from_data(bytes);
                if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
                    response = response.with_header(header);
                }
                request.respond(response)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(url = %url, "preview miss");
                request.respond(Response::from_string("not found").with_status_code(404))
            }
            Err(err) => {
                warn!(url = %url, error = %err, "preview read failed");
                request.respond(Response::from_string("internal error").with_status_code(500))
            }
        };
        if let Err(err) = outcome {
            error!(url = %url, error = %err, "preview response failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;
    use std::thread;

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_serves_files_and_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("dev")).unwrap();
        std::fs::write(dir.path().join("dev/index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("dev/app.yaml"), "name: foo\n").unwrap();

        let preview = Arc::new(Preview::bind(dir.path(), 0).unwrap());
        let addr = preview.addr();
        let server = Arc::clone(&preview);
        let handle = thread::spawn(move || server.run());

        let file = get(addr, "/dev/app.yaml");
        assert!(file.starts_with("HTTP/1.1 200"));
        assert!(file.contains("application/yaml"));
        assert!(file.ends_with("name: foo\n"));

        let index = get(addr, "/dev/");
        assert!(index.ends_with("<html></html>"));

        assert!(get(addr, "/missing.txt").starts_with("HTTP/1.1 404"));
        assert!(get(addr, "/../etc/passwd").starts_with("HTTP/1.1 404"));

        preview.shutdown();
        handle.join().unwrap();
    }
}
