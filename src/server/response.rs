//! HTTP response writers.

use std::fs;
use std::io;
use std::path::Path;

use tiny_http::{Header, Request, Response, StatusCode};

use crate::debug;
use crate::route::ResponseContext;
use crate::utils::mime::{self, types};

/// Write a handler response.
///
/// `tiny_http` omits the body for `HEAD` requests on its own.
pub fn respond(request: Request, res: ResponseContext) -> io::Result<()> {
    let mut response = Response::from_data(res.body).with_status_code(StatusCode(res.status));
    for (name, value) in &res.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => debug!("serve"; "dropping invalid header `{}`", name),
        }
    }
    request.respond(response)
}

/// Respond with a static file.
pub fn respond_file(request: Request, path: &Path) -> io::Result<()> {
    let body = fs::read(path)?;
    let res = ResponseContext::new(200)
        .with_header("Content-Type", mime::from_path(path))
        .with_body(body);
    respond(request, res)
}

pub fn respond_status(request: Request, status: u16, message: &str) -> io::Result<()> {
    let res = ResponseContext::new(status)
        .with_header("Content-Type", types::PLAIN)
        .with_body(message.as_bytes().to_vec());
    respond(request, res)
}

pub fn respond_not_found(request: Request) -> io::Result<()> {
    respond_status(request, 404, "404 Not Found")
}

pub fn respond_method_not_allowed(request: Request) -> io::Result<()> {
    respond_status(request, 405, "405 Method Not Allowed")
}

/// Shutdown in progress.
pub fn respond_unavailable(request: Request) -> io::Result<()> {
    respond_status(request, 503, "503 Service Unavailable")
}
