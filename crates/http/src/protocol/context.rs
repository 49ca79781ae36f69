use std::net::SocketAddr;

use crate::protocol::{CookieJar, Request, Response};

/// Everything a middleware sees while handling one request.
///
/// The context holds at most one response. Setting another replaces it, so
/// an outer middleware can rewrite what an inner one produced.
#[derive(Debug)]
pub struct Context {
    request: Request,
    remote_addr: Option<SocketAddr>,
    response: Option<Response>,
    cookies: CookieJar,
}

impl Context {
    pub fn new(request: Request, remote_addr: Option<SocketAddr>) -> Self {
        let cookies = CookieJar::from_headers(request.headers());
        Self { request, remote_addr, response: None, cookies }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }
}
