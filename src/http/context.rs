use crate::http::{request::Request, response::Response};

/// The request and its response for one connection.
///
/// Created by the server after the request head is parsed and passed to
/// [`Handler::handle`](crate::Handler::handle). Both halves live exactly as
/// long as the connection.
///
/// # Examples
/// ```
/// use nimble_http::{Context, StatusCode};
///
/// async fn echo_header(ctx: &mut Context) -> std::io::Result<()> {
///     let (req, resp) = ctx.parts();
///     let value = req.header("Custom-Header").unwrap_or_default();
///
///     resp.status(StatusCode::Ok)
///         .header("Content-Length", value.len());
///     resp.write_body(value).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
}

impl Context {
    #[inline]
    pub(crate) fn new(request: Request, response: Response) -> Self {
        Self { request, response }
    }

    #[inline]
    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    #[inline(always)]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline(always)]
    pub fn response(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Borrows the request and the response at the same time.
    #[inline(always)]
    pub fn parts(&mut self) -> (&Request, &mut Response) {
        (&self.request, &mut self.response)
    }
}
