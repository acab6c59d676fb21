use crate::url_request::UrlRequest;

/// A page of results, produced by page requests.
///
/// Pages cannot be built directly. Get the first one from a
/// [`FirstPageRequest`](crate::FirstPageRequest) and the following ones from
/// the `next_page` delivered on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    size: u32,
    number: u32,
    url_request: UrlRequest,
}

impl Page {
    /// Let the service decide the page size.
    pub const UNSPECIFIED_SIZE: u32 = 0;

    pub(crate) fn first(url_request: UrlRequest, size: u32) -> Self {
        Self {
            size,
            number: 0,
            url_request,
        }
    }

    pub(crate) fn next(&self, url_request: UrlRequest) -> Self {
        Self {
            size: self.size,
            number: self.number.saturating_add(1),
            url_request,
        }
    }

    /// Requested page size, or [`Page::UNSPECIFIED_SIZE`].
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Page number, starting at 0.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Request retrieving the page.
    pub fn url_request(&self) -> &UrlRequest {
        &self.url_request
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "page {} (size {}) {}",
            self.number,
            self.size,
            self.url_request.url()
        )
    }
}
