//! Stock sizers and paginators for common pagination schemes.

use crate::url_request::{HttpResponse, UrlRequest};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use url::Url;

static LINK_NEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]*)>\s*((?:;\s*[^;,]+)*);?\s*rel\s*=\s*"?([^";,]*\bnext\b[^";,]*)"?"#)
        .expect("link header regex must compile")
});

/// Sizer setting the page size through the `name` query parameter.
pub fn query_sizer(name: &str) -> impl Fn(&UrlRequest, u32) -> UrlRequest + Clone + Send + Sync {
    let name = name.to_string();
    move |url_request, size| url_request.clone().with_query_value(&name, &size.to_string())
}

/// Paginator for services numbering pages through the `name` query parameter.
///
/// Pagination stops on an empty page, or on a page shorter than the requested
/// size.
pub fn query_page_paginator(
    name: &str,
) -> impl Fn(&UrlRequest, Option<&Vec<Value>>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
       + Clone
       + Send
       + Sync {
    let name = name.to_string();
    move |url_request, items, _response, size, number| {
        let count = items?.len();
        if count == 0 || (size != 0 && count < size as usize) {
            return None;
        }
        Some(
            url_request
                .clone()
                .with_query_value(&name, &(number + 1).to_string()),
        )
    }
}

/// Paginator following the `rel="next"` link of the `Link` response header.
pub fn link_header_paginator<T>(
) -> impl Fn(&UrlRequest, Option<&T>, Option<&HttpResponse>, u32, u32) -> Option<UrlRequest>
       + Clone
       + Send
       + Sync {
    |url_request, _value, response, _size, _number| {
        let response = response?;
        let header = response.header(reqwest::header::LINK.as_str())?;
        let next = next_link(header)?;
        let url = resolve(response.url(), &next)?;
        Some(url_request.clone().with_url(url))
    }
}

/// Paginator reading the next page URL from the `field` entry of a JSON
/// dictionary. Relative URLs are resolved against the current request URL.
pub fn json_field_paginator(
    field: &str,
) -> impl Fn(
    &UrlRequest,
    Option<&Map<String, Value>>,
    Option<&HttpResponse>,
    u32,
    u32,
) -> Option<UrlRequest>
       + Clone
       + Send
       + Sync {
    let field = field.to_string();
    move |url_request, dictionary, _response, _size, _number| {
        let next = dictionary?.get(&field)?.as_str()?;
        if next.is_empty() {
            return None;
        }
        let url = resolve(url_request.url(), next)?;
        Some(url_request.clone().with_url(url))
    }
}

/// Target of the `rel="next"` link in a `Link` header value.
pub fn next_link(header: &str) -> Option<String> {
    LINK_NEXT_RE
        .captures_iter(header)
        .find(|caps| {
            caps.get(3)
                .map(|rel| rel.as_str().split_whitespace().any(|r| r == "next"))
                .unwrap_or(false)
        })
        .and_then(|caps| caps.get(1))
        .map(|target| target.as_str().trim().to_string())
}

fn resolve(base: &Url, target: &str) -> Option<Url> {
    base.join(target).ok()
}
