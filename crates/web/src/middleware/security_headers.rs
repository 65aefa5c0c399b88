//! Security headers middleware.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Google Identity Services origin (sign-in button script, iframe, styles).
const GSI: &str = "https://accounts.google.com/gsi/";

/// Add security headers to all responses.
///
/// The CSP admits Google Identity Services for the login button and any
/// `https:` or `data:` image, since app icons are either remote URLs or
/// embedded uploads:
///
/// ```text
/// default-src 'self';
/// script-src 'self' https://accounts.google.com/gsi/client;
/// style-src 'self' https://accounts.google.com/gsi/style;
/// img-src 'self' data: https:;
/// connect-src 'self' https://accounts.google.com/gsi/;
/// frame-src https://accounts.google.com/gsi/;
/// object-src 'none';
/// base-uri 'self';
/// form-action 'self';
/// frame-ancestors 'none'
/// ```
///
/// The opener policy is `same-origin-allow-popups` so the Google sign-in
/// popup can post back to the page.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if let Ok(csp) = HeaderValue::from_str(&content_security_policy()) {
        headers.insert(CONTENT_SECURITY_POLICY, csp);
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             payment=(), \
             usb=()",
        ),
    );

    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin-allow-popups"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

fn content_security_policy() -> String {
    format!(
        "default-src 'self'; \
         script-src 'self' {GSI}client; \
         style-src 'self' {GSI}style; \
         img-src 'self' data: https:; \
         connect-src 'self' {GSI}; \
         frame-src {GSI}; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'"
    )
}
