use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::{Id, RequestContext};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Axum extractor for RequestContext from request headers
///
/// The requesting identity is read from `X-User-Id`. A request without the
/// header is anonymous; a header that is not an integer id is rejected.
/// Route parameters are added by the handlers.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        match extract_user_id(&parts.headers) {
            Ok(Some(user)) => Ok(RequestContext::for_user(user)),
            Ok(None) => Ok(RequestContext::anonymous()),
            Err(()) => Err(StatusCode::BAD_REQUEST),
        }
    }
}

fn extract_user_id(headers: &HeaderMap) -> Result<Option<Id>, ()> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<Id>().ok())
        .map(Some)
        .ok_or(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_user_id_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers), Ok(None));

        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("42"),
        );
        assert_eq!(extract_user_id(&headers), Ok(Some(42)));

        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("alice"),
        );
        assert_eq!(extract_user_id(&headers), Err(()));
    }
}
