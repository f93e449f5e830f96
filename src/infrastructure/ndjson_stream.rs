// Newline-delimited JSON streaming utilities
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::watch;

/// Stream every item as one JSON line.
pub fn ndjson_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize,
{
    let body = Body::from_stream(stream.map(|item| serialize_line(&item)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn serialize_line<T: Serialize>(item: &T) -> Result<Bytes, serde_json::Error> {
    let mut line = BytesMut::new().writer();
    serde_json::to_writer(&mut line, item)?;
    let mut line = line.into_inner();
    line.put_u8(b'\n');
    Ok(line.freeze())
}

/// Emit the current value of `rx`, then each change until the sender goes away.
pub fn stream_from_watch<T>(mut rx: watch::Receiver<T>) -> impl IntoResponse
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        let current = rx.borrow_and_update().clone();
        yield current;
        while rx.changed().await.is_ok() {
            let next = rx.borrow_and_update().clone();
            yield next;
        }
    };

    match ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Serialize)]
    struct Reading {
        value: u32,
    }

    #[test]
    fn test_line_is_terminated() {
        let line = serialize_line(&Reading { value: 7 }).unwrap();
        assert_eq!(&line[..], b"{\"value\":7}\n");
    }

    #[tokio::test]
    async fn test_watch_stream_replays_current_then_changes() {
        let (tx, rx) = watch::channel(Reading { value: 1 });
        let response = stream_from_watch(rx).into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );

        tx.send_replace(Reading { value: 2 });
        drop(tx);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        // The first line is whatever was current when polling began
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.ends_with("{\"value\":2}\n"));
        assert!(text.lines().count() <= 2);
    }
}
