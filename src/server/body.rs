//! Response body that releases the checkpoint producer once sent.
//!
//! The migration session rides inside the body stream and is released when
//! the stream is dropped. The release is `Delivered` once the HTTP stack has
//! polled the stream past its only chunk, and `Disconnected` if the stream
//! is dropped before that, for example when the connection goes away.
//!
//! `Delivered` means the payload was handed to the HTTP stack, not that it
//! was flushed to the socket or received by the caller. The stack may still
//! be writing the final chunk when the producer proceeds, and a connection
//! lost at that point is not reported.

use std::convert::Infallible;

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream;

use crate::migration::{MigrationSession, ReleaseReason};

struct DeliveryGuard {
    session: MigrationSession,
    delivered: bool,
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        let reason = if self.delivered {
            ReleaseReason::Delivered
        } else {
            ReleaseReason::Disconnected
        };
        self.session.release(reason);
    }
}

/// Wrap `payload` in a body that releases `session` when it is dropped.
#[must_use]
pub fn release_after_send(session: MigrationSession, payload: Bytes) -> Body {
    let guard = DeliveryGuard {
        session,
        delivered: false,
    };
    let chunks = stream::unfold((Some(payload), guard), |(payload, mut guard)| async move {
        match payload {
            Some(bytes) => Some((Ok::<Bytes, Infallible>(bytes), (None, guard))),
            None => {
                guard.delivered = true;
                None
            }
        }
    });
    Body::from_stream(chunks)
}
