//! Decode and encode loops.
//!
//! [`Pipeline::spawn`] starts two tokio tasks over one transport:
//! - decode: read at least `needed` bytes, decode as many frames as the buffer
//!   holds, publish events, repeat until the transport or a cancel ends it
//! - encode: take one request, encode it into the write buffer, flush, repeat
//!   until the request queue completes
//!
//! Each loop has its own cancellation token and completes its own side of the
//! transport and its own queue on exit, whatever the reason.

use std::fmt;
use std::time::Duration;

use nt3_frame::{Decode, FrameConfig, FrameDecoder, ReadEvent, WriteEvent};
use nt3_transport::{TransportReader, TransportStream, TransportWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, warn, Instrument};

use crate::channel::{EventReceiver, EventSender, PipelineEnd};
use crate::error::PipelineError;

/// How a loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// The input side ended (transport EOF, request queue completed, or the
    /// peer stopped accepting data).
    Completed,
    /// The loop's cancellation token fired.
    Cancelled,
    /// A transport or frame error stopped the loop.
    Failed(PipelineError),
}

impl LoopExit {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoopExit::Failed(_))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            LoopExit::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::Completed => f.write_str("completed"),
            LoopExit::Cancelled => f.write_str("cancelled"),
            LoopExit::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Exit status of both loops after [`Pipeline::close`].
#[derive(Debug)]
pub struct PipelineReport {
    pub decode: LoopExit,
    pub encode: LoopExit,
}

impl PipelineReport {
    /// First loop failure, decode side first.
    pub fn into_result(self) -> Result<(), PipelineError> {
        match (self.decode, self.encode) {
            (LoopExit::Failed(err), _) | (_, LoopExit::Failed(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Handle to a running decode/encode loop pair.
pub struct Pipeline {
    decode_task: JoinHandle<LoopExit>,
    encode_task: JoinHandle<LoopExit>,
    decode_cancel: CancellationToken,
    encode_cancel: CancellationToken,
}

impl Pipeline {
    /// Spawn both loops on the current tokio runtime.
    pub fn spawn<R, W>(transport: TransportStream<R, W>, end: PipelineEnd, config: FrameConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let peer = transport
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());
        let (reader, writer) = transport.split();
        let PipelineEnd { events, requests } = end;

        let decode_cancel = CancellationToken::new();
        let encode_cancel = CancellationToken::new();

        let decode_task = tokio::spawn(
            decode_loop(
                reader,
                events,
                FrameDecoder::with_config(config),
                decode_cancel.clone(),
            )
            .instrument(info_span!("nt3_decode", peer = %peer)),
        );
        let encode_task = tokio::spawn(
            encode_loop(writer, requests, encode_cancel.clone())
                .instrument(info_span!("nt3_encode", peer = %peer)),
        );

        Self {
            decode_task,
            encode_task,
            decode_cancel,
            encode_cancel,
        }
    }

    /// Stop the decode loop. The encode loop keeps running.
    pub fn cancel_decode(&self) {
        self.decode_cancel.cancel();
    }

    /// Stop the encode loop. The decode loop keeps running.
    pub fn cancel_encode(&self) {
        self.encode_cancel.cancel();
    }

    /// True once both loops have exited.
    pub fn is_finished(&self) -> bool {
        self.decode_task.is_finished() && self.encode_task.is_finished()
    }

    /// Wait for the encode loop, then the decode loop.
    ///
    /// Neither loop is cancelled here: the encode loop ends when its request
    /// queue completes, the decode loop when the peer closes.
    pub async fn close(self) -> PipelineReport {
        let encode = join(self.encode_task).await;
        let decode = join(self.decode_task).await;
        PipelineReport { decode, encode }
    }

    /// Like [`close`](Self::close), but cancels the decode loop if it has not
    /// finished within `grace` after the encode loop exited.
    pub async fn close_with_timeout(self, grace: Duration) -> PipelineReport {
        let Pipeline {
            mut decode_task,
            encode_task,
            decode_cancel,
            ..
        } = self;

        let encode = join(encode_task).await;
        let decode = match tokio::time::timeout(grace, &mut decode_task).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                debug!(?grace, "decode loop still running; cancelling");
                decode_cancel.cancel();
                join(decode_task).await
            }
        };
        PipelineReport { decode, encode }
    }

    /// Cancel both loops and wait for them.
    pub async fn abort(self) -> PipelineReport {
        self.decode_cancel.cancel();
        self.encode_cancel.cancel();
        self.close().await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("decode_finished", &self.decode_task.is_finished())
            .field("encode_finished", &self.encode_task.is_finished())
            .finish()
    }
}

async fn join(task: JoinHandle<LoopExit>) -> LoopExit {
    flatten(task.await)
}

fn flatten(joined: Result<LoopExit, tokio::task::JoinError>) -> LoopExit {
    joined.unwrap_or_else(|err| LoopExit::Failed(PipelineError::TaskPanicked(err.to_string())))
}

async fn decode_loop<R>(
    mut reader: TransportReader<R>,
    mut events: EventSender<ReadEvent>,
    mut decoder: FrameDecoder,
    cancel: CancellationToken,
) -> LoopExit
where
    R: AsyncRead + Unpin,
{
    debug!("decode loop started");
    let exit = run_decode(&mut reader, &mut events, &mut decoder, &cancel).await;

    reader.complete();
    events.close();

    match &exit {
        LoopExit::Failed(err) => warn!(error = %err, "decode loop failed"),
        other => debug!(exit = %other, "decode loop stopped"),
    }
    exit
}

async fn run_decode<R>(
    reader: &mut TransportReader<R>,
    events: &mut EventSender<ReadEvent>,
    decoder: &mut FrameDecoder,
    cancel: &CancellationToken,
) -> LoopExit
where
    R: AsyncRead + Unpin,
{
    let mut needed = 1;
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            read = reader.read_at_least(needed) => read,
        };
        let read = match read {
            Ok(read) => read,
            Err(err) => return LoopExit::Failed(err.into()),
        };

        loop {
            match decoder.decode(reader.buffer()) {
                Ok(Decode::Frame { event, consumed }) => {
                    reader.consume(consumed);
                    let Some(event) = event else {
                        trace!(consumed, "frame carried no event");
                        continue;
                    };
                    trace!(kind = event.kind().name(), consumed, "decoded event");
                    if events.send(event).is_err() {
                        debug!("event consumer went away");
                        return LoopExit::Completed;
                    }
                }
                Ok(Decode::Incomplete { needed: more }) => {
                    needed = more;
                    break;
                }
                Err(err) => return LoopExit::Failed(err.into()),
            }
        }

        if read.is_completed {
            let unread = reader.buffer().len();
            if unread > 0 {
                debug!(unread, "peer closed mid-frame");
            }
            return LoopExit::Completed;
        }
    }
}

async fn encode_loop<W>(
    mut writer: TransportWriter<W>,
    mut requests: EventReceiver<WriteEvent>,
    cancel: CancellationToken,
) -> LoopExit
where
    W: AsyncWrite + Unpin,
{
    debug!("encode loop started");
    let mut exit = run_encode(&mut writer, &mut requests, &cancel).await;

    requests.close();
    if let Err(err) = writer.complete().await {
        if matches!(exit, LoopExit::Completed) {
            exit = LoopExit::Failed(err.into());
        } else {
            debug!(error = %err, "write side shutdown failed");
        }
    }

    match &exit {
        LoopExit::Failed(err) => warn!(error = %err, "encode loop failed"),
        other => debug!(exit = %other, "encode loop stopped"),
    }
    exit
}

async fn run_encode<W>(
    writer: &mut TransportWriter<W>,
    requests: &mut EventReceiver<WriteEvent>,
    cancel: &CancellationToken,
) -> LoopExit
where
    W: AsyncWrite + Unpin,
{
    loop {
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            request = requests.recv() => request,
        };
        let Some(request) = request else {
            return LoopExit::Completed;
        };

        let len = match request.encoded_len() {
            Ok(len) => len,
            Err(err) => return LoopExit::Failed(err.into()),
        };
        let written = match request.encode_into(writer.get_buffer(len)) {
            Ok(written) => written,
            Err(err) => return LoopExit::Failed(err.into()),
        };
        writer.advance(written);
        trace!(kind = ?request.kind(), bytes = written, "encoded request");

        let flushed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            flushed = writer.flush() => flushed,
        };
        match flushed {
            Ok(result) if result.is_completed => {
                debug!("peer stopped accepting data");
                return LoopExit::Completed;
            }
            Ok(_) => {}
            Err(err) => return LoopExit::Failed(err.into()),
        }
    }
}
