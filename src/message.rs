// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The remote-task round trip: two FIFOs (outbound requests, inbound responses) sharing one
//! mutex and one condition variable, plus the [`RemoteTransport`] boundary an external actor
//! implements to actually perform the remote work.

use std::collections::VecDeque;
use std::ptr::NonNull;
use std::sync::{Condvar, Mutex};

use arrayvec::ArrayString;

use crate::task::Task;

/// Outgoing messages are bounded by this many bytes, matching the original implementation's
/// `MAX_MSG_LENGTH`. Longer messages are truncated at construction.
pub const MAX_MSG_LENGTH: usize = 254;

/// A remote-task's position in its round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Sitting on the outbound queue, awaiting a transport.
    Send,
    /// Sitting on the inbound queue, filled in by a transport.
    Recv,
}

/// Ownership of a remote task's response payload.
pub enum ResponseBuf {
    /// No response payload (or not yet filled in).
    None,
    /// The remote record owns the allocation; freed when the record is dropped.
    Owned(Vec<u8>),
    /// The caller supplied a fixed buffer; the transport writes into it in place and the remote
    /// record does not free it.
    CallerOwned(NonNull<[u8]>),
}

// Safety: a `CallerOwned` buffer is only ever touched by the transport (between dequeue and
// re-enqueue) and, after the round trip completes, by the calling task alone.
unsafe impl Send for ResponseBuf {}

/// How a caller of [`crate::remote_task_create`] wants the response delivered.
pub enum ResponseBuffer {
    /// No response payload is expected.
    None,
    /// The transport writes the response directly into this buffer, which the caller already
    /// owns and reads again after the call returns (or, for a non-blocking send, once it knows
    /// the round trip completed).
    ///
    /// # Safety
    /// The pointee must stay valid and exclusively accessible until the round trip completes.
    /// Guaranteed automatically for a blocking send, since the caller stays suspended; the
    /// caller's own responsibility for a non-blocking one.
    CallerOwned(NonNull<[u8]>),
}

/// A remote task: an outbound request, optionally paired with the calling task that will be
/// reinserted once the response arrives.
pub struct RemoteTask {
    pub message: ArrayString<MAX_MSG_LENGTH>,
    pub status: RemoteStatus,
    pub data: ResponseBuf,
    /// `Some` only for blocking sends: owns the caller until the response arrives. Non-blocking
    /// sends reinsert the caller immediately at send time (see `executor`), so there is nothing
    /// left to own here. The calling task is realized as ownership rather than a bare reference,
    /// since nothing else is left holding the caller's `Task` once it leaves its ready queue; see
    /// the handoff protocol note in [`crate::current`].
    pub(crate) caller: Option<Box<Task>>,
    pub blocking: bool,
}

impl RemoteTask {
    pub(crate) fn new(message: &str, blocking: bool) -> Self {
        let mut truncated = ArrayString::new();
        let cut = message
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= MAX_MSG_LENGTH)
            .last()
            .unwrap_or(0);
        truncated.push_str(&message[..cut]);

        RemoteTask {
            message: truncated,
            status: RemoteStatus::Send,
            data: ResponseBuf::None,
            caller: None,
            blocking,
        }
    }
}

/// The board's outbound/inbound message queues, sharing one mutex and one condvar.
#[derive(Default)]
pub struct MessageQueues {
    outbound: VecDeque<Box<RemoteTask>>,
    inbound: VecDeque<Box<RemoteTask>>,
}

/// Shared lock plus condvar wrapping [`MessageQueues`].
#[derive(Default)]
pub struct Messages {
    queues: Mutex<MessageQueues>,
    condvar: Condvar,
}

impl Messages {
    pub fn new() -> Self {
        Messages {
            queues: Mutex::new(MessageQueues::default()),
            condvar: Condvar::new(),
        }
    }

    /// Enqueue a new remote request on the outbound queue and wake the transport.
    pub(crate) fn send(&self, remote: Box<RemoteTask>) {
        let mut queues = self.queues.lock().unwrap();
        queues.outbound.push_back(remote);
        self.condvar.notify_all();
    }

    /// Drain every entry currently on the inbound queue. Called by the sequencer at the top of
    /// every executor iteration, under the message mutex.
    pub(crate) fn drain_inbound(&self) -> Vec<Box<RemoteTask>> {
        let mut queues = self.queues.lock().unwrap();
        queues.inbound.drain(..).collect()
    }

    pub(crate) fn notify_all(&self) {
        self.condvar.notify_all();
    }

    /// Drain whatever remains on both queues, for board teardown.
    pub(crate) fn drain_all(&self) -> (Vec<Box<RemoteTask>>, Vec<Box<RemoteTask>>) {
        let mut queues = self.queues.lock().unwrap();
        (
            queues.outbound.drain(..).collect(),
            queues.inbound.drain(..).collect(),
        )
    }
}

/// The transport boundary: an external actor that drains outbound requests, performs the actual
/// remote work, and deposits responses on the inbound queue.
///
/// This crate does not ship a networked implementation (see the crate-level Non-goals), but it
/// provides the contract, the queue plumbing, and a fake transport under `tests/` for exercising
/// the round trip. Implementors supply [`RemoteTransport::execute`]; [`RemoteTransport::run`]
/// drives the loop using it.
pub trait RemoteTransport: Send + Sync {
    /// Perform the actual remote work for one request's message, returning the response payload,
    /// if any. Called with the message mutex released, so this may block for as long as the real
    /// remote call takes.
    fn execute(&self, message: &str) -> Option<Vec<u8>>;

    /// Drive the transport loop until `should_stop` returns true: block for a batch of outbound
    /// requests, call [`RemoteTransport::execute`] on each, write the result back (respecting a
    /// [`super::ResponseBuffer::CallerOwned`] buffer in place), and reply.
    fn run(&self, messages: &Messages, should_stop: impl Fn() -> bool + Copy) {
        loop {
            let batch = self.recv_batch(messages, should_stop);
            if batch.is_empty() {
                if should_stop() {
                    return;
                }
                continue;
            }
            for mut request in batch {
                let response = self.execute(&request.message);
                request.status = RemoteStatus::Recv;
                request.data = match (std::mem::replace(&mut request.data, ResponseBuf::None), response) {
                    (ResponseBuf::CallerOwned(mut ptr), Some(bytes)) => {
                        // Safety: contract documented on `ResponseBuffer::CallerOwned`.
                        let slice = unsafe { ptr.as_mut() };
                        let n = bytes.len().min(slice.len());
                        slice[..n].copy_from_slice(&bytes[..n]);
                        ResponseBuf::CallerOwned(ptr)
                    }
                    (ResponseBuf::CallerOwned(ptr), None) => ResponseBuf::CallerOwned(ptr),
                    (_, Some(bytes)) => ResponseBuf::Owned(bytes),
                    (_, None) => ResponseBuf::None,
                };
                self.reply(messages, request);
            }
        }
    }

    /// Block until at least one outbound request is available, or until `should_stop` returns
    /// true (checked after every spurious wake), then drain and return all of them.
    fn recv_batch(
        &self,
        messages: &Messages,
        should_stop: impl Fn() -> bool,
    ) -> Vec<Box<RemoteTask>> {
        let mut queues = messages.queues.lock().unwrap();
        loop {
            if !queues.outbound.is_empty() {
                return queues.outbound.drain(..).collect();
            }
            if should_stop() {
                return Vec::new();
            }
            let (g, _timeout) = messages
                .condvar
                .wait_timeout(queues, std::time::Duration::from_millis(50))
                .unwrap();
            queues = g;
        }
    }

    /// Deposit a filled-in response on the inbound queue and wake the sequencer.
    fn reply(&self, messages: &Messages, response: Box<RemoteTask>) {
        let mut queues = messages.queues.lock().unwrap();
        queues.inbound.push_back(response);
        messages.condvar.notify_all();
    }
}
