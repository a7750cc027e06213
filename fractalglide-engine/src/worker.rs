//! Render workers: two OS threads that turn frames into RGBA off the
//! main context.
//!
//! Frames move by value over the channels, so whichever side holds a
//! frame holds it exclusively. A worker receives a frame, renders it
//! (or observes its expiry and leaves the drop signal) and sends the
//! same frame back on the shared reply channel.

use crate::error::EngineError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use fractalglide_core::{render_frame, Frame, Pixel};
use log::debug;
use std::thread::JoinHandle;
use std::time::Instant;

pub(crate) enum WorkerRequest<P: Pixel> {
    Render(Frame<P>),
    Terminate,
}

pub(crate) struct WorkerReply<P: Pixel> {
    pub frame: Frame<P>,
}

pub(crate) struct RenderWorkers<P: Pixel> {
    senders: Vec<Sender<WorkerRequest<P>>>,
    replies: Receiver<WorkerReply<P>>,
    handles: Vec<JoinHandle<()>>,
}

impl<P: Pixel> RenderWorkers<P> {
    /// Spawn `count` workers sharing one reply channel. `epoch` is the
    /// engine clock zero so expiry deadlines mean the same thing on
    /// every thread.
    pub fn spawn(count: usize, epoch: Instant) -> Result<Self, EngineError> {
        let (reply_tx, replies) = unbounded();
        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let (tx, rx) = unbounded::<WorkerRequest<P>>();
            let reply_tx = reply_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("fractalglide-render-{id}"))
                .spawn(move || worker_loop(id, rx, reply_tx, epoch))?;
            senders.push(tx);
            handles.push(handle);
        }

        Ok(Self {
            senders,
            replies,
            handles,
        })
    }

    /// Transfer a frame to a worker. The frame comes back through
    /// [`RenderWorkers::try_recv`] once rendered or dropped.
    pub fn submit(&self, worker_id: usize, frame: Frame<P>) {
        // a send can only fail after the worker died; the reply channel
        // going quiet surfaces that to the scheduler
        let _ = self.senders[worker_id].send(WorkerRequest::Render(frame));
    }

    pub fn try_recv(&self) -> Option<WorkerReply<P>> {
        self.replies.try_recv().ok()
    }
}

impl<P: Pixel> Drop for RenderWorkers<P> {
    fn drop(&mut self) {
        for sender in &self.senders {
            let _ = sender.send(WorkerRequest::Terminate);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<P: Pixel>(
    id: usize,
    requests: Receiver<WorkerRequest<P>>,
    replies: Sender<WorkerReply<P>>,
    epoch: Instant,
) {
    debug!("render worker {} up", id);
    while let Ok(request) = requests.recv() {
        match request {
            WorkerRequest::Render(mut frame) => {
                let now_ms = epoch.elapsed().as_secs_f64() * 1000.0;
                render_frame(&mut frame, now_ms);
                if replies.send(WorkerReply { frame }).is_err() {
                    break;
                }
            }
            WorkerRequest::Terminate => break,
        }
    }
    debug!("render worker {} down", id);
}
