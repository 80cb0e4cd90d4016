//! Serialized writes.
//!
//! Every create and update goes through one worker thread. A job performs
//! the write and, when it succeeds, the wholesale reload of the collection,
//! so outcomes are delivered strictly in submission order and a reload can
//! never be overtaken by an older write.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Sender};

use crate::api::{ApiError, NewPost, Post};
use crate::data::{classify, PostService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationJob {
    Create(NewPost),
    Update(Post),
}

impl MutationJob {
    pub fn post_id(&self) -> Option<&str> {
        match self {
            MutationJob::Create(_) => None,
            MutationJob::Update(post) => Some(&post.id),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            MutationJob::Create(post) => &post.tag,
            MutationJob::Update(post) => &post.tag,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MutationJob::Create(_) => "create",
            MutationJob::Update(_) => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    /// Write accepted and the collection reloaded.
    Saved { posts: Vec<Post> },
    /// Write accepted but the follow-up reload failed.
    SavedWithoutReload { error: String },
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub ticket: u64,
    pub job: MutationJob,
    pub status: MutationStatus,
}

impl MutationOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self.status, MutationStatus::Failed(_))
    }
}

struct Envelope {
    ticket: u64,
    job: MutationJob,
    passkey: String,
}

pub struct MutationQueue {
    jobs: Option<Sender<Envelope>>,
    worker: Option<JoinHandle<()>>,
    next_ticket: u64,
    pending: Arc<AtomicUsize>,
}

impl MutationQueue {
    /// Starts the worker. `notify` runs on the worker thread once per job.
    pub fn start<F>(service: Arc<dyn PostService>, notify: F) -> Result<Self>
    where
        F: Fn(MutationOutcome) + Send + 'static,
    {
        let (tx, rx) = unbounded::<Envelope>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = pending.clone();

        let worker = thread::Builder::new()
            .name("blog-tui-mutations".into())
            .spawn(move || {
                for envelope in rx.iter() {
                    let outcome = run_job(service.as_ref(), envelope);
                    notify(outcome);
                    worker_pending.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .context("spawn mutation worker")?;

        Ok(Self {
            jobs: Some(tx),
            worker: Some(worker),
            next_ticket: 1,
            pending,
        })
    }

    pub fn submit(&mut self, job: MutationJob, passkey: &str) -> Result<u64> {
        let ticket = self.next_ticket;
        let sender = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("mutation queue is shut down"))?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            ticket,
            job,
            passkey: passkey.to_string(),
        };
        if sender.send(envelope).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("mutation worker stopped"));
        }
        self.next_ticket += 1;
        Ok(ticket)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.pending() > 0
    }

    /// Finishes queued jobs, then stops the worker.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("mutation worker panicked");
            }
        }
    }
}

impl Drop for MutationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(service: &dyn PostService, envelope: Envelope) -> MutationOutcome {
    let Envelope {
        ticket,
        job,
        passkey,
    } = envelope;

    let written = match &job {
        MutationJob::Create(post) => service.create(post, &passkey),
        MutationJob::Update(post) => service.update(post, &passkey),
    };

    let status = match written {
        Err(err) => {
            let err = classify(&err);
            tracing::warn!(ticket, kind = job.kind(), error = %err, "mutation rejected");
            MutationStatus::Failed(err)
        }
        Ok(()) => {
            tracing::info!(ticket, kind = job.kind(), tag = job.tag(), "mutation saved");
            match service.list_posts() {
                Ok(snapshot) => MutationStatus::Saved {
                    posts: snapshot.data,
                },
                Err(err) => {
                    tracing::warn!(ticket, error = %err, "reload after write failed");
                    MutationStatus::SavedWithoutReload {
                        error: format!("{err:#}"),
                    }
                }
            }
        }
    };

    MutationOutcome {
        ticket,
        job,
        status,
    }
}
