use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::data::loader::LabeledImage;
use crate::error::{Error, ErrorKind, Result};
use crate::ingest;
use crate::math::tensor::Tensor;

/// One decoded minibatch.
#[derive(Debug)]
pub struct Batch {
    pub images: Vec<Tensor>,
    pub targets: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Decodes minibatches on a background thread, ahead of the consumer.
///
/// A single worker walks `order` front to back and hands batches over a
/// bounded channel, so batches arrive in exactly the order they were
/// requested. The first decode failure is delivered in place of its batch
/// and ends the stream.
pub struct Prefetcher {
    rx: Option<Receiver<Result<Batch>>>,
    worker: Option<JoinHandle<()>>,
}

impl Prefetcher {
    pub fn spawn(
        items: Arc<[LabeledImage]>,
        order: Vec<usize>,
        batch_size: usize,
        (height, width): (usize, usize),
        depth: usize,
    ) -> Prefetcher {
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        let batch_size = batch_size.max(1);

        let worker = thread::spawn(move || {
            for chunk in order.chunks(batch_size) {
                let batch = decode_batch(&items, chunk, height, width);
                let failed = batch.is_err();
                // Receiver gone: the consumer stopped early.
                if tx.send(batch).is_err() || failed {
                    return;
                }
            }
        });

        Prefetcher { rx: Some(rx), worker: Some(worker) }
    }
}

fn decode_batch(items: &[LabeledImage], chunk: &[usize], height: usize, width: usize) -> Result<Batch> {
    let mut images = Vec::with_capacity(chunk.len());
    let mut targets = Vec::with_capacity(chunk.len());
    for &i in chunk {
        let item = &items[i];
        let bytes = item.source.read()?;
        let tensor = ingest::decode_resized(&bytes, height, width).map_err(|e| match e.kind() {
            ErrorKind::Decode => Error::data(format!("{}: {e}", item.source.describe())),
            _ => e,
        })?;
        images.push(tensor);
        targets.push(item.class_id);
    }
    Ok(Batch { images, targets })
}

impl Iterator for Prefetcher {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        // Dropping the receiver unblocks a worker stuck on a full channel.
        drop(self.rx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
