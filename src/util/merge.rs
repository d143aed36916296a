// src/util/merge.rs

//! Merging of multiple byte streams into one reader
//!
//! A [`MergeReader`] multiplexes several readers, typically a child
//! process's stdout and stderr pipes, into a single [`Read`]
//! implementation. One producer thread drains each source in small chunks
//! into a bounded channel; the consumer keeps a carry buffer so that
//! partial reads never lose data. Content is preserved byte for byte, but
//! ordering between the sources is not guaranteed.

use std::io::{self, Read};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;

const CHUNK_SIZE: usize = 4096;
const CHANNEL_BOUND: usize = 8;

enum Chunk {
    Data(Vec<u8>),
    Failed(io::Error),
}

/// A reader over the merged content of several underlying readers.
pub struct MergeReader {
    receiver: Receiver<Chunk>,
    carry: Vec<u8>,
    carry_offset: usize,
}

impl MergeReader {
    /// Starts draining the given readers and returns the merged reader.
    ///
    /// The producer threads run until their sources are exhausted; dropping
    /// the merged reader early detaches them.
    pub fn new(readers: Vec<Box<dyn Read + Send>>) -> Self {
        let (sender, receiver) = sync_channel::<Chunk>(CHANNEL_BOUND);

        for mut reader in readers {
            let sender = sender.clone();
            thread::spawn(move || {
                let mut buf = [0u8; CHUNK_SIZE];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => return,
                        Ok(n) => {
                            if sender.send(Chunk::Data(buf[..n].to_vec())).is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            let _ = sender.send(Chunk::Failed(err));
                            return;
                        }
                    }
                }
            });
        }

        // The channel closes once every producer has finished.
        drop(sender);

        MergeReader {
            receiver,
            carry: Vec::new(),
            carry_offset: 0,
        }
    }
}

impl Read for MergeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.carry_offset < self.carry.len() {
            let remaining = &self.carry[self.carry_offset..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.carry_offset += n;
            return Ok(n);
        }

        match self.receiver.recv() {
            Ok(Chunk::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.carry = data;
                    self.carry_offset = n;
                }
                Ok(n)
            }
            Ok(Chunk::Failed(err)) => Err(err),
            Err(_) => Ok(0),
        }
    }
}
