//! Scripted fakes for the I/O seam, for tests that drive whole send/reconnect scenarios.
//!  Single-interaction expectations use the mockall mocks instead.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;

use crate::connection::{GatewayStream, StreamConnector};

/// What a [`ScriptedStream`] does when the verdict read is attempted.
pub(crate) enum ReadBehavior {
    /// Never completes - exercises the deadline path.
    Silent,
    /// Completes once with these bytes; subsequent reads never complete.
    Respond(Vec<u8>),
    /// Fails with an I/O-style error.
    Fail(&'static str),
}

/// Stand-in for the TLS stream: records written frames and plays back a scripted read
///  behavior.
pub(crate) struct ScriptedStream {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_write_at: Option<usize>,
    read_behavior: ReadBehavior,
    responded: bool,
}

impl ScriptedStream {
    pub fn new(read_behavior: ReadBehavior) -> ScriptedStream {
        ScriptedStream {
            written: Default::default(),
            fail_write_at: None,
            read_behavior,
            responded: false,
        }
    }

    /// Makes the nth (0-based) `write_frame` call fail.
    pub fn failing_write_at(mut self, index: usize) -> ScriptedStream {
        self.fail_write_at = Some(index);
        self
    }

    /// Handle on the recorded frames; survives moving the stream into a connection.
    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.written.clone()
    }
}

#[async_trait]
impl GatewayStream for ScriptedStream {
    async fn write_frame(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        let mut written = self.written.lock().unwrap();
        if self.fail_write_at == Some(written.len()) {
            bail!("scripted write failure");
        }
        written.push(buf.to_vec());
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> anyhow::Result<()> {
        if let ReadBehavior::Fail(msg) = &self.read_behavior {
            bail!("{}", msg);
        }
        if let ReadBehavior::Respond(bytes) = &self.read_behavior {
            if !self.responded {
                let bytes = bytes.clone();
                self.responded = true;
                buf.copy_from_slice(&bytes[..buf.len()]);
                return Ok(());
            }
        }
        std::future::pending::<anyhow::Result<()>>().await
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hands out a queue of scripted streams, one per `connect` call; errors when exhausted,
///  which doubles as the reconnect-failure fixture.
pub(crate) struct ScriptedConnector {
    streams: Mutex<VecDeque<ScriptedStream>>,
}

impl ScriptedConnector {
    pub fn new(streams: Vec<ScriptedStream>) -> ScriptedConnector {
        ScriptedConnector {
            streams: Mutex::new(streams.into()),
        }
    }

    pub fn empty() -> ScriptedConnector {
        ScriptedConnector::new(Vec::new())
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn GatewayStream>> {
        match self.streams.lock().unwrap().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => bail!("no more scripted streams"),
        }
    }
}
