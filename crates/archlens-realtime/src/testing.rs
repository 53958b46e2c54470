//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use archlens_core::error::AppError;
use archlens_core::result::AppResult;

use crate::connection::FrameSink;

/// Sink that records frames, or fails every write.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub frames: Arc<Mutex<Vec<String>>>,
    pub pings: Arc<Mutex<usize>>,
    pub closed: Arc<Mutex<bool>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: &str) -> AppResult<()> {
        if self.fail {
            return Err(AppError::internal("broken pipe"));
        }
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_ping(&mut self) -> AppResult<()> {
        if self.fail {
            return Err(AppError::internal("broken pipe"));
        }
        *self.pings.lock().unwrap() += 1;
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
