//! Streaming reader over a scroll cursor
//!
//! Walks every batch, continuing the scroll whenever the current batch runs
//! dry, and releases the cursor as soon as the last hit has been handed out.

use super::backend::SearchHit;
use super::cursor::ScrollCursor;
use super::errors::ScrollResult;

#[derive(Debug)]
pub struct ScrollStream {
    cursor: ScrollCursor,
    done: bool,
}

impl ScrollStream {
    pub fn new(cursor: ScrollCursor) -> Self {
        Self {
            cursor,
            done: false,
        }
    }

    /// Stop early and release the cursor
    pub fn close(mut self) {
        self.finish();
    }

    pub fn cursor(&self) -> &ScrollCursor {
        &self.cursor
    }

    fn finish(&mut self) {
        self.done = true;
        self.cursor.release();
    }
}

impl Iterator for ScrollStream {
    type Item = ScrollResult<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(hit) = self.cursor.next_hit() {
                return Some(Ok(hit));
            }
            if self.cursor.is_final() {
                self.finish();
                return None;
            }
            if let Err(e) = self.cursor.advance() {
                self.finish();
                return Some(Err(e));
            }
        }
    }
}
