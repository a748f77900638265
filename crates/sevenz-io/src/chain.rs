//! Sequential concatenation of closable streams.

use crate::stream::ReadClose;
use std::io::{self, Read};
use tracing::trace;

/// The streams a [`ChainStream`] concatenates.
pub type ChainMember = Box<dyn ReadClose + Send>;

/// Logical concatenation of byte streams.
///
/// Members are read in order; end of data is reported only once the last
/// member is exhausted, and a member's failure is reported immediately.
/// Nested chains are spliced flat when appended, so a read never traverses
/// more than one level of indirection.
pub struct ChainStream {
    members: Vec<ChainMember>,
    current: usize,
}

impl ChainStream {
    pub fn new(members: Vec<ChainMember>) -> Self {
        Self {
            members,
            current: 0,
        }
    }

    /// Append one stream to the end of the chain.
    pub fn push(&mut self, member: ChainMember) {
        self.members.push(member);
    }

    /// Splice another chain's members onto the end of this one.
    ///
    /// The other chain is dissolved: its members land inline here, so the
    /// result is a single flat chain. Members the other chain had already
    /// exhausted simply report end of data and are skipped over, keeping
    /// this chain responsible for closing every member exactly once.
    pub fn append_chain(&mut self, mut other: ChainStream) {
        trace!(
            "Splicing {} chained streams onto {}",
            other.members.len(),
            self.members.len()
        );
        self.members.append(&mut other.members);
    }

    /// Number of member streams, exhausted ones included.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl Read for ChainStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current < self.members.len() {
            match self.members[self.current].read(buf)? {
                0 => {
                    trace!("Chained stream {} exhausted", self.current);
                    self.current += 1;
                }
                n => return Ok(n),
            }
        }
        Ok(0)
    }
}

impl ReadClose for ChainStream {
    fn close(&mut self) -> io::Result<()> {
        for member in &mut self.members {
            member.close()?;
        }
        Ok(())
    }
}
