use bytes::BytesMut;

use super::{Io, CR_LF};

/// end of data sequence, written after the `"\r\n"` ending the last line
const EOD_SEQ: &str = ".\r\n";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum CrLf {
    None,
    HitCr,
    HitLf,
}

/// Incremental dot-stashing (dot-stuffing) of a mail body
///
/// Keeps track of line starts across calls, so the body can be passed in
/// arbitrary chunks. The state starts as if a line just ended, i.e. a `'.'`
/// as first byte of the body is stashed, too.
#[derive(Debug, Clone)]
pub struct DotStasher {
    state: CrLf,
}

impl DotStasher {
    pub fn new() -> Self {
        DotStasher { state: CrLf::HitLf }
    }

    /// writes `unstashed` to `out` doubling every `'.'` at the start of a line
    pub fn stash_into(&mut self, unstashed: &[u8], out: &mut BytesMut) {
        let mut state = self.state;
        let mut start = 0;
        for (idx, &bch) in unstashed.iter().enumerate() {
            let (stash, new_state) = match (bch, state) {
                (b'\r', _) => (false, CrLf::HitCr),
                (b'\n', CrLf::HitCr) => (false, CrLf::HitLf),
                (b'.', CrLf::HitLf) => (true, CrLf::None),
                // this _could_ be invalid data but legacy systems _should_
                // be able to handle orphan '\r'/'\n' so treat it as ok
                (_, _) => (false, CrLf::None),
            };
            state = new_state;
            if stash {
                // write everything up to and including the '.' then
                // start the next segment with the same '.'
                out.extend_from_slice(&unstashed[start..=idx]);
                start = idx;
            }
        }
        out.extend_from_slice(&unstashed[start..]);
        self.state = state;
    }

    /// writes the end of data sequence to `out`
    ///
    /// A `"\r\n"` is only added if the body did not already end with one.
    pub fn finish_into(&mut self, out: &mut BytesMut) {
        if self.state != CrLf::HitLf {
            out.extend_from_slice(CR_LF.as_bytes());
        }
        out.extend_from_slice(EOD_SEQ.as_bytes());
        self.state = CrLf::HitLf;
    }
}

impl Default for DotStasher {
    fn default() -> Self {
        DotStasher::new()
    }
}

impl Io {
    /// dot-stashes `unstashed` into the output buffer
    pub fn write_dot_stashed(&mut self, stasher: &mut DotStasher, unstashed: &[u8]) {
        #[cfg(feature = "log")]
        log_facade::trace!("C: <mail body redacted> ({} bytes)", unstashed.len());
        let out = self.out_buffer(unstashed.len());
        stasher.stash_into(unstashed, out);
    }

    /// writes the end of data sequence into the output buffer
    pub fn write_end_of_data(&mut self, stasher: &mut DotStasher) {
        let out = self.out_buffer(CR_LF.len() + EOD_SEQ.len());
        stasher.finish_into(out);
    }
}
