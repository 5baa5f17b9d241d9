//! Streaming transcoder from the feed encoding to UTF-8.
//!
//! Works through fixed-size buffers so memory stays flat regardless of feed
//! size. Malformed input surfaces as an `InvalidData` I/O error carrying a
//! [`MalformedInput`] payload.

use encoding_rs::{DecoderResult, Encoding};
use std::fmt;
use std::io::{self, Read};

const INPUT_BUFFER: usize = 64 * 1024;
const OUTPUT_BUFFER: usize = 128 * 1024;

/// Raised when a byte sequence is invalid in the feed encoding.
#[derive(Debug)]
pub struct MalformedInput {
    pub encoding: &'static str,
    /// Byte offset of the first byte after the malformed sequence.
    pub offset: u64,
}

impl fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {} sequence before byte {}", self.encoding, self.offset)
    }
}

impl std::error::Error for MalformedInput {}

/// Pull the [`MalformedInput`] out of an I/O error, if that is what it is.
pub fn malformed_input(err: &io::Error) -> Option<&MalformedInput> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<MalformedInput>())
}

pub struct DecodingReader<R> {
    inner: R,
    encoding: &'static Encoding,
    decoder: encoding_rs::Decoder,
    input: Vec<u8>,
    input_start: usize,
    input_end: usize,
    output: Vec<u8>,
    output_start: usize,
    output_end: usize,
    consumed: u64,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    /// A leading byte-order mark of `encoding` is dropped.
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0; INPUT_BUFFER],
            input_start: 0,
            input_end: 0,
            output: vec![0; OUTPUT_BUFFER],
            output_start: 0,
            output_end: 0,
            consumed: 0,
            eof: false,
            finished: false,
        }
    }

    fn fill_output(&mut self) -> io::Result<()> {
        if self.input_start == self.input_end && !self.eof {
            let n = self.inner.read(&mut self.input)?;
            self.input_start = 0;
            self.input_end = n;
            self.eof = n == 0;
        }

        let (result, read, written) = self.decoder.decode_to_utf8_without_replacement(
            &self.input[self.input_start..self.input_end],
            &mut self.output,
            self.eof,
        );
        self.input_start += read;
        self.consumed += read as u64;
        self.output_start = 0;
        self.output_end = written;

        match result {
            DecoderResult::InputEmpty => {
                if self.eof {
                    self.finished = true;
                }
                Ok(())
            }
            DecoderResult::OutputFull => Ok(()),
            DecoderResult::Malformed(_, _) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                MalformedInput {
                    encoding: self.encoding.name(),
                    offset: self.consumed,
                },
            )),
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_start < self.output_end {
                let n = buf.len().min(self.output_end - self.output_start);
                buf[..n].copy_from_slice(&self.output[self.output_start..self.output_start + n]);
                self.output_start += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.fill_output()?;
        }
    }
}
