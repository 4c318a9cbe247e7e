//! Raw DEFLATE backend on top of `flate2`.
//!
//! ZIP stores DEFLATE payloads without the zlib wrapper, so both engines are
//! created with the header disabled.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tracing::trace;

use super::{CompressionLevel, Compressor};
use crate::error::{Error, Result};

/// Chunk size used for feeding input and draining output.
const CHUNK_SIZE: usize = 16 * 1024;

/// Streaming DEFLATE compressor.
///
/// Each call creates a fresh engine, so the value itself carries no stream state
/// between calls, only a reusable scratch buffer.
#[derive(Debug)]
pub struct DeflateCompressor {
    buffer: Vec<u8>,
}

impl DeflateCompressor {
    pub fn new() -> Self {
        Self {
            buffer: vec![0u8; CHUNK_SIZE],
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for DeflateCompressor {
    fn compress(&mut self, input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        if level == CompressionLevel::Store {
            return Ok(input.to_vec());
        }

        let mut engine = Compress::new(Compression::new(level.effort()), false);
        let mut output = Vec::with_capacity(input.len() / 2 + 64);

        for chunk in input.chunks(CHUNK_SIZE) {
            let mut pending = chunk;
            while !pending.is_empty() {
                let (consumed, produced, _) =
                    step_compress(&mut engine, pending, &mut self.buffer, FlushCompress::None)?;
                output.extend_from_slice(&self.buffer[..produced]);
                pending = &pending[consumed..];

                if consumed == 0 && produced == 0 {
                    return Err(Error::Compression("deflate engine made no progress".into()));
                }
            }
        }

        loop {
            let (_, produced, status) =
                step_compress(&mut engine, &[], &mut self.buffer, FlushCompress::Finish)?;
            output.extend_from_slice(&self.buffer[..produced]);

            match status {
                Status::StreamEnd => break,
                _ if produced == 0 => {
                    return Err(Error::Compression("deflate engine stalled while finishing".into()));
                }
                _ => {}
            }
        }

        trace!(
            input = input.len(),
            output = output.len(),
            level = level.effort(),
            "deflated buffer"
        );
        Ok(output)
    }

    fn decompress(&mut self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let mut engine = Decompress::new(false);
        // DEFLATE cannot expand more than ~1032:1, so a larger hint is bogus
        let capacity = if expected_size > 0 {
            expected_size.min(input.len().saturating_mul(1032))
        } else {
            input.len().saturating_mul(2)
        };
        let mut output = Vec::with_capacity(capacity);
        let mut remaining = input;

        loop {
            let window = &remaining[..remaining.len().min(CHUNK_SIZE)];
            let before_in = engine.total_in();
            let before_out = engine.total_out();

            let status = engine
                .decompress(window, &mut self.buffer, FlushDecompress::None)
                .map_err(|e| Error::Decompression(e.to_string()))?;

            let consumed = (engine.total_in() - before_in) as usize;
            let produced = (engine.total_out() - before_out) as usize;
            output.extend_from_slice(&self.buffer[..produced]);
            remaining = &remaining[consumed..];

            if status == Status::StreamEnd {
                break;
            }
            if consumed == 0 && produced == 0 {
                return Err(Error::Decompression(
                    "compressed stream ended before its final block".into(),
                ));
            }
        }

        trace!(input = input.len(), output = output.len(), "inflated buffer");
        Ok(output)
    }
}

fn step_compress(
    engine: &mut Compress,
    input: &[u8],
    buffer: &mut [u8],
    flush: FlushCompress,
) -> Result<(usize, usize, Status)> {
    let before_in = engine.total_in();
    let before_out = engine.total_out();

    let status = engine
        .compress(input, buffer, flush)
        .map_err(|e| Error::Compression(e.to_string()))?;

    let consumed = (engine.total_in() - before_in) as usize;
    let produced = (engine.total_out() - before_out) as usize;
    Ok((consumed, produced, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [CompressionLevel; 3] = [
        CompressionLevel::Fast,
        CompressionLevel::Default,
        CompressionLevel::Maximum,
    ];

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    fn text(len: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog; "
            .iter()
            .cycle()
            .take(len)
            .copied()
            .collect()
    }

    #[test]
    fn compress_and_decompress() {
        let input = b"Hello, World! This is a test string for compression.".repeat(4);
        let mut compressor = DeflateCompressor::new();

        let compressed = compressor.compress(&input, CompressionLevel::Default).unwrap();
        assert!(compressed.len() < input.len());

        let decompressed = compressor.decompress(&compressed, input.len()).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn empty_input() {
        let mut compressor = DeflateCompressor::new();
        for level in LEVELS.into_iter().chain([CompressionLevel::Store]) {
            assert!(compressor.compress(&[], level).unwrap().is_empty());
        }
        assert!(compressor.decompress(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn round_trip_all_levels_across_chunks() {
        let mut compressor = DeflateCompressor::new();
        let inputs = [vec![0x42], text(CHUNK_SIZE - 1), text(CHUNK_SIZE * 3 + 7), pattern(100_000)];

        for input in &inputs {
            for level in LEVELS {
                let compressed = compressor.compress(input, level).unwrap();
                let restored = compressor.decompress(&compressed, input.len()).unwrap();
                assert_eq!(&restored, input, "level {level:?}, {} bytes", input.len());
            }
        }
    }

    #[test]
    fn store_returns_input_unchanged() {
        let input = pattern(1024 * 1024);
        let mut compressor = DeflateCompressor::new();
        let stored = compressor.compress(&input, CompressionLevel::Store).unwrap();
        assert_eq!(stored.len(), input.len());
        assert_eq!(stored, input);
    }

    #[test]
    fn maximum_is_not_worse_than_fast() {
        let input = text(1024 * 1024);
        let mut compressor = DeflateCompressor::new();
        let fast = compressor.compress(&input, CompressionLevel::Fast).unwrap();
        let max = compressor.compress(&input, CompressionLevel::Maximum).unwrap();
        assert!(max.len() <= fast.len(), "max {} > fast {}", max.len(), fast.len());
    }

    #[test]
    fn hint_never_truncates() {
        let input = text(200_000);
        let mut compressor = DeflateCompressor::new();
        let compressed = compressor.compress(&input, CompressionLevel::Default).unwrap();

        let restored = compressor.decompress(&compressed, 10).unwrap();
        assert_eq!(restored.len(), input.len());
        let restored = compressor.decompress(&compressed, 0).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn truncated_stream_is_decompression_error() {
        let input = pattern(64 * 1024);
        let mut compressor = DeflateCompressor::new();
        let compressed = compressor.compress(&input, CompressionLevel::Default).unwrap();

        let err = compressor
            .decompress(&compressed[..compressed.len() / 2], input.len())
            .unwrap_err();
        assert!(matches!(err, Error::Decompression(_)), "{err}");
    }

    #[test]
    fn garbage_is_decompression_error() {
        let mut compressor = DeflateCompressor::new();
        // BTYPE = 11 is reserved in DEFLATE
        let err = compressor.decompress(&[0xff, 0xff, 0xff, 0xff], 0).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)), "{err}");
    }
}
