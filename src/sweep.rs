//! Linear sweep over a flat image, sequential or chunked on the rayon pool.

use std::time::Instant;

use rayon::prelude::*;

use crate::{Address, DecodeOracle, DecodedInstruction, Decoder, DecoderConfig, DetailError};

/// Bytes each parallel chunk owns.
const CHUNK_SIZE: usize = 4096;

/// Decode `image` front to back, starting at address `base`.
///
/// Bytes nothing decodes at become one-byte placeholders, so the result
/// covers the image exactly: each instruction starts where the previous one
/// ends. Errors other than `NoInstruction` stop the sweep.
pub fn sweep<O: DecodeOracle>(
    decoder: &Decoder<O>,
    image: &[u8],
    base: Address,
) -> Result<Vec<DecodedInstruction>, DetailError> {
    sweep_range(decoder, image, base, 0, image.len())
}

/// Sweep `image[start..]`, stopping at the first instruction that starts at or after `end`.
fn sweep_range<O: DecodeOracle>(
    decoder: &Decoder<O>,
    image: &[u8],
    base: Address,
    start: usize,
    end: usize,
) -> Result<Vec<DecodedInstruction>, DetailError> {
    let mut insns = Vec::new();
    let mut skipped = 0usize;
    let mut offset = start;

    while offset < end {
        let insn = decoder.decode_or_skip(&image[offset..], base + offset as Address)?;
        if insn.is_bad_byte() {
            skipped += 1;
        }
        offset += usize::from(insn.size).max(1);
        insns.push(insn);
    }

    log::trace!(
        "swept {:#x}..{:#x}: {} instructions, {} bad bytes",
        base + start as Address,
        base + offset as Address,
        insns.len(),
        skipped
    );
    Ok(insns)
}

/// Sweep `image` in parallel, one decoder session per chunk.
///
/// Each chunk decodes past its end by the target's longest encoding and keeps
/// only instructions starting inside it. Chunks resynchronize independently,
/// so an instruction that a neighbouring chunk already covered is dropped and
/// the result can have a gap where two chunks disagree. Without gaps it is
/// identical to [`sweep`].
pub fn par_sweep(
    config: &DecoderConfig,
    image: &[u8],
    base: Address,
) -> Result<Vec<DecodedInstruction>, DetailError> {
    if image.is_empty() {
        return Ok(Vec::new());
    }

    let start_time = Instant::now();
    let overlap = config.target.max_instruction_size();
    let num_chunks = image.len().div_ceil(CHUNK_SIZE);
    log::debug!(
        "sweeping {} bytes of {} in {} chunks",
        image.len(),
        config.target,
        num_chunks
    );

    let chunks = (0..num_chunks)
        .into_par_iter()
        .map(|chunk_idx| {
            let start = chunk_idx * CHUNK_SIZE;
            let end = (start + CHUNK_SIZE).min(image.len());
            let decoder = Decoder::open(config)?;
            // Decode with lookahead so the chunk's last instruction is complete.
            let window = &image[..(end + overlap).min(image.len())];
            sweep_range(&decoder, window, base, start, end)
        })
        .collect::<Result<Vec<_>, DetailError>>()?;

    let mut merged: Vec<DecodedInstruction> = Vec::new();
    let mut dropped = 0usize;
    for insn in chunks.into_iter().flatten() {
        match merged.last() {
            Some(prev) if insn.address < prev.end_address() => dropped += 1,
            _ => merged.push(insn),
        }
    }

    log::debug!(
        "parallel sweep finished in {:?}: {} instructions, {} dropped at chunk seams",
        start_time.elapsed(),
        merged.len(),
        dropped
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_oracle::{record, StubOracle};
    use crate::Target;

    #[test]
    fn test_sweep_covers_image() {
        let decoder = Decoder::with_oracle(StubOracle::new(Target::Arm, false, Some(record(None))));
        let image = [1, 2, 3, 4, 5];

        let insns = sweep(&decoder, &image, 0x1000).unwrap();
        assert_eq!(insns.len(), 3);
        assert_eq!(insns[0].address, 0x1000);
        assert_eq!(insns[1].address, 0x1002);
        // One trailing byte is too short for the two-byte record.
        assert!(insns[2].is_bad_byte());
        assert_eq!(insns[2].bytes, vec![5]);

        let mut expected = 0x1000;
        for insn in &insns {
            assert_eq!(insn.address, expected);
            assert_eq!(insn.bytes.len(), usize::from(insn.size));
            expected = insn.end_address();
        }
        assert_eq!(expected, 0x1005);
    }

    #[test]
    fn test_sweep_empty_image() {
        let decoder = Decoder::with_oracle(StubOracle::new(Target::Arm, false, None));
        assert!(sweep(&decoder, &[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_par_sweep_matches_sweep() -> anyhow::Result<()> {
        // nop; mov eax, 1; repeated past several chunk boundaries.
        let pattern = [0x90, 0xb8, 0x01, 0x00, 0x00, 0x00];
        let image: Vec<u8> = pattern.iter().copied().cycle().take(3 * CHUNK_SIZE + 100).collect();
        let config = DecoderConfig {
            target: Target::X86_32,
            detail: false,
            ..DecoderConfig::default()
        };

        let parallel = par_sweep(&config, &image, 0x400000)?;
        let sequential = sweep(&Decoder::open(&config)?, &image, 0x400000)?;
        assert_eq!(parallel, sequential);

        for pair in parallel.windows(2) {
            assert_eq!(pair[0].end_address(), pair[1].address);
        }
        Ok(())
    }
}
